//! Reflow decoded lines into screen-sized pages.
//!
//! Three strategies share one entry point, [`paginate`]. Every strategy
//! returns at least one page; input that produces nothing printable gets a
//! single placeholder page.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

pub type Page = String;

pub const EMPTY_CONTENT_MESSAGE: &str =
    "📖 Empty file or undecodable content; check the file format";

/// Rows reserved for the title and status bars by the reflow strategy.
const REFLOW_RESERVED_ROWS: usize = 2;
/// Rows reserved for title, status, and progress rows by the line-count strategies.
const FIXED_RESERVED_ROWS: usize = 4;
/// A new paragraph starting this close to the bottom moves to the next page.
const PARAGRAPH_LOOKAHEAD: usize = 5;

static CHAPTER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^第[零一二三四五六七八九十百千]+章\s*[^\s]{0,20}",
        r"^第[0-9]+章\s*[^\s]{0,20}",
        r"^卷[零一二三四五六七八九十百千]+\s*[^\s]{0,20}",
        r"^[0-9]+\.[0-9]+\s+[^\s]{0,20}",
        r"^[一二三四五六七八九十]+、\s*[^\s]{0,20}",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("chapter pattern is valid"))
    .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sides {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

impl Sides {
    pub fn uniform(size: usize) -> Self {
        Self {
            top: size,
            bottom: size,
            left: size,
            right: size,
        }
    }

    pub fn horizontal(&self) -> usize {
        self.left + self.right
    }

    pub fn vertical(&self) -> usize {
        self.top + self.bottom
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutParams {
    pub width: usize,
    pub height: usize,
    pub margin: Sides,
    pub padding: Sides,
    /// Explicit page length for the line-count strategies.
    pub lines_per_page: Option<usize>,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

impl LayoutParams {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            margin: Sides::default(),
            padding: Sides::default(),
            lines_per_page: None,
        }
    }

    pub fn with_margin(mut self, margin: Sides) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_padding(mut self, padding: Sides) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_lines_per_page(mut self, lines: Option<usize>) -> Self {
        self.lines_per_page = lines;
        self
    }

    /// Columns available to text after margins and padding.
    pub fn max_width(&self) -> usize {
        self.width
            .saturating_sub(self.margin.horizontal() + self.padding.horizontal())
            .max(1)
    }

    /// Rows available to reflowed text after margins, padding, and the bars.
    pub fn max_height(&self) -> usize {
        self.height
            .saturating_sub(
                self.margin.vertical() + self.padding.vertical() + REFLOW_RESERVED_ROWS,
            )
            .max(1)
    }

    pub fn rows_per_page(&self) -> usize {
        match self.lines_per_page {
            Some(lines) if lines > 0 => lines,
            _ => self
                .height
                .saturating_sub(
                    self.margin.vertical() + self.padding.vertical() + FIXED_RESERVED_ROWS,
                )
                .max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Strategy {
    /// Word wrap with chapter headings isolated on their own pages.
    #[default]
    #[serde(rename = "reflow")]
    Reflow,
    /// Fixed number of source lines per page, no wrapping.
    #[serde(rename = "fixed")]
    FixedLines,
    /// Fixed line count that avoids starting a paragraph at a page bottom.
    #[serde(rename = "paragraph")]
    Paragraph,
}

impl Strategy {
    pub fn label(self) -> &'static str {
        match self {
            Strategy::Reflow => "reflow",
            Strategy::FixedLines => "fixed",
            Strategy::Paragraph => "paragraph",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Strategy::Reflow => Strategy::FixedLines,
            Strategy::FixedLines => Strategy::Paragraph,
            Strategy::Paragraph => Strategy::Reflow,
        }
    }

    /// Whether pages are already wrapped to the layout width.
    pub fn wraps(self) -> bool {
        self == Strategy::Reflow
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reflow" | "a" => Ok(Strategy::Reflow),
            "fixed" | "b" => Ok(Strategy::FixedLines),
            "paragraph" | "c" => Ok(Strategy::Paragraph),
            other => Err(format!(
                "unknown strategy '{other}' (expected reflow, fixed, or paragraph)"
            )),
        }
    }
}

pub fn is_chapter_heading(line: &str) -> bool {
    CHAPTER_PATTERNS.iter().any(|re| re.is_match(line))
}

/// Terminal column width; wide characters such as CJK count as two.
pub fn display_width(text: &str) -> usize {
    UnicodeWidthStr::width(text)
}

pub fn clamp_page_index(index: usize, total_pages: usize) -> usize {
    if total_pages == 0 {
        0
    } else {
        index.min(total_pages - 1)
    }
}

pub fn paginate<S: AsRef<str>>(lines: &[S], layout: &LayoutParams, strategy: Strategy) -> Vec<Page> {
    let pages = match strategy {
        Strategy::Reflow => reflow(lines, layout),
        Strategy::FixedLines => fixed_lines(lines, layout.rows_per_page()),
        Strategy::Paragraph => paragraph_aware(lines, layout.rows_per_page()),
    };

    if pages.iter().all(|page| page.trim().is_empty()) {
        vec![EMPTY_CONTENT_MESSAGE.to_string()]
    } else {
        pages
    }
}

#[derive(Default)]
struct PageBuffer {
    text: String,
    rows: usize,
    line_width: usize,
    row_open: bool,
}

impl PageBuffer {
    fn push_word(&mut self, word: &str, width: usize) {
        if self.row_open {
            self.text.push(' ');
            self.line_width += 1;
        }
        self.text.push_str(word);
        self.line_width += width;
        self.row_open = true;
    }

    fn break_row(&mut self) {
        self.text.push('\n');
        self.rows += 1;
        self.line_width = 0;
        self.row_open = false;
    }

    fn flush_into(&mut self, pages: &mut Vec<Page>) {
        if !self.text.is_empty() {
            pages.push(std::mem::take(&mut self.text));
        }
        self.rows = 0;
        self.line_width = 0;
        self.row_open = false;
    }
}

fn reflow<S: AsRef<str>>(lines: &[S], layout: &LayoutParams) -> Vec<Page> {
    let max_width = layout.max_width();
    let max_height = layout.max_height();
    let mut pages = Vec::new();
    let mut page = PageBuffer::default();

    for line in lines {
        let line = line.as_ref().trim();
        if line.is_empty() {
            continue;
        }

        if is_chapter_heading(line) {
            page.flush_into(&mut pages);
            pages.push(line.to_string());
            continue;
        }

        for word in line.split_whitespace() {
            let word_width = display_width(word);
            // A word wider than the page still lands on its own row.
            if page.row_open && page.line_width + word_width + 1 > max_width {
                page.break_row();
            }
            if !page.row_open && page.rows >= max_height {
                page.flush_into(&mut pages);
            }
            page.push_word(word, word_width);
        }

        page.break_row();
        if page.rows >= max_height {
            page.flush_into(&mut pages);
        }
    }

    page.flush_into(&mut pages);
    pages
}

fn fixed_lines<S: AsRef<str>>(lines: &[S], rows_per_page: usize) -> Vec<Page> {
    lines
        .chunks(rows_per_page.max(1))
        .map(|chunk| {
            chunk
                .iter()
                .map(AsRef::as_ref)
                .collect::<Vec<&str>>()
                .join("\n")
        })
        .collect()
}

fn paragraph_aware<S: AsRef<str>>(lines: &[S], rows_per_page: usize) -> Vec<Page> {
    let rows_per_page = rows_per_page.max(1);
    let mut pages = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let line = line.as_ref();

        if line.trim().is_empty() {
            if current.len() >= rows_per_page {
                pages.push(current.join("\n"));
                current.clear();
            }
            current.push(line);
            continue;
        }

        let paragraph_start = i > 0 && lines[i - 1].as_ref().trim().is_empty();
        let near_bottom = current.len() + PARAGRAPH_LOOKAHEAD > rows_per_page;
        if (!current.is_empty() && paragraph_start && near_bottom)
            || current.len() >= rows_per_page
        {
            pages.push(current.join("\n"));
            current.clear();
        }
        current.push(line);
    }

    if !current.is_empty() {
        pages.push(current.join("\n"));
    }
    pages
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageMatch {
    pub page: usize,
    pub preview: String,
}

/// A page sequence together with the inputs that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Pages {
    pages: Vec<Page>,
    layout: LayoutParams,
    strategy: Strategy,
}

impl Pages {
    pub fn build<S: AsRef<str>>(lines: &[S], layout: LayoutParams, strategy: Strategy) -> Self {
        let pages = paginate(lines, &layout, strategy);
        Self {
            pages,
            layout,
            strategy,
        }
    }

    /// Rebuild from the full line list and return `current_page` clamped to
    /// the new page count. The old sequence stays intact until the new one
    /// is complete.
    pub fn reflow<S: AsRef<str>>(
        &mut self,
        lines: &[S],
        layout: LayoutParams,
        strategy: Strategy,
        current_page: usize,
    ) -> usize {
        let rebuilt = Self::build(lines, layout, strategy);
        *self = rebuilt;
        clamp_page_index(current_page, self.total())
    }

    pub fn total(&self) -> usize {
        self.pages.len()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.pages.get(index).map(String::as_str)
    }

    pub fn as_slice(&self) -> &[Page] {
        &self.pages
    }

    pub fn layout(&self) -> &LayoutParams {
        &self.layout
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Case-insensitive substring search; one hit per matching page.
    pub fn search(&self, query: &str) -> Vec<PageMatch> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.pages
            .iter()
            .enumerate()
            .filter_map(|(page, text)| {
                text.lines()
                    .find(|line| line.to_lowercase().contains(&needle))
                    .map(|line| PageMatch {
                        page,
                        preview: line.trim().chars().take(60).collect(),
                    })
            })
            .collect()
    }
}
