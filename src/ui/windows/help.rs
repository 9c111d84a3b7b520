use ratatui::{
    Frame,
    layout::Rect,
    text::Line,
    widgets::{Block, Borders, Clear, Paragraph},
};

pub struct HelpWindow;

const HELP_TEXT: &[&str] = &[
    " Reading:",
    "   l / Right / Space   Next Page",
    "   h / Left / PgUp     Previous Page",
    "   PgDn                Next Page",
    "   g / Home            First Page",
    "   G / End             Last Page",
    "   <digits> Enter      Go To Page",
    "",
    " Layout:",
    "   + / -               Larger / Smaller Font",
    "   S                   Cycle Pagination Strategy",
    "",
    " Search:",
    "   /                   Search",
    "   n / N               Next / Previous Hit",
    "",
    " Bookmarks & Library:",
    "   b                   Add Bookmark (with note)",
    "   m                   Bookmarks",
    "   r                   Library (History)",
    "   x                   Book Info & Reading Stats",
    "   e                   Export Bookmarks & Stats",
    "",
    " Hands Free:",
    "   a                   Toggle Auto Page Flip",
    "   t                   Toggle Read Aloud",
    "",
    "   s                   Settings",
    "   i                   Hide / Show Reader",
    "   ?                   Help",
    "   q / Esc             Close Window / Quit",
];

impl HelpWindow {
    pub fn get_total_lines() -> usize {
        HELP_TEXT.len()
    }

    /// Largest useful scroll offset for a frame of the given size.
    pub fn max_scroll_offset(area: Rect) -> u16 {
        let visible = area.height.saturating_sub(2) as usize;
        Self::get_total_lines().saturating_sub(visible) as u16
    }

    pub fn render(frame: &mut Frame, area: Rect, scroll_offset: u16) {
        let help_content: Vec<Line> = HELP_TEXT.iter().map(|&s| Line::from(s)).collect();

        let max_width = help_content.iter().map(|l| l.width()).max().unwrap_or(0) as u16;
        let width = (max_width + 4).min(area.width);
        let height = (help_content.len() as u16 + 2).min(area.height);

        let x = area.x + (area.width - width) / 2;
        let y = area.y + (area.height - height) / 2;
        let popup_area = Rect::new(x, y, width, height);

        frame.render_widget(Clear, popup_area);

        let help_paragraph = Paragraph::new(help_content)
            .block(Block::default().title("Help").borders(Borders::ALL))
            .scroll((scroll_offset, 0));

        frame.render_widget(help_paragraph, popup_area);
    }
}
