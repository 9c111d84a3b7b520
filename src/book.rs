use crate::encoding::{self, Encoding};
use crate::logging;
use crate::models::BookMetadata;
use epub::doc::EpubDoc;
use eyre::{Result, WrapErr};
use html2text::config;
use std::path::Path;

/// Width handed to html2text when flattening EPUB chapters. Pagination does
/// the real wrapping, so this only needs to be wide enough not to interfere.
const EPUB_FLATTEN_WIDTH: usize = 10_000;

pub trait Ebook {
    fn path(&self) -> &str;
    fn get_meta(&self) -> &BookMetadata;
    /// Decoded source lines, in file order.
    fn lines(&self) -> &[String];
    /// Problem met while reading that the reader should tell the user about.
    fn warning(&self) -> Option<&str> {
        None
    }

    fn initialize(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookFormat {
    Txt,
    Epub,
}

impl BookFormat {
    pub fn from_path(path: &str) -> Result<Self> {
        let ext = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match ext.as_deref() {
            None | Some("txt") | Some("text") => Ok(BookFormat::Txt),
            Some("epub") => Ok(BookFormat::Epub),
            Some(other) => Err(eyre::eyre!("Unsupported format: .{}", other)),
        }
    }
}

/// Open and initialize the book at `path`, choosing the reader by extension.
pub fn open_book(path: &str, forced_encoding: Option<Encoding>) -> Result<Box<dyn Ebook>> {
    if !Path::new(path).exists() {
        return Err(eyre::eyre!("File does not exist: {}", path));
    }

    let mut book: Box<dyn Ebook> = match BookFormat::from_path(path)? {
        BookFormat::Txt => Box::new(TxtBook::new(path, forced_encoding)),
        BookFormat::Epub => Box::new(EpubBook::new(path)),
    };
    book.initialize()
        .wrap_err_with(|| format!("Failed to open {}", path))?;
    Ok(book)
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedText {
    pub lines: Vec<String>,
    /// `None` when every decoder failed and the bytes were read as lossy UTF-8.
    pub encoding: Option<Encoding>,
    /// Set when the first choice of decoder failed.
    pub warning: Option<String>,
}

/// Decode a plain-text file: detected (or forced) encoding first, then GBK,
/// then lossy UTF-8 so there is always something to show.
pub fn decode_with_fallback(bytes: &[u8], forced: Option<Encoding>) -> DecodedText {
    let detected = forced.unwrap_or_else(|| encoding::detect_lenient(bytes));
    logging::debug(format!("Decoding as {}", detected));

    let first_error = match encoding::decode(bytes, detected) {
        Ok(lines) => {
            return DecodedText {
                lines,
                encoding: Some(detected),
                warning: None,
            };
        }
        Err(err) => err,
    };
    logging::debug(format!("{}; retrying as gbk", first_error));

    if detected != Encoding::Gbk {
        match encoding::decode(bytes, Encoding::Gbk) {
            Ok(lines) => {
                return DecodedText {
                    lines,
                    encoding: Some(Encoding::Gbk),
                    warning: Some(format!("Could not decode as {}; read as gbk", detected)),
                };
            }
            Err(err) => logging::debug(format!("{}; showing raw bytes", err)),
        }
    }

    DecodedText {
        lines: encoding::split_lines(&String::from_utf8_lossy(bytes)),
        encoding: None,
        warning: Some(format!(
            "Could not decode as {} or gbk; showing raw bytes",
            detected
        )),
    }
}

pub struct TxtBook {
    path: String,
    forced_encoding: Option<Encoding>,
    lines: Vec<String>,
    metadata: BookMetadata,
    warning: Option<String>,
}

impl TxtBook {
    pub fn new(path: &str, forced_encoding: Option<Encoding>) -> Self {
        Self {
            path: path.to_string(),
            forced_encoding,
            lines: Vec::new(),
            metadata: BookMetadata::default(),
            warning: None,
        }
    }
}

impl Ebook for TxtBook {
    fn path(&self) -> &str {
        &self.path
    }

    fn get_meta(&self) -> &BookMetadata {
        &self.metadata
    }

    fn lines(&self) -> &[String] {
        &self.lines
    }

    fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    fn initialize(&mut self) -> Result<()> {
        let bytes = std::fs::read(&self.path)?;
        let decoded = decode_with_fallback(&bytes, self.forced_encoding);

        self.metadata = BookMetadata {
            title: Path::new(&self.path)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned()),
            encoding: decoded.encoding.map(|encoding| encoding.label().to_string()),
            ..BookMetadata::default()
        };
        self.lines = decoded.lines;
        self.warning = decoded.warning;
        Ok(())
    }
}

pub struct EpubBook {
    path: String,
    lines: Vec<String>,
    metadata: BookMetadata,
}

impl EpubBook {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            lines: Vec::new(),
            metadata: BookMetadata::default(),
        }
    }
}

/// Flatten one XHTML chapter to plain lines.
pub fn html_to_lines(html: &str) -> Result<Vec<String>> {
    let text = config::plain()
        .string_from_read(html.as_bytes(), EPUB_FLATTEN_WIDTH)?;
    Ok(text.lines().map(|line| line.trim_end().to_string()).collect())
}

impl Ebook for EpubBook {
    fn path(&self) -> &str {
        &self.path
    }

    fn get_meta(&self) -> &BookMetadata {
        &self.metadata
    }

    fn lines(&self) -> &[String] {
        &self.lines
    }

    fn initialize(&mut self) -> Result<()> {
        let mut doc = EpubDoc::new(&self.path)?;

        let readable: Vec<usize> = doc
            .spine
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                if let Some(resource) = doc.resources.get(&item.idref) {
                    // NCX (EPUB 2) and nav documents (EPUB 3) are tables of contents.
                    if resource.mime == "application/x-dtbncx+xml" {
                        return false;
                    }
                    if let Some(properties) = &resource.properties {
                        if properties.split_whitespace().any(|p| p == "nav") {
                            return false;
                        }
                    }
                }
                true
            })
            .map(|(index, _)| index)
            .collect();

        let mut lines = Vec::new();
        for index in readable {
            if !doc.set_current_chapter(index) {
                continue;
            }
            let Some((html, _mime)) = doc.get_current_str() else {
                continue;
            };
            match html_to_lines(&html) {
                Ok(chapter) => {
                    if !lines.is_empty() {
                        lines.push(String::new());
                    }
                    lines.extend(chapter);
                }
                Err(err) => logging::warn(format!("Skipping chapter {}: {}", index, err)),
            }
        }

        let field = |name: &str| doc.mdata(name).map(|item| item.value.clone());
        self.metadata = BookMetadata {
            title: field("title"),
            creator: field("creator"),
            description: field("description"),
            publisher: field("publisher"),
            date: field("date"),
            language: field("language"),
            encoding: None,
        };
        self.lines = lines;
        Ok(())
    }
}
