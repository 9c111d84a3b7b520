use chrono::{DateTime, Utc};

use crate::pagination::{Strategy, clamp_page_index};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum WindowType {
    #[default]
    Reader,
    Help,
    Bookmarks,
    BookmarkNote,
    Library,
    Search,
    GotoPage,
    Metadata,
    Settings,
    ExportPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MessageType {
    #[default]
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BookMetadata {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub date: Option<String>,
    pub language: Option<String>,
    /// Text encoding the book was decoded from, for plain-text files.
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryItem {
    pub last_read: DateTime<Utc>,
    pub filepath: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub reading_progress: Option<f32>,
}

/// Where the reader left a book. `page` is only meaningful together with the
/// strategy and page count it was recorded under.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingState {
    pub page: usize,
    pub total_pages: usize,
    pub strategy: Strategy,
    pub rel_pctg: Option<f32>,
}

impl Default for ReadingState {
    fn default() -> Self {
        Self {
            page: 0,
            total_pages: 1,
            strategy: Strategy::Reflow,
            rel_pctg: None,
        }
    }
}

impl ReadingState {
    /// Fraction of the book before the current page.
    pub fn progress(&self) -> f32 {
        if self.total_pages == 0 {
            0.0
        } else {
            self.page as f32 / self.total_pages as f32
        }
    }

    /// The saved page, clamped to a pagination with `total_pages` pages.
    pub fn page_in(&self, total_pages: usize) -> usize {
        clamp_page_index(self.page, total_pages)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bookmark {
    pub name: String,
    pub page: usize,
    pub total_pages: usize,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Bookmark {
    /// The bookmarked page mapped onto a pagination with `total_pages` pages,
    /// keeping its relative position when the page count changed.
    pub fn page_in(&self, total_pages: usize) -> usize {
        if total_pages == self.total_pages || self.total_pages == 0 {
            return clamp_page_index(self.page, total_pages);
        }
        let scaled = (self.page as f64 * total_pages as f64 / self.total_pages as f64).round();
        clamp_page_index(scaled as usize, total_pages)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReadingStats {
    pub seconds_read: u64,
    pub pages_turned: u64,
}
