//! Bookmarks, notes and reading statistics of one book written out as JSON.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use eyre::{Result, WrapErr};
use serde::Serialize;

use crate::book::Ebook;
use crate::models::{Bookmark, ReadingStats};

/// File name used when the export prompt is left empty.
pub const DEFAULT_EXPORT_FILE: &str = "ureader-export.json";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookExport {
    pub book: String,
    pub title: Option<String>,
    pub exported_at: DateTime<Utc>,
    pub bookmarks: Vec<BookmarkExport>,
    pub stats: StatsExport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookmarkExport {
    pub name: String,
    /// 1-based, counted in the pagination the bookmark was made under.
    pub page: usize,
    pub total_pages: usize,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsExport {
    pub seconds_read: u64,
    pub pages_turned: u64,
}

impl From<&Bookmark> for BookmarkExport {
    fn from(bookmark: &Bookmark) -> Self {
        Self {
            name: bookmark.name.clone(),
            page: bookmark.page + 1,
            total_pages: bookmark.total_pages,
            note: bookmark.note.clone(),
            created_at: bookmark.created_at,
        }
    }
}

impl From<ReadingStats> for StatsExport {
    fn from(stats: ReadingStats) -> Self {
        Self {
            seconds_read: stats.seconds_read,
            pages_turned: stats.pages_turned,
        }
    }
}

pub fn build_export(ebook: &dyn Ebook, bookmarks: &[Bookmark], stats: ReadingStats) -> BookExport {
    BookExport {
        book: ebook.path().to_string(),
        title: ebook.get_meta().title.clone(),
        exported_at: Utc::now(),
        bookmarks: bookmarks.iter().map(BookmarkExport::from).collect(),
        stats: stats.into(),
    }
}

pub fn write_export(path: &Path, export: &BookExport) -> Result<()> {
    let json = serde_json::to_string_pretty(export)?;
    fs::write(path, json).wrap_err_with(|| format!("Could not write {}", path.display()))?;
    Ok(())
}
