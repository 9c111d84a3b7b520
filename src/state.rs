use crate::book::Ebook;
use crate::config::get_app_data_prefix;
use crate::models::{Bookmark, LibraryItem, ReadingState, ReadingStats};
use crate::pagination::Strategy;
use chrono::Utc;
use eyre::Result;
use rusqlite::{Connection, OptionalExtension, params};
use sha1::{Digest, Sha1};
use std::path::Path;

pub const STATE_FILE_NAME: &str = "states.db";

pub struct State {
    conn: Connection,
}

impl State {
    pub fn new() -> Result<Self> {
        let prefix = get_app_data_prefix()?;
        Self::open(prefix.join(STATE_FILE_NAME))
    }

    pub fn open(filepath: impl AsRef<Path>) -> Result<Self> {
        let filepath = filepath.as_ref();
        if let Some(parent) = filepath.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(filepath)?;
        // Tables are only created when missing, so this also repairs empty databases.
        Self::init_db(&conn)?;

        Ok(Self { conn })
    }

    fn init_db(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS reading_states (
                filepath TEXT PRIMARY KEY,
                page INTEGER,
                total_pages INTEGER DEFAULT 1,
                strategy TEXT DEFAULT 'reflow',
                rel_pctg REAL
            );

            CREATE TABLE IF NOT EXISTS library (
                last_read DATETIME DEFAULT (datetime('now')),
                filepath TEXT PRIMARY KEY,
                title TEXT,
                author TEXT,
                reading_progress REAL,
                FOREIGN KEY (filepath) REFERENCES reading_states(filepath)
                ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS bookmarks (
                id TEXT PRIMARY KEY,
                filepath TEXT,
                name TEXT,
                page INTEGER,
                total_pages INTEGER DEFAULT 1,
                note TEXT,
                created_at DATETIME,
                FOREIGN KEY (filepath) REFERENCES reading_states(filepath)
                ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS reading_stats (
                filepath TEXT PRIMARY KEY,
                seconds_read INTEGER DEFAULT 0,
                pages_turned INTEGER DEFAULT 0,
                FOREIGN KEY (filepath) REFERENCES reading_states(filepath)
                ON DELETE CASCADE
            );
            ",
        )?;

        Ok(())
    }

    pub fn get_from_history(&self) -> Result<Vec<LibraryItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT last_read, filepath, title, author, reading_progress FROM library ORDER BY last_read DESC",
        )?;

        let library_items_iter = stmt.query_map([], |row| {
            Ok(LibraryItem {
                last_read: row.get(0)?,
                filepath: row.get(1)?,
                title: row.get(2)?,
                author: row.get(3)?,
                reading_progress: row.get(4)?,
            })
        })?;

        let mut library_items = Vec::new();
        for item_result in library_items_iter {
            library_items.push(item_result?);
        }

        Ok(library_items)
    }

    /// Forget a book entirely; bookmarks and stats go with it.
    pub fn delete_from_library(&self, filepath: &str) -> Result<()> {
        self.conn.execute("DELETE FROM reading_states WHERE filepath=?", params![filepath])?;
        Ok(())
    }

    pub fn get_last_read(&self) -> Result<Option<String>> {
        let library = self.get_from_history()?;
        Ok(library.into_iter().next().map(|item| item.filepath))
    }

    pub fn get_last_reading_state(&self, ebook: &dyn Ebook) -> Result<ReadingState> {
        Ok(self.get_reading_state(ebook.path())?.unwrap_or_default())
    }

    /// The saved state of a file, if it was ever opened.
    pub fn get_reading_state(&self, filepath: &str) -> Result<Option<ReadingState>> {
        let row = self
            .conn
            .query_row(
                "SELECT page, total_pages, strategy, rel_pctg FROM reading_states WHERE filepath=?",
                params![filepath],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<f32>>(3)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(page, total_pages, strategy, rel_pctg)| ReadingState {
            page: page.max(0) as usize,
            total_pages: total_pages.max(1) as usize,
            strategy: strategy
                .and_then(|label| label.parse::<Strategy>().ok())
                .unwrap_or_default(),
            rel_pctg,
        }))
    }

    pub fn set_last_reading_state(&self, ebook: &dyn Ebook, reading_state: &ReadingState) -> Result<()> {
        // Upsert rather than REPLACE: a REPLACE deletes the row first, which
        // would cascade into bookmarks and stats.
        self.conn.execute(
            "INSERT INTO reading_states (filepath, page, total_pages, strategy, rel_pctg)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(filepath) DO UPDATE SET
                page=excluded.page,
                total_pages=excluded.total_pages,
                strategy=excluded.strategy,
                rel_pctg=excluded.rel_pctg",
            params![
                ebook.path(),
                reading_state.page as i64,
                reading_state.total_pages as i64,
                reading_state.strategy.label(),
                reading_state.rel_pctg,
            ],
        )?;
        Ok(())
    }

    /// Save a bookmark. Re-using a name on the same book overwrites it.
    pub fn insert_bookmark(&self, ebook: &dyn Ebook, bookmark: &Bookmark) -> Result<()> {
        self.ensure_reading_state(ebook.path())?;
        self.conn.execute(
            "INSERT OR REPLACE INTO bookmarks (id, filepath, name, page, total_pages, note, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                bookmark_id(ebook.path(), &bookmark.name),
                ebook.path(),
                bookmark.name,
                bookmark.page as i64,
                bookmark.total_pages as i64,
                bookmark.note,
                bookmark.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn delete_bookmark(&self, ebook: &dyn Ebook, name: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM bookmarks WHERE filepath=? AND name=?",
            params![ebook.path(), name],
        )?;
        Ok(())
    }

    /// Bookmarks of one book, in page order.
    pub fn get_bookmarks(&self, ebook: &dyn Ebook) -> Result<Vec<Bookmark>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, page, total_pages, note, created_at FROM bookmarks
             WHERE filepath=? ORDER BY page, created_at",
        )?;
        let bookmarks_iter = stmt.query_map(params![ebook.path()], |row| {
            Ok(Bookmark {
                name: row.get(0)?,
                page: row.get::<_, i64>(1)?.max(0) as usize,
                total_pages: row.get::<_, i64>(2)?.max(1) as usize,
                note: row.get(3)?,
                created_at: row.get::<_, Option<_>>(4)?.unwrap_or_else(Utc::now),
            })
        })?;

        let mut bookmarks = Vec::new();
        for bookmark_result in bookmarks_iter {
            bookmarks.push(bookmark_result?);
        }

        Ok(bookmarks)
    }

    pub fn update_library(&self, ebook: &dyn Ebook, reading_progress: Option<f32>) -> Result<()> {
        self.ensure_reading_state(ebook.path())?;
        let metadata = ebook.get_meta();
        self.conn.execute(
            "INSERT INTO library (last_read, filepath, title, author, reading_progress)
             VALUES (datetime('now'), ?, ?, ?, ?)
             ON CONFLICT(filepath) DO UPDATE SET
                last_read=excluded.last_read,
                title=excluded.title,
                author=excluded.author,
                reading_progress=excluded.reading_progress",
            params![ebook.path(), metadata.title, metadata.creator, reading_progress],
        )?;
        Ok(())
    }

    /// Add one session's reading time and page turns to the book's totals.
    pub fn add_reading_stats(&self, ebook: &dyn Ebook, session: &ReadingStats) -> Result<()> {
        self.ensure_reading_state(ebook.path())?;
        self.conn.execute(
            "INSERT INTO reading_stats (filepath, seconds_read, pages_turned) VALUES (?, ?, ?)
             ON CONFLICT(filepath) DO UPDATE SET
                seconds_read=seconds_read + excluded.seconds_read,
                pages_turned=pages_turned + excluded.pages_turned",
            params![
                ebook.path(),
                session.seconds_read as i64,
                session.pages_turned as i64
            ],
        )?;
        Ok(())
    }

    pub fn get_reading_stats(&self, ebook: &dyn Ebook) -> Result<ReadingStats> {
        let stats = self
            .conn
            .query_row(
                "SELECT seconds_read, pages_turned FROM reading_stats WHERE filepath=?",
                params![ebook.path()],
                |row| {
                    Ok(ReadingStats {
                        seconds_read: row.get::<_, i64>(0)?.max(0) as u64,
                        pages_turned: row.get::<_, i64>(1)?.max(0) as u64,
                    })
                },
            )
            .optional()?;
        Ok(stats.unwrap_or_default())
    }

    /// Dependent tables reference `reading_states`, so make sure a row exists.
    fn ensure_reading_state(&self, filepath: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO reading_states (filepath, page, total_pages, strategy) VALUES (?, 0, 1, 'reflow')",
            params![filepath],
        )?;
        Ok(())
    }
}

fn bookmark_id(filepath: &str, name: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("{}{}", filepath, name).as_bytes());
    let hash = hasher.finalize();
    hex::encode(hash)[..10].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookMetadata;
    use tempfile::TempDir;

    struct MockEbook {
        path_str: String,
        metadata: BookMetadata,
        lines: Vec<String>,
    }

    impl MockEbook {
        fn new(path: &str, title: &str, author: &str) -> Self {
            Self {
                path_str: path.to_string(),
                metadata: BookMetadata {
                    title: Some(title.to_string()),
                    creator: Some(author.to_string()),
                    encoding: Some("gbk".to_string()),
                    ..Default::default()
                },
                lines: vec!["第一章".to_string(), "内容".to_string()],
            }
        }
    }

    impl Ebook for MockEbook {
        fn path(&self) -> &str {
            &self.path_str
        }

        fn get_meta(&self) -> &BookMetadata {
            &self.metadata
        }

        fn lines(&self) -> &[String] {
            &self.lines
        }

        fn initialize(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn setup_test_state() -> (State, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let state = State::open(temp_dir.path().join("test_states.db")).unwrap();
        (state, temp_dir)
    }

    fn bookmark(name: &str, page: usize, note: Option<&str>) -> Bookmark {
        Bookmark {
            name: name.to_string(),
            page,
            total_pages: 100,
            note: note.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_state_database_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("init.db");
        assert!(!db_path.exists());
        let state = State::open(&db_path).unwrap();
        assert!(db_path.exists());

        let mut stmt = state.conn.prepare("PRAGMA table_info(bookmarks)").unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get(1))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert!(columns.contains(&"note".to_string()));
        assert!(columns.contains(&"created_at".to_string()));

        // Opening an existing database is fine.
        drop(stmt);
        drop(state);
        State::open(&db_path).unwrap();
    }

    #[test]
    fn test_get_from_history_empty() {
        let (state, _temp_dir) = setup_test_state();
        assert!(state.get_from_history().unwrap().is_empty());
        assert_eq!(state.get_last_read().unwrap(), None);
    }

    #[test]
    fn test_library_management() {
        let (state, _temp_dir) = setup_test_state();

        let ebook1 = MockEbook::new("/path/to/book1.txt", "Book One", "Author One");
        let ebook2 = MockEbook::new("/path/to/book2.txt", "Book Two", "Author Two");

        state.update_library(&ebook1, Some(0.25)).unwrap();
        state.update_library(&ebook2, Some(0.75)).unwrap();

        let history = state.get_from_history().unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().any(|item| item.filepath == "/path/to/book2.txt"
            && item.title.as_deref() == Some("Book Two")
            && item.author.as_deref() == Some("Author Two")
            && item.reading_progress == Some(0.75)));
        assert!(history.iter().any(|item| item.filepath == "/path/to/book1.txt"
            && item.reading_progress == Some(0.25)));

        let last_read = state.get_last_read().unwrap();
        assert!(last_read.unwrap().contains("book"));

        state.delete_from_library("/path/to/book1.txt").unwrap();
        let history = state.get_from_history().unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].filepath.contains("book2"));
    }

    #[test]
    fn test_reading_state_management() {
        let (state, _temp_dir) = setup_test_state();
        let ebook = MockEbook::new("/path/to/test.txt", "Test Book", "Test Author");

        assert_eq!(state.get_last_reading_state(&ebook).unwrap(), ReadingState::default());
        assert_eq!(state.get_reading_state(ebook.path()).unwrap(), None);

        let saved = ReadingState {
            page: 42,
            total_pages: 120,
            strategy: Strategy::Paragraph,
            rel_pctg: Some(0.35),
        };
        state.set_last_reading_state(&ebook, &saved).unwrap();
        assert_eq!(state.get_last_reading_state(&ebook).unwrap(), saved);

        let updated = ReadingState {
            page: 100,
            ..saved.clone()
        };
        state.set_last_reading_state(&ebook, &updated).unwrap();
        assert_eq!(state.get_last_reading_state(&ebook).unwrap().page, 100);
    }

    #[test]
    fn test_unknown_strategy_label_defaults_to_reflow() {
        let (state, _temp_dir) = setup_test_state();
        let ebook = MockEbook::new("/path/to/test.txt", "Test Book", "Test Author");
        state
            .conn
            .execute(
                "INSERT INTO reading_states (filepath, page, total_pages, strategy) VALUES (?, 3, 10, 'zigzag')",
                params![ebook.path()],
            )
            .unwrap();

        let loaded = state.get_last_reading_state(&ebook).unwrap();
        assert_eq!(loaded.page, 3);
        assert_eq!(loaded.strategy, Strategy::Reflow);
    }

    #[test]
    fn test_bookmark_management() {
        let (state, _temp_dir) = setup_test_state();
        let ebook = MockEbook::new("/path/to/test.txt", "Test Book", "Test Author");

        assert!(state.get_bookmarks(&ebook).unwrap().is_empty());

        state.insert_bookmark(&ebook, &bookmark("later", 50, None)).unwrap();
        state
            .insert_bookmark(&ebook, &bookmark("start", 2, Some("the hero appears")))
            .unwrap();

        let bookmarks = state.get_bookmarks(&ebook).unwrap();
        assert_eq!(bookmarks.len(), 2);
        assert_eq!(bookmarks[0].name, "start");
        assert_eq!(bookmarks[0].page, 2);
        assert_eq!(bookmarks[0].note.as_deref(), Some("the hero appears"));
        assert_eq!(bookmarks[1].name, "later");
        assert_eq!(bookmarks[1].note, None);

        // Same name overwrites.
        state.insert_bookmark(&ebook, &bookmark("later", 60, Some("moved"))).unwrap();
        let bookmarks = state.get_bookmarks(&ebook).unwrap();
        assert_eq!(bookmarks.len(), 2);
        assert_eq!(bookmarks[1].page, 60);

        state.delete_bookmark(&ebook, "start").unwrap();
        let bookmarks = state.get_bookmarks(&ebook).unwrap();
        assert_eq!(bookmarks.len(), 1);
        assert_eq!(bookmarks[0].name, "later");
    }

    #[test]
    fn test_bookmark_id_generation() {
        let a = bookmark_id("/path/to/test1.txt", "Important");
        let b = bookmark_id("/path/to/test2.txt", "Important");
        assert_eq!(a.len(), 10);
        assert_ne!(a, b);
        assert_eq!(a, bookmark_id("/path/to/test1.txt", "Important"));
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_saving_state_keeps_bookmarks() {
        let (state, _temp_dir) = setup_test_state();
        let ebook = MockEbook::new("/path/to/test.txt", "Test Book", "Test Author");

        state.insert_bookmark(&ebook, &bookmark("keep", 5, None)).unwrap();
        state
            .set_last_reading_state(&ebook, &ReadingState { page: 9, ..ReadingState::default() })
            .unwrap();
        assert_eq!(state.get_bookmarks(&ebook).unwrap().len(), 1);
    }

    #[test]
    fn test_foreign_key_cascade() {
        let (state, _temp_dir) = setup_test_state();
        let ebook = MockEbook::new("/path/to/test.txt", "Test Book", "Test Author");

        state.set_last_reading_state(&ebook, &ReadingState::default()).unwrap();
        state.update_library(&ebook, Some(0.1)).unwrap();
        state.insert_bookmark(&ebook, &bookmark("Test Bookmark", 1, None)).unwrap();
        state
            .add_reading_stats(&ebook, &ReadingStats { seconds_read: 60, pages_turned: 3 })
            .unwrap();

        state.delete_from_library(ebook.path()).unwrap();

        assert!(state.get_from_history().unwrap().is_empty());
        assert!(state.get_bookmarks(&ebook).unwrap().is_empty());
        assert_eq!(state.get_reading_stats(&ebook).unwrap(), ReadingStats::default());
    }

    #[test]
    fn test_reading_stats_accumulate() {
        let (state, _temp_dir) = setup_test_state();
        let ebook = MockEbook::new("/path/to/test.txt", "Test Book", "Test Author");
        let other = MockEbook::new("/path/to/other.txt", "Other", "Someone");

        assert_eq!(state.get_reading_stats(&ebook).unwrap(), ReadingStats::default());

        state
            .add_reading_stats(&ebook, &ReadingStats { seconds_read: 120, pages_turned: 4 })
            .unwrap();
        state
            .add_reading_stats(&ebook, &ReadingStats { seconds_read: 30, pages_turned: 1 })
            .unwrap();

        assert_eq!(
            state.get_reading_stats(&ebook).unwrap(),
            ReadingStats { seconds_read: 150, pages_turned: 5 }
        );
        assert_eq!(state.get_reading_stats(&other).unwrap(), ReadingStats::default());
    }

    #[test]
    fn test_update_library_replace() {
        let (state, _temp_dir) = setup_test_state();
        let ebook = MockEbook::new("/path/to/test.txt", "Test Book", "Test Author");

        state.update_library(&ebook, Some(0.25)).unwrap();
        state.update_library(&ebook, Some(0.75)).unwrap();

        let history = state.get_from_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reading_progress, Some(0.75));

        state.update_library(&ebook, None).unwrap();
        assert_eq!(state.get_from_history().unwrap()[0].reading_progress, None);
    }

    #[test]
    fn test_error_handling() {
        let (state, _temp_dir) = setup_test_state();
        let fake_ebook = MockEbook::new("/nonexistent/path.txt", "Fake Book", "Fake Author");

        assert_eq!(state.get_last_reading_state(&fake_ebook).unwrap().page, 0);
        assert!(state.get_bookmarks(&fake_ebook).unwrap().is_empty());
        assert!(state.delete_bookmark(&fake_ebook, "Non-existent bookmark").is_ok());
    }
}
