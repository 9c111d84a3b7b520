mod timers;
pub mod tts;

use std::io::{self, Stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    Frame, Terminal,
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Padding, Paragraph, Wrap},
};

use crate::book::{Ebook, open_book};
use crate::config::Config;
use crate::encoding::Encoding;
use crate::export::{self, DEFAULT_EXPORT_FILE};
use crate::logging;
use crate::models::{
    BookMetadata, Bookmark, LibraryItem, MessageType, ReadingState, ReadingStats, WindowType,
};
use crate::pagination::{
    LayoutParams, PageMatch, Pages, Strategy, clamp_page_index, display_width,
};
use crate::settings::{MIN_HEIGHT, SettingItem};
use crate::state::State;
use crate::ui::windows::{
    bookmarks::BookmarksWindow, disguise::DisguiseWindow, help::HelpWindow, input::InputWindow,
    library::LibraryWindow, metadata::MetadataWindow, search::SearchWindow,
    settings::SettingsWindow,
};

pub use timers::{AutoFlip, Reminder};
use tts::TtsPlayer;

/// Seconds a status message stays on screen.
const MESSAGE_TTL: Duration = Duration::from_secs(3);
/// Longest idle wait between redraws.
const IDLE_POLL: Duration = Duration::from_secs(60);
/// Poll interval while a TTS process may finish at any moment.
const TTS_POLL: Duration = Duration::from_millis(200);
/// Rows the font-size keys add or remove.
const FONT_STEP: usize = 2;

/// Application state that encompasses all UI and reading state
#[derive(Debug, Clone)]
pub struct ApplicationState {
    pub reading_state: ReadingState,
    pub config: Config,
    pub ui_state: UiState,
    pub should_quit: bool,
}

impl ApplicationState {
    pub fn new(config: Config) -> Self {
        let strategy = config.settings.strategy;
        Self {
            reading_state: ReadingState {
                strategy,
                ..ReadingState::default()
            },
            config,
            ui_state: UiState::new(),
            should_quit: false,
        }
    }
}

/// UI-specific state management
#[derive(Debug, Clone)]
pub struct UiState {
    pub active_window: WindowType,
    pub search_query: String,
    pub search_results: Vec<PageMatch>,
    pub selected_search_result: usize,
    pub bookmarks: Vec<Bookmark>,
    pub bookmarks_selected_index: usize,
    pub library_items: Vec<LibraryItem>,
    pub library_selected_index: usize,
    pub settings_selected_index: usize,
    pub metadata: Option<BookMetadata>,
    pub stats: Option<ReadingStats>,
    /// Text typed into the page-number, bookmark-note or export-path prompt.
    pub input: String,
    pub message: Option<String>,
    pub message_type: MessageType,
    pub message_time: Option<Instant>,
    pub help_scroll_offset: u16,
    pub tts_active: bool,
    pub auto_flip: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}

impl UiState {
    pub fn new() -> Self {
        Self {
            active_window: WindowType::Reader,
            search_query: String::new(),
            search_results: Vec::new(),
            selected_search_result: 0,
            bookmarks: Vec::new(),
            bookmarks_selected_index: 0,
            library_items: Vec::new(),
            library_selected_index: 0,
            settings_selected_index: 0,
            metadata: None,
            stats: None,
            input: String::new(),
            message: None,
            message_type: MessageType::Info,
            message_time: None,
            help_scroll_offset: 0,
            tts_active: false,
            auto_flip: false,
        }
    }

    pub fn set_message(&mut self, message: String, message_type: MessageType) {
        self.message = Some(message);
        self.message_type = message_type;
        self.message_time = Some(Instant::now());
    }

    pub fn clear_message(&mut self) {
        self.message = None;
        self.message_time = None;
    }

    pub fn message_expired(&self) -> bool {
        self.message_time.is_some_and(|t| t.elapsed() >= MESSAGE_TTL)
    }

    pub fn open_window(&mut self, window_type: WindowType) {
        self.active_window = window_type;
        match window_type {
            WindowType::Help => self.help_scroll_offset = 0,
            WindowType::GotoPage | WindowType::BookmarkNote | WindowType::ExportPath => {
                self.input.clear()
            }
            WindowType::Search => {
                self.search_query.clear();
                self.search_results.clear();
                self.selected_search_result = 0;
            }
            _ => {}
        }
    }
}

/// Raw mode and the alternate screen, restored when dropped.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        if let Err(err) = crossterm::execute!(io::stdout(), crossterm::terminal::EnterAlternateScreen) {
            let _ = crossterm::terminal::disable_raw_mode();
            return Err(err);
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(io::stdout(), crossterm::terminal::LeaveAlternateScreen);
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

/// The reader hidden behind a blank prompt. Hidden time is not reading time.
#[derive(Debug, Clone, Copy)]
struct HiddenSession {
    started: Instant,
    auto_flip_was_enabled: bool,
}

/// Main reader application struct
pub struct Reader<B: Backend = CrosstermBackend<Stdout>> {
    state: ApplicationState,
    terminal: Terminal<B>,
    db_state: State,
    ebook: Option<Box<dyn Ebook>>,
    pages: Pages,
    forced_encoding: Option<Encoding>,
    strategy_override: Option<Strategy>,
    /// Rows hidden by the font-size keys when following the terminal size.
    font_rows: usize,
    auto_flip: AutoFlip,
    reminder: Reminder,
    tts: TtsPlayer,
    session_started: Instant,
    pages_turned: u64,
    hidden: Option<HiddenSession>,
}

impl Reader<CrosstermBackend<Stdout>> {
    /// Create a reader drawing to stdout, with state in the default database.
    pub fn new(config: Config) -> eyre::Result<Self> {
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::new(backend)?;
        let db_state = State::new()?;
        Ok(Self::with_terminal(config, db_state, terminal))
    }
}

impl<B: Backend> Reader<B> {
    pub fn with_terminal(config: Config, db_state: State, terminal: Terminal<B>) -> Self {
        let now = Instant::now();
        let settings = &config.settings;
        let auto_flip = AutoFlip::new(settings.auto_flip_interval, settings.auto_flip, now);
        let reminder = Reminder::new(settings.remind_interval, now);
        let pages = Pages::build::<String>(&[], settings.layout(), settings.strategy);

        let mut state = ApplicationState::new(config);
        state.ui_state.auto_flip = auto_flip.is_enabled();

        Self {
            state,
            terminal,
            db_state,
            ebook: None,
            pages,
            forced_encoding: None,
            strategy_override: None,
            font_rows: 0,
            auto_flip,
            reminder,
            tts: TtsPlayer::default(),
            session_started: now,
            pages_turned: 0,
            hidden: None,
        }
    }

    pub fn set_forced_encoding(&mut self, encoding: Option<Encoding>) {
        self.forced_encoding = encoding;
    }

    /// Use this strategy for every book instead of the saved or configured one.
    pub fn set_strategy_override(&mut self, strategy: Option<Strategy>) {
        self.strategy_override = strategy;
    }

    pub fn state(&self) -> &ApplicationState {
        &self.state
    }

    pub fn pages(&self) -> &Pages {
        &self.pages
    }

    pub fn current_page(&self) -> usize {
        self.state.reading_state.page
    }

    fn normalize_ebook_path(path: &str) -> String {
        match std::fs::canonicalize(path) {
            Ok(canonical) => canonical.to_string_lossy().to_string(),
            Err(err) => {
                logging::debug(format!(
                    "Could not canonicalize ebook path {}: {}",
                    path, err
                ));
                path.to_string()
            }
        }
    }

    /// Load the most recently read book, if any, using the database
    pub fn load_last_ebook_if_any(&mut self) -> eyre::Result<bool> {
        if let Some(filepath) = self.db_state.get_last_read()?
            && std::path::Path::new(&filepath).exists()
        {
            self.load_ebook(&filepath, None)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Open a book and restore where it was left. `start_page` is 1-based
    /// and wins over the saved position.
    pub fn load_ebook(&mut self, path: &str, start_page: Option<usize>) -> eyre::Result<()> {
        let normalized_path = Self::normalize_ebook_path(path);
        let book = open_book(&normalized_path, self.forced_encoding)?;

        // Leaving the previous book counts as closing it.
        self.stop_tts();
        self.persist_state()?;

        let saved = self.db_state.get_reading_state(book.path())?;
        let strategy = self
            .strategy_override
            .or(saved.as_ref().map(|s| s.strategy))
            .unwrap_or(self.state.config.settings.strategy);
        let layout = self.current_layout();
        self.pages = Pages::build(book.lines(), layout, strategy);

        let total_pages = self.pages.total();
        let page = match (start_page, saved.as_ref()) {
            (Some(page), _) => clamp_page_index(page.saturating_sub(1), total_pages),
            (None, Some(saved)) => saved.page_in(total_pages),
            (None, None) => 0,
        };
        logging::debug(format!(
            "Loaded {} ({} lines, {} pages, {})",
            book.path(),
            book.lines().len(),
            total_pages,
            strategy
        ));

        self.state.reading_state = ReadingState {
            page,
            total_pages,
            strategy,
            rel_pctg: saved.and_then(|s| s.rel_pctg),
        };
        let ui_state = &mut self.state.ui_state;
        ui_state.metadata = Some(book.get_meta().clone());
        ui_state.bookmarks = self.db_state.get_bookmarks(book.as_ref())?;
        ui_state.bookmarks_selected_index = 0;
        ui_state.stats = Some(self.db_state.get_reading_stats(book.as_ref())?);
        ui_state.search_results.clear();
        ui_state.search_query.clear();

        if let Some(warning) = book.warning() {
            ui_state.set_message(warning.to_string(), MessageType::Warning);
        }

        self.ebook = Some(book);
        let now = Instant::now();
        self.session_started = now;
        self.pages_turned = 0;
        self.auto_flip.reset(now);
        Ok(())
    }

    /// Save position, library entry, and this session's reading stats.
    pub fn persist_state(&mut self) -> eyre::Result<()> {
        let Some(ebook) = self.ebook.as_ref() else {
            return Ok(());
        };

        let mut to_save = self.state.reading_state.clone();
        to_save.total_pages = self.pages.total();
        to_save.strategy = self.pages.strategy();
        let rel_pctg = Some(to_save.progress());
        to_save.rel_pctg = rel_pctg;

        self.db_state.set_last_reading_state(ebook.as_ref(), &to_save)?;
        self.db_state.update_library(ebook.as_ref(), rel_pctg)?;

        let now = Instant::now();
        let session = ReadingStats {
            seconds_read: self.session_seconds(now),
            pages_turned: self.pages_turned,
        };
        self.db_state.add_reading_stats(ebook.as_ref(), &session)?;
        self.session_started = now;
        if let Some(hidden) = self.hidden.as_mut() {
            hidden.started = now;
        }
        self.pages_turned = 0;
        Ok(())
    }

    /// Seconds read since the session started, not counting time spent hidden.
    fn session_seconds(&self, now: Instant) -> u64 {
        let end = self.hidden.map_or(now, |hidden| hidden.started);
        end.saturating_duration_since(self.session_started).as_secs()
    }

    /// Write the settings file, reporting failure on the status row.
    fn save_config(&mut self) {
        if let Err(err) = self.state.config.save() {
            logging::debug(format!("Saving configuration failed: {:#}", err));
            self.state.ui_state.set_message(
                format!("Could not save settings: {}", err),
                MessageType::Error,
            );
        }
    }

    /// Page size from the configuration, or from the terminal when fitting to it.
    fn current_layout(&self) -> LayoutParams {
        let settings = &self.state.config.settings;
        if !settings.fit_to_terminal {
            return settings.layout();
        }
        let (width, height) = match self.terminal.size() {
            Ok(size) => (size.width as usize, size.height as usize),
            Err(_) => (settings.width, settings.height),
        };
        let height = height
            .saturating_sub(self.font_rows)
            .max(MIN_HEIGHT.min(height));
        settings.layout_for(width, height)
    }

    /// Re-paginate after the layout or strategy changed, keeping the page
    /// index when it still exists.
    fn reflow_pages(&mut self, strategy: Strategy) {
        let layout = self.current_layout();
        if layout == *self.pages.layout() && strategy == self.pages.strategy() {
            return;
        }
        let lines: &[String] = match &self.ebook {
            Some(book) => book.lines(),
            None => &[],
        };
        let page = self
            .pages
            .reflow(lines, layout, strategy, self.state.reading_state.page);
        self.state.reading_state.page = page;
        self.state.reading_state.total_pages = self.pages.total();
        self.state.reading_state.strategy = strategy;
        // Hits point at pages of the old pagination.
        self.state.ui_state.search_results.clear();
    }

    fn goto_page(&mut self, page: usize) {
        let page = clamp_page_index(page, self.pages.total());
        if page != self.state.reading_state.page {
            self.state.reading_state.page = page;
            self.pages_turned += 1;
        }
        self.auto_flip.reset(Instant::now());
    }

    fn next_page(&mut self) {
        self.goto_page(self.state.reading_state.page.saturating_add(1));
    }

    fn previous_page(&mut self) {
        self.goto_page(self.state.reading_state.page.saturating_sub(1));
    }

    fn change_font_size(&mut self, delta: i32) {
        if self.state.config.settings.fit_to_terminal {
            let max_rows = self.terminal_height().saturating_sub(MIN_HEIGHT);
            self.font_rows = if delta > 0 {
                (self.font_rows + FONT_STEP).min(max_rows)
            } else {
                self.font_rows.saturating_sub(FONT_STEP)
            };
        } else {
            self.state.config.settings.change_font_size(delta);
            self.save_config();
        }
        self.reflow_pages(self.pages.strategy());
    }

    fn terminal_height(&self) -> usize {
        self.terminal
            .size()
            .map(|size| size.height as usize)
            .unwrap_or(self.state.config.settings.height)
    }

    fn cycle_strategy(&mut self) {
        let strategy = self.pages.strategy().next();
        self.reflow_pages(strategy);
        self.state
            .ui_state
            .set_message(format!("Pagination: {}", strategy), MessageType::Info);
    }

    /// Run the main application loop
    pub fn run(&mut self) -> eyre::Result<()> {
        let quiet = logging::quiet();
        let guard = TerminalGuard::enter()?;
        self.terminal
            .clear()
            .map_err(|err| eyre::eyre!("Failed to clear terminal: {}", err))?;
        let _ = self.terminal.hide_cursor();

        self.reflow_pages(self.pages.strategy());
        if self.ebook.is_none() {
            self.open_library_window()?;
        }

        let result = self.event_loop();

        self.stop_tts();
        self.set_hidden(false, Instant::now());
        let persisted = self.persist_state();
        let _ = self.terminal.show_cursor();
        drop(guard);
        drop(quiet);

        if let Err(err) = persisted {
            logging::error(format!("Could not save reading state: {:#}", err));
        }
        result
    }

    fn event_loop(&mut self) -> eyre::Result<()> {
        while !self.state.should_quit {
            if self.state.ui_state.message_expired() {
                self.state.ui_state.clear_message();
            }
            self.tick(Instant::now())?;
            self.draw()?;

            let timeout = self.poll_timeout(Instant::now());
            if !crossterm::event::poll(timeout)? {
                continue;
            }

            match crossterm::event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key_event(key)?,
                Event::Resize(_, _) => self.reflow_pages(self.pages.strategy()),
                _ => {}
            }
        }
        Ok(())
    }

    /// Timers: TTS completion, auto page flip, and the reading reminder.
    fn tick(&mut self, now: Instant) -> eyre::Result<()> {
        if self.hidden.is_some() {
            return Ok(());
        }
        if self.tts.finished() && self.state.ui_state.tts_active {
            self.tts_advance_page()?;
        }

        if self.auto_flip.tick(now) && self.ebook.is_some() {
            if self.state.reading_state.page + 1 < self.pages.total() {
                self.next_page();
            } else {
                self.auto_flip.set_enabled(false, now);
                self.state.ui_state.auto_flip = false;
                self.state
                    .ui_state
                    .set_message("Reached the last page".to_string(), MessageType::Info);
            }
        }

        if self.reminder.tick(now) && self.ebook.is_some() {
            let minutes = self.state.config.settings.remind_interval;
            self.state.ui_state.set_message(
                format!("You have been reading for {} minutes. Time for a break!", minutes),
                MessageType::Warning,
            );
        }
        Ok(())
    }

    fn poll_timeout(&self, now: Instant) -> Duration {
        let mut timeout = IDLE_POLL;
        if self.hidden.is_some() {
            return timeout;
        }
        if self.state.ui_state.tts_active {
            timeout = timeout.min(TTS_POLL);
        }
        if let Some(t) = self.state.ui_state.message_time {
            timeout = timeout.min(MESSAGE_TTL.saturating_sub(now.duration_since(t)));
        }
        for remaining in [self.auto_flip.remaining(now), self.reminder.remaining(now)]
            .into_iter()
            .flatten()
        {
            timeout = timeout.min(remaining);
        }
        timeout
    }

    pub fn draw(&mut self) -> eyre::Result<()> {
        let state = &self.state;
        let pages = &self.pages;
        let hidden = self.hidden.is_some();
        self.terminal
            .draw(|f| {
                if hidden {
                    DisguiseWindow::render(f, f.area());
                } else {
                    Self::render_static(f, state, pages);
                }
            })
            .map_err(|err| eyre::eyre!("Failed to draw: {}", err))?;
        Ok(())
    }

    /// Handle keyboard input events
    pub fn handle_key_event(&mut self, key: KeyEvent) -> eyre::Result<()> {
        if self.hidden.is_some() {
            if key.code == KeyCode::Char('i') {
                self.set_hidden(false, Instant::now());
            }
            return Ok(());
        }
        match self.state.ui_state.active_window {
            WindowType::Reader => self.handle_normal_mode_keys(key)?,
            WindowType::Search => self.handle_search_mode_keys(key)?,
            WindowType::Bookmarks => self.handle_bookmarks_mode_keys(key)?,
            WindowType::Library => self.handle_library_mode_keys(key)?,
            WindowType::GotoPage | WindowType::BookmarkNote | WindowType::ExportPath => {
                self.handle_input_mode_keys(key)?
            }
            WindowType::Settings => self.handle_settings_mode_keys(key),
            WindowType::Help => self.handle_help_mode_keys(key),
            WindowType::Metadata => self.state.ui_state.open_window(WindowType::Reader),
        }
        Ok(())
    }

    fn handle_normal_mode_keys(&mut self, key: KeyEvent) -> eyre::Result<()> {
        match key.code {
            KeyCode::Char('l') | KeyCode::Right | KeyCode::Char(' ') | KeyCode::PageDown => {
                self.next_page();
            }
            KeyCode::Char('h') | KeyCode::Left | KeyCode::PageUp => {
                self.previous_page();
            }
            KeyCode::Char('g') | KeyCode::Home => self.goto_page(0),
            KeyCode::Char('G') | KeyCode::End => self.goto_page(usize::MAX),
            KeyCode::Char(c) if c.is_ascii_digit() => {
                self.state.ui_state.open_window(WindowType::GotoPage);
                self.state.ui_state.input.push(c);
            }

            KeyCode::Char('+') | KeyCode::Char('=') => self.change_font_size(1),
            KeyCode::Char('-') => self.change_font_size(-1),
            KeyCode::Char('S') => self.cycle_strategy(),

            KeyCode::Char('/') => self.state.ui_state.open_window(WindowType::Search),
            KeyCode::Char('n') => self.search_next(true),
            KeyCode::Char('N') => self.search_next(false),

            KeyCode::Char('b') => {
                if self.ebook.is_some() {
                    self.state.ui_state.open_window(WindowType::BookmarkNote);
                } else {
                    self.state
                        .ui_state
                        .set_message("No book loaded".to_string(), MessageType::Warning);
                }
            }
            KeyCode::Char('m') => self.open_bookmarks_window()?,
            KeyCode::Char('r') => self.open_library_window()?,
            KeyCode::Char('x') => self.open_metadata_window()?,
            KeyCode::Char('e') => {
                if self.ebook.is_some() {
                    self.state.ui_state.open_window(WindowType::ExportPath);
                } else {
                    self.state
                        .ui_state
                        .set_message("No book loaded".to_string(), MessageType::Warning);
                }
            }
            KeyCode::Char('s') => self.state.ui_state.open_window(WindowType::Settings),
            KeyCode::Char('i') => self.set_hidden(true, Instant::now()),
            KeyCode::Char('?') => self.state.ui_state.open_window(WindowType::Help),

            KeyCode::Char('a') => self.toggle_auto_flip(),
            KeyCode::Char('t') => self.toggle_tts()?,

            KeyCode::Char('q') => self.state.should_quit = true,
            KeyCode::Esc => {
                if self.state.ui_state.tts_active {
                    self.stop_tts();
                } else {
                    self.state.should_quit = true;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_list_nav(&mut self, key: &KeyEvent, list_len: usize, index: &mut usize) -> bool {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => {
                self.state.ui_state.open_window(WindowType::Reader);
                true
            }
            KeyCode::Char('j') | KeyCode::Down => {
                if list_len > 0 {
                    *index = (*index + 1).min(list_len - 1);
                }
                true
            }
            KeyCode::Char('k') | KeyCode::Up => {
                *index = index.saturating_sub(1);
                true
            }
            _ => false,
        }
    }

    fn handle_search_mode_keys(&mut self, key: KeyEvent) -> eyre::Result<()> {
        let ui_state = &mut self.state.ui_state;
        match key.code {
            KeyCode::Enter => {
                if ui_state.search_results.is_empty() {
                    self.execute_search();
                } else {
                    self.jump_to_selected_search_result();
                }
            }
            KeyCode::Esc => ui_state.open_window(WindowType::Reader),
            KeyCode::Backspace => {
                ui_state.search_query.pop();
                ui_state.search_results.clear();
            }
            KeyCode::Down => {
                if !ui_state.search_results.is_empty() {
                    ui_state.selected_search_result = (ui_state.selected_search_result + 1)
                        .min(ui_state.search_results.len() - 1);
                }
            }
            KeyCode::Up => {
                ui_state.selected_search_result = ui_state.selected_search_result.saturating_sub(1);
            }
            KeyCode::Char(c) => {
                ui_state.search_query.push(c);
                ui_state.search_results.clear();
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_bookmarks_mode_keys(&mut self, key: KeyEvent) -> eyre::Result<()> {
        let list_len = self.state.ui_state.bookmarks.len();
        let mut index = self.state.ui_state.bookmarks_selected_index;
        if self.handle_list_nav(&key, list_len, &mut index) {
            self.state.ui_state.bookmarks_selected_index = index;
            return Ok(());
        }
        match key.code {
            KeyCode::Char('b') => self.state.ui_state.open_window(WindowType::BookmarkNote),
            KeyCode::Char('d') => self.delete_selected_bookmark()?,
            KeyCode::Enter => self.jump_to_selected_bookmark(),
            _ => {}
        }
        Ok(())
    }

    fn handle_library_mode_keys(&mut self, key: KeyEvent) -> eyre::Result<()> {
        let list_len = self.state.ui_state.library_items.len();
        let mut index = self.state.ui_state.library_selected_index;
        if self.handle_list_nav(&key, list_len, &mut index) {
            self.state.ui_state.library_selected_index = index;
            return Ok(());
        }
        match key.code {
            KeyCode::Char('d') => self.delete_selected_library_item()?,
            KeyCode::Enter => self.open_selected_library_item()?,
            _ => {}
        }
        Ok(())
    }

    /// Page-number and bookmark-note prompts.
    fn handle_input_mode_keys(&mut self, key: KeyEvent) -> eyre::Result<()> {
        let window = self.state.ui_state.active_window;
        match key.code {
            KeyCode::Esc => self.state.ui_state.open_window(WindowType::Reader),
            KeyCode::Backspace => {
                self.state.ui_state.input.pop();
            }
            KeyCode::Enter => {
                let input = std::mem::take(&mut self.state.ui_state.input);
                self.state.ui_state.open_window(WindowType::Reader);
                match window {
                    WindowType::GotoPage => match input.trim().parse::<usize>() {
                        Ok(page) if page > 0 => self.goto_page(page - 1),
                        _ => self.state.ui_state.set_message(
                            format!("Not a page number: {}", input),
                            MessageType::Warning,
                        ),
                    },
                    WindowType::ExportPath => self.export_book_data(input.trim())?,
                    _ => self.add_bookmark(input.trim())?,
                }
            }
            KeyCode::Char(c) if window == WindowType::GotoPage => {
                if c.is_ascii_digit() && self.state.ui_state.input.len() < 9 {
                    self.state.ui_state.input.push(c);
                }
            }
            KeyCode::Char(c) => self.state.ui_state.input.push(c),
            _ => {}
        }
        Ok(())
    }

    fn handle_settings_mode_keys(&mut self, key: KeyEvent) {
        let items = SettingItem::all();
        let index = self.state.ui_state.settings_selected_index.min(items.len() - 1);
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('s') => {
                self.state.ui_state.open_window(WindowType::Reader);
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.state.ui_state.settings_selected_index = (index + 1).min(items.len() - 1);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.state.ui_state.settings_selected_index = index.saturating_sub(1);
            }
            KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right | KeyCode::Char('+') => {
                self.adjust_setting(items[index], 1);
            }
            KeyCode::Char('h') | KeyCode::Left | KeyCode::Char('-') => {
                self.adjust_setting(items[index], -1);
            }
            _ => {}
        }
    }

    /// Apply a settings-editor change right away and save it.
    fn adjust_setting(&mut self, item: SettingItem, delta: i32) {
        item.adjust(&mut self.state.config.settings, delta);
        let now = Instant::now();
        let settings = &self.state.config.settings;
        match item {
            SettingItem::AutoFlipInterval => {
                self.auto_flip = AutoFlip::new(
                    settings.auto_flip_interval,
                    self.auto_flip.is_enabled(),
                    now,
                );
            }
            SettingItem::RemindInterval => {
                self.reminder = Reminder::new(settings.remind_interval, now);
            }
            _ => {}
        }
        if item.affects_layout() {
            let strategy = match item {
                SettingItem::Strategy => self.strategy_override.unwrap_or(settings.strategy),
                _ => self.pages.strategy(),
            };
            self.reflow_pages(strategy);
        }
        self.save_config();
    }

    /// Hide the reader behind a blank prompt, or bring it back. While hidden
    /// read-aloud is stopped and timers are paused.
    fn set_hidden(&mut self, hide: bool, now: Instant) {
        if hide {
            if self.hidden.is_some() {
                return;
            }
            self.stop_tts();
            self.hidden = Some(HiddenSession {
                started: now,
                auto_flip_was_enabled: self.auto_flip.is_enabled(),
            });
            self.auto_flip.set_enabled(false, now);
            self.state.ui_state.clear_message();
        } else if let Some(hidden) = self.hidden.take() {
            let away = now.saturating_duration_since(hidden.started);
            self.session_started += away;
            self.reminder.postpone(away);
            self.auto_flip.set_enabled(hidden.auto_flip_was_enabled, now);
        }
    }

    fn handle_help_mode_keys(&mut self, key: KeyEvent) {
        let (term_width, term_height) = crossterm::terminal::size().unwrap_or((80, 24));
        let max_offset = HelpWindow::max_scroll_offset(Rect::new(0, 0, term_width, term_height));

        let ui_state = &mut self.state.ui_state;
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Enter | KeyCode::Char('?') => {
                ui_state.open_window(WindowType::Reader);
            }
            KeyCode::Char('j') | KeyCode::Down => {
                ui_state.help_scroll_offset = ui_state.help_scroll_offset.saturating_add(1).min(max_offset);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                ui_state.help_scroll_offset = ui_state.help_scroll_offset.saturating_sub(1);
            }
            _ => {}
        }
    }

    fn toggle_auto_flip(&mut self) {
        let enabled = !self.auto_flip.is_enabled();
        self.auto_flip.set_enabled(enabled, Instant::now());
        self.state.ui_state.auto_flip = enabled;
        self.state.config.settings.auto_flip = enabled;
        let message = if enabled {
            format!(
                "Auto flip every {}s",
                self.state.config.settings.auto_flip_interval.max(1)
            )
        } else {
            "Auto flip off".to_string()
        };
        self.state.ui_state.set_message(message, MessageType::Info);
        self.save_config();
    }

    fn execute_search(&mut self) {
        let query = self.state.ui_state.search_query.clone();
        let results = self.pages.search(&query);
        let ui_state = &mut self.state.ui_state;
        if results.is_empty() && !query.trim().is_empty() {
            ui_state.set_message(format!("No match for \"{}\"", query.trim()), MessageType::Warning);
        }
        ui_state.selected_search_result = results
            .iter()
            .position(|hit| hit.page >= self.state.reading_state.page)
            .unwrap_or(0);
        ui_state.search_results = results;
    }

    fn jump_to_selected_search_result(&mut self) {
        let page = self
            .state
            .ui_state
            .search_results
            .get(self.state.ui_state.selected_search_result)
            .map(|hit| hit.page);
        if let Some(page) = page {
            self.goto_page(page);
        }
        self.state.ui_state.active_window = WindowType::Reader;
    }

    /// Next (or previous) page with a hit, wrapping around the book.
    pub fn next_hit(hits: &[PageMatch], current: usize, forward: bool) -> Option<usize> {
        if forward {
            hits.iter()
                .find(|hit| hit.page > current)
                .or_else(|| hits.first())
                .map(|hit| hit.page)
        } else {
            hits.iter()
                .rev()
                .find(|hit| hit.page < current)
                .or_else(|| hits.last())
                .map(|hit| hit.page)
        }
    }

    fn search_next(&mut self, forward: bool) {
        let hits = &self.state.ui_state.search_results;
        match Self::next_hit(hits, self.state.reading_state.page, forward) {
            Some(page) => self.goto_page(page),
            None => self
                .state
                .ui_state
                .set_message("No search results".to_string(), MessageType::Info),
        }
    }

    fn add_bookmark(&mut self, note: &str) -> eyre::Result<()> {
        let Some(ebook) = self.ebook.as_ref() else {
            return Ok(());
        };
        let page = self.state.reading_state.page;
        let bookmark = Bookmark {
            name: format!("Page {}", page + 1),
            page,
            total_pages: self.pages.total(),
            note: (!note.is_empty()).then(|| note.to_string()),
            created_at: Utc::now(),
        };
        self.db_state.insert_bookmark(ebook.as_ref(), &bookmark)?;
        self.refresh_bookmarks()?;
        self.state
            .ui_state
            .set_message(format!("Bookmarked page {}", page + 1), MessageType::Info);
        Ok(())
    }

    fn delete_selected_bookmark(&mut self) -> eyre::Result<()> {
        let Some(ebook) = self.ebook.as_ref() else {
            return Ok(());
        };
        let name = self
            .state
            .ui_state
            .bookmarks
            .get(self.state.ui_state.bookmarks_selected_index)
            .map(|bookmark| bookmark.name.clone());
        if let Some(name) = name {
            self.db_state.delete_bookmark(ebook.as_ref(), &name)?;
            self.refresh_bookmarks()?;
        }
        Ok(())
    }

    fn refresh_bookmarks(&mut self) -> eyre::Result<()> {
        if let Some(ebook) = self.ebook.as_ref() {
            let bookmarks = self.db_state.get_bookmarks(ebook.as_ref())?;
            let ui_state = &mut self.state.ui_state;
            ui_state.bookmarks = bookmarks;
            if ui_state.bookmarks_selected_index >= ui_state.bookmarks.len() {
                ui_state.bookmarks_selected_index = ui_state.bookmarks.len().saturating_sub(1);
            }
        }
        Ok(())
    }

    fn jump_to_selected_bookmark(&mut self) {
        let page = self
            .state
            .ui_state
            .bookmarks
            .get(self.state.ui_state.bookmarks_selected_index)
            .map(|bookmark| bookmark.page_in(self.pages.total()));
        if let Some(page) = page {
            self.goto_page(page);
            self.state.ui_state.open_window(WindowType::Reader);
        }
    }

    fn open_bookmarks_window(&mut self) -> eyre::Result<()> {
        self.refresh_bookmarks()?;
        self.state.ui_state.open_window(WindowType::Bookmarks);
        Ok(())
    }

    fn open_library_window(&mut self) -> eyre::Result<()> {
        let items = self.db_state.get_from_history()?;
        let ui_state = &mut self.state.ui_state;
        ui_state.library_items = items;
        ui_state.library_selected_index = 0;
        ui_state.open_window(WindowType::Library);
        Ok(())
    }

    fn open_metadata_window(&mut self) -> eyre::Result<()> {
        if let Some(ebook) = self.ebook.as_ref() {
            let mut stats = self.db_state.get_reading_stats(ebook.as_ref())?;
            stats.seconds_read += self.session_seconds(Instant::now());
            stats.pages_turned += self.pages_turned;
            self.state.ui_state.stats = Some(stats);
        }
        self.state.ui_state.open_window(WindowType::Metadata);
        Ok(())
    }

    /// Write bookmarks, notes and reading stats of the open book as JSON.
    fn export_book_data(&mut self, path: &str) -> eyre::Result<()> {
        let Some(ebook) = self.ebook.as_ref() else {
            return Ok(());
        };
        let path = if path.is_empty() {
            PathBuf::from(DEFAULT_EXPORT_FILE)
        } else {
            PathBuf::from(path)
        };
        let bookmarks = self.db_state.get_bookmarks(ebook.as_ref())?;
        let mut stats = self.db_state.get_reading_stats(ebook.as_ref())?;
        stats.seconds_read += self.session_seconds(Instant::now());
        stats.pages_turned += self.pages_turned;

        let data = export::build_export(ebook.as_ref(), &bookmarks, stats);
        match export::write_export(&path, &data) {
            Ok(()) => self.state.ui_state.set_message(
                format!("Exported {} bookmarks to {}", bookmarks.len(), path.display()),
                MessageType::Info,
            ),
            Err(err) => self
                .state
                .ui_state
                .set_message(format!("{:#}", err), MessageType::Error),
        }
        Ok(())
    }

    fn delete_selected_library_item(&mut self) -> eyre::Result<()> {
        let filepath = self
            .state
            .ui_state
            .library_items
            .get(self.state.ui_state.library_selected_index)
            .map(|item| item.filepath.clone());
        if let Some(path) = filepath {
            self.db_state.delete_from_library(&path)?;
            let library_items = self.db_state.get_from_history()?;
            let ui_state = &mut self.state.ui_state;
            ui_state.library_items = library_items;
            if ui_state.library_selected_index >= ui_state.library_items.len() {
                ui_state.library_selected_index = ui_state.library_items.len().saturating_sub(1);
            }
        }
        Ok(())
    }

    fn open_selected_library_item(&mut self) -> eyre::Result<()> {
        let filepath = self
            .state
            .ui_state
            .library_items
            .get(self.state.ui_state.library_selected_index)
            .map(|item| item.filepath.clone());
        let Some(path) = filepath else {
            return Ok(());
        };
        if !std::path::Path::new(&path).exists() {
            self.state.ui_state.set_message(
                "Selected file no longer exists".to_string(),
                MessageType::Warning,
            );
            return Ok(());
        }
        match self.load_ebook(&path, None) {
            Ok(()) => self.state.ui_state.open_window(WindowType::Reader),
            Err(err) => self
                .state
                .ui_state
                .set_message(format!("{:#}", err), MessageType::Error),
        }
        Ok(())
    }

    fn render_static(frame: &mut Frame, state: &ApplicationState, pages: &Pages) {
        Self::render_reader_static(frame, state, pages);

        let area = frame.area();
        let ui_state = &state.ui_state;
        match ui_state.active_window {
            WindowType::Reader => {}
            WindowType::Help => HelpWindow::render(frame, area, ui_state.help_scroll_offset),
            WindowType::Bookmarks => BookmarksWindow::render(
                frame,
                area,
                &ui_state.bookmarks,
                ui_state.bookmarks_selected_index,
            ),
            WindowType::Library => LibraryWindow::render(
                frame,
                area,
                &ui_state.library_items,
                ui_state.library_selected_index,
            ),
            WindowType::Search => SearchWindow::render(
                frame,
                area,
                &ui_state.search_query,
                &ui_state.search_results,
                ui_state.selected_search_result,
            ),
            WindowType::Metadata => MetadataWindow::render(
                frame,
                area,
                ui_state.metadata.as_ref(),
                ui_state.stats.as_ref(),
            ),
            WindowType::GotoPage => InputWindow::render(
                frame,
                area,
                &format!("Go to page (1-{})", pages.total()),
                &ui_state.input,
            ),
            WindowType::BookmarkNote => {
                InputWindow::render(frame, area, "Bookmark note (optional)", &ui_state.input)
            }
            WindowType::ExportPath => InputWindow::render(
                frame,
                area,
                &format!("Export to (default {})", DEFAULT_EXPORT_FILE),
                &ui_state.input,
            ),
            WindowType::Settings => {
                let entries: Vec<String> = SettingItem::all()
                    .iter()
                    .map(|item| item.describe(&state.config.settings))
                    .collect();
                SettingsWindow::render(frame, area, &entries, ui_state.settings_selected_index)
            }
        }
    }

    /// Title row, page body, and status row inside the page rectangle.
    fn render_reader_static(frame: &mut Frame, state: &ApplicationState, pages: &Pages) {
        let frame_area = frame.area();
        let layout = pages.layout();
        let width = u16::try_from(layout.width).unwrap_or(u16::MAX).min(frame_area.width);
        let height = u16::try_from(layout.height).unwrap_or(u16::MAX).min(frame_area.height);
        let page_area = Rect::new(
            frame_area.x + (frame_area.width - width) / 2,
            frame_area.y,
            width,
            height,
        );

        let chunks = Layout::default()
            .direction(ratatui::layout::Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(page_area);

        let page = state.reading_state.page;
        let total = pages.total();
        let title = state
            .ui_state
            .metadata
            .as_ref()
            .and_then(|meta| meta.title.as_deref())
            .unwrap_or("ureader");
        let position = format!("{}/{} {}%", page + 1, total, Self::percent(page, total));
        let header = Self::build_header_line(title, Some(position.as_str()), chunks[0].width);
        frame.render_widget(
            Paragraph::new(Line::from(header)).style(Style::default().add_modifier(Modifier::BOLD)),
            chunks[0],
        );

        let margin = layout.margin;
        let body = chunks[1];
        let body_area = Rect::new(
            body.x + (margin.left as u16).min(body.width),
            body.y + (margin.top as u16).min(body.height),
            body.width.saturating_sub((margin.left + margin.right) as u16),
            body.height.saturating_sub((margin.top + margin.bottom) as u16),
        );
        let padding = layout.padding;
        let text = pages.get(page).unwrap_or_default();
        let mut paragraph = Paragraph::new(text).block(Block::default().padding(Padding::new(
            padding.left as u16,
            padding.right as u16,
            padding.top as u16,
            padding.bottom as u16,
        )));
        if !pages.strategy().wraps() {
            paragraph = paragraph.wrap(Wrap { trim: false });
        }
        frame.render_widget(paragraph, body_area);

        frame.render_widget(Paragraph::new(Self::status_line(state, pages)), chunks[2]);
    }

    fn status_line(state: &ApplicationState, pages: &Pages) -> Line<'static> {
        let ui_state = &state.ui_state;
        let mut spans = Vec::new();

        if let Some(message) = &ui_state.message {
            let color = match ui_state.message_type {
                MessageType::Info => Color::Blue,
                MessageType::Warning => Color::Yellow,
                MessageType::Error => Color::Red,
            };
            spans.push(Span::styled(message.clone(), Style::default().fg(color)));
        } else {
            spans.push(Span::styled(
                "? help  q quit",
                Style::default().fg(Color::DarkGray),
            ));
        }

        let mut markers = vec![format!("[{}]", pages.strategy())];
        if ui_state.auto_flip {
            markers.push("[auto]".to_string());
        }
        if ui_state.tts_active {
            markers.push("[tts]".to_string());
        }
        if state.config.settings.show_progress {
            markers.push(Self::progress_bar(state.reading_state.page, pages.total(), 10));
        }
        spans.push(Span::raw(format!("  {}", markers.join(" "))));
        Line::from(spans)
    }

    fn percent(page: usize, total: usize) -> usize {
        if total == 0 {
            0
        } else {
            ((page + 1) * 100 / total).min(100)
        }
    }

    pub fn progress_bar(page: usize, total: usize, cells: usize) -> String {
        let filled = if total == 0 {
            0
        } else {
            ((page + 1) * cells / total).min(cells)
        };
        format!("[{}{}]", "#".repeat(filled), "-".repeat(cells - filled))
    }

    /// Title centered in the space left of the right-aligned text, measured
    /// in terminal columns.
    pub fn build_header_line(title: &str, right_text: Option<&str>, width: u16) -> String {
        let width = width as usize;
        if width == 0 {
            return String::new();
        }

        let right_text = right_text.unwrap_or("");
        let right_width = display_width(right_text);
        let content_width = if right_width > 0 {
            width.saturating_sub(right_width + 1)
        } else {
            width
        };

        let mut title_text = String::new();
        let mut title_width = 0;
        for ch in title.chars() {
            let ch_width = display_width(ch.encode_utf8(&mut [0; 4]));
            if title_width + ch_width > content_width {
                break;
            }
            title_text.push(ch);
            title_width += ch_width;
        }

        let left_pad = content_width.saturating_sub(title_width) / 2;
        let mut line = " ".repeat(left_pad);
        line.push_str(&title_text);
        let used = left_pad + title_width;
        if right_width > 0 && used + right_width <= width {
            line.push_str(&" ".repeat(width - used - right_width));
            line.push_str(right_text);
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::windows::buffer_text;
    use crossterm::event::KeyModifiers;
    use ratatui::backend::TestBackend;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        reader: Reader<TestBackend>,
        book_path: String,
        dir: TempDir,
    }

    fn sample_lines() -> Vec<String> {
        (1..=60).map(|i| format!("line {i} of the sample book")).collect()
    }

    fn fixture_with(lines: &[String], configure: impl FnOnce(&mut Config)) -> Fixture {
        let dir = TempDir::new().unwrap();
        let mut config = Config::load_from(dir.path().join("configuration.json")).unwrap();
        config.settings.fit_to_terminal = false;
        config.settings.width = 40;
        config.settings.height = 20;
        config.settings.margin = 0;
        config.settings.padding = 0;
        config.settings.strategy = Strategy::FixedLines;
        config.settings.lines_per_page = Some(10);
        configure(&mut config);

        let db_state = State::open(dir.path().join("states.db")).unwrap();
        let terminal = Terminal::new(TestBackend::new(40, 20)).unwrap();
        let mut reader = Reader::with_terminal(config, db_state, terminal);

        let book_path = dir.path().join("sample.txt");
        fs::write(&book_path, lines.join("\n")).unwrap();
        let book_path = book_path.to_str().unwrap().to_string();
        reader.load_ebook(&book_path, None).unwrap();
        Fixture { reader, book_path, dir }
    }

    fn fixture() -> Fixture {
        fixture_with(&sample_lines(), |_| {})
    }

    fn press(reader: &mut Reader<TestBackend>, code: KeyCode) {
        reader
            .handle_key_event(KeyEvent::new(code, KeyModifiers::NONE))
            .unwrap();
    }

    fn type_text(reader: &mut Reader<TestBackend>, text: &str) {
        for c in text.chars() {
            press(reader, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_load_paginates_book() {
        let f = fixture();
        assert_eq!(f.reader.pages().total(), 6);
        assert_eq!(f.reader.current_page(), 0);
        let meta = f.reader.state().ui_state.metadata.as_ref().unwrap();
        assert_eq!(meta.title.as_deref(), Some("sample"));
    }

    #[test]
    fn test_page_navigation_keys() {
        let mut f = fixture();
        press(&mut f.reader, KeyCode::Char('l'));
        press(&mut f.reader, KeyCode::Char(' '));
        assert_eq!(f.reader.current_page(), 2);
        press(&mut f.reader, KeyCode::Left);
        assert_eq!(f.reader.current_page(), 1);
        press(&mut f.reader, KeyCode::Char('G'));
        assert_eq!(f.reader.current_page(), 5);
        press(&mut f.reader, KeyCode::PageDown);
        assert_eq!(f.reader.current_page(), 5);
        press(&mut f.reader, KeyCode::Home);
        assert_eq!(f.reader.current_page(), 0);
        press(&mut f.reader, KeyCode::Char('h'));
        assert_eq!(f.reader.current_page(), 0);
    }

    #[test]
    fn test_goto_page_prompt() {
        let mut f = fixture();
        type_text(&mut f.reader, "4");
        assert_eq!(f.reader.state().ui_state.active_window, WindowType::GotoPage);
        type_text(&mut f.reader, "x");
        assert_eq!(f.reader.state().ui_state.input, "4");
        press(&mut f.reader, KeyCode::Enter);
        assert_eq!(f.reader.current_page(), 3);
        assert_eq!(f.reader.state().ui_state.active_window, WindowType::Reader);

        type_text(&mut f.reader, "99");
        press(&mut f.reader, KeyCode::Enter);
        assert_eq!(f.reader.current_page(), 5);

        type_text(&mut f.reader, "0");
        press(&mut f.reader, KeyCode::Enter);
        assert_eq!(f.reader.current_page(), 5);
        assert!(f.reader.state().ui_state.message.is_some());
    }

    #[test]
    fn test_strategy_cycle_clamps_page() {
        let mut f = fixture();
        press(&mut f.reader, KeyCode::Char('G'));
        assert_eq!(f.reader.current_page(), 5);

        press(&mut f.reader, KeyCode::Char('S'));
        assert_eq!(f.reader.pages().strategy(), Strategy::Paragraph);
        press(&mut f.reader, KeyCode::Char('S'));
        assert_eq!(f.reader.pages().strategy(), Strategy::Reflow);
        // 60 short lines at 18 rows per reflowed page.
        assert_eq!(f.reader.pages().total(), 4);
        assert_eq!(f.reader.current_page(), 3);
        assert_eq!(f.reader.state().reading_state.strategy, Strategy::Reflow);
    }

    #[test]
    fn test_font_size_keys_reflow() {
        let lines: Vec<String> = (1..=90).map(|i| format!("line {i}")).collect();
        let mut f = fixture_with(&lines, |config| {
            config.settings.strategy = Strategy::Reflow;
        });
        let before = f.reader.pages().total();
        assert_eq!(before, 5);
        press(&mut f.reader, KeyCode::Char('+'));
        assert_eq!(f.reader.state().config.settings.height, 18);
        assert!(f.reader.pages().total() > before);
        press(&mut f.reader, KeyCode::Char('-'));
        assert_eq!(f.reader.pages().total(), before);
    }

    #[test]
    fn test_fit_to_terminal_uses_backend_size() {
        let mut f = fixture_with(&sample_lines(), |config| {
            config.settings.fit_to_terminal = true;
            config.settings.strategy = Strategy::Reflow;
        });
        assert_eq!(f.reader.pages().layout().width, 40);
        assert_eq!(f.reader.pages().layout().height, 20);

        press(&mut f.reader, KeyCode::Char('+'));
        assert_eq!(f.reader.pages().layout().height, 18);
        for _ in 0..10 {
            press(&mut f.reader, KeyCode::Char('+'));
        }
        assert_eq!(f.reader.pages().layout().height, MIN_HEIGHT);
    }

    #[test]
    fn test_search_and_hit_navigation() {
        let mut lines = sample_lines();
        lines[14] = "the Dragon wakes".to_string();
        lines[42] = "a dragon sleeps".to_string();
        let mut f = fixture_with(&lines, |_| {});

        press(&mut f.reader, KeyCode::Char('/'));
        type_text(&mut f.reader, "dragon");
        press(&mut f.reader, KeyCode::Enter);
        let hits: Vec<usize> = f.reader.state().ui_state.search_results.iter().map(|h| h.page).collect();
        assert_eq!(hits, vec![1, 4]);

        press(&mut f.reader, KeyCode::Enter);
        assert_eq!(f.reader.current_page(), 1);
        assert_eq!(f.reader.state().ui_state.active_window, WindowType::Reader);

        press(&mut f.reader, KeyCode::Char('n'));
        assert_eq!(f.reader.current_page(), 4);
        press(&mut f.reader, KeyCode::Char('n'));
        assert_eq!(f.reader.current_page(), 1);
        press(&mut f.reader, KeyCode::Char('N'));
        assert_eq!(f.reader.current_page(), 4);
    }

    #[test]
    fn test_next_hit_wraps() {
        let hits = vec![
            PageMatch { page: 2, preview: String::new() },
            PageMatch { page: 7, preview: String::new() },
        ];
        assert_eq!(Reader::<TestBackend>::next_hit(&hits, 0, true), Some(2));
        assert_eq!(Reader::<TestBackend>::next_hit(&hits, 2, true), Some(7));
        assert_eq!(Reader::<TestBackend>::next_hit(&hits, 7, true), Some(2));
        assert_eq!(Reader::<TestBackend>::next_hit(&hits, 7, false), Some(2));
        assert_eq!(Reader::<TestBackend>::next_hit(&hits, 2, false), Some(7));
        assert_eq!(Reader::<TestBackend>::next_hit(&[], 2, false), None);
    }

    #[test]
    fn test_bookmark_with_note() {
        let mut f = fixture();
        press(&mut f.reader, KeyCode::Char('l'));
        press(&mut f.reader, KeyCode::Char('l'));
        press(&mut f.reader, KeyCode::Char('b'));
        assert_eq!(f.reader.state().ui_state.active_window, WindowType::BookmarkNote);
        type_text(&mut f.reader, "hero returns");
        press(&mut f.reader, KeyCode::Enter);

        let bookmarks = &f.reader.state().ui_state.bookmarks;
        assert_eq!(bookmarks.len(), 1);
        assert_eq!(bookmarks[0].page, 2);
        assert_eq!(bookmarks[0].note.as_deref(), Some("hero returns"));

        press(&mut f.reader, KeyCode::Char('g'));
        press(&mut f.reader, KeyCode::Char('m'));
        assert_eq!(f.reader.state().ui_state.active_window, WindowType::Bookmarks);
        press(&mut f.reader, KeyCode::Enter);
        assert_eq!(f.reader.current_page(), 2);

        press(&mut f.reader, KeyCode::Char('m'));
        press(&mut f.reader, KeyCode::Char('d'));
        assert!(f.reader.state().ui_state.bookmarks.is_empty());
        press(&mut f.reader, KeyCode::Esc);
        assert_eq!(f.reader.state().ui_state.active_window, WindowType::Reader);
    }

    #[test]
    fn test_state_persists_between_sessions() {
        let mut f = fixture();
        press(&mut f.reader, KeyCode::Char('l'));
        press(&mut f.reader, KeyCode::Char('l'));
        press(&mut f.reader, KeyCode::Char('l'));
        f.reader.persist_state().unwrap();

        let db_state = State::open(f.dir.path().join("states.db")).unwrap();
        let config = f.reader.state().config.clone();
        let terminal = Terminal::new(TestBackend::new(40, 20)).unwrap();
        let mut reopened = Reader::with_terminal(config, db_state, terminal);
        assert!(reopened.load_last_ebook_if_any().unwrap());
        assert_eq!(reopened.current_page(), 3);

        let path = Reader::<TestBackend>::normalize_ebook_path(&f.book_path);
        let history = State::open(f.dir.path().join("states.db")).unwrap().get_from_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].filepath, path);

        let stats = reopened.db_state.get_reading_stats(reopened.ebook.as_deref().unwrap()).unwrap();
        assert_eq!(stats.pages_turned, 3);
    }

    #[test]
    fn test_start_page_overrides_saved_position() {
        let mut f = fixture();
        let path = f.book_path.clone();
        f.reader.load_ebook(&path, Some(5)).unwrap();
        assert_eq!(f.reader.current_page(), 4);
        f.reader.load_ebook(&path, Some(500)).unwrap();
        assert_eq!(f.reader.current_page(), 5);
    }

    #[test]
    fn test_strategy_override() {
        let mut f = fixture();
        f.reader.set_strategy_override(Some(Strategy::Reflow));
        let path = f.book_path.clone();
        f.reader.load_ebook(&path, None).unwrap();
        assert_eq!(f.reader.pages().strategy(), Strategy::Reflow);
    }

    #[test]
    fn test_auto_flip_and_reminder_ticks() {
        let mut f = fixture_with(&sample_lines(), |config| {
            config.settings.auto_flip_interval = 5;
            config.settings.remind_interval = 1;
        });
        press(&mut f.reader, KeyCode::Char('a'));
        assert!(f.reader.state().ui_state.auto_flip);

        let now = Instant::now();
        f.reader.tick(now + Duration::from_secs(6)).unwrap();
        assert_eq!(f.reader.current_page(), 1);

        f.reader.tick(now + Duration::from_secs(61)).unwrap();
        let message = f.reader.state().ui_state.message.clone().unwrap();
        assert!(message.contains("1 minutes"));

        press(&mut f.reader, KeyCode::Char('G'));
        f.reader.tick(now + Duration::from_secs(120)).unwrap();
        assert_eq!(f.reader.current_page(), 5);
        assert!(!f.reader.state().ui_state.auto_flip);
    }

    #[test]
    fn test_poll_timeout_follows_timers() {
        let mut f = fixture_with(&sample_lines(), |config| {
            config.settings.auto_flip_interval = 5;
            config.settings.remind_interval = 0;
        });
        let now = Instant::now();
        assert!(f.reader.poll_timeout(now) <= IDLE_POLL);
        press(&mut f.reader, KeyCode::Char('a'));
        f.reader.state.ui_state.clear_message();
        assert!(f.reader.poll_timeout(Instant::now()) <= Duration::from_secs(5));
    }

    #[test]
    fn test_render_reader_view() {
        let mut f = fixture();
        press(&mut f.reader, KeyCode::Char('l'));
        f.reader.draw().unwrap();
        let text = buffer_text(f.reader.terminal.backend().buffer());
        assert!(text.contains("sample"));
        assert!(text.contains("2/6 33%"));
        assert!(text.contains("line 11 of the sample book"));
        assert!(text.contains("[fixed]"));
    }

    #[test]
    fn test_render_windows() {
        let mut f = fixture();
        for (key, expected) in [
            ('?', "Help"),
            ('x', "Metadata"),
            ('r', "Library"),
            ('m', "Bookmarks"),
            ('/', "Search"),
            ('s', "Settings"),
            ('e', "Export to"),
        ] {
            press(&mut f.reader, KeyCode::Char(key));
            f.reader.draw().unwrap();
            let text = buffer_text(f.reader.terminal.backend().buffer());
            assert!(text.contains(expected), "window for {key:?} missing {expected:?}");
            press(&mut f.reader, KeyCode::Esc);
            assert_eq!(f.reader.state().ui_state.active_window, WindowType::Reader);
        }
    }

    #[test]
    fn test_runtime_setting_changes_are_saved() {
        let mut f = fixture();
        press(&mut f.reader, KeyCode::Char('+'));
        press(&mut f.reader, KeyCode::Char('a'));

        let saved = Config::load_from(f.dir.path().join("configuration.json")).unwrap();
        assert_eq!(saved.settings.height, 18);
        assert!(saved.settings.auto_flip);
        assert!(!saved.settings.fit_to_terminal);

        press(&mut f.reader, KeyCode::Char('a'));
        let saved = Config::load_from(f.dir.path().join("configuration.json")).unwrap();
        assert!(!saved.settings.auto_flip);
    }

    #[test]
    fn test_decode_fallback_shown_as_status_message() {
        let mut f = fixture();
        let raw = f.dir.path().join("raw.txt");
        fs::write(&raw, [b'a', 0xFF, b'b']).unwrap();
        f.reader.load_ebook(raw.to_str().unwrap(), None).unwrap();

        let ui_state = &f.reader.state().ui_state;
        assert_eq!(ui_state.message_type, MessageType::Warning);
        assert!(ui_state.message.as_deref().unwrap().contains("showing raw bytes"));
        assert_eq!(f.reader.pages().get(0), Some("a\u{FFFD}b"));
    }

    #[test]
    fn test_settings_editor_applies_and_saves() {
        let mut f = fixture();
        press(&mut f.reader, KeyCode::Char('s'));
        assert_eq!(f.reader.state().ui_state.active_window, WindowType::Settings);

        // Height
        press(&mut f.reader, KeyCode::Char('j'));
        press(&mut f.reader, KeyCode::Char('+'));
        assert_eq!(f.reader.state().config.settings.height, 22);

        // Lines per page: 10 -> 5 doubles the page count.
        for _ in 0..3 {
            press(&mut f.reader, KeyCode::Down);
        }
        press(&mut f.reader, KeyCode::Char('-'));
        assert_eq!(f.reader.state().config.settings.lines_per_page, Some(5));
        assert_eq!(f.reader.pages().total(), 12);

        // Pagination strategy
        press(&mut f.reader, KeyCode::Char('j'));
        press(&mut f.reader, KeyCode::Enter);
        assert_eq!(f.reader.pages().strategy(), Strategy::Paragraph);

        press(&mut f.reader, KeyCode::Esc);
        assert_eq!(f.reader.state().ui_state.active_window, WindowType::Reader);

        let saved = Config::load_from(f.dir.path().join("configuration.json")).unwrap();
        assert_eq!(saved.settings.height, 22);
        assert_eq!(saved.settings.lines_per_page, Some(5));
        assert_eq!(saved.settings.strategy, Strategy::Paragraph);
    }

    #[test]
    fn test_settings_editor_restarts_timers() {
        let mut f = fixture_with(&sample_lines(), |config| {
            config.settings.auto_flip_interval = 5;
        });
        press(&mut f.reader, KeyCode::Char('a'));
        press(&mut f.reader, KeyCode::Char('s'));
        for _ in 0..10 {
            press(&mut f.reader, KeyCode::Char('j'));
        }
        press(&mut f.reader, KeyCode::Char('+'));
        assert_eq!(f.reader.state().config.settings.auto_flip_interval, 6);
        assert!(f.reader.auto_flip.is_enabled());
        assert!(f.reader.poll_timeout(Instant::now()) <= Duration::from_secs(6));
    }

    #[test]
    fn test_hide_key_shows_blank_prompt_and_pauses() {
        let mut f = fixture_with(&sample_lines(), |config| {
            config.settings.auto_flip_interval = 5;
        });
        press(&mut f.reader, KeyCode::Char('a'));
        press(&mut f.reader, KeyCode::Char('i'));
        assert!(f.reader.hidden.is_some());

        f.reader.draw().unwrap();
        let text = buffer_text(f.reader.terminal.backend().buffer());
        assert!(text.contains("Terminal"));
        assert!(!text.contains("sample book"));

        // Only the hide key responds while hidden.
        press(&mut f.reader, KeyCode::Char('l'));
        press(&mut f.reader, KeyCode::Char('q'));
        assert_eq!(f.reader.current_page(), 0);
        assert!(!f.reader.state().should_quit);
        f.reader.tick(Instant::now() + Duration::from_secs(60)).unwrap();
        assert_eq!(f.reader.current_page(), 0);

        press(&mut f.reader, KeyCode::Char('i'));
        assert!(f.reader.hidden.is_none());
        assert!(f.reader.auto_flip.is_enabled());
        f.reader.draw().unwrap();
        let text = buffer_text(f.reader.terminal.backend().buffer());
        assert!(text.contains("line 1 of the sample book"));
    }

    #[test]
    fn test_hidden_time_is_not_reading_time() {
        let mut f = fixture();
        let now = Instant::now();
        let start = now.checked_sub(Duration::from_secs(100)).unwrap();
        f.reader.session_started = start;

        f.reader.set_hidden(true, start + Duration::from_secs(60));
        assert_eq!(f.reader.session_seconds(now), 60);
        f.reader.set_hidden(false, now);
        assert_eq!(f.reader.session_seconds(now), 60);
    }

    #[test]
    fn test_export_writes_bookmarks_and_stats() {
        let mut f = fixture();
        press(&mut f.reader, KeyCode::Char('l'));
        press(&mut f.reader, KeyCode::Char('b'));
        type_text(&mut f.reader, "storm");
        press(&mut f.reader, KeyCode::Enter);

        let out = f.dir.path().join("export.json");
        press(&mut f.reader, KeyCode::Char('e'));
        assert_eq!(f.reader.state().ui_state.active_window, WindowType::ExportPath);
        type_text(&mut f.reader, out.to_str().unwrap());
        press(&mut f.reader, KeyCode::Enter);

        let message = f.reader.state().ui_state.message.clone().unwrap();
        assert!(message.starts_with("Exported 1 bookmarks"));
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(value["title"], "sample");
        assert_eq!(value["bookmarks"][0]["page"], 2);
        assert_eq!(value["bookmarks"][0]["note"], "storm");
        assert_eq!(value["stats"]["pages_turned"], 1);
    }

    #[test]
    fn test_export_failure_reported() {
        let mut f = fixture();
        press(&mut f.reader, KeyCode::Char('e'));
        type_text(&mut f.reader, "/nonexistent-dir/export.json");
        press(&mut f.reader, KeyCode::Enter);
        assert_eq!(f.reader.state().ui_state.message_type, MessageType::Error);
    }

    #[test]
    fn test_tts_skips_blank_pages() {
        let mut lines = vec!["opening".to_string()];
        lines.extend(vec![String::new(); 30]);
        lines.push("closing".to_string());
        let mut f = fixture_with(&lines, |config| {
            config.settings.preferred_tts_engine =
                Some("definitely-not-a-tts-engine-xyz".to_string());
        });
        assert_eq!(f.reader.pages().total(), 4);

        press(&mut f.reader, KeyCode::Char('l'));
        press(&mut f.reader, KeyCode::Char('t'));
        assert_eq!(f.reader.current_page(), 3);
        let message = f.reader.state().ui_state.message.clone().unwrap();
        assert!(message.starts_with("TTS failed"));
        assert!(!f.reader.state().ui_state.tts_active);
    }

    #[test]
    fn test_tts_stops_when_only_blank_pages_remain() {
        let mut lines = vec!["opening".to_string()];
        lines.extend(vec![String::new(); 15]);
        let mut f = fixture_with(&lines, |_| {});
        press(&mut f.reader, KeyCode::Char('l'));
        press(&mut f.reader, KeyCode::Char('t'));
        assert_eq!(f.reader.current_page(), 1);
        assert_eq!(f.reader.state().ui_state.message.as_deref(), Some("TTS finished"));
        assert!(!f.reader.state().ui_state.tts_active);
    }

    #[test]
    fn test_render_oversized_layout() {
        let mut f = fixture_with(&sample_lines(), |config| {
            config.settings.width = 100_000;
            config.settings.height = 70_000;
        });
        f.reader.draw().unwrap();
        let text = buffer_text(f.reader.terminal.backend().buffer());
        assert!(text.contains("line 1 of the sample book"));
    }

    #[test]
    fn test_quit_keys() {
        let mut f = fixture();
        press(&mut f.reader, KeyCode::Char('q'));
        assert!(f.reader.state().should_quit);
    }

    #[test]
    fn test_build_header_line() {
        let line = Reader::<TestBackend>::build_header_line("Book", Some("1/2 50%"), 20);
        assert_eq!(display_width(&line), 20);
        assert!(line.ends_with("1/2 50%"));
        assert!(line.contains("Book"));

        let cjk = Reader::<TestBackend>::build_header_line("三体三体三体", Some("1/9"), 10);
        assert!(display_width(&cjk) <= 10);
        assert!(cjk.ends_with("1/9"));

        assert_eq!(Reader::<TestBackend>::build_header_line("x", None, 0), "");
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(Reader::<TestBackend>::progress_bar(0, 10, 10), "[#---------]");
        assert_eq!(Reader::<TestBackend>::progress_bar(9, 10, 10), "[##########]");
        assert_eq!(Reader::<TestBackend>::progress_bar(0, 0, 4), "[----]");
    }
}
