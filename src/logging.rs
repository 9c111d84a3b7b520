use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    /// `-v` raises the level to info, `-vv` or `--debug` to debug.
    pub fn from_flags(verbose: u8, debug: bool) -> Self {
        if debug {
            return LogLevel::Debug;
        }
        match verbose {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);
static QUIET: AtomicBool = AtomicBool::new(false);

pub fn init(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn enabled(level: LogLevel) -> bool {
    if QUIET.load(Ordering::Relaxed) && LOG_LEVEL.load(Ordering::Relaxed) < LogLevel::Debug as u8 {
        return false;
    }
    LOG_LEVEL.load(Ordering::Relaxed) >= level as u8
}

/// Silences stderr while the full-screen UI owns the terminal, unless the
/// level is debug. Dropping the guard restores normal output.
#[must_use]
pub struct QuietGuard {
    was_quiet: bool,
}

pub fn quiet() -> QuietGuard {
    QuietGuard {
        was_quiet: QUIET.swap(true, Ordering::Relaxed),
    }
}

impl Drop for QuietGuard {
    fn drop(&mut self) {
        QUIET.store(self.was_quiet, Ordering::Relaxed);
    }
}

pub fn error(message: impl AsRef<str>) {
    log(LogLevel::Error, "error", message.as_ref());
}

pub fn warn(message: impl AsRef<str>) {
    log(LogLevel::Warn, "warn", message.as_ref());
}

pub fn info(message: impl AsRef<str>) {
    log(LogLevel::Info, "info", message.as_ref());
}

pub fn debug(message: impl AsRef<str>) {
    log(LogLevel::Debug, "debug", message.as_ref());
}

fn log(level: LogLevel, label: &str, message: &str) {
    if enabled(level) {
        eprintln!("[{}] {}", label, message);
    }
}
