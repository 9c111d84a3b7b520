use crate::encoding::Encoding;
use crate::models::LibraryItem;
use crate::pagination::Strategy;
use clap::{ArgAction, Parser};
use eyre::Result;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[clap(
    name = "ureader",
    version,
    about = "A terminal novel reader that detects GBK/Big5/UTF-8/UTF-16 text and paginates it to the screen.",
    long_about = None
)]
pub struct Cli {
    /// Print reading history
    #[clap(short = 'r', long)]
    pub history: bool,

    /// Print the paginated book to stdout and exit
    #[clap(short, long)]
    pub dump: bool,

    /// Start at this page (1-based)
    #[clap(short, long, value_name = "N")]
    pub page: Option<usize>,

    /// Pagination strategy: reflow, fixed, or paragraph
    #[clap(short, long, value_name = "STRATEGY")]
    pub strategy: Option<Strategy>,

    /// Decode with this encoding instead of detecting it
    #[clap(long, value_name = "LABEL")]
    pub encoding: Option<Encoding>,

    /// Write the book's bookmarks, notes and reading stats as JSON to FILE and exit
    #[clap(short = 'e', long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Use a specific configuration file
    #[clap(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Enable debug output
    #[clap(long)]
    pub debug: bool,

    /// Book path or history number
    #[clap(name = "EBOOK")]
    pub ebook: Vec<String>,
}

/// An existing file is used as is; a bare number picks that entry of the
/// reading history (1 is the most recent).
pub fn resolve_ebook_arg(arg: &str, history: &[LibraryItem]) -> Result<String> {
    if Path::new(arg).is_file() {
        return Ok(arg.to_string());
    }
    if let Ok(number) = arg.trim().parse::<usize>() {
        return match number.checked_sub(1).and_then(|index| history.get(index)) {
            Some(item) => Ok(item.filepath.clone()),
            None => Err(eyre::eyre!(
                "History has {} entries, no book number {}",
                history.len(),
                number
            )),
        };
    }
    Err(eyre::eyre!("File not found: {}", arg))
}
