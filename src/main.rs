use ureader::{
    book::{Ebook, open_book},
    cli::{Cli, resolve_ebook_arg},
    config::Config,
    encoding::Encoding,
    export::{build_export, write_export},
    logging::{self, LogLevel},
    pagination::{Pages, clamp_page_index},
    state::State,
    ui::{reader::Reader, windows::library::LibraryWindow},
};

use clap::Parser;
use eyre::{Result, WrapErr};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(LogLevel::from_flags(cli.verbose, cli.debug));

    let config = match &cli.config {
        Some(path) => Config::load_from(path.clone())
            .wrap_err_with(|| format!("Could not load configuration {}", path.display()))?,
        None => Config::new().wrap_err("Could not load configuration")?,
    };
    logging::debug(format!("Configuration: {}", config.filepath().display()));

    let forced_encoding = cli.encoding.or_else(|| configured_encoding(&config));

    if cli.history {
        return print_history();
    }

    let filepath = if cli.ebook.is_empty() {
        None
    } else {
        let history = State::new()?.get_from_history()?;
        Some(resolve_ebook_arg(&cli.ebook.join(" "), &history)?)
    };

    if let Some(out) = &cli.export {
        let Some(filepath) = filepath else {
            return Err(eyre::eyre!("--export needs a book"));
        };
        return export_book(&filepath, out, forced_encoding);
    }

    if cli.dump {
        let Some(filepath) = filepath else {
            return Err(eyre::eyre!("--dump needs a book to print"));
        };
        return dump_content(&filepath, &cli, &config, forced_encoding);
    }

    let mut reader = Reader::new(config)?;
    reader.set_forced_encoding(forced_encoding);
    reader.set_strategy_override(cli.strategy);
    match filepath {
        Some(filepath) => reader.load_ebook(&filepath, cli.page)?,
        None => {
            reader.load_last_ebook_if_any()?;
        }
    }
    reader.run()
}

fn configured_encoding(config: &Config) -> Option<Encoding> {
    let label = config.settings.forced_encoding.as_deref()?;
    match label.parse() {
        Ok(encoding) => Some(encoding),
        Err(err) => {
            logging::warn(format!("Ignoring forced_encoding {:?}: {}", label, err));
            None
        }
    }
}

fn print_history() -> Result<()> {
    let history = State::new()?.get_from_history()?;
    if history.is_empty() {
        println!("No reading history.");
        return Ok(());
    }
    for (i, item) in history.iter().enumerate() {
        println!("{:>3}. {}", i + 1, LibraryWindow::format_item(item));
    }
    Ok(())
}

fn export_book(filepath: &str, out: &Path, forced_encoding: Option<Encoding>) -> Result<()> {
    let filepath = std::fs::canonicalize(filepath)
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_else(|_| filepath.to_string());
    let book = open_book(&filepath, forced_encoding)?;
    let state = State::new()?;
    let bookmarks = state.get_bookmarks(book.as_ref())?;
    let stats = state.get_reading_stats(book.as_ref())?;
    write_export(out, &build_export(book.as_ref(), &bookmarks, stats))?;
    println!("Exported {} bookmarks to {}", bookmarks.len(), out.display());
    Ok(())
}

fn dump_content(
    filepath: &str,
    cli: &Cli,
    config: &Config,
    forced_encoding: Option<Encoding>,
) -> Result<()> {
    let book = open_book(filepath, forced_encoding)?;
    let strategy = cli.strategy.unwrap_or(config.settings.strategy);
    let pages = Pages::build(book.lines(), config.settings.layout(), strategy);
    let total = pages.total();
    logging::info(format!(
        "{}: {} lines, {} pages ({}, encoding {})",
        book.path(),
        book.lines().len(),
        total,
        strategy,
        book.get_meta().encoding.as_deref().unwrap_or("n/a")
    ));

    let selected: Vec<usize> = match cli.page {
        Some(page) => vec![clamp_page_index(page.saturating_sub(1), total)],
        None => (0..total).collect(),
    };
    for index in selected {
        println!("--- page {}/{} ---", index + 1, total);
        println!("{}", pages.get(index).unwrap_or_default());
    }
    Ok(())
}
