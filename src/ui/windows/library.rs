use chrono::Local;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Clear, List, Paragraph},
};

use crate::models::LibraryItem;
use crate::ui::windows::{centered_popup_area, selectable_items};

pub struct LibraryWindow;

impl LibraryWindow {
    /// One history row: progress, last read time, and book name.
    pub fn format_item(item: &LibraryItem) -> String {
        let reading_progress_str = match item.reading_progress {
            Some(p) => {
                let pct = ((p * 100.0).round() as i32).clamp(0, 100);
                format!("{:>4}", format!("{}%", pct))
            }
            None => format!("{:>4}", "N/A"),
        };

        let filename = match std::env::var("HOME") {
            Ok(home) if !home.is_empty() && item.filepath.starts_with(&home) => {
                item.filepath.replacen(&home, "~", 1)
            }
            _ => item.filepath.clone(),
        };

        let book_name = match (item.title.as_deref(), item.author.as_deref()) {
            (Some(title), Some(author)) => format!("{} - {} ({})", title, author, filename),
            (Some(title), None) => format!("{} ({})", title, filename),
            (None, Some(author)) => format!("{} - {}", filename, author),
            (None, None) => filename,
        };

        let last_read_str = item
            .last_read
            .with_timezone(&Local)
            .format("%I:%M%p %b %d")
            .to_string();

        format!("{} {}: {}", reading_progress_str, last_read_str, book_name)
    }

    pub fn render(frame: &mut Frame, area: Rect, items: &[LibraryItem], selected_index: usize) {
        let popup_area = centered_popup_area(area, 80, 70);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("Library").borders(Borders::ALL);
        let inner = block.inner(popup_area);
        frame.render_widget(block, popup_area);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);
        let footer = Paragraph::new("Enter open | d delete | q close");

        if items.is_empty() {
            let paragraph =
                Paragraph::new("Reading history is empty").style(Style::default().fg(Color::DarkGray));
            frame.render_widget(paragraph, rows[0]);
            frame.render_widget(footer, rows[1]);
            return;
        }

        let entries: Vec<String> = items.iter().map(Self::format_item).collect();
        let list = List::new(selectable_items(&entries, selected_index));
        frame.render_widget(list, rows[0]);
        frame.render_widget(footer, rows[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(title: Option<&str>, author: Option<&str>, progress: Option<f32>) -> LibraryItem {
        LibraryItem {
            last_read: Utc::now(),
            filepath: "/books/novel.txt".to_string(),
            title: title.map(str::to_string),
            author: author.map(str::to_string),
            reading_progress: progress,
        }
    }

    #[test]
    fn test_format_item_progress() {
        let line = LibraryWindow::format_item(&item(Some("Novel"), Some("Someone"), Some(0.256)));
        assert!(line.starts_with(" 26%"));
        assert!(line.ends_with("Novel - Someone (/books/novel.txt)"));

        let line = LibraryWindow::format_item(&item(None, None, None));
        assert!(line.starts_with(" N/A"));
        assert!(line.ends_with("/books/novel.txt"));
    }

    #[test]
    fn test_format_item_clamps_progress() {
        let line = LibraryWindow::format_item(&item(Some("Novel"), None, Some(1.7)));
        assert!(line.starts_with("100%"));
        assert!(line.ends_with("Novel (/books/novel.txt)"));
    }
}
