use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Clear, List, Paragraph},
};

use crate::models::Bookmark;
use crate::ui::windows::{centered_popup_area, selectable_items};

pub struct BookmarksWindow;

impl BookmarksWindow {
    pub fn format_entry(bookmark: &Bookmark) -> String {
        let mut entry = format!("p.{:<6} {}", bookmark.page + 1, bookmark.name);
        if let Some(note) = bookmark.note.as_deref().filter(|note| !note.is_empty()) {
            entry.push_str(" - ");
            entry.push_str(note);
        }
        entry
    }

    pub fn render(frame: &mut Frame, area: Rect, bookmarks: &[Bookmark], selected_index: usize) {
        let popup_area = centered_popup_area(area, 60, 60);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("Bookmarks").borders(Borders::ALL);
        let inner = block.inner(popup_area);
        frame.render_widget(block, popup_area);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);
        let footer = Paragraph::new("Enter jump | d delete | b add | q close");

        if bookmarks.is_empty() {
            let paragraph = Paragraph::new("No bookmarks yet. Press b while reading to add one.")
                .style(Style::default().fg(Color::DarkGray));
            frame.render_widget(paragraph, rows[0]);
            frame.render_widget(footer, rows[1]);
            return;
        }

        let entries: Vec<String> = bookmarks.iter().map(Self::format_entry).collect();
        let list = List::new(selectable_items(&entries, selected_index));
        frame.render_widget(list, rows[0]);
        frame.render_widget(footer, rows[1]);
    }
}
