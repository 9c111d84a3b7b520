use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Clear, List, Paragraph},
};

use crate::ui::windows::{scale, selectable_items};

pub struct SettingsWindow;

impl SettingsWindow {
    pub fn render(frame: &mut Frame, area: Rect, entries: &[String], selected_index: usize) {
        let popup_area = Rect::new(
            area.x + area.width / 6,
            area.y + area.height / 8,
            scale(area.width, 2, 3),
            scale(area.height, 3, 4),
        );

        frame.render_widget(Clear, popup_area);
        let block = Block::default().title("Settings").borders(Borders::ALL);
        let inner = block.inner(popup_area);
        frame.render_widget(block, popup_area);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);
        let footer = Paragraph::new("Enter/+ next | - previous | saved on change")
            .style(Style::default().fg(Color::DarkGray));

        let list = List::new(selectable_items(entries, selected_index));
        frame.render_widget(list, rows[0]);
        frame.render_widget(footer, rows[1]);
    }
}
