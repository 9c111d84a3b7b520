use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::pagination::display_width;

/// A one-line text prompt, used for page numbers and bookmark notes.
pub struct InputWindow;

impl InputWindow {
    pub fn render(frame: &mut Frame, area: Rect, title: &str, value: &str) {
        let width = (area.width / 2).max(20).min(area.width);
        let popup_area = Rect::new(
            area.x + (area.width - width) / 2,
            area.y + area.height.saturating_sub(3) / 2,
            width,
            3.min(area.height),
        );

        let input = Paragraph::new(Line::from(value)).block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        );

        frame.render_widget(Clear, popup_area);
        frame.render_widget(input, popup_area);

        let cursor_x = (popup_area.x + 1 + display_width(value) as u16)
            .min(popup_area.right().saturating_sub(2));
        frame.set_cursor_position((cursor_x, popup_area.y + 1));
    }
}
