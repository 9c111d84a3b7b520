use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Clear, List, Paragraph},
};

use crate::pagination::PageMatch;
use crate::ui::windows::{scale, selectable_items};

pub struct SearchWindow;

impl SearchWindow {
    pub fn render(
        frame: &mut Frame,
        area: Rect,
        query: &str,
        results: &[PageMatch],
        selected_index: usize,
    ) {
        let popup_area = Rect::new(
            area.x + area.width / 8,
            area.y + area.height / 6,
            scale(area.width, 3, 4),
            scale(area.height, 2, 3),
        );

        frame.render_widget(Clear, popup_area);

        let header = Paragraph::new(Line::from(format!("/{}", query)))
            .block(Block::default().title("Search").borders(Borders::ALL))
            .style(Style::default().add_modifier(Modifier::BOLD));

        let header_area = Rect::new(popup_area.x, popup_area.y, popup_area.width, 3.min(popup_area.height));
        frame.render_widget(header, header_area);

        let list_area = Rect::new(
            popup_area.x,
            popup_area.y + header_area.height,
            popup_area.width,
            popup_area.height.saturating_sub(header_area.height),
        );

        if results.is_empty() {
            let empty = Paragraph::new("Type a query and press Enter")
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(empty, list_area);
            return;
        }

        let entries: Vec<String> = results
            .iter()
            .map(|hit| format!("p.{:<6} {}", hit.page + 1, hit.preview))
            .collect();
        let list = List::new(selectable_items(&entries, selected_index)).block(
            Block::default()
                .title(format!("{} pages", results.len()))
                .borders(Borders::ALL),
        );

        frame.render_widget(list, list_area);
    }
}
