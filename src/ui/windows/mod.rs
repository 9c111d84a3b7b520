pub mod bookmarks;
pub mod disguise;
pub mod help;
pub mod input;
pub mod library;
pub mod metadata;
pub mod search;
pub mod settings;

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::ListItem,
};

/// Compute a centered popup area within the given area.
pub fn centered_popup_area(area: Rect, width_percent: u16, height_percent: u16) -> Rect {
    let width = scale(area.width, width_percent.min(100), 100);
    let height = scale(area.height, height_percent.min(100), 100);
    let x = area.x + (area.width - width) / 2;
    let y = area.y + (area.height - height) / 2;

    Rect::new(x, y, width, height)
}

/// `value * numerator / denominator` without overflowing `u16`. The result
/// never exceeds `value` when `numerator <= denominator`.
pub fn scale(value: u16, numerator: u16, denominator: u16) -> u16 {
    let scaled = u32::from(value) * u32::from(numerator) / u32::from(denominator.max(1));
    u16::try_from(scaled).unwrap_or(u16::MAX)
}

/// List rows with the selected one highlighted.
pub fn selectable_items(entries: &[String], selected_index: usize) -> Vec<ListItem<'_>> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let style = if i == selected_index {
                Style::default().bg(Color::Blue).fg(Color::White)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(entry.as_str())).style(style)
        })
        .collect()
}

/// Flatten a rendered buffer into text, one line per row.
#[cfg(test)]
pub(crate) fn buffer_text(buffer: &ratatui::buffer::Buffer) -> String {
    let width = buffer.area.width as usize;
    buffer
        .content
        .chunks(width.max(1))
        .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_popup_area() {
        let area = Rect::new(0, 0, 100, 40);
        let popup = centered_popup_area(area, 50, 50);
        assert_eq!(popup, Rect::new(25, 10, 50, 20));

        let offset = centered_popup_area(Rect::new(10, 5, 20, 10), 100, 100);
        assert_eq!(offset, Rect::new(10, 5, 20, 10));
    }

    #[test]
    fn test_centered_popup_area_wide_terminal() {
        let wide = Rect { x: 0, y: 0, width: 1000, height: 400 };
        let popup = centered_popup_area(wide, 80, 60);
        assert_eq!((popup.x, popup.y, popup.width, popup.height), (100, 80, 800, 240));

        let huge = Rect { x: 0, y: 0, width: u16::MAX, height: u16::MAX };
        let popup = centered_popup_area(huge, 90, 90);
        assert_eq!((popup.x, popup.width), (3277, 58981));
    }

    #[test]
    fn test_scale() {
        assert_eq!(scale(1000, 3, 4), 750);
        assert_eq!(scale(u16::MAX, 3, 4), 49151);
        assert_eq!(scale(7, 1, 0), 7);
    }

    #[test]
    fn test_selectable_items_len() {
        let entries = vec!["one".to_string(), "two".to_string()];
        assert_eq!(selectable_items(&entries, 1).len(), 2);
        assert!(selectable_items(&[], 0).is_empty());
    }
}
