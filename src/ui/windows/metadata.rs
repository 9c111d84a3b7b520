use crate::models::{BookMetadata, ReadingStats};
use crate::ui::windows::centered_popup_area;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

pub struct MetadataWindow;

impl MetadataWindow {
    pub fn format_duration(seconds: u64) -> String {
        let hours = seconds / 3600;
        let minutes = (seconds % 3600) / 60;
        if hours > 0 {
            format!("{}h {}m", hours, minutes)
        } else {
            format!("{}m", minutes)
        }
    }

    pub fn render(
        frame: &mut Frame,
        area: Rect,
        metadata: Option<&BookMetadata>,
        stats: Option<&ReadingStats>,
    ) {
        let popup_area = centered_popup_area(area, 60, 80);

        frame.render_widget(Clear, popup_area);

        let close_hint = Line::from(Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::ITALIC),
        ));

        let Some(metadata) = metadata else {
            let paragraph = Paragraph::new(vec![Line::from("No metadata available"), Line::from(""), close_hint])
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::default().title("Metadata").borders(Borders::ALL));
            frame.render_widget(paragraph, popup_area);
            return;
        };

        let field = |label: &str, value: Option<&str>| {
            Line::from(format!("{}: {}", label, value.unwrap_or("Unknown")))
        };
        let mut content = vec![
            Line::from(Span::styled(
                "Book Information",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            field("Title", metadata.title.as_deref()),
            field("Author", metadata.creator.as_deref()),
            field("Publisher", metadata.publisher.as_deref()),
            field("Date", metadata.date.as_deref()),
            field("Language", metadata.language.as_deref()),
            field("Encoding", metadata.encoding.as_deref()),
        ];

        if let Some(stats) = stats {
            content.push(Line::from(""));
            content.push(Line::from(format!(
                "Time read: {}",
                Self::format_duration(stats.seconds_read)
            )));
            content.push(Line::from(format!("Pages turned: {}", stats.pages_turned)));
        }

        content.push(Line::from(""));
        content.push(Line::from("Description:"));
        content.push(Line::from(
            metadata
                .description
                .as_deref()
                .unwrap_or("No description available"),
        ));
        content.push(Line::from(""));
        content.push(close_hint);

        let paragraph = Paragraph::new(content)
            .wrap(Wrap { trim: true })
            .block(Block::default().title("Metadata").borders(Borders::ALL));

        frame.render_widget(paragraph, popup_area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::windows::buffer_text;
    use ratatui::{Terminal, backend::TestBackend};

    #[test]
    fn test_format_duration() {
        assert_eq!(MetadataWindow::format_duration(59), "0m");
        assert_eq!(MetadataWindow::format_duration(600), "10m");
        assert_eq!(MetadataWindow::format_duration(3 * 3600 + 120), "3h 2m");
    }

    #[test]
    fn test_render_metadata_with_stats() {
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        let metadata = BookMetadata {
            title: Some("Novel".to_string()),
            encoding: Some("gbk".to_string()),
            ..BookMetadata::default()
        };
        let stats = ReadingStats { seconds_read: 7200, pages_turned: 12 };
        terminal
            .draw(|f| MetadataWindow::render(f, f.area(), Some(&metadata), Some(&stats)))
            .unwrap();
        let text = buffer_text(terminal.backend().buffer());
        assert!(text.contains("Title: Novel"));
        assert!(text.contains("Encoding: gbk"));
        assert!(text.contains("Time read: 2h 0m"));
        assert!(text.contains("Pages turned: 12"));
    }
}
