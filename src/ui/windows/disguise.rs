use ratatui::{
    Frame,
    layout::Rect,
    widgets::{Block, Borders, Clear, Paragraph},
};

/// Blank shell prompt drawn over the whole screen while the reader is hidden.
pub struct DisguiseWindow;

impl DisguiseWindow {
    pub fn render(frame: &mut Frame, area: Rect) {
        frame.render_widget(Clear, area);
        let prompt = Paragraph::new("$ ").block(Block::default().title("Terminal").borders(Borders::ALL));
        frame.render_widget(prompt, area);
    }
}
