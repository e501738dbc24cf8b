use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};
use ratatui::Frame;

use super::theme;
use crate::app::App;
use crate::capture::CaptureClient;
use crate::config::CaptureMode;

/// Render the application header bar
pub fn render<C: CaptureClient>(frame: &mut Frame, app: &App<C>, area: Rect) {
    let title = Line::from(vec![Span::styled(
        format!(" {}snapbooth ", theme::ICON_CAMERA),
        app.theme.panel_title,
    )]);

    let block = Block::default()
        .title(title)
        .title_alignment(Alignment::Left)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(app.theme.accent));
    frame.render_widget(block, area);

    let inner = Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: area.height.saturating_sub(2).min(1),
    };

    let mode = match app.mode() {
        CaptureMode::Single => "Single photo",
        CaptureMode::Triple => "Three photos",
    };
    let left = Line::from(vec![
        Span::styled("  Mode ", Style::default().fg(app.theme.fg_dim)),
        Span::styled(mode, Style::default().fg(app.theme.fg).add_modifier(Modifier::BOLD)),
    ]);
    frame.render_widget(Paragraph::new(left).alignment(Alignment::Left), inner);

    let right = Line::from(vec![
        Span::styled("Server ", Style::default().fg(app.theme.fg_dim)),
        Span::styled(format!("{} ", app.server_url), Style::default().fg(app.theme.fg)),
    ]);
    frame.render_widget(Paragraph::new(right).alignment(Alignment::Right), inner);
}
