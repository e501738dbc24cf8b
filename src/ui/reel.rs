use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};
use ratatui::Frame;

use super::theme;
use crate::app::App;
use crate::capture::CaptureClient;

/// Side panel listing the most recent captures, newest first
pub fn render<C: CaptureClient>(frame: &mut Frame, app: &App<C>, area: Rect) {
    let block = Block::default()
        .title(Span::styled(
            format!(" Photos ({}) ", app.reel.len()),
            app.theme.panel_title,
        ))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(app.theme.panel_border);

    let lines: Vec<Line> = if app.reel.is_empty() {
        vec![Line::from(Span::styled(
            " No photos yet",
            Style::default().fg(app.theme.fg_dim),
        ))]
    } else {
        app.reel
            .entries()
            .flat_map(|entry| {
                [
                    Line::from(vec![
                        Span::styled(
                            format!(" {}", theme::ICON_PHOTO),
                            Style::default().fg(app.theme.accent),
                        ),
                        Span::styled(entry.filename.clone(), Style::default().fg(app.theme.fg)),
                    ]),
                    Line::from(Span::styled(
                        format!("   {}", entry.captured_at.format("%H:%M:%S")),
                        Style::default().fg(app.theme.fg_dim),
                    )),
                    Line::from(Span::styled(
                        format!("   {}", entry.url),
                        Style::default().fg(app.theme.fg_dim),
                    )),
                ]
            })
            .collect()
    };

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
