use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::App;
use crate::capture::CaptureClient;
use crate::ui::theme::{self, Theme};

/// Render the bottom status bar with contextual keybindings and capture state
pub fn render<C: CaptureClient>(f: &mut Frame, app: &App<C>, theme: &Theme, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let capture_key = app.capture_key().to_string();
    let keys: Vec<(&str, &str)> = if app.alert.visible {
        vec![("Enter", "Dismiss")]
    } else {
        vec![(capture_key.as_str(), "Capture"), ("q", "Quit")]
    };
    let key_spans: Vec<Span> = keys
        .iter()
        .flat_map(|(key, desc)| {
            vec![
                Span::styled(format!(" {key} "), theme.help_key),
                Span::styled(format!("{desc} "), theme.help_desc),
                Span::styled("│", Style::default().fg(theme.border)),
            ]
        })
        .collect();
    f.render_widget(Paragraph::new(Line::from(key_spans)).style(theme.status_bar), chunks[0]);

    let state = if app.alert.visible {
        Span::styled(format!("{}Error ", theme::ICON_ERROR), Style::default().fg(theme.error))
    } else if app.capture_enabled {
        Span::styled(" ● Ready ", Style::default().fg(theme.success))
    } else {
        let stage = app
            .stage
            .map(|stage| format!(" · {stage}"))
            .unwrap_or_default();
        Span::styled(format!(" ○ Capturing{stage} "), Style::default().fg(theme.warning))
    };
    let status = Paragraph::new(Line::from(state))
        .style(theme.status_bar)
        .alignment(Alignment::Right);
    f.render_widget(status, chunks[1]);
}
