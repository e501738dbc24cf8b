use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

use crate::ui::theme::{self, Theme};

/// A blocking message box dismissed with Enter/Esc
#[derive(Debug, Clone, Default)]
pub struct AlertDialog {
    pub title: String,
    pub message: String,
    pub visible: bool,
}

impl AlertDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, title: &str, message: &str) {
        self.title = title.to_string();
        self.message = message.to_string();
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn render(&self, f: &mut Frame, theme: &Theme) {
        if !self.visible {
            return;
        }

        let area = f.area();
        let width = (self.message.width() as u16 + 6)
            .max(self.title.width() as u16 + 6)
            .clamp(24, area.width.saturating_sub(4).max(24));
        // Room for wrapped message lines, the action row and borders
        let inner_width = width.saturating_sub(2).max(1);
        let lines = (self.message.width() as u16).div_ceil(inner_width).max(1);
        let popup = centered_rect(width, lines + 4, area);
        f.render_widget(Clear, popup);

        let block = Block::default()
            .title(Span::styled(
                format!("{}{} ", theme::ICON_ERROR, self.title),
                Style::default().fg(theme.error).add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(theme.dialog_border);

        let inner = block.inner(popup);
        f.render_widget(block, popup);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);

        let msg = Paragraph::new(Line::from(Span::styled(
            &self.message,
            Style::default().fg(theme.fg),
        )))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
        f.render_widget(msg, chunks[0]);

        let actions = Line::from(vec![
            Span::styled(" Enter ", theme.help_key),
            Span::styled("OK ", Style::default().fg(theme.fg_dim)),
        ]);
        f.render_widget(Paragraph::new(actions).alignment(Alignment::Center), chunks[1]);
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}
