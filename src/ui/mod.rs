pub mod components;
pub mod header;
pub mod reel;
pub mod stage;
pub mod theme;

use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

use crate::app::App;
use crate::capture::CaptureClient;
use crate::stage::{FadeColor, StageSize};
use stage::StageWidget;
use theme::Theme;

/// Width of the photo reel side panel
const REEL_WIDTH: u16 = 34;

/// Colors assumed for cells drawn with the terminal default
const DEFAULT_FG: [u8; 3] = [229, 229, 229];
const DEFAULT_BG: [u8; 3] = [0, 0, 0];

/// Top-level draw function
pub fn draw<C: CaptureClient>(f: &mut Frame, app: &App<C>) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(4),
            Constraint::Length(1),
        ])
        .split(area);

    header::render(f, app, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(REEL_WIDTH)])
        .split(chunks[1]);
    render_stage(f, app, body[0]);
    reel::render(f, app, body[1]);

    components::status_bar::render(f, app, &app.theme, chunks[2]);

    // The fade covers the whole page; dialogs stay readable above it
    apply_fade(f.buffer_mut(), area, app.overlay.fade_color(), app.overlay.fade_opacity());

    app.alert.render(f, &app.theme);
    if let Some(ref msg) = app.toast_message {
        render_toast(f, msg, app.toast_is_error, &app.theme);
    }
}

fn render_stage<C: CaptureClient>(f: &mut Frame, app: &App<C>, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(app.theme.panel_border);
    let inner = block.inner(area);
    f.render_widget(block, area);

    // One cell holds two dots stacked vertically
    app.overlay
        .resize(StageSize::new(inner.width as f32, inner.height as f32 * 2.0));
    app.overlay.with_view(|view| {
        let widget = StageWidget {
            view: &view,
            preview: &app.preview,
            theme: &app.theme,
        };
        f.render_widget(widget, inner);
    });
}

/// Blend every cell of `area` toward the overlay color
fn apply_fade(buf: &mut Buffer, area: Rect, color: FadeColor, opacity: f32) {
    let FadeColor::Rgb(r, g, b) = color else {
        return;
    };
    if opacity <= 0.0 {
        return;
    }
    let target = [r, g, b];
    let area = area.intersection(buf.area);
    for y in area.top()..area.bottom() {
        for x in area.left()..area.right() {
            let cell = &mut buf[(x, y)];
            let fg = stage::mix(rgb_or(cell.fg, DEFAULT_FG), target, opacity);
            let bg = stage::mix(rgb_or(cell.bg, DEFAULT_BG), target, opacity);
            cell.set_fg(Color::Rgb(fg[0], fg[1], fg[2]))
                .set_bg(Color::Rgb(bg[0], bg[1], bg[2]));
        }
    }
}

fn rgb_or(color: Color, fallback: [u8; 3]) -> [u8; 3] {
    theme::approx_rgb(color)
        .map(|(r, g, b)| [r, g, b])
        .unwrap_or(fallback)
}

/// Render a toast notification in the top-right corner
fn render_toast(f: &mut Frame, message: &str, is_error: bool, theme: &Theme) {
    let area = f.area();
    if area.width < 8 || area.height < 4 {
        return;
    }
    let width = (message.width() as u16 + 6).min(area.width - 4);
    let x = area.width.saturating_sub(width + 2);
    let toast_area = Rect::new(x, 1, width, 3);

    f.render_widget(Clear, toast_area);

    let color = if is_error { theme.error } else { theme.success };
    let icon = if is_error { theme::ICON_ERROR } else { theme::ICON_OK };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color));

    let text = Paragraph::new(Line::from(vec![
        Span::styled(icon, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(message, Style::default().fg(theme.fg)),
    ]))
    .block(block);

    f.render_widget(text, toast_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use crate::event::Event;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn screen(buf: &Buffer) -> String {
        buf.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn full_fade_paints_every_cell() {
        let area = Rect::new(0, 0, 3, 2);
        let mut buf = Buffer::empty(area);
        buf[(1, 1)].set_fg(Color::Rgb(10, 20, 30)).set_bg(Color::Rgb(40, 50, 60));

        apply_fade(&mut buf, area, FadeColor::BLACK, 1.0);
        for cell in buf.content() {
            assert_eq!(cell.fg, Color::Rgb(0, 0, 0));
            assert_eq!(cell.bg, Color::Rgb(0, 0, 0));
        }
    }

    #[test]
    fn partial_and_transparent_fades() {
        let area = Rect::new(0, 0, 1, 1);
        let mut buf = Buffer::empty(area);
        buf[(0, 0)].set_bg(Color::Black);
        apply_fade(&mut buf, area, FadeColor::WHITE, 0.5);
        assert_eq!(buf[(0, 0)].bg, Color::Rgb(128, 128, 128));

        let mut untouched = Buffer::empty(area);
        apply_fade(&mut untouched, area, FadeColor::Transparent, 1.0);
        apply_fade(&mut untouched, area, FadeColor::BLACK, 0.0);
        assert_eq!(untouched[(0, 0)].bg, Color::Reset);
    }

    #[tokio::test]
    async fn draws_header_reel_and_status() {
        let mut app = test_app();
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| draw(f, &app)).unwrap();
        let text = screen(terminal.backend().buffer());
        assert!(text.contains("snapbooth"));
        assert!(text.contains("No photos yet"));
        assert!(text.contains("Ready"));
        assert!(text.contains("LIVE"));

        // The stage follows the drawn area: 100 - 34 reel - 2 borders wide
        let size = app.overlay.size();
        assert_eq!(size.width, 64.0);
        assert_eq!(size.height, 48.0);

        app.handle_event(Event::PhotoCaptured("shot_001.jpg".into()));
        app.handle_event(Event::CaptureFailed("Camera offline".into()));
        terminal.draw(|f| draw(f, &app)).unwrap();
        let text = screen(terminal.backend().buffer());
        assert!(text.contains("shot_001.jpg"));
        assert!(text.contains("Camera offline"));
        assert!(text.contains("Dismiss"));
    }
}
