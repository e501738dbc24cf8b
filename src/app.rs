use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::time::Instant;
use tracing::info;

use crate::ambient::AmbientArrows;
use crate::capture::{CaptureClient, CaptureSession};
use crate::config::{CaptureMode, Config};
use crate::event::{CaptureSource, Event};
use crate::reel::{PhotoReel, PreviewDisplay};
use crate::sequence::SequenceStage;
use crate::stage::OverlayController;
use crate::ui::components::alert::AlertDialog;
use crate::ui::theme::Theme;

/// How long a toast stays on screen
const TOAST_DURATION: Duration = Duration::from_secs(3);

// ── Application State ─────────────────────────────────────────────────

pub struct App<C> {
    pub should_quit: bool,
    pub theme: Theme,

    // Stage
    pub overlay: Arc<OverlayController>,
    pub ambient: Option<AmbientArrows>,
    pub preview: PreviewDisplay,
    preview_hold: Duration,

    // Capture
    pub session: CaptureSession<C>,
    pub capture_enabled: bool,
    pub stage: Option<SequenceStage>,
    capture_key: char,
    pub server_url: String,

    pub reel: PhotoReel,

    // Blocking alert (capture failures)
    pub alert: AlertDialog,

    // Toast notification
    pub toast_message: Option<String>,
    pub toast_is_error: bool,
    pub toast_ticks: u16,
    toast_length: u16,
}

impl<C: CaptureClient> App<C> {
    pub fn new(
        overlay: Arc<OverlayController>,
        session: CaptureSession<C>,
        ambient: Option<AmbientArrows>,
        config: &Config,
    ) -> Self {
        let tick_ms = config.tick_rate().as_millis().max(1);
        let toast_length = (TOAST_DURATION.as_millis() / tick_ms).clamp(1, u16::MAX as u128) as u16;

        Self {
            should_quit: false,
            theme: Theme::default(),

            overlay,
            ambient,
            preview: PreviewDisplay::Live,
            preview_hold: config.reel.preview_hold(),

            session,
            capture_enabled: true,
            stage: None,
            capture_key: config.capture.key.to_ascii_lowercase(),
            server_url: config.server.base_url.clone(),

            reel: PhotoReel::new(config.reel.max_photos, &config.server.base_url),

            alert: AlertDialog::new(),

            toast_message: None,
            toast_is_error: false,
            toast_ticks: 0,
            toast_length,
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.session.mode()
    }

    pub fn capture_key(&self) -> char {
        self.capture_key
    }

    /// Handle a key event
    pub fn handle_key(&mut self, key: KeyEvent) {
        // The alert blocks everything until dismissed
        if self.alert.visible {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                self.alert.hide();
            }
            return;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
            }
            KeyCode::Char(c) if c.to_ascii_lowercase() == self.capture_key => {
                self.request_capture(CaptureSource::Keyboard);
            }
            _ => {}
        }
    }

    fn request_capture(&mut self, source: CaptureSource) {
        if self.alert.visible {
            return;
        }
        self.session.trigger(source);
    }

    pub fn show_toast(&mut self, message: &str, is_error: bool) {
        self.toast_message = Some(message.to_string());
        self.toast_is_error = is_error;
        self.toast_ticks = self.toast_length;
    }

    pub fn tick_toast(&mut self) {
        if self.toast_ticks > 0 {
            self.toast_ticks -= 1;
            if self.toast_ticks == 0 {
                self.toast_message = None;
            }
        }
    }

    /// Handle events from the event loop
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => self.handle_key(key),
            Event::Tick => {
                self.tick_toast();
                let now = Instant::now();
                if let Some(ambient) = self.ambient.as_mut() {
                    ambient.relayout();
                    ambient.tick(now);
                }
                self.preview.expire(now);
            }
            Event::Resize(_w, _h) => {
                // The stage is resized from the drawn area on the next frame
            }
            Event::CaptureRequested(source) => self.request_capture(source),
            Event::CaptureControl { enabled } => {
                self.capture_enabled = enabled;
                if enabled {
                    self.stage = None;
                }
            }
            Event::CaptureRejected => {
                self.show_toast("Capture already in progress", true);
            }
            Event::Stage(stage) => self.stage = Some(stage),
            Event::PhotosCaptured(filenames) => {
                for filename in &filenames {
                    self.reel.add(filename);
                }
                self.show_toast(&format!("{} photos captured", filenames.len()), false);
            }
            Event::PhotoCaptured(filename) => {
                self.reel.add(&filename);
                self.show_toast(&format!("Captured {filename}"), false);
            }
            Event::PhotoFetched { filename, image } => {
                info!(%filename, "showing latest photo");
                self.preview = PreviewDisplay::show(filename, image, self.preview_hold);
            }
            Event::CaptureFailed(message) => {
                let message = if message.is_empty() {
                    "Failed to capture image.".to_string()
                } else {
                    message
                };
                self.alert.show("Capture failed", &message);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::capture::HttpCaptureClient;
    use crate::sequence::choreographer::tests::{preloaded, rig};
    use image::RgbaImage;

    pub(crate) fn test_app() -> App<HttpCaptureClient> {
        let rig = rig(preloaded());
        let client = HttpCaptureClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let session = CaptureSession::new(
            Arc::new(client),
            rig.choreographer.clone(),
            CaptureMode::Triple,
            rig.tx.clone(),
        );
        App::new(rig.overlay.clone(), session, None, &Config::default())
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[tokio::test]
    async fn quit_keys() {
        let mut app = test_app();
        app.handle_key(key(KeyCode::Char('x')));
        assert!(!app.should_quit);
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);

        let mut app = test_app();
        app.handle_key(key(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn alert_blocks_input_until_dismissed() {
        let mut app = test_app();
        app.handle_event(Event::CaptureFailed("Failed to capture images".into()));
        assert!(app.alert.visible);
        assert_eq!(app.alert.message, "Failed to capture images");

        // Neither quitting nor capturing while the alert is up
        app.handle_key(key(KeyCode::Char('q')));
        app.handle_key(key(KeyCode::Char('c')));
        assert!(!app.should_quit);
        assert!(!app.session.is_busy());
        app.handle_event(Event::CaptureRequested(CaptureSource::Gamepad));
        assert!(!app.session.is_busy());

        app.handle_key(key(KeyCode::Enter));
        assert!(!app.alert.visible);
    }

    #[tokio::test]
    async fn capture_control_and_stage_tracking() {
        let mut app = test_app();
        app.handle_event(Event::CaptureControl { enabled: false });
        app.handle_event(Event::Stage(SequenceStage::Countdown(2)));
        assert!(!app.capture_enabled);
        assert_eq!(app.stage, Some(SequenceStage::Countdown(2)));

        app.handle_event(Event::CaptureControl { enabled: true });
        assert!(app.capture_enabled);
        assert_eq!(app.stage, None);
    }

    #[tokio::test]
    async fn rejected_capture_shows_a_toast_that_expires() {
        let mut app = test_app();
        app.handle_event(Event::CaptureRejected);
        assert_eq!(app.toast_message.as_deref(), Some("Capture already in progress"));
        assert!(app.toast_is_error);
        for _ in 0..app.toast_length {
            app.tick_toast();
        }
        assert!(app.toast_message.is_none());
    }

    #[tokio::test]
    async fn captured_photos_fill_the_reel_and_preview() {
        let mut app = test_app();
        app.handle_event(Event::PhotosCaptured(vec!["a.jpg".into(), "b.jpg".into()]));
        app.handle_event(Event::PhotoCaptured("c.jpg".into()));
        let names: Vec<&str> = app.reel.entries().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["c.jpg", "b.jpg", "a.jpg"]);

        app.handle_event(Event::PhotoFetched {
            filename: "c.jpg".into(),
            image: Arc::new(RgbaImage::new(2, 2)),
        });
        assert!(!app.preview.is_live());
    }
}
