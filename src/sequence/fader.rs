use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::trace;

use crate::stage::{FadeColor, OverlayController};

/// Fade-out duration of a flash
pub const FLASH_FADE_OUT: Duration = Duration::from_millis(300);

/// Timing of one fade cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeOptions {
    pub fade_in: Duration,
    pub fade_out: Duration,
    pub hold: Duration,
}

impl Default for FadeOptions {
    fn default() -> Self {
        Self::millis(300, 300)
    }
}

impl FadeOptions {
    pub const fn millis(fade_in: u64, fade_out: u64) -> Self {
        Self {
            fade_in: Duration::from_millis(fade_in),
            fade_out: Duration::from_millis(fade_out),
            hold: Duration::ZERO,
        }
    }

    #[cfg(test)]
    pub const fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }
}

/// Drives the page-wide fade overlay. Fades have no cancellation of their
/// own; callers serialize them.
#[derive(Debug, Clone)]
pub struct ScreenFader {
    overlay: Arc<OverlayController>,
}

impl ScreenFader {
    pub fn new(overlay: Arc<OverlayController>) -> Self {
        Self { overlay }
    }

    /// Fade to `color`, hold, and fade back out when `fade_out` is non-zero
    /// or the color is transparent. Otherwise the overlay stays opaque.
    pub async fn fade(&self, color: FadeColor, options: FadeOptions) {
        trace!(?color, ?options, "fade");
        self.overlay.set_fade_transition(options.fade_in);
        self.overlay.set_fade_color(color);
        self.overlay.flush();
        self.overlay.set_fade_opacity(1.0);

        sleep(options.fade_in + options.hold).await;

        if color.is_transparent() || !options.fade_out.is_zero() {
            if options.fade_in != options.fade_out {
                self.overlay.set_fade_transition(options.fade_out);
                self.overlay.flush();
            }
            self.overlay.set_fade_opacity(0.0);
            sleep(options.fade_out).await;
        }
    }

    /// Instant white, then a fixed fade back to clear.
    pub async fn flash(&self) {
        self.overlay.set_fade_transition(Duration::ZERO);
        self.overlay.set_fade_color(FadeColor::WHITE);
        self.overlay.set_fade_opacity(1.0);
        self.overlay.flush();

        self.overlay.set_fade_transition(FLASH_FADE_OUT);
        self.overlay.set_fade_opacity(0.0);
        sleep(FLASH_FADE_OUT).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageSize;

    fn fader() -> (Arc<OverlayController>, ScreenFader) {
        let overlay = Arc::new(OverlayController::new(StageSize::new(80.0, 48.0)));
        (overlay.clone(), ScreenFader::new(overlay))
    }

    #[tokio::test(start_paused = true)]
    async fn fade_without_fade_out_stays_opaque() {
        let (overlay, fader) = fader();
        fader.fade(FadeColor::WHITE, FadeOptions::millis(300, 0)).await;
        assert_eq!(overlay.fade_opacity(), 1.0);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(overlay.fade_opacity(), 1.0);
        assert_eq!(overlay.fade_color(), FadeColor::WHITE);
    }

    #[tokio::test(start_paused = true)]
    async fn fade_round_trip_takes_in_hold_and_out() {
        let (overlay, fader) = fader();
        let start = tokio::time::Instant::now();
        let options = FadeOptions::millis(300, 200).with_hold(Duration::from_millis(100));
        fader.fade(FadeColor::BLACK, options).await;
        assert_eq!(start.elapsed(), Duration::from_millis(600));
        assert_eq!(overlay.fade_opacity(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn transparent_fades_out_even_with_zero_duration() {
        let (overlay, fader) = fader();
        overlay.set_fade_transition(Duration::ZERO);
        overlay.set_fade_opacity(1.0);
        fader
            .fade(FadeColor::Transparent, FadeOptions::millis(0, 0))
            .await;
        assert_eq!(overlay.fade_opacity(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn flash_jumps_white_then_clears() {
        let (overlay, fader) = fader();
        let watcher = {
            let overlay = overlay.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                overlay.fade_opacity()
            })
        };
        let flash = fader.flash();
        let (opacity_at_start, ()) = tokio::join!(watcher, flash);
        let opacity_at_start = opacity_at_start.unwrap();
        assert!(opacity_at_start > 0.99, "flash should start opaque, got {opacity_at_start}");
        assert_eq!(overlay.fade_opacity(), 0.0);
        assert_eq!(overlay.fade_color(), FadeColor::WHITE);
    }
}
