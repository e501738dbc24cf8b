//! Timed overlay choreography: countdown digits, traveling arrows, screen
//! flashes and the score reveal.

pub mod choreographer;
pub mod effects;
pub mod fader;

use std::fmt;

pub use choreographer::Choreographer;
pub use effects::{EffectSprites, TravelingEffects};
pub use fader::{FadeOptions, ScreenFader};

/// Stages of one capture's choreography, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStage {
    LoadingAssets,
    /// Showing digit `n`, counting down to 1
    Countdown(u32),
    /// Arrow burst is over; ambient arrows hidden and effects cleared
    Arrows,
    /// Flash `k` of the capture, 1-based
    Flash(u32),
    ScoreReveal,
    FadeOut,
}

impl fmt::Display for SequenceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadingAssets => write!(f, "Loading"),
            Self::Countdown(n) => write!(f, "Countdown {n}"),
            Self::Arrows => write!(f, "Arrows"),
            Self::Flash(k) => write!(f, "Flash {k}"),
            Self::ScoreReveal => write!(f, "Score"),
            Self::FadeOut => write!(f, "Fade out"),
        }
    }
}
