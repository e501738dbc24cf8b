use std::time::Duration;

use tokio::time::Instant;

use super::{ease_in_out, lerp};

/// One stop of a keyframe animation. `offset` is the fraction of the total
/// duration at which `opacity` and `scale` are reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub offset: f32,
    pub opacity: f32,
    pub scale: f32,
}

impl Keyframe {
    pub const fn new(offset: f32, opacity: f32, scale: f32) -> Self {
        Self {
            offset,
            opacity,
            scale,
        }
    }
}

const IDENTITY: Keyframe = Keyframe::new(0.0, 1.0, 1.0);

/// Countdown digits fade in small, grow, then fade out at full size.
pub const COUNTDOWN_FADE_IN_GROW: &[Keyframe] = &[
    Keyframe::new(0.0, 0.0, 0.8),
    Keyframe::new(0.25, 1.0, 0.8),
    Keyframe::new(0.85, 1.0, 1.0),
    Keyframe::new(1.0, 0.0, 1.0),
];

/// Score reveal pops in from half size, holds, then fades out.
pub const SCORE_FADE_IN_OUT: &[Keyframe] = &[
    Keyframe::new(0.0, 0.0, 0.5),
    Keyframe::new(0.1, 1.0, 1.0),
    Keyframe::new(0.9, 1.0, 1.0),
    Keyframe::new(1.0, 0.0, 1.0),
];

/// A running keyframe animation. Past its end it holds the last frame.
#[derive(Debug, Clone, Copy)]
pub struct KeyframeAnimation {
    frames: &'static [Keyframe],
    start: Instant,
    duration: Duration,
}

impl KeyframeAnimation {
    pub fn new(frames: &'static [Keyframe], start: Instant, duration: Duration) -> Self {
        Self {
            frames,
            start,
            duration,
        }
    }

    /// The instant the animation completes (its "animation end" event)
    pub fn ends_at(&self) -> Instant {
        self.start + self.duration
    }

    #[cfg(test)]
    pub fn is_finished(&self, now: Instant) -> bool {
        now >= self.ends_at()
    }

    pub fn sample(&self, now: Instant) -> Keyframe {
        let (first, last) = match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return IDENTITY,
        };

        let progress = if self.duration.is_zero() {
            1.0
        } else {
            now.saturating_duration_since(self.start).as_secs_f32() / self.duration.as_secs_f32()
        };

        if progress <= first.offset {
            return first;
        }
        if progress >= last.offset {
            return last;
        }

        for pair in self.frames.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if progress >= a.offset && progress <= b.offset {
                let span = b.offset - a.offset;
                let t = if span <= 0.0 {
                    1.0
                } else {
                    ease_in_out((progress - a.offset) / span)
                };
                return Keyframe::new(progress, lerp(a.opacity, b.opacity, t), lerp(a.scale, b.scale, t));
            }
        }
        last
    }
}
