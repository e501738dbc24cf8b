pub mod frames;
pub mod keyframes;

use std::time::Duration;

use tokio::time::Instant;

pub use frames::{animate, AnimationHandle, FrameClock, FrameSequence};
pub use keyframes::{Keyframe, KeyframeAnimation, COUNTDOWN_FADE_IN_GROW, SCORE_FADE_IN_OUT};

/// Linear interpolation
pub fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t.clamp(0.0, 1.0)
}

/// Smoothstep ease-in-out on `[0, 1]`
pub fn ease_in_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// A single animated property: linear from `from` to `to` over `duration`.
///
/// Retargeting starts the new transition from the value observed at that
/// instant, so an interrupted transition never jumps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    from: f32,
    to: f32,
    start: Instant,
    duration: Duration,
}

impl Transition {
    /// A property resting at `value`
    pub fn settled(value: f32, now: Instant) -> Self {
        Self {
            from: value,
            to: value,
            start: now,
            duration: Duration::ZERO,
        }
    }

    pub fn value_at(&self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.start);
        if self.duration.is_zero() || elapsed >= self.duration {
            return self.to;
        }
        lerp(
            self.from,
            self.to,
            elapsed.as_secs_f32() / self.duration.as_secs_f32(),
        )
    }

    #[cfg(test)]
    pub fn target(&self) -> f32 {
        self.to
    }

    pub fn is_settled(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.start) >= self.duration
    }

    /// Start moving toward `to`; a zero duration jumps immediately.
    pub fn retarget(&mut self, now: Instant, to: f32, duration: Duration) {
        self.from = self.value_at(now);
        self.to = to;
        self.start = now;
        self.duration = duration;
    }

    /// Drop any in-progress transition, keeping the current value.
    pub fn freeze(&mut self, now: Instant) {
        *self = Self::settled(self.value_at(now), now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_clamps_progress() {
        assert_eq!(lerp(0.0, 10.0, 0.5), 5.0);
        assert_eq!(lerp(0.0, 10.0, 2.0), 10.0);
        assert_eq!(lerp(0.0, 10.0, -1.0), 0.0);
    }

    #[test]
    fn ease_is_symmetric() {
        assert_eq!(ease_in_out(0.0), 0.0);
        assert_eq!(ease_in_out(1.0), 1.0);
        assert!((ease_in_out(0.5) - 0.5).abs() < f32::EPSILON);
        assert!(ease_in_out(0.25) < 0.25);
    }

    #[tokio::test(start_paused = true)]
    async fn transition_interpolates_then_rests() {
        let now = Instant::now();
        let mut t = Transition::settled(0.0, now);
        t.retarget(now, 1.0, Duration::from_millis(100));
        assert_eq!(t.value_at(now), 0.0);
        assert!((t.value_at(now + Duration::from_millis(50)) - 0.5).abs() < 1e-4);
        assert_eq!(t.value_at(now + Duration::from_millis(100)), 1.0);
        assert_eq!(t.value_at(now + Duration::from_secs(5)), 1.0);
        assert!(t.is_settled(now + Duration::from_millis(100)));
    }

    #[tokio::test(start_paused = true)]
    async fn retarget_mid_flight_starts_from_current_value() {
        let now = Instant::now();
        let mut t = Transition::settled(0.0, now);
        t.retarget(now, 1.0, Duration::from_millis(100));
        let mid = now + Duration::from_millis(50);
        t.retarget(mid, 0.0, Duration::from_millis(100));
        assert!((t.value_at(mid) - 0.5).abs() < 1e-4);
        assert!((t.value_at(mid + Duration::from_millis(50)) - 0.25).abs() < 1e-4);
    }

    #[tokio::test(start_paused = true)]
    async fn freeze_strips_the_transition() {
        let now = Instant::now();
        let mut t = Transition::settled(10.0, now);
        t.retarget(now, 0.0, Duration::from_millis(200));
        let mid = now + Duration::from_millis(100);
        t.freeze(mid);
        assert_eq!(t.target(), 5.0);
        assert_eq!(t.value_at(mid + Duration::from_secs(1)), 5.0);
    }
}
