use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::{BoothError, BoothResult};
use crate::stage::{OverlayController, SurfaceId, TileSheet};

/// Smallest interval a frame loop will run at
const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

/// An ordered, non-empty list of tile indices played in a loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSequence(Vec<u32>);

impl FrameSequence {
    pub fn new(frames: Vec<u32>) -> BoothResult<Self> {
        if frames.is_empty() {
            return Err(BoothError::Config("frame sequence must not be empty".into()));
        }
        Ok(Self(frames))
    }

    /// Every tile of one sheet row: `[row*cols .. row*cols + cols - 1]`
    pub fn row(row: u32, cols: u32) -> Self {
        let cols = cols.max(1);
        Self((0..cols).map(|i| row * cols + i).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn frames(&self) -> &[u32] {
        &self.0
    }
}

/// Position within a [`FrameSequence`], wrapping circularly.
#[derive(Debug, Clone)]
pub struct FrameCursor {
    sequence: FrameSequence,
    index: usize,
}

impl FrameCursor {
    pub fn new(sequence: FrameSequence) -> Self {
        Self { sequence, index: 0 }
    }

    /// Tile to show now; moves the cursor to `(i + 1) mod len`.
    pub fn next_tile(&mut self) -> u32 {
        let tile = self.sequence.0[self.index];
        self.index = (self.index + 1) % self.sequence.len();
        tile
    }

    #[cfg(test)]
    pub fn position(&self) -> usize {
        self.index
    }
}

/// Handle to a running frame loop. Dropping it leaves the loop running;
/// call [`AnimationHandle::cancel`] to stop it.
#[derive(Debug)]
pub struct AnimationHandle {
    task: JoinHandle<()>,
}

impl AnimationHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Fixed-timer frame loop over a set of surfaces.
///
/// Frame 0 is drawn before this returns; each `interval` afterwards the next
/// frame is drawn. The loop ends by itself once none of the surfaces are
/// attached any more.
pub fn animate(
    overlay: Arc<OverlayController>,
    sheet: Arc<TileSheet>,
    surfaces: Vec<SurfaceId>,
    sequence: FrameSequence,
    interval: Duration,
) -> AnimationHandle {
    let interval = interval.max(MIN_FRAME_INTERVAL);
    let mut cursor = FrameCursor::new(sequence);

    let first = cursor.next_tile();
    for id in &surfaces {
        overlay.draw_tile(*id, &sheet, first);
    }

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let tile = cursor.next_tile();
            let drawn = surfaces
                .iter()
                .filter(|id| overlay.draw_tile(**id, &sheet, tile))
                .count();
            if drawn == 0 {
                break;
            }
        }
    });

    AnimationHandle { task }
}

/// Delta-time frame clock. Fed timestamps from the render loop, it advances
/// one frame whenever a full interval has accumulated and keeps the
/// remainder, so dropped render frames are caught up instead of drifting.
#[derive(Debug, Clone)]
pub struct FrameClock {
    cursor: FrameCursor,
    interval: Duration,
    accumulated: Duration,
    last: Option<Instant>,
}

impl FrameClock {
    pub fn new(sequence: FrameSequence, interval: Duration) -> Self {
        Self {
            cursor: FrameCursor::new(sequence),
            interval: interval.max(MIN_FRAME_INTERVAL),
            accumulated: Duration::ZERO,
            last: None,
        }
    }

    /// Tile to show right away; time is measured from `now` on.
    pub fn start(&mut self, now: Instant) -> u32 {
        self.last = Some(now);
        self.accumulated = Duration::ZERO;
        self.cursor.next_tile()
    }

    /// Returns the tile to draw when a frame boundary was crossed.
    pub fn advance(&mut self, now: Instant) -> Option<u32> {
        let last = *self.last.get_or_insert(now);
        self.accumulated += now.saturating_duration_since(last);
        self.last = Some(now);

        if self.accumulated < self.interval {
            return None;
        }
        let remainder = self.accumulated.as_nanos() % self.interval.as_nanos();
        self.accumulated = Duration::from_nanos(remainder as u64);
        Some(self.cursor.next_tile())
    }

    #[cfg(test)]
    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }
}
