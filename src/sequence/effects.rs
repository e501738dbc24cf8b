use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::animation::{animate, AnimationHandle, FrameSequence};
use crate::config::ArrowsConfig;
use crate::stage::{LaneLayout, Layer, OverlayController, Rotation, SurfaceId, TileSheet, VisualSurface};

/// The impact flash starts this long before an arrow arrives
const IMPACT_LEAD: Duration = Duration::from_millis(20);

/// Extra time after the last arrival before a sequence reports completion
const SEQUENCE_TAIL: Duration = Duration::from_millis(100);

/// Traveling arrows opacity while in flight
const ARROW_OPACITY: f32 = 0.8;

/// Sprites used by traveling effects. Either may be missing if its image
/// failed to load; surfaces then stay blank.
#[derive(Debug, Clone, Default)]
pub struct EffectSprites {
    pub arrows: Option<Arc<TileSheet>>,
    pub impact: Option<Arc<RgbaImage>>,
}

/// Everything that can still touch the stage. Guarded by one lock so that
/// the epoch check and the mutation that follows it are atomic.
#[derive(Debug, Default)]
struct Tracked {
    epoch: u64,
    timers: Vec<JoinHandle<()>>,
    arrows: HashMap<SurfaceId, Option<AnimationHandle>>,
    impacts: HashSet<SurfaceId>,
}

impl Tracked {
    fn track(&mut self, timer: JoinHandle<()>) {
        self.timers.retain(|t| !t.is_finished());
        self.timers.push(timer);
    }
}

/// Spawns arrows that travel up their lane and burst into an impact flash
/// on arrival. Every timer belongs to an epoch; [`TravelingEffects::clear_all`]
/// starts a new epoch so callbacks scheduled before it become no-ops.
#[derive(Debug)]
pub struct TravelingEffects {
    overlay: Arc<OverlayController>,
    config: ArrowsConfig,
    sprites: Mutex<EffectSprites>,
    tracked: Mutex<Tracked>,
    rng: Mutex<StdRng>,
    spawned: AtomicUsize,
}

impl TravelingEffects {
    pub fn new(overlay: Arc<OverlayController>, config: ArrowsConfig, rng: StdRng) -> Self {
        Self {
            overlay,
            config,
            sprites: Mutex::new(EffectSprites::default()),
            tracked: Mutex::new(Tracked::default()),
            rng: Mutex::new(rng),
            spawned: AtomicUsize::new(0),
        }
    }

    pub fn install_sprites(&self, sprites: EffectSprites) {
        *self.sprites.lock() = sprites;
    }

    #[cfg(test)]
    pub fn epoch(&self) -> u64 {
        self.tracked.lock().epoch
    }

    /// Surfaces currently owned by in-flight effects
    pub fn tracked_surfaces(&self) -> usize {
        let tracked = self.tracked.lock();
        tracked.arrows.len() + tracked.impacts.len()
    }

    /// Timers that have not fired yet
    pub fn pending_timers(&self) -> usize {
        self.tracked
            .lock()
            .timers
            .iter()
            .filter(|t| !t.is_finished())
            .count()
    }

    /// Total arrows spawned since creation
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Launch one arrow up `lane`.
    #[cfg(test)]
    pub fn spawn(self: &Arc<Self>, lane: usize, rotation: Rotation) -> SurfaceId {
        let mut tracked = self.tracked.lock();
        self.spawn_locked(&mut tracked, lane, rotation)
    }

    fn spawn_locked(self: &Arc<Self>, tracked: &mut Tracked, lane: usize, rotation: Rotation) -> SurfaceId {
        let epoch = tracked.epoch;
        let size = self.overlay.size();
        let layout = self.layout(size.width);
        let sheet = self.sprites.lock().arrows.clone();

        let canvas = sheet
            .as_ref()
            .map(|s| s.blank_canvas())
            .unwrap_or_else(|| RgbaImage::new(self.config.tile_width, self.config.tile_height));
        let surface = VisualSurface::new(
            Layer::Traveling,
            canvas,
            layout.lane_x(lane),
            size.height,
            layout.lane_width,
            layout.lane_width,
        )
        .with_rotation(rotation)
        .with_opacity(ARROW_OPACITY);

        let id = self.overlay.attach(surface);
        let travel = self.config.travel();
        self.overlay.move_to(id, self.config.top_offset, travel);

        let animation = sheet.map(|sheet| {
            let sequence = FrameSequence::row(lane as u32, sheet.cols());
            animate(
                Arc::clone(&self.overlay),
                sheet,
                vec![id],
                sequence,
                self.config.animation_interval(),
            )
        });
        tracked.arrows.insert(id, animation);

        let this = Arc::clone(self);
        tracked.track(tokio::spawn(async move {
            sleep(travel.saturating_sub(IMPACT_LEAD)).await;
            let mut tracked = this.tracked.lock();
            if tracked.epoch == epoch {
                this.spawn_impact_locked(&mut tracked, lane);
            }
        }));

        let this = Arc::clone(self);
        tracked.track(tokio::spawn(async move {
            sleep(travel).await;
            let mut tracked = this.tracked.lock();
            if tracked.epoch != epoch {
                return;
            }
            if let Some(animation) = tracked.arrows.remove(&id).flatten() {
                animation.cancel();
            }
            this.overlay.detach(id);
        }));

        self.spawned.fetch_add(1, Ordering::Relaxed);
        trace!(lane, ?id, epoch, "arrow spawned");
        id
    }

    fn spawn_impact_locked(self: &Arc<Self>, tracked: &mut Tracked, lane: usize) {
        let epoch = tracked.epoch;
        let layout = self.layout(self.overlay.size().width);
        let canvas = self
            .sprites
            .lock()
            .impact
            .as_deref()
            .cloned()
            .unwrap_or_else(|| RgbaImage::new(1, 1));

        let surface = VisualSurface::new(
            Layer::Impact,
            canvas,
            layout.lane_x(lane),
            self.config.top_offset,
            layout.lane_width,
            layout.lane_width,
        )
        .with_opacity(0.0);
        let id = self.overlay.attach(surface);
        self.overlay.set_opacity(id, 1.0, self.config.fade_in());
        tracked.impacts.insert(id);

        let impact = self.config.impact();
        let fade_out = self.config.fade_out();

        let this = Arc::clone(self);
        tracked.track(tokio::spawn(async move {
            sleep(impact).await;
            let tracked = this.tracked.lock();
            if tracked.epoch == epoch {
                this.overlay.set_opacity(id, 0.0, fade_out);
            }
        }));

        let this = Arc::clone(self);
        tracked.track(tokio::spawn(async move {
            sleep(impact + fade_out).await;
            let mut tracked = this.tracked.lock();
            if tracked.epoch == epoch && tracked.impacts.remove(&id) {
                this.overlay.detach(id);
            }
        }));
    }

    /// Run one arrow burst: every spawn interval, each lane independently
    /// fires with the configured probability. Completes `travel + 100ms`
    /// after it starts, whatever happens to the arrows meanwhile.
    pub async fn spawn_sequence(self: &Arc<Self>) {
        let started = Instant::now();
        let ticks = self.config.spawn_ticks();
        let interval = self.config.spawn_interval();

        if ticks > 0 {
            let this = Arc::clone(self);
            let mut tracked = self.tracked.lock();
            let epoch = tracked.epoch;
            tracked.track(tokio::spawn(async move {
                let mut ticker = tokio::time::interval_at(started + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                for _ in 0..ticks {
                    ticker.tick().await;
                    let lanes = this.sample_lanes();
                    let mut tracked = this.tracked.lock();
                    if tracked.epoch != epoch {
                        return;
                    }
                    for lane in lanes {
                        let rotation = Rotation::from_degrees(this.config.rotation(lane));
                        this.spawn_locked(&mut tracked, lane, rotation);
                    }
                }
            }));
        }

        sleep_until(started + self.config.travel() + SEQUENCE_TAIL).await;
        debug!(total = self.spawned(), "arrow sequence finished");
    }

    fn sample_lanes(&self) -> Vec<usize> {
        let probability = self.config.spawn_probability;
        let mut rng = self.rng.lock();
        (0..LaneLayout::LANES)
            .filter(|_| rng.gen::<f64>() < probability)
            .collect()
    }

    /// Cancel every timer and animation and detach every tracked surface.
    pub fn clear_all(&self) {
        let mut tracked = self.tracked.lock();
        tracked.epoch += 1;

        for timer in tracked.timers.drain(..) {
            timer.abort();
        }
        let arrows: Vec<_> = tracked.arrows.drain().collect();
        for (id, animation) in arrows {
            if let Some(animation) = animation {
                animation.cancel();
            }
            self.overlay.strip_transitions(id);
            self.overlay.detach(id);
        }
        for id in tracked.impacts.drain() {
            self.overlay.strip_transitions(id);
            self.overlay.detach(id);
        }
        debug!(epoch = tracked.epoch, "traveling effects cleared");
    }

    fn layout(&self, stage_width: f32) -> LaneLayout {
        LaneLayout::compute(stage_width, self.config.container_scale, self.config.gap_scale)
    }
}
