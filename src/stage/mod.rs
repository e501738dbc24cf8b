//! The stage: every on-screen visual surface plus the page-wide fade
//! overlay, owned by one [`OverlayController`] created at startup and
//! shared by `Arc` with everything that draws.

pub mod layout;
pub mod sprite;

use std::collections::BTreeMap;
use std::time::Duration;

use image::RgbaImage;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

use crate::animation::{KeyframeAnimation, Transition};

pub use layout::LaneLayout;
pub use sprite::TileSheet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u64);

/// Z-order of stage elements, back to front
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    Ambient,
    Traveling,
    Countdown,
    Score,
    Impact,
}

/// Right-angle rotations, clockwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    /// Snap an angle in degrees to the nearest right angle
    pub fn from_degrees(degrees: i32) -> Self {
        match ((degrees.rem_euclid(360) + 45) / 90) % 4 {
            1 => Self::Quarter,
            2 => Self::Half,
            3 => Self::ThreeQuarter,
            _ => Self::None,
        }
    }

    /// Map a point of the rotated box back into the unrotated source,
    /// both in unit coordinates.
    pub fn source_uv(self, u: f32, v: f32) -> (f32, f32) {
        match self {
            Self::None => (u, v),
            Self::Quarter => (v, 1.0 - u),
            Self::Half => (1.0 - u, 1.0 - v),
            Self::ThreeQuarter => (1.0 - v, u),
        }
    }
}

/// How a surface's `(x, y)` relates to its box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    TopLeft,
    Center,
}

/// Fill color of the fade overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeColor {
    Transparent,
    Rgb(u8, u8, u8),
}

impl FadeColor {
    pub const WHITE: Self = Self::Rgb(255, 255, 255);
    pub const BLACK: Self = Self::Rgb(0, 0, 0);

    pub fn is_transparent(self) -> bool {
        matches!(self, Self::Transparent)
    }
}

/// Stage dimensions in dots (one terminal cell is 1x2 dots)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageSize {
    pub width: f32,
    pub height: f32,
}

impl StageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// One on-stage element showing a single canvas (usually one tile).
#[derive(Debug, Clone)]
pub struct VisualSurface {
    pub layer: Layer,
    pub anchor: Anchor,
    pub canvas: RgbaImage,
    pub tile: Option<u32>,
    pub x: f32,
    pub y: Transition,
    pub width: f32,
    pub height: f32,
    pub rotation: Rotation,
    pub opacity: Transition,
    pub animation: Option<KeyframeAnimation>,
}

impl VisualSurface {
    pub fn new(layer: Layer, canvas: RgbaImage, x: f32, y: f32, width: f32, height: f32) -> Self {
        let now = Instant::now();
        Self {
            layer,
            anchor: Anchor::TopLeft,
            canvas,
            tile: None,
            x,
            y: Transition::settled(y, now),
            width,
            height,
            rotation: Rotation::None,
            opacity: Transition::settled(1.0, now),
            animation: None,
        }
    }

    pub fn centered(mut self) -> Self {
        self.anchor = Anchor::Center;
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = Transition::settled(opacity, Instant::now());
        self
    }

    pub fn with_animation(mut self, animation: KeyframeAnimation) -> Self {
        self.animation = Some(animation);
        self
    }

    /// Resolve transitions, anchor and keyframes into a drawable box.
    pub fn frame_at(&self, now: Instant) -> SurfaceFrame<'_> {
        let mut opacity = self.opacity.value_at(now);
        let mut scale = 1.0;
        if let Some(animation) = self.animation {
            let key = animation.sample(now);
            opacity *= key.opacity;
            scale = key.scale;
        }

        let width = self.width * scale;
        let height = self.height * scale;
        let y = self.y.value_at(now);
        let (left, top) = match self.anchor {
            Anchor::TopLeft => (
                self.x + (self.width - width) / 2.0,
                y + (self.height - height) / 2.0,
            ),
            Anchor::Center => (self.x - width / 2.0, y - height / 2.0),
        };

        SurfaceFrame {
            canvas: &self.canvas,
            left,
            top,
            width,
            height,
            rotation: self.rotation,
            opacity: opacity.clamp(0.0, 1.0),
        }
    }
}

/// A surface resolved for one rendered frame
#[derive(Debug, Clone, Copy)]
pub struct SurfaceFrame<'a> {
    pub canvas: &'a RgbaImage,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub rotation: Rotation,
    pub opacity: f32,
}

/// The page-wide fade overlay
#[derive(Debug, Clone, Copy)]
pub struct FadeState {
    pub color: FadeColor,
    /// Duration applied to the next opacity change
    pub transition: Duration,
    opacity: Transition,
}

impl FadeState {
    pub fn opacity_at(&self, now: Instant) -> f32 {
        self.opacity.value_at(now)
    }
}

#[derive(Debug)]
struct StageState {
    size: StageSize,
    next_id: u64,
    surfaces: BTreeMap<SurfaceId, VisualSurface>,
    fade: FadeState,
    ambient_visible: bool,
}

/// Read-only view of the stage handed to the renderer
pub struct StageView<'a> {
    pub now: Instant,
    pub ambient_visible: bool,
    state: &'a StageState,
}

impl<'a> StageView<'a> {
    /// Surfaces back to front (layer, then creation order)
    pub fn surfaces(&self) -> Vec<&'a VisualSurface> {
        let mut surfaces: Vec<_> = self.state.surfaces.iter().collect();
        surfaces.sort_by_key(|(id, surface)| (surface.layer, **id));
        surfaces.into_iter().map(|(_, surface)| surface).collect()
    }
}

/// Owner of the stage. All mutation goes through here; the lock is never
/// held across an await point.
#[derive(Debug)]
pub struct OverlayController {
    state: Mutex<StageState>,
}

impl OverlayController {
    pub fn new(size: StageSize) -> Self {
        let now = Instant::now();
        Self {
            state: Mutex::new(StageState {
                size,
                next_id: 0,
                surfaces: BTreeMap::new(),
                fade: FadeState {
                    color: FadeColor::Transparent,
                    transition: Duration::from_millis(300),
                    opacity: Transition::settled(0.0, now),
                },
                ambient_visible: true,
            }),
        }
    }

    // ── Geometry ──────────────────────────────────────────────────────

    pub fn size(&self) -> StageSize {
        self.state.lock().size
    }

    pub fn resize(&self, size: StageSize) {
        let mut state = self.state.lock();
        if state.size != size {
            trace!(width = size.width, height = size.height, "stage resized");
            state.size = size;
        }
    }

    // ── Surfaces ──────────────────────────────────────────────────────

    pub fn attach(&self, surface: VisualSurface) -> SurfaceId {
        let mut state = self.state.lock();
        let id = SurfaceId(state.next_id);
        state.next_id += 1;
        state.surfaces.insert(id, surface);
        id
    }

    pub fn detach(&self, id: SurfaceId) -> bool {
        self.state.lock().surfaces.remove(&id).is_some()
    }

    /// Detach every surface of `layer`, returning how many were removed
    pub fn detach_layer(&self, layer: Layer) -> usize {
        let mut state = self.state.lock();
        let before = state.surfaces.len();
        state.surfaces.retain(|_, surface| surface.layer != layer);
        before - state.surfaces.len()
    }

    #[cfg(test)]
    pub fn contains(&self, id: SurfaceId) -> bool {
        self.state.lock().surfaces.contains_key(&id)
    }

    #[cfg(test)]
    pub fn surface_count(&self) -> usize {
        self.state.lock().surfaces.len()
    }

    #[cfg(test)]
    pub fn count_layer(&self, layer: Layer) -> usize {
        self.state
            .lock()
            .surfaces
            .values()
            .filter(|surface| surface.layer == layer)
            .count()
    }

    /// Blit a tile onto a surface. Returns `false` if the surface is gone.
    pub fn draw_tile(&self, id: SurfaceId, sheet: &TileSheet, index: u32) -> bool {
        let mut state = self.state.lock();
        let Some(surface) = state.surfaces.get_mut(&id) else {
            return false;
        };
        sheet.draw(&mut surface.canvas, index);
        surface.tile = Some(index);
        true
    }

    #[cfg(test)]
    pub fn current_tile(&self, id: SurfaceId) -> Option<u32> {
        self.state.lock().surfaces.get(&id).and_then(|s| s.tile)
    }

    pub fn place(&self, id: SurfaceId, x: f32, y: f32, width: f32, height: f32) {
        let now = Instant::now();
        self.with_surface(id, |surface| {
            surface.x = x;
            surface.y = Transition::settled(y, now);
            surface.width = width;
            surface.height = height;
        });
    }

    /// Move vertically to `y` over `duration` (linear)
    pub fn move_to(&self, id: SurfaceId, y: f32, duration: Duration) {
        let now = Instant::now();
        self.with_surface(id, |surface| surface.y.retarget(now, y, duration));
    }

    pub fn set_opacity(&self, id: SurfaceId, opacity: f32, duration: Duration) {
        let now = Instant::now();
        self.with_surface(id, |surface| surface.opacity.retarget(now, opacity, duration));
    }

    pub fn strip_transitions(&self, id: SurfaceId) {
        let now = Instant::now();
        self.with_surface(id, |surface| {
            surface.y.freeze(now);
            surface.opacity.freeze(now);
        });
    }

    #[cfg(test)]
    pub fn surface_y(&self, id: SurfaceId) -> Option<f32> {
        let now = Instant::now();
        self.state.lock().surfaces.get(&id).map(|s| s.y.value_at(now))
    }

    /// When the surface's keyframe animation ends, if it has one
    pub fn animation_end(&self, id: SurfaceId) -> Option<Instant> {
        self.state
            .lock()
            .surfaces
            .get(&id)
            .and_then(|s| s.animation.map(|a| a.ends_at()))
    }

    fn with_surface(&self, id: SurfaceId, f: impl FnOnce(&mut VisualSurface)) {
        if let Some(surface) = self.state.lock().surfaces.get_mut(&id) {
            f(surface);
        }
    }

    // ── Ambient arrows ────────────────────────────────────────────────

    pub fn set_ambient_visible(&self, visible: bool) {
        self.state.lock().ambient_visible = visible;
    }

    #[cfg(test)]
    pub fn ambient_visible(&self) -> bool {
        self.state.lock().ambient_visible
    }

    // ── Fade overlay ──────────────────────────────────────────────────

    pub fn set_fade_transition(&self, duration: Duration) {
        self.state.lock().fade.transition = duration;
    }

    pub fn set_fade_color(&self, color: FadeColor) {
        self.state.lock().fade.color = color;
    }

    /// Start moving the overlay opacity using the current transition duration
    pub fn set_fade_opacity(&self, opacity: f32) {
        let now = Instant::now();
        let mut state = self.state.lock();
        let duration = state.fade.transition;
        state.fade.opacity.retarget(now, opacity, duration);
    }

    /// Settle finished transitions so the next change starts from a resolved
    /// value rather than a stale one.
    pub fn flush(&self) {
        let now = Instant::now();
        let mut state = self.state.lock();
        if state.fade.opacity.is_settled(now) {
            state.fade.opacity.freeze(now);
        }
        for surface in state.surfaces.values_mut() {
            if surface.y.is_settled(now) {
                surface.y.freeze(now);
            }
            if surface.opacity.is_settled(now) {
                surface.opacity.freeze(now);
            }
        }
    }

    pub fn fade_opacity(&self) -> f32 {
        self.state.lock().fade.opacity_at(Instant::now())
    }

    pub fn fade_color(&self) -> FadeColor {
        self.state.lock().fade.color
    }

    /// Jump the overlay back to fully clear with no transition
    pub fn reset_fade(&self) {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.fade.opacity = Transition::settled(0.0, now);
        state.fade.color = FadeColor::Transparent;
    }

    // ── Rendering ─────────────────────────────────────────────────────

    /// Run `f` against a consistent snapshot of the stage.
    pub fn with_view<R>(&self, f: impl FnOnce(StageView<'_>) -> R) -> R {
        let guard = self.state.lock();
        f(StageView {
            now: Instant::now(),
            ambient_visible: guard.ambient_visible,
            state: &*guard,
        })
    }
}
