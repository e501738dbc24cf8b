use std::sync::Arc;

use tokio::time::Instant;
use tracing::debug;

use crate::animation::{FrameClock, FrameSequence};
use crate::config::{AmbientConfig, ArrowsConfig};
use crate::error::BoothResult;
use crate::stage::{LaneLayout, Layer, OverlayController, Rotation, SurfaceId, TileSheet, VisualSurface};

/// The four idle receptor arrows along the top of the stage. Driven by the
/// render tick through a delta-time clock; the overlay hides them while a
/// capture runs.
pub struct AmbientArrows {
    overlay: Arc<OverlayController>,
    sheet: TileSheet,
    surfaces: Vec<SurfaceId>,
    clock: FrameClock,
    container_scale: f32,
    gap_scale: f32,
    top_offset: f32,
    laid_out_width: f32,
}

impl AmbientArrows {
    pub fn new(
        overlay: Arc<OverlayController>,
        sheet: TileSheet,
        ambient: &AmbientConfig,
        arrows: &ArrowsConfig,
    ) -> BoothResult<Self> {
        let sequence = FrameSequence::new(ambient.frame_sequence.clone())?;
        let mut clock = FrameClock::new(sequence, ambient.animation_interval());
        let first = clock.start(Instant::now());

        let width = overlay.size().width;
        let layout = LaneLayout::compute(width, arrows.container_scale, arrows.gap_scale);
        let surfaces = (0..LaneLayout::LANES)
            .map(|lane| {
                let surface = VisualSurface::new(
                    Layer::Ambient,
                    sheet.blank_canvas(),
                    layout.lane_x(lane),
                    arrows.top_offset,
                    layout.lane_width,
                    layout.lane_width,
                )
                .with_rotation(Rotation::from_degrees(arrows.rotation(lane)));
                let id = overlay.attach(surface);
                overlay.draw_tile(id, &sheet, first);
                id
            })
            .collect();

        debug!(lanes = LaneLayout::LANES, "ambient arrows attached");
        Ok(Self {
            overlay,
            sheet,
            surfaces,
            clock,
            container_scale: arrows.container_scale,
            gap_scale: arrows.gap_scale,
            top_offset: arrows.top_offset,
            laid_out_width: width,
        })
    }

    /// Advance the animation; call once per render tick.
    pub fn tick(&mut self, now: Instant) {
        if let Some(tile) = self.clock.advance(now) {
            for id in &self.surfaces {
                self.overlay.draw_tile(*id, &self.sheet, tile);
            }
        }
    }

    /// Re-place the arrows after the stage changed width
    pub fn relayout(&mut self) {
        let width = self.overlay.size().width;
        if width == self.laid_out_width {
            return;
        }
        let layout = LaneLayout::compute(width, self.container_scale, self.gap_scale);
        for (lane, id) in self.surfaces.iter().enumerate() {
            self.overlay.place(
                *id,
                layout.lane_x(lane),
                self.top_offset,
                layout.lane_width,
                layout.lane_width,
            );
        }
        self.laid_out_width = width;
    }

    #[cfg(test)]
    pub fn surfaces(&self) -> &[SurfaceId] {
        &self.surfaces
    }
}
