/// Horizontal placement of the four arrow lanes across the stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneLayout {
    pub left: f32,
    pub gap: f32,
    pub lane_width: f32,
}

impl LaneLayout {
    pub const LANES: usize = 4;

    /// Lanes fill `container_scale` of the stage width, centered, separated
    /// by `gap_scale` of that span. Sizes are floored to whole dots.
    pub fn compute(stage_width: f32, container_scale: f32, gap_scale: f32) -> Self {
        let total = stage_width * container_scale;
        let gap = (total * gap_scale).floor();
        let lanes = Self::LANES as f32;
        let lane_width = ((total - gap * (lanes - 1.0)) / lanes).floor().max(1.0);
        Self {
            left: (stage_width - total) / 2.0,
            gap,
            lane_width,
        }
    }

    pub fn lane_x(&self, lane: usize) -> f32 {
        self.left + lane as f32 * (self.lane_width + self.gap)
    }
}
