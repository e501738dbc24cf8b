use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::try_join_all;
use image::RgbaImage;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{BoothError, BoothResult};
use crate::stage::TileSheet;

/// Images needed by a capture sequence, decoded once
#[derive(Debug, Clone)]
pub struct BoothAssets {
    /// Countdown digits; index 0 holds "1"
    pub digits: Vec<Arc<RgbaImage>>,
    pub score: Arc<TileSheet>,
    pub arrows: Option<Arc<TileSheet>>,
    pub impact: Option<Arc<RgbaImage>>,
}

/// Where sequence images come from
#[derive(Debug, Clone)]
pub enum AssetSource {
    /// Files under a directory, by fixed naming convention
    Directory(PathBuf),
    /// Already decoded in memory
    #[cfg(test)]
    Preloaded(Arc<BoothAssets>),
}

/// File names and sheet geometry used when loading from a directory
#[derive(Debug, Clone)]
struct AssetLayout {
    digits: u32,
    score_sheet: String,
    score_rows: u32,
    arrows_sheet: String,
    arrow_tile: (u32, u32),
    arrow_columns: u32,
    ambient_sheet: String,
    ambient_columns: u32,
    impact: String,
}

/// Load-once cache of the booth's images.
///
/// A failed load is not cached: the next capture tries again.
#[derive(Debug)]
pub struct AssetStore {
    source: AssetSource,
    layout: AssetLayout,
    loaded: OnceCell<Arc<BoothAssets>>,
}

impl AssetStore {
    pub fn new(source: AssetSource, config: &Config) -> Self {
        Self {
            source,
            layout: AssetLayout {
                digits: config.countdown.digits,
                score_sheet: config.assets.score_sheet.clone(),
                score_rows: config.score.rows,
                arrows_sheet: config.assets.arrows_sheet.clone(),
                arrow_tile: (config.arrows.tile_width, config.arrows.tile_height),
                arrow_columns: config.arrows.columns,
                ambient_sheet: config.assets.ambient_sheet.clone(),
                ambient_columns: config.ambient.columns,
                impact: config.assets.impact.clone(),
            },
            loaded: OnceCell::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(AssetSource::Directory(config.assets.dir.clone()), config)
    }

    /// Suspend until the digit images and score sheet are decoded. The first
    /// failure aborts the load.
    pub async fn ensure_loaded(&self) -> BoothResult<Arc<BoothAssets>> {
        self.loaded
            .get_or_try_init(|| self.load())
            .await
            .map(Arc::clone)
    }

    async fn load(&self) -> BoothResult<Arc<BoothAssets>> {
        let dir = match &self.source {
            #[cfg(test)]
            AssetSource::Preloaded(assets) => return Ok(Arc::clone(assets)),
            AssetSource::Directory(dir) => dir,
        };
        let layout = &self.layout;

        let digit_loads = (1..=layout.digits).map(|n| load_image(dir.join(format!("{n}.png"))));
        let (digits, score) = tokio::try_join!(
            try_join_all(digit_loads),
            load_image(dir.join(&layout.score_sheet)),
        )?;
        let score = TileSheet::stacked(score, layout.score_rows)?;

        let (tile_width, tile_height) = layout.arrow_tile;
        let arrows = optional(
            "traveling arrow sheet",
            load_image(dir.join(&layout.arrows_sheet))
                .await
                .and_then(|image| TileSheet::new(image, tile_width, tile_height, layout.arrow_columns)),
        );
        let impact = optional("impact image", load_image(dir.join(&layout.impact)).await);

        info!(digits = digits.len(), dir = %dir.display(), "sequence assets loaded");
        Ok(Arc::new(BoothAssets {
            digits: digits.into_iter().map(Arc::new).collect(),
            score: Arc::new(score),
            arrows: arrows.map(Arc::new),
            impact: impact.map(Arc::new),
        }))
    }

    /// The idle receptor arrows sheet. Loaded separately because the booth
    /// runs fine without it.
    pub async fn load_ambient_sheet(&self) -> BoothResult<TileSheet> {
        let dir = match &self.source {
            AssetSource::Directory(dir) => dir,
            #[cfg(test)]
            AssetSource::Preloaded(_) => {
                return Err(BoothError::Asset("no ambient sheet in preloaded assets".into()))
            }
        };
        let (tile_width, tile_height) = self.layout.arrow_tile;
        let image = load_image(dir.join(&self.layout.ambient_sheet)).await?;
        TileSheet::new(image, tile_width, tile_height, self.layout.ambient_columns)
    }
}

fn optional<T>(what: &str, result: BoothResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{what} unavailable, effects will be blank: {e}");
            None
        }
    }
}

/// Read and decode one image file into RGBA
pub async fn load_image(path: PathBuf) -> BoothResult<RgbaImage> {
    debug!(path = %path.display(), "loading image");
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| load_error(&path, e))?;
    tokio::task::spawn_blocking(move || {
        image::load_from_memory(&bytes)
            .map(|decoded| decoded.to_rgba8())
            .map_err(|e| load_error(&path, e))
    })
    .await?
}

fn load_error(path: &Path, reason: impl std::fmt::Display) -> BoothError {
    BoothError::AssetLoad {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}
