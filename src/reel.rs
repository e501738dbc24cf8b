use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use image::RgbaImage;
use tokio::time::Instant;

use crate::capture::photo_url;

/// One captured photo shown in the reel
#[derive(Debug, Clone, PartialEq)]
pub struct ReelEntry {
    pub filename: String,
    pub url: String,
    pub captured_at: DateTime<Local>,
}

/// Newest-first list of recent captures, capped at `capacity`.
#[derive(Debug, Clone)]
pub struct PhotoReel {
    entries: VecDeque<ReelEntry>,
    capacity: usize,
    base_url: String,
}

impl PhotoReel {
    pub fn new(capacity: usize, base_url: &str) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn add(&mut self, filename: &str) {
        self.add_at(filename, Local::now());
    }

    pub fn add_at(&mut self, filename: &str, captured_at: DateTime<Local>) {
        self.entries.push_front(ReelEntry {
            filename: filename.to_string(),
            url: photo_url(&self.base_url, filename),
            captured_at,
        });
        self.entries.truncate(self.capacity);
    }

    pub fn entries(&self) -> impl Iterator<Item = &ReelEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What the stage shows beneath the overlay
#[derive(Debug, Clone)]
pub enum PreviewDisplay {
    /// The camera's live feed placeholder
    Live,
    /// A just-captured photo, until `until`
    Photo {
        filename: String,
        image: Arc<RgbaImage>,
        until: Instant,
    },
}

impl PreviewDisplay {
    /// Show `image` for `hold`, then fall back to live.
    pub fn show(filename: String, image: Arc<RgbaImage>, hold: Duration) -> Self {
        Self::Photo {
            filename,
            image,
            until: Instant::now() + hold,
        }
    }

    /// Return to live once the hold has passed. Returns `true` on change.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self {
            Self::Photo { until, .. } if now >= *until => {
                *self = Self::Live;
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}
