//! Scenes, scene collections and date windows

use crate::bands::SpectralBand;
use crate::imagery::mask_clouds;
use chrono::NaiveDate;
use paddyscan_core::raster::{Raster, RasterStack};
use paddyscan_core::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Half-open date range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn overlaps(&self, other: &DateWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One acquisition: reflectance bands plus optional SCL quality layer
#[derive(Debug, Clone)]
pub struct Scene {
    pub date: NaiveDate,
    /// Scene-level cloudy pixel percentage from the product metadata
    pub cloud_percentage: f64,
    pub bands: RasterStack<SpectralBand>,
    pub scl: Option<Raster<u8>>,
}

impl Scene {
    pub fn new(date: NaiveDate, cloud_percentage: f64, bands: RasterStack<SpectralBand>) -> Self {
        Self {
            date,
            cloud_percentage,
            bands,
            scl: None,
        }
    }

    pub fn with_scl(mut self, scl: Raster<u8>) -> Self {
        self.scl = Some(scl);
        self
    }
}

/// Time series of scenes over the region
#[derive(Debug, Clone, Default)]
pub struct SceneCollection {
    scenes: Vec<Scene>,
}

impl SceneCollection {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.iter()
    }

    /// Scenes acquired inside `window`
    pub fn in_window<'a>(&'a self, window: &'a DateWindow) -> impl Iterator<Item = &'a Scene> + 'a {
        self.scenes.iter().filter(move |s| window.contains(s.date))
    }

    /// Keep scenes whose cloud percentage is strictly below `max_percentage`
    pub fn filter_cloudy(self, max_percentage: f64) -> Self {
        let before = self.scenes.len();
        let scenes: Vec<Scene> = self
            .scenes
            .into_iter()
            .filter(|s| s.cloud_percentage < max_percentage)
            .collect();
        info!(
            "Cloud filter (< {}%): kept {} of {} scenes",
            max_percentage,
            scenes.len(),
            before
        );
        Self { scenes }
    }

    /// Apply each scene's SCL layer, keeping only `clear_classes`.
    ///
    /// Scenes without an SCL layer pass through unchanged.
    pub fn mask_clouds(self, clear_classes: &[u8]) -> Result<Self> {
        let scenes = self
            .scenes
            .into_iter()
            .map(|scene| match &scene.scl {
                Some(scl) => {
                    debug!("SCL mask for scene {}", scene.date);
                    let bands = mask_clouds(&scene.bands, scl, clear_classes)?;
                    Ok(Scene { bands, ..scene })
                }
                None => Ok(scene),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { scenes })
    }
}
