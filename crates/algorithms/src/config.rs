//! Pipeline configuration
//!
//! One TOML document with a section per stage. Every field has a default,
//! so an empty file is a valid configuration:
//!
//! ```toml
//! [imagery]
//! planting = { start = "2024-05-15", end = "2024-07-05" }
//! growth = { start = "2024-07-05", end = "2024-09-15" }
//!
//! [forest]
//! trees = 100
//!
//! [rules]
//! slope_threshold = 3.0
//! vigor = "conjunctive"
//! ```

use crate::classification::ForestParams;
use crate::composite::DateWindow;
use crate::export::ExportParams;
use crate::imagery::DEFAULT_CLEAR_CLASSES;
use crate::morphology::CleanerParams;
use crate::phenology::CandidateRules;
use crate::sampling::{PartitionParams, SamplingParams};
use crate::vector::VectorizeParams;
use chrono::NaiveDate;
use paddyscan_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Scene selection and compositing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageryConfig {
    /// Scenes at or above this cloud percentage are dropped
    pub max_cloud_percentage: f64,
    /// Apply the per-pixel SCL mask when a scene carries one
    pub mask_clouds: bool,
    /// SCL classes kept by the per-pixel mask
    pub clear_classes: Vec<u8>,
    /// Flooding / transplanting window, suffix `E`
    pub planting: DateWindow,
    /// Canopy development window, suffix `B`
    pub growth: DateWindow,
}

impl Default for ImageryConfig {
    fn default() -> Self {
        Self {
            max_cloud_percentage: 20.0,
            mask_clouds: true,
            clear_classes: DEFAULT_CLEAR_CLASSES.to_vec(),
            planting: window((2024, 5, 15), (2024, 7, 5)),
            growth: window((2024, 7, 5), (2024, 9, 15)),
        }
    }
}

fn window(start: (i32, u32, u32), end: (i32, u32, u32)) -> DateWindow {
    let date = |(y, m, d): (i32, u32, u32)| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
    DateWindow::new(date(start), date(end))
}

/// Land-cover codes used only for reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandCoverConfig {
    /// Code of cropland in the reference map (WorldCover 40)
    pub cropland_class: u16,
}

impl Default for LandCoverConfig {
    fn default() -> Self {
        Self { cropland_class: 40 }
    }
}

/// Every tunable parameter of a detection run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub imagery: ImageryConfig,
    pub sampling: SamplingParams,
    pub partition: PartitionParams,
    pub forest: ForestParams,
    pub rules: CandidateRules,
    pub cleaner: CleanerParams,
    /// Tracing and refinement; `buffer_distance` is the inward distance in
    /// meters and must be positive (12 means a -12 m buffer)
    pub vectorize: VectorizeParams,
    pub export: ExportParams,
    pub landcover: LandCoverConfig,
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Other(e.to_string()))
    }

    /// Reject invalid parameter combinations before any computation
    pub fn validate(&self) -> Result<()> {
        let imagery = &self.imagery;
        for (name, w) in [("imagery.planting", &imagery.planting), ("imagery.growth", &imagery.growth)] {
            if w.is_empty() {
                return Err(Error::config(name, format!("window {} .. {} is empty", w.start, w.end)));
            }
        }
        if imagery.planting.overlaps(&imagery.growth) {
            return Err(Error::config(
                "imagery",
                format!(
                    "planting window {} .. {} overlaps growth window {} .. {}",
                    imagery.planting.start, imagery.planting.end, imagery.growth.start, imagery.growth.end
                ),
            ));
        }
        if !(imagery.max_cloud_percentage > 0.0 && imagery.max_cloud_percentage <= 100.0) {
            return Err(Error::config(
                "max_cloud_percentage",
                format!("{} is outside (0, 100]", imagery.max_cloud_percentage),
            ));
        }
        if imagery.mask_clouds && imagery.clear_classes.is_empty() {
            return Err(Error::config("clear_classes", "cloud masking needs at least one clear class"));
        }

        if self.sampling.max_positives == 0 {
            return Err(Error::config("max_positives", "must be at least 1"));
        }
        self.partition.validate()?;
        self.forest.validate()?;

        let slope = self.rules.slope_threshold;
        if !slope.is_finite() || slope <= 0.0 {
            return Err(Error::config("slope_threshold", format!("{slope} must be a positive angle")));
        }
        for (name, value) in [
            ("lswi_planting", self.rules.thresholds.lswi_planting),
            ("mndwi_planting", self.rules.thresholds.mndwi_planting),
            ("ndvi_growth", self.rules.thresholds.ndvi_growth),
            ("evi_growth", self.rules.thresholds.evi_growth),
            ("ndvi_delta", self.rules.thresholds.ndvi_delta),
        ] {
            if !value.is_finite() {
                return Err(Error::config(name, "must be finite"));
            }
        }

        if !self.cleaner.mode_radius.is_finite() || self.cleaner.mode_radius < 0.0 {
            return Err(Error::config(
                "mode_radius",
                format!("{} must be a non-negative number", self.cleaner.mode_radius),
            ));
        }
        self.vectorize.validate()?;
        self.export.validate()?;
        Ok(())
    }
}
