//! End-to-end detection run
//!
//! Stages run eagerly in dependency order, each consuming the previous
//! stage's output:
//!
//! 1. cloud filtering and planting/growth composites
//! 2. feature stack (composites, slope, elevation) clipped to the region
//! 3. sampling, train/test partition, random forest and validation
//! 4. classification and the phenology/terrain/land-cover rule mask
//! 5. mask cleanup, vectorization and (optionally) chunked export

use crate::bands::{FeatureName, Window};
use crate::classification::{Classification, RandomForest, TrainedModel, ValidationReport};
use crate::composite::{build_composite, Composite, SceneCollection};
use crate::config::PipelineConfig;
use crate::export::{ChunkedExporter, ExportReport, ExportSink};
use crate::features::{assemble_features, FeatureStack};
use crate::morphology::{clean_mask, count_true};
use crate::phenology::candidate_mask;
use crate::sampling::{collect_samples, partition, NEGATIVE, POSITIVE};
use crate::vector::vectorize;
use geo::Polygon;
use paddyscan_core::raster::Raster;
use paddyscan_core::vector::FieldCollection;
use paddyscan_core::{Region, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Everything a run reads
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub scenes: SceneCollection,
    /// Elevation in meters on the scene grid
    pub dem: Raster<f64>,
    /// Categorical land-cover codes on the scene grid
    pub landcover: Raster<u16>,
    pub region: Region,
    /// Known paddy fields used as positive training samples
    pub positives: Vec<Polygon<f64>>,
}

/// Sample counts of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SampleCounts {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub train: usize,
    pub test: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: FeatureName,
    pub importance: f64,
}

/// What `report.json` holds
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub planting_scenes: usize,
    pub growth_scenes: usize,
    pub feature_names: Vec<FeatureName>,
    pub samples: SampleCounts,
    pub validation: ValidationReport,
    pub importance: Vec<FeatureImportance>,
    /// True pixels before and after cleanup
    pub candidate_pixels: usize,
    pub cleaned_pixels: usize,
    /// Area of the cleaned mask, in areal units
    pub detected_area: f64,
    /// Fraction of cleaned pixels on the cropland land-cover class
    pub cropland_share: Option<f64>,
    pub field_count: usize,
    /// Sum of field areas after buffering and filtering, in areal units
    pub field_area: f64,
    pub unit_label: String,
    pub export: Option<ExportReport>,
    pub parameters: PipelineConfig,
}

impl RunSummary {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Products of a run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub features: FeatureStack,
    pub model: TrainedModel,
    pub classification: Classification,
    /// Classifier AND rules, before cleanup
    pub candidates: Raster<u8>,
    /// Cleaned, self-masked detection mask
    pub mask: Raster<u8>,
    pub fields: FieldCollection,
    pub summary: RunSummary,
}

/// Orchestrates one detection run under a validated configuration
#[derive(Debug, Clone)]
pub struct DetectionPipeline {
    config: PipelineConfig,
}

impl DetectionPipeline {
    /// Validates `config`; nothing is computed with an invalid one
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Cloud filtering by scene metadata, then per-pixel SCL masking
    pub fn prepare_scenes(&self, scenes: SceneCollection) -> Result<SceneCollection> {
        let imagery = &self.config.imagery;
        let before = scenes.len();
        let kept = scenes.filter_cloudy(imagery.max_cloud_percentage);
        if kept.len() < before {
            warn!(
                "Dropped {} of {} scenes at or above {}% cloud",
                before - kept.len(),
                before,
                imagery.max_cloud_percentage
            );
        }
        if imagery.mask_clouds {
            kept.mask_clouds(&imagery.clear_classes)
        } else {
            Ok(kept)
        }
    }

    /// Planting and growth composites of already prepared scenes
    pub fn composites(&self, scenes: &SceneCollection) -> Result<(Composite, Composite)> {
        let imagery = &self.config.imagery;
        let planting = build_composite(scenes, &imagery.planting, Window::Planting)?;
        let growth = build_composite(scenes, &imagery.growth, Window::Growth)?;
        Ok((planting, growth))
    }

    /// Run every stage except export
    pub fn run(&self, inputs: PipelineInputs) -> Result<PipelineOutput> {
        let config = &self.config;
        let scenes = self.prepare_scenes(inputs.scenes)?;
        let (planting, growth) = self.composites(&scenes)?;
        let features = assemble_features(&planting, &growth, &inputs.dem, &inputs.region)?;

        let samples = collect_samples(&features, &inputs.positives, &inputs.landcover, &config.sampling)?;
        let split = partition(&samples, config.partition)?;
        let model = RandomForest::new(config.forest.clone())?.fit(&split.train)?;
        let validation = model.evaluate(&split.test)?;

        let classification = model.classify(&features)?;
        let candidates = candidate_mask(&features, &classification.classes, &inputs.landcover, &config.rules)?;
        let mask = clean_mask(&candidates, &config.cleaner)?;
        let fields = vectorize(&mask, &config.vectorize)?;

        let cleaned_pixels = count_true(&mask);
        let summary = RunSummary {
            planting_scenes: planting.scene_count,
            growth_scenes: growth.scene_count,
            feature_names: features.keys().to_vec(),
            samples: SampleCounts {
                total: samples.len(),
                positive: samples.count_label(POSITIVE),
                negative: samples.count_label(NEGATIVE),
                train: split.train.len(),
                test: split.test.len(),
            },
            validation,
            importance: model
                .importance()
                .into_iter()
                .map(|(feature, importance)| FeatureImportance { feature, importance })
                .collect(),
            candidate_pixels: count_true(&candidates),
            cleaned_pixels,
            detected_area: mask_area(&mask, config.vectorize.area_unit_m2),
            cropland_share: cropland_share(&mask, &inputs.landcover, config.landcover.cropland_class),
            field_count: fields.len(),
            field_area: fields.total_area(),
            unit_label: config.vectorize.unit_label.clone(),
            export: None,
            parameters: config.clone(),
        };

        info!(
            "Detection: {} fields, {:.2} {} in fields, {:.2} {} detected",
            summary.field_count,
            summary.field_area,
            summary.unit_label,
            summary.detected_area,
            summary.unit_label
        );

        Ok(PipelineOutput {
            features,
            model,
            classification,
            candidates,
            mask,
            fields,
            summary,
        })
    }

    /// Run every stage and hand the fields to `sink` in chunks
    pub fn run_and_export<S: ExportSink>(&self, inputs: PipelineInputs, sink: S) -> Result<PipelineOutput> {
        let exporter = ChunkedExporter::new(sink, self.config.export.clone())?;
        let mut output = self.run(inputs)?;
        let report = exporter.export(&output.fields)?;
        output.summary.export = Some(report);
        Ok(output)
    }
}

/// Ground area of the true cells of `mask`, in units of `area_unit_m2`.
///
/// Geographic grids use the cell area at each row's latitude.
pub fn mask_area(mask: &Raster<u8>, area_unit_m2: f64) -> f64 {
    let m2: f64 = mask
        .data()
        .rows()
        .into_iter()
        .enumerate()
        .map(|(row, values)| {
            let n = values.iter().filter(|v| **v != 0 && !mask.is_nodata(**v)).count();
            n as f64 * mask.cell_area_m2(row)
        })
        .sum();
    m2 / area_unit_m2
}

fn cropland_share(mask: &Raster<u8>, landcover: &Raster<u16>, cropland: u16) -> Option<f64> {
    let mut total = 0usize;
    let mut on_cropland = 0usize;
    for (v, code) in mask.data().iter().zip(landcover.data().iter()) {
        if *v != 0 && !mask.is_nodata(*v) {
            total += 1;
            if *code == cropland {
                on_cropland += 1;
            }
        }
    }
    (total > 0).then(|| on_cropland as f64 / total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use paddyscan_core::{GeoTransform, CRS};

    #[test]
    fn test_mask_area_projected() {
        let mut mask = Raster::<u8>::new(4, 4);
        mask.set_transform(GeoTransform::new(0.0, 40.0, 10.0, -10.0));
        for c in 0..4 {
            mask.set(0, c, 1).unwrap();
        }
        mask.set_nodata(Some(0));
        // 4 cells of 100 m² in dönüm
        assert_relative_eq!(mask_area(&mask, 1000.0), 0.4);
    }

    #[test]
    fn test_mask_area_geographic_shrinks_with_latitude() {
        let mut equator = Raster::<u8>::filled(1, 1, 1);
        equator.set_transform(GeoTransform::new(0.0, 0.0005, 0.001, -0.001));
        equator.set_crs(Some(CRS::wgs84()));
        let mut north = equator.clone();
        north.set_transform(GeoTransform::new(0.0, 60.0005, 0.001, -0.001));
        let a0 = mask_area(&equator, 1.0);
        let a60 = mask_area(&north, 1.0);
        assert!((a60 / a0 - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_cropland_share() {
        let mask = Raster::from_vec(vec![1u8, 1, 0, 1], 2, 2).unwrap();
        let lc = Raster::from_vec(vec![40u16, 30, 40, 40], 2, 2).unwrap();
        assert_relative_eq!(cropland_share(&mask, &lc, 40).unwrap(), 2.0 / 3.0);
        let empty = Raster::<u8>::new(2, 2);
        assert!(cropland_share(&empty, &lc, 40).is_none());
    }

    #[test]
    fn test_invalid_config_rejected_before_run() {
        let mut config = PipelineConfig::default();
        config.partition.split_ratio = 0.0;
        assert!(DetectionPipeline::new(config).is_err());
    }
}
