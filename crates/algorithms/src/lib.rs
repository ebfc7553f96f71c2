//! # PaddyScan Algorithms
//!
//! The stages of the paddy-rice detection pipeline.
//!
//! ## Modules
//!
//! - **imagery**: normalized-difference indices, EVI, SCL cloud masking
//! - **composite**: scenes, date windows, per-window median composites
//! - **terrain**: Horn slope on ground distances
//! - **features**: the ordered, region-clipped feature stack
//! - **sampling**: positive and negative samples, train/test partition
//! - **classification**: seeded random forest and validation metrics
//! - **phenology**: water, vigor and growth rules plus terrain/land-cover constraints
//! - **morphology**: mode filter, connected components, mask cleanup
//! - **vector**: polygon tracing, buffering, simplification, area filter
//! - **export**: chunked export through an `ExportSink`
//! - **config** / **pipeline**: configuration and the end-to-end run

pub mod bands;
pub mod classification;
pub mod composite;
pub mod config;
pub mod export;
pub mod features;
pub mod imagery;
pub(crate) mod maybe_rayon;
pub mod morphology;
pub mod phenology;
pub mod pipeline;
pub mod sampling;
pub mod terrain;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::bands::{FeatureName, SpectralBand, SpectralIndex, Window};
    pub use crate::classification::{
        Classification, ForestParams, RandomForest, TrainedModel, ValidationReport,
    };
    pub use crate::composite::{build_composite, Composite, DateWindow, Scene, SceneCollection};
    pub use crate::config::PipelineConfig;
    pub use crate::export::{
        plan_chunks, ChunkRange, ChunkedExporter, ExportParams, ExportReport, ExportSink,
        GeoJsonDirectorySink,
    };
    pub use crate::features::{assemble_features, FeatureStack};
    pub use crate::imagery::{evi, lswi, mndwi, ndvi, normalized_difference};
    pub use crate::morphology::{clean_mask, CleanerParams, Connectivity, MaskCleaner};
    pub use crate::phenology::{candidate_mask, phenology_mask, CandidateRules, PhenologyThresholds, VigorPolicy};
    pub use crate::pipeline::{DetectionPipeline, PipelineInputs, PipelineOutput, RunSummary};
    pub use crate::sampling::{collect_samples, partition, LabeledSample, PartitionParams, SampleSet, SamplingParams};
    pub use crate::terrain::{slope, Slope, SlopeParams, SlopeUnits};
    pub use crate::vector::{vectorize, VectorizeParams};
    pub use paddyscan_core::prelude::*;
}
