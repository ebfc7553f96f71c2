//! Error types for PaddyScan

use thiserror::Error;

/// Main error type for PaddyScan operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Grid alignment mismatch for band {band}: {reason}")]
    Misaligned { band: String, reason: String },

    #[error("Duplicate band in stack: {0}")]
    DuplicateBand(String),

    #[error("Missing band: {0}")]
    MissingBand(String),

    /// Classification inputs do not carry the feature ordering the model was
    /// trained on.
    #[error("Feature order mismatch: model expects [{expected}], got [{actual}]")]
    FeatureMismatch { expected: String, actual: String },

    /// Invalid parameter or parameter combination, raised before any
    /// computation starts.
    #[error("Configuration error: {parameter}: {reason}")]
    Configuration { parameter: String, reason: String },

    /// Required input data is empty for a stage (no scenes in a window, empty
    /// sample set, empty train/test partition).
    #[error("No data for stage '{stage}': {reason}")]
    DataAvailability { stage: String, reason: String },

    /// A single export chunk failed. Carries enough to retry that chunk alone.
    #[error("Export of chunk {chunk} (features {start}..{end}) failed: {reason}")]
    Export {
        chunk: usize,
        start: usize,
        end: usize,
        reason: String,
    },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("TIFF error: {0}")]
    Tiff(String),

    #[error("GeoJSON error: {0}")]
    GeoJson(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a [`Error::Configuration`] naming the offending parameter
    pub fn config(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Configuration {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`Error::DataAvailability`] naming the stage
    pub fn no_data(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::DataAvailability {
            stage: stage.into(),
            reason: reason.into(),
        }
    }
}

impl From<tiff::TiffError> for Error {
    fn from(e: tiff::TiffError) -> Self {
        Error::Tiff(e.to_string())
    }
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        Error::GeoJson(e.to_string())
    }
}

/// Result type alias for PaddyScan operations
pub type Result<T> = std::result::Result<T, Error>;
