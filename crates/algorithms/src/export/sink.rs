//! Export destinations

use paddyscan_core::io::write_fields;
use paddyscan_core::vector::FieldPolygon;
use paddyscan_core::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Receives one batch of fields per export request.
///
/// Requests for different chunks are independent and may run
/// concurrently.
pub trait ExportSink: Sync {
    fn export(&self, description: &str, fields: &[FieldPolygon]) -> Result<()>;
}

/// Writes each batch to `<dir>/<description>.geojson`
#[derive(Debug, Clone)]
pub struct GeoJsonDirectorySink {
    dir: PathBuf,
}

impl GeoJsonDirectorySink {
    /// Create the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, description: &str) -> PathBuf {
        self.dir.join(format!("{description}.geojson"))
    }
}

impl ExportSink for GeoJsonDirectorySink {
    fn export(&self, description: &str, fields: &[FieldPolygon]) -> Result<()> {
        write_fields(fields, description, self.path_for(description))
    }
}
