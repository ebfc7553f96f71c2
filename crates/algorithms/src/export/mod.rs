//! Chunked export of the final field collection
//!
//! The ordered collection is cut into contiguous batches of `chunk_size`
//! fields and each batch is handed to an [`ExportSink`] under the
//! description `<prefix>_Chunk_<i>`. A failing batch is recorded and the
//! remaining batches still run.

mod chunk;
mod sink;

pub use chunk::{plan_chunks, ChunkIterator, ChunkRange};
pub use sink::{ExportSink, GeoJsonDirectorySink};

use crate::maybe_rayon::*;
use paddyscan_core::vector::FieldCollection;
use paddyscan_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Parameters for [`ChunkedExporter`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportParams {
    /// Fields per export request (default 500)
    pub chunk_size: usize,
    /// Description prefix of every chunk
    pub prefix: String,
}

impl Default for ExportParams {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            prefix: "PaddyScan_Fields".to_string(),
        }
    }
}

impl ExportParams {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size", "must be at least 1"));
        }
        if self.prefix.is_empty() {
            return Err(Error::config("export.prefix", "must not be empty"));
        }
        Ok(())
    }

    pub fn description(&self, chunk: usize) -> String {
        format!("{}_Chunk_{}", self.prefix, chunk)
    }
}

/// A chunk whose export request failed
#[derive(Debug, Clone, Serialize)]
pub struct ChunkFailure {
    pub chunk: ChunkRange,
    pub reason: String,
}

impl ChunkFailure {
    pub fn to_error(&self) -> Error {
        Error::Export {
            chunk: self.chunk.index,
            start: self.chunk.start,
            end: self.chunk.end,
            reason: self.reason.clone(),
        }
    }
}

/// Outcome of one export run, chunks in index order
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    pub succeeded: Vec<ChunkRange>,
    pub failed: Vec<ChunkFailure>,
}

impl ExportReport {
    pub fn chunk_count(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn exported_fields(&self) -> usize {
        self.succeeded.iter().map(ChunkRange::len).sum()
    }
}

/// Issues one export request per chunk of a field collection
pub struct ChunkedExporter<S: ExportSink> {
    sink: S,
    params: ExportParams,
}

impl<S: ExportSink> ChunkedExporter<S> {
    pub fn new(sink: S, params: ExportParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { sink, params })
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn params(&self) -> &ExportParams {
        &self.params
    }

    /// Export every chunk of `fields`.
    ///
    /// Only the chunk plan can fail the call; per-chunk sink errors end up
    /// in [`ExportReport::failed`].
    pub fn export(&self, fields: &FieldCollection) -> Result<ExportReport> {
        let chunks: Vec<ChunkRange> = plan_chunks(fields.len(), self.params.chunk_size)?.collect();

        let outcomes: Vec<(ChunkRange, Result<()>)> = chunks
            .par_iter()
            .map(|chunk| {
                let description = self.params.description(chunk.index);
                let batch = fields.slice(chunk.range());
                debug!("Exporting {} ({} fields)", description, batch.len());
                (*chunk, self.sink.export(&description, batch))
            })
            .collect();

        let mut report = ExportReport::default();
        for (chunk, outcome) in outcomes {
            match outcome {
                Ok(()) => report.succeeded.push(chunk),
                Err(e) => {
                    let failure = ChunkFailure {
                        chunk,
                        reason: e.to_string(),
                    };
                    warn!("{}", failure.to_error());
                    report.failed.push(failure);
                }
            }
        }

        info!(
            "Export: {} fields in {} chunks of {} ({} failed)",
            fields.len(),
            report.chunk_count(),
            self.params.chunk_size,
            report.failed.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};
    use paddyscan_core::vector::FieldPolygon;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    fn collection(n: usize) -> FieldCollection {
        let fields = (0..n)
            .map(|id| FieldPolygon {
                id,
                geometry: Polygon::new(
                    LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]),
                    vec![],
                ),
                name: format!("Field_{id}"),
                description: "Area: 1.00 dönüm".into(),
                area: 1.0,
                perimeter_m: 4.0,
                compactness: 0.5,
                properties: BTreeMap::new(),
            })
            .collect();
        FieldCollection::new(fields, None)
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(String, usize)>>,
        fail_on: Option<String>,
    }

    impl ExportSink for RecordingSink {
        fn export(&self, description: &str, fields: &[FieldPolygon]) -> Result<()> {
            if self.fail_on.as_deref() == Some(description) {
                return Err(Error::Other("destination unavailable".into()));
            }
            self.calls.lock().unwrap().push((description.to_string(), fields.len()));
            Ok(())
        }
    }

    #[test]
    fn test_1234_fields_in_three_requests() {
        let exporter = ChunkedExporter::new(RecordingSink::default(), ExportParams::default()).unwrap();
        let report = exporter.export(&collection(1234)).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.exported_fields(), 1234);

        let mut calls = exporter.sink().calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(
            calls,
            vec![
                ("PaddyScan_Fields_Chunk_0".to_string(), 500),
                ("PaddyScan_Fields_Chunk_1".to_string(), 500),
                ("PaddyScan_Fields_Chunk_2".to_string(), 234),
            ]
        );
    }

    #[test]
    fn test_failed_chunk_does_not_abort_siblings() {
        let sink = RecordingSink {
            fail_on: Some("PaddyScan_Fields_Chunk_1".into()),
            ..Default::default()
        };
        let exporter = ChunkedExporter::new(sink, ExportParams::default()).unwrap();
        let report = exporter.export(&collection(1234)).unwrap();
        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.failed.len(), 1);
        let failure = &report.failed[0];
        assert_eq!(failure.chunk.index, 1);
        assert!(matches!(
            failure.to_error(),
            Error::Export { chunk: 1, start: 500, end: 1000, .. }
        ));
    }

    #[test]
    fn test_empty_collection_exports_nothing() {
        let exporter = ChunkedExporter::new(RecordingSink::default(), ExportParams::default()).unwrap();
        let report = exporter.export(&collection(0)).unwrap();
        assert_eq!(report.chunk_count(), 0);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let params = ExportParams {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(ChunkedExporter::new(RecordingSink::default(), params).is_err());
    }

    #[test]
    fn test_geojson_directory_sink_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = GeoJsonDirectorySink::new(dir.path().join("out")).unwrap();
        let params = ExportParams {
            chunk_size: 2,
            prefix: "Test".into(),
        };
        let exporter = ChunkedExporter::new(sink, params).unwrap();
        let report = exporter.export(&collection(3)).unwrap();
        assert!(report.is_complete());

        let first = exporter.sink().path_for("Test_Chunk_0");
        let second = exporter.sink().path_for("Test_Chunk_1");
        assert!(first.exists());
        assert!(second.exists());
        let text = std::fs::read_to_string(second).unwrap();
        let fc: geojson::FeatureCollection = text.parse::<geojson::GeoJson>().unwrap().try_into().unwrap();
        assert_eq!(fc.features.len(), 1);
    }
}
