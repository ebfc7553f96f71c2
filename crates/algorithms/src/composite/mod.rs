//! Temporal compositing
//!
//! Reduces a time series of scenes to one representative image per seasonal
//! window (per-pixel median), then derives the spectral indices and tags
//! every band with the window so planting and growth composites can share a
//! feature stack.

mod median;
mod scene;

pub use median::median_band;
pub use scene::{DateWindow, Scene, SceneCollection};

use crate::bands::{FeatureName, SpectralBand, SpectralIndex, Window};
use crate::imagery::compute_index;
use paddyscan_core::raster::RasterStack;
use paddyscan_core::{Error, Result};
use tracing::{debug, info};

/// A seasonal composite with its tagged bands, in stack order
#[derive(Debug, Clone)]
pub struct Composite {
    pub window: Window,
    pub range: DateWindow,
    /// Number of scenes reduced into the composite
    pub scene_count: usize,
    pub bands: RasterStack<FeatureName>,
}

/// Build the composite for one window.
///
/// All scenes acquired in `[range.start, range.end)` are reduced by median.
/// Fails with `DataAvailability` when the window holds no scene.
pub fn build_composite(
    scenes: &SceneCollection,
    range: &DateWindow,
    window: Window,
) -> Result<Composite> {
    let selected: Vec<&Scene> = scenes.in_window(range).collect();
    if selected.is_empty() {
        return Err(Error::no_data(
            format!("{window} composite"),
            format!(
                "no scene between {} and {} (of {} available)",
                range.start,
                range.end,
                scenes.len()
            ),
        ));
    }
    info!(
        "{} composite: {} scenes between {} and {}",
        window,
        selected.len(),
        range.start,
        range.end
    );

    let mut reflectance: RasterStack<SpectralBand> = RasterStack::new();
    for band in SpectralBand::ALL {
        reflectance.push(band, median_band(&selected, band)?)?;
        debug!("median {} for {} window", band, window);
    }

    let mut bands = RasterStack::new();
    for band in SpectralBand::COMPOSITE {
        bands.push(FeatureName::Band(band, window), reflectance.require(band)?.clone())?;
    }
    for index in SpectralIndex::ALL {
        bands.push(
            FeatureName::Index(index, window),
            compute_index(index, &reflectance)?,
        )?;
    }

    Ok(Composite {
        window,
        range: *range,
        scene_count: selected.len(),
        bands,
    })
}
