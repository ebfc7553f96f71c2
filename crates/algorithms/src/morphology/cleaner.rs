//! Candidate mask cleanup: mode smoothing, small-group removal, self-mask

use super::components::{remove_small_components, Connectivity};
use super::element::{Kernel, KernelShape};
use super::mode::mode_filter;
use paddyscan_core::raster::Raster;
use paddyscan_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Parameters for [`MaskCleaner`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerParams {
    /// Mode filter radius in pixels (default 1.5)
    pub mode_radius: f64,
    pub kernel: KernelShape,
    /// Groups of this many pixels or fewer are dropped (default 5)
    pub min_connected_pixels: usize,
    pub connectivity: Connectivity,
}

impl Default for CleanerParams {
    fn default() -> Self {
        Self {
            mode_radius: 1.5,
            kernel: KernelShape::Circle,
            min_connected_pixels: 5,
            connectivity: Connectivity::Four,
        }
    }
}

/// Mask cleanup algorithm
#[derive(Debug, Clone, Default)]
pub struct MaskCleaner;

impl Algorithm for MaskCleaner {
    type Input = Raster<u8>;
    type Output = Raster<u8>;
    type Params = CleanerParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "MaskCleaner"
    }

    fn description(&self) -> &'static str {
        "Mode-filter a binary mask, drop small connected groups and self-mask"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        clean_mask(&input, &params)
    }
}

/// Smooth, filter and self-mask a candidate mask.
///
/// The result never holds more true pixels than `mask`.
pub fn clean_mask(mask: &Raster<u8>, params: &CleanerParams) -> Result<Raster<u8>> {
    let kernel = Kernel::new(params.kernel, params.mode_radius)?;
    let smoothed = mode_filter(mask, &kernel)?;
    let filtered = remove_small_components(&smoothed, params.min_connected_pixels, params.connectivity)?;
    let cleaned = self_mask(&filtered);

    info!(
        "Mask cleanup: {} -> {} (mode r={}) -> {} pixels (groups > {})",
        count_true(mask),
        count_true(&smoothed),
        params.mode_radius,
        count_true(&cleaned),
        params.min_connected_pixels
    );
    Ok(cleaned)
}

/// 0 becomes no-data; true cells stay 1
pub fn self_mask(mask: &Raster<u8>) -> Raster<u8> {
    let mut out = mask.clone();
    out.data_mut().mapv_inplace(|v| u8::from(v != 0 && !mask_is_nodata(mask, v)));
    out.set_nodata(Some(0));
    out
}

fn mask_is_nodata(mask: &Raster<u8>, v: u8) -> bool {
    mask.nodata().is_some_and(|nd| nd != 0 && nd == v)
}

/// Number of cells that are 1 and not no-data
pub fn count_true(mask: &Raster<u8>) -> usize {
    mask.data()
        .iter()
        .filter(|v| **v != 0 && !mask.is_nodata(**v))
        .count()
}
