//! Scene-classification (SCL) cloud masking

use crate::bands::SpectralBand;
use paddyscan_core::raster::{Raster, RasterStack};
use paddyscan_core::Result;

/// Sentinel-2 SCL classes kept by default: vegetation, bare soil, water
pub const DEFAULT_CLEAR_CLASSES: [u8; 3] = [4, 5, 6];

/// Mask every band to NaN where the SCL class is not in `keep`.
///
/// Cells where the SCL layer itself is no-data are masked too.
pub fn mask_clouds(
    bands: &RasterStack<SpectralBand>,
    scl: &Raster<u8>,
    keep: &[u8],
) -> Result<RasterStack<SpectralBand>> {
    bands.map_bands(|key, band| {
        band.check_aligned(scl, &format!("SCL for {key}"))?;
        let mut out = band.clone();
        out.set_nodata(Some(f64::NAN));
        for (value, class) in out.data_mut().iter_mut().zip(scl.data().iter()) {
            if scl.is_nodata(*class) || !keep.contains(class) {
                *value = f64::NAN;
            }
        }
        Ok(out)
    })
}
