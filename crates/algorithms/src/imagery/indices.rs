//! Spectral vegetation and water indices
//!
//! Indices are computed per composite from single-band reflectance rasters.
//! A zero denominator is not an error: the pixel is masked to NaN and the
//! rest of the raster is unaffected.

use crate::bands::{SpectralBand, SpectralIndex};
use crate::maybe_rayon::*;
use ndarray::Array2;
use paddyscan_core::raster::{Raster, RasterStack};
use paddyscan_core::{Error, Result};

/// Denominators below this magnitude are treated as zero
const DENOM_EPS: f64 = 1e-10;

// ---------------------------------------------------------------------------
// Generic normalized difference
// ---------------------------------------------------------------------------

/// Normalized difference between two bands:
///
/// `(band_a - band_b) / (band_a + band_b)`
///
/// Result is in [-1, 1] for non-negative reflectance. Pixels where the sum
/// is zero or either input is no-data are NaN.
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    check_dimensions(band_a, band_b)?;
    let nodata_a = band_a.nodata();
    let nodata_b = band_b.nodata();

    per_pixel(band_a, |row, col| {
        let a = unsafe { band_a.get_unchecked(row, col) };
        let b = unsafe { band_b.get_unchecked(row, col) };
        if is_nodata_f64(a, nodata_a) || is_nodata_f64(b, nodata_b) {
            return f64::NAN;
        }
        let sum = a + b;
        if sum.abs() < DENOM_EPS {
            return f64::NAN;
        }
        (a - b) / sum
    })
}

/// `NDVI = (NIR - Red) / (NIR + Red)`
pub fn ndvi(nir: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, red)
}

/// Land Surface Water Index (Xiao et al., 2005)
///
/// `LSWI = (NIR - SWIR1) / (NIR + SWIR1)`
///
/// Rises sharply when paddies are flooded before transplanting.
pub fn lswi(nir: &Raster<f64>, swir1: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, swir1)
}

/// Modified Normalized Difference Water Index (Xu, 2006)
///
/// `MNDWI = (Green - SWIR1) / (Green + SWIR1)`
pub fn mndwi(green: &Raster<f64>, swir1: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(green, swir1)
}

// ---------------------------------------------------------------------------
// EVI
// ---------------------------------------------------------------------------

/// Parameters for EVI
#[derive(Debug, Clone, Copy)]
pub struct EviParams {
    /// Gain factor (default: 2.5)
    pub g: f64,
    /// Aerosol coefficient for red band (default: 6.0)
    pub c1: f64,
    /// Aerosol coefficient for blue band (default: 7.5)
    pub c2: f64,
    /// Canopy background adjustment (default: 1.0)
    pub l: f64,
}

impl Default for EviParams {
    fn default() -> Self {
        Self {
            g: 2.5,
            c1: 6.0,
            c2: 7.5,
            l: 1.0,
        }
    }
}

/// Enhanced Vegetation Index (Huete et al., 2002)
///
/// `EVI = G * (NIR - Red) / (NIR + C1 * Red - C2 * Blue + L)`
///
/// Less prone to saturation than NDVI over dense canopy.
pub fn evi(
    nir: &Raster<f64>,
    red: &Raster<f64>,
    blue: &Raster<f64>,
    params: EviParams,
) -> Result<Raster<f64>> {
    check_dimensions(nir, red)?;
    check_dimensions(nir, blue)?;
    let nodata_nir = nir.nodata();
    let nodata_red = red.nodata();
    let nodata_blue = blue.nodata();

    per_pixel(nir, |row, col| {
        let n = unsafe { nir.get_unchecked(row, col) };
        let r = unsafe { red.get_unchecked(row, col) };
        let b = unsafe { blue.get_unchecked(row, col) };
        if is_nodata_f64(n, nodata_nir)
            || is_nodata_f64(r, nodata_red)
            || is_nodata_f64(b, nodata_blue)
        {
            return f64::NAN;
        }
        let denom = n + params.c1 * r - params.c2 * b + params.l;
        if denom.abs() < DENOM_EPS {
            return f64::NAN;
        }
        params.g * (n - r) / denom
    })
}

// ---------------------------------------------------------------------------
// Stack-level dispatch
// ---------------------------------------------------------------------------

/// Compute `index` from the reflectance bands of one composite
pub fn compute_index(
    index: SpectralIndex,
    bands: &RasterStack<SpectralBand>,
) -> Result<Raster<f64>> {
    match index {
        SpectralIndex::Ndvi => ndvi(
            bands.require(SpectralBand::Nir)?,
            bands.require(SpectralBand::Red)?,
        ),
        SpectralIndex::Lswi => lswi(
            bands.require(SpectralBand::Nir)?,
            bands.require(SpectralBand::Swir1)?,
        ),
        SpectralIndex::Mndwi => mndwi(
            bands.require(SpectralBand::Green)?,
            bands.require(SpectralBand::Swir1)?,
        ),
        SpectralIndex::Evi => evi(
            bands.require(SpectralBand::Nir)?,
            bands.require(SpectralBand::Red)?,
            bands.require(SpectralBand::Blue)?,
            EviParams::default(),
        ),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_nodata_f64(value: f64, nodata: Option<f64>) -> bool {
    if value.is_nan() {
        return true;
    }
    match nodata {
        Some(nd) => (value - nd).abs() < f64::EPSILON,
        None => false,
    }
}

fn check_dimensions(a: &Raster<f64>, b: &Raster<f64>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::SizeMismatch {
            er: a.rows(),
            ec: a.cols(),
            ar: b.rows(),
            ac: b.cols(),
        });
    }
    Ok(())
}

/// Evaluate `f` for every cell of `template`'s grid, rows in parallel
fn per_pixel<F>(template: &Raster<f64>, f: F) -> Result<Raster<f64>>
where
    F: Fn(usize, usize) -> f64 + Sync + Send,
{
    let (rows, cols) = template.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| (0..cols).map(|col| f(row, col)).collect::<Vec<_>>())
        .collect();

    let mut output = template.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use paddyscan_core::GeoTransform;

    fn make_band(rows: usize, cols: usize, value: f64) -> Raster<f64> {
        let mut r = Raster::filled(rows, cols, value);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r
    }

    fn make_gradient(rows: usize, cols: usize, start: f64, step: f64) -> Raster<f64> {
        let mut r = make_band(rows, cols, 0.0);
        for row in 0..rows {
            for col in 0..cols {
                r.set(row, col, start + (row * cols + col) as f64 * step).unwrap();
            }
        }
        r
    }

    #[test]
    fn test_normalized_difference_basic() {
        let a = make_band(5, 5, 0.8);
        let b = make_band(5, 5, 0.2);

        let result = normalized_difference(&a, &b).unwrap();
        // (0.8 - 0.2) / (0.8 + 0.2) = 0.6
        assert_relative_eq!(result.get(2, 2).unwrap(), 0.6, epsilon = 1e-10);
    }

    #[test]
    fn test_normalized_difference_range() {
        let a = make_gradient(10, 10, 0.0, 0.01);
        let b = make_gradient(10, 10, 0.5, -0.004);

        let result = normalized_difference(&a, &b).unwrap();
        for val in result.data().iter().filter(|v| !v.is_nan()) {
            assert!((-1.0..=1.0).contains(val), "ND out of range: {}", val);
        }
    }

    #[test]
    fn test_zero_sum_is_masked_not_fatal() {
        let mut a = make_band(3, 3, 0.3);
        let mut b = make_band(3, 3, 0.1);
        a.set(1, 1, 0.0).unwrap();
        b.set(1, 1, 0.0).unwrap();

        let result = normalized_difference(&a, &b).unwrap();
        assert!(result.get(1, 1).unwrap().is_nan());
        assert_relative_eq!(result.get(0, 0).unwrap(), 0.5, epsilon = 1e-10);
        assert_eq!(result.valid_count(), 8);
    }

    #[test]
    fn test_nodata_propagates() {
        let mut nir = make_band(3, 3, 0.5);
        nir.set(0, 0, -9999.0).unwrap();
        nir.set_nodata(Some(-9999.0));
        let red = make_band(3, 3, 0.1);

        let result = ndvi(&nir, &red).unwrap();
        assert!(result.get(0, 0).unwrap().is_nan());
        assert!(!result.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn test_lswi_flooded_field_positive() {
        let nir = make_band(3, 3, 0.20);
        let swir1 = make_band(3, 3, 0.10);
        let val = lswi(&nir, &swir1).unwrap().get(1, 1).unwrap();
        assert_relative_eq!(val, 1.0 / 3.0, epsilon = 1e-10);
    }

    #[test]
    fn test_evi() {
        let nir = make_band(5, 5, 0.5);
        let red = make_band(5, 5, 0.1);
        let blue = make_band(5, 5, 0.05);

        let result = evi(&nir, &red, &blue, EviParams::default()).unwrap();
        // 2.5 * 0.4 / (0.5 + 0.6 - 0.375 + 1.0)
        let expected = 2.5 * 0.4 / 1.725;
        assert_relative_eq!(result.get(2, 2).unwrap(), expected, epsilon = 1e-10);
    }

    #[test]
    fn test_evi_zero_denominator_masked() {
        // 0 + 6*0 - 7.5*(1/7.5) + 1 = 0
        let nir = make_band(2, 2, 0.0);
        let red = make_band(2, 2, 0.0);
        let blue = make_band(2, 2, 1.0 / 7.5);
        let result = evi(&nir, &red, &blue, EviParams::default()).unwrap();
        assert!(result.get(0, 0).unwrap().is_nan());
    }

    #[test]
    fn test_compute_index_requires_bands() {
        let stack = RasterStack::new()
            .with(SpectralBand::Nir, make_band(2, 2, 0.4))
            .unwrap()
            .with(SpectralBand::Red, make_band(2, 2, 0.1))
            .unwrap();

        let ndvi = compute_index(SpectralIndex::Ndvi, &stack).unwrap();
        assert_relative_eq!(ndvi.get(0, 0).unwrap(), 0.6, epsilon = 1e-10);
        assert!(matches!(
            compute_index(SpectralIndex::Lswi, &stack),
            Err(Error::MissingBand(name)) if name == "B11"
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = make_band(3, 3, 0.5);
        let b = make_band(4, 3, 0.5);
        assert!(matches!(
            normalized_difference(&a, &b),
            Err(Error::SizeMismatch { .. })
        ));
    }
}
