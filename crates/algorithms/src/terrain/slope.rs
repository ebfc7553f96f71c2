//! Slope calculation from DEMs
//!
//! Uses the Horn (1981) 3x3 finite-difference method. Cell sizes are taken in
//! ground meters, so geographic (degree) DEMs give the same slope as their
//! projected equivalent. Edge cells and cells next to no-data reuse the
//! center elevation for the missing neighbours instead of being dropped.

use crate::maybe_rayon::*;
use paddyscan_core::raster::Raster;
use paddyscan_core::{Algorithm, Error, Result};

/// Units for slope output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlopeUnits {
    /// Degrees (0-90)
    #[default]
    Degrees,
    /// Percent rise
    Percent,
}

/// Parameters for slope calculation
#[derive(Debug, Clone)]
pub struct SlopeParams {
    pub units: SlopeUnits,
    /// Vertical exaggeration applied to elevations (default 1.0)
    pub z_factor: f64,
}

impl Default for SlopeParams {
    fn default() -> Self {
        Self {
            units: SlopeUnits::Degrees,
            z_factor: 1.0,
        }
    }
}

/// Slope algorithm
#[derive(Debug, Clone, Default)]
pub struct Slope;

impl Algorithm for Slope {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = SlopeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Slope"
    }

    fn description(&self) -> &'static str {
        "Terrain slope from a DEM using Horn's method"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        slope(&input, params)
    }
}

/// Calculate slope from a DEM
///
/// ```text
/// a b c
/// d e f
/// g h i
/// ```
///
/// dz/dx = ((c + 2f + i) - (a + 2d + g)) / (8 * dx)
/// dz/dy = ((g + 2h + i) - (a + 2b + c)) / (8 * dy)
/// slope = atan(sqrt(dz/dx² + dz/dy²))
///
/// No-data centers stay NaN.
pub fn slope(dem: &Raster<f64>, params: SlopeParams) -> Result<Raster<f64>> {
    if params.z_factor <= 0.0 || !params.z_factor.is_finite() {
        return Err(Error::config("z_factor", "must be a positive number"));
    }
    let (rows, cols) = dem.shape();
    let (dx, dy) = dem.ground_cell_size();
    let nodata = dem.nodata();
    let z = params.z_factor;

    let is_missing = |v: f64| v.is_nan() || nodata.is_some_and(|nd| (v - nd).abs() < f64::EPSILON);

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let e = unsafe { dem.get_unchecked(row, col) };
                if is_missing(e) {
                    continue;
                }

                // Neighbour elevation, falling back to the center outside the
                // grid or on no-data
                let at = |dr: isize, dc: isize| -> f64 {
                    let r = row as isize + dr;
                    let c = col as isize + dc;
                    if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize {
                        return e * z;
                    }
                    let v = unsafe { dem.get_unchecked(r as usize, c as usize) };
                    if is_missing(v) {
                        e * z
                    } else {
                        v * z
                    }
                };

                let (a, b, c) = (at(-1, -1), at(-1, 0), at(-1, 1));
                let (d, f) = (at(0, -1), at(0, 1));
                let (g, h, i) = (at(1, -1), at(1, 0), at(1, 1));

                let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * dx);
                let dz_dy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / (8.0 * dy);
                let slope_rad = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan();

                *out = match params.units {
                    SlopeUnits::Degrees => slope_rad.to_degrees(),
                    SlopeUnits::Percent => slope_rad.tan() * 100.0,
                };
            }

            row_data
        })
        .collect();

    dem.derive(output_data, Some(f64::NAN))
}
