//! Per-pixel median reduction

use super::Scene;
use crate::bands::SpectralBand;
use crate::maybe_rayon::*;
use paddyscan_core::raster::Raster;
use paddyscan_core::{Error, Result};

/// Per-pixel median of `band` over `scenes`.
///
/// Only finite observations take part; a pixel with none stays NaN. Even
/// counts average the two middle values.
pub fn median_band(scenes: &[&Scene], band: SpectralBand) -> Result<Raster<f64>> {
    let layers: Vec<&Raster<f64>> = scenes
        .iter()
        .map(|s| s.bands.require(band))
        .collect::<Result<_>>()?;
    let template = *layers
        .first()
        .ok_or_else(|| Error::no_data("median", format!("no scene provides {band}")))?;
    for (scene, layer) in scenes.iter().zip(&layers).skip(1) {
        template.check_aligned(*layer, &format!("{band} on {}", scene.date))?;
    }

    let (rows, cols) = template.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut values = Vec::with_capacity(layers.len());
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                values.clear();
                values.extend(
                    layers
                        .iter()
                        .map(|l| unsafe { l.get_unchecked(row, col) })
                        .filter(|v| v.is_finite()),
                );
                *out = median(&mut values);
            }
            row_data
        })
        .collect();

    template.derive(data, Some(f64::NAN))
}

fn median(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use paddyscan_core::{GeoTransform, RasterStack};

    fn scene(day: u32, nir: Raster<f64>) -> Scene {
        let mut bands = RasterStack::new();
        bands.push(SpectralBand::Nir, nir).unwrap();
        Scene::new(NaiveDate::from_ymd_opt(2024, 6, day).unwrap(), 0.0, bands)
    }

    fn make_band(value: f64) -> Raster<f64> {
        let mut r = Raster::filled(2, 2, value);
        r.set_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        r
    }

    #[test]
    fn test_median_even_count_averages() {
        let a = scene(1, make_band(0.2));
        let b = scene(2, make_band(0.4));
        let m = median_band(&[&a, &b], SpectralBand::Nir).unwrap();
        assert!((m.get(0, 0).unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_median_ignores_masked_observations() {
        let mut cloudy = make_band(0.9);
        cloudy.set(0, 0, f64::NAN).unwrap();
        let a = scene(1, make_band(0.2));
        let b = scene(2, cloudy);
        let c = scene(3, make_band(0.4));

        let m = median_band(&[&a, &b, &c], SpectralBand::Nir).unwrap();
        assert!((m.get(0, 0).unwrap() - 0.3).abs() < 1e-12);
        assert!((m.get(1, 1).unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_all_masked_pixel_stays_nan() {
        let mut r = make_band(0.5);
        r.set(1, 0, f64::NAN).unwrap();
        let a = scene(1, r);
        let m = median_band(&[&a], SpectralBand::Nir).unwrap();
        assert!(m.get(1, 0).unwrap().is_nan());
    }

    #[test]
    fn test_missing_band_reported() {
        let a = scene(1, make_band(0.5));
        assert!(matches!(
            median_band(&[&a], SpectralBand::Red),
            Err(Error::MissingBand(_))
        ));
    }
}
