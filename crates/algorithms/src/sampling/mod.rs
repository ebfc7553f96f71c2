//! Labeled training samples
//!
//! Positives are read from known paddy polygons; negatives come from two
//! tiers: pixels whose land-cover code marks a non-paddy class, and
//! unconstrained random pixels over the region. Every draw is seeded, so
//! the same inputs always give the same sample set.

mod partition;

pub use partition::{partition, Partition, PartitionParams};

use crate::bands::FeatureName;
use crate::features::FeatureStack;
use geo::{BoundingRect, Contains, Point, Polygon};
use paddyscan_core::raster::Raster;
use paddyscan_core::{Error, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Class label of paddy rice
pub const POSITIVE: u8 = 1;
/// Class label of everything else
pub const NEGATIVE: u8 = 0;

/// One feature vector with its class label
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    pub features: Vec<f64>,
    pub label: u8,
    /// Map coordinates of the pixel center the sample was read from
    pub location: Option<(f64, f64)>,
}

/// Ordered samples plus the feature names they were drawn with
#[derive(Debug, Clone, Default)]
pub struct SampleSet {
    feature_names: Vec<FeatureName>,
    samples: Vec<LabeledSample>,
}

impl SampleSet {
    pub fn new(feature_names: Vec<FeatureName>) -> Self {
        Self {
            feature_names,
            samples: Vec::new(),
        }
    }

    /// Append a sample; its vector length must match the feature names
    pub fn push(&mut self, sample: LabeledSample) -> Result<()> {
        if sample.features.len() != self.feature_names.len() {
            return Err(Error::Algorithm(format!(
                "sample has {} features, set expects {}",
                sample.features.len(),
                self.feature_names.len()
            )));
        }
        self.samples.push(sample);
        Ok(())
    }

    pub fn extend(&mut self, samples: impl IntoIterator<Item = LabeledSample>) -> Result<()> {
        for sample in samples {
            self.push(sample)?;
        }
        Ok(())
    }

    pub fn feature_names(&self) -> &[FeatureName] {
        &self.feature_names
    }

    pub fn samples(&self) -> &[LabeledSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn count_label(&self, label: u8) -> usize {
        self.samples.iter().filter(|s| s.label == label).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabeledSample> {
        self.samples.iter()
    }
}

/// Sample counts, seeds and land-cover classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    /// Upper bound on positive samples, applied by truncation
    pub max_positives: usize,
    /// Land-cover codes treated as known non-paddy
    pub negative_classes: Vec<u16>,
    pub landcover_negatives: usize,
    pub landcover_seed: u64,
    pub random_negatives: usize,
    pub random_seed: u64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_positives: 5000,
            // WorldCover: tree cover, built-up, water, grassland
            negative_classes: vec![10, 50, 80, 30],
            landcover_negatives: 3000,
            landcover_seed: 42,
            random_negatives: 1000,
            random_seed: 123,
        }
    }
}

// ---------------------------------------------------------------------------
// Positive samples
// ---------------------------------------------------------------------------

/// Label-1 samples from pixels whose center lies in a known paddy polygon.
///
/// Polygons are visited in order and pixels row-major within each polygon.
/// Pixels with any non-finite feature are skipped. At most `cap` samples are
/// returned; fewer is not an error.
pub fn positive_samples(stack: &FeatureStack, polygons: &[Polygon<f64>], cap: usize) -> Vec<LabeledSample> {
    let Some(template) = stack.template() else {
        return Vec::new();
    };
    let (rows, cols) = template.shape();
    let mut buf = vec![0.0; stack.len()];
    let mut out = Vec::new();

    'polygons: for polygon in polygons {
        let Some(rect) = polygon.bounding_rect() else {
            continue;
        };
        let Some((r0, r1, c0, c1)) = pixel_window(template, rect.min(), rect.max(), rows, cols) else {
            continue;
        };
        for row in r0..r1 {
            for col in c0..c1 {
                if out.len() >= cap {
                    break 'polygons;
                }
                let (x, y) = template.pixel_to_geo(col, row);
                if !polygon.contains(&Point::new(x, y)) {
                    continue;
                }
                if stack.pixel_into(row, col, &mut buf) {
                    out.push(LabeledSample {
                        features: buf.clone(),
                        label: POSITIVE,
                        location: Some((x, y)),
                    });
                }
            }
        }
    }
    out
}

/// Pixel row/col ranges covering a map-space rectangle, clamped to the grid
fn pixel_window(
    template: &Raster<f64>,
    min: geo::Coord<f64>,
    max: geo::Coord<f64>,
    rows: usize,
    cols: usize,
) -> Option<(usize, usize, usize, usize)> {
    let (ca, ra) = template.geo_to_pixel(min.x, min.y);
    let (cb, rb) = template.geo_to_pixel(max.x, max.y);
    let clamp = |v: f64, hi: usize| v.max(0.0).min(hi as f64) as usize;
    let r0 = clamp(ra.min(rb).floor(), rows);
    let r1 = clamp(ra.max(rb).ceil(), rows);
    let c0 = clamp(ca.min(cb).floor(), cols);
    let c1 = clamp(ca.max(cb).ceil(), cols);
    (r0 < r1 && c0 < c1).then_some((r0, r1, c0, c1))
}

// ---------------------------------------------------------------------------
// Negative samples
// ---------------------------------------------------------------------------

/// Label-0 samples from pixels whose land-cover code is in `classes`.
///
/// Draws `count` distinct pixels, or every eligible pixel when fewer exist.
pub fn landcover_negatives(
    stack: &FeatureStack,
    landcover: &Raster<u16>,
    classes: &[u16],
    count: usize,
    seed: u64,
) -> Result<Vec<LabeledSample>> {
    if let Some(template) = stack.template() {
        template.check_aligned(landcover, "landcover")?;
    }
    let eligible = |row: usize, col: usize| {
        landcover
            .get(row, col)
            .is_ok_and(|code| !landcover.is_nodata(code) && classes.contains(&code))
    };
    Ok(draw(stack, eligible, count, seed))
}

/// Label-0 samples drawn uniformly from every pixel with a complete feature
/// vector, i.e. anywhere inside the clipped region
pub fn random_negatives(stack: &FeatureStack, count: usize, seed: u64) -> Vec<LabeledSample> {
    draw(stack, |_, _| true, count, seed)
}

fn draw<F>(stack: &FeatureStack, eligible: F, count: usize, seed: u64) -> Vec<LabeledSample>
where
    F: Fn(usize, usize) -> bool,
{
    let Some(template) = stack.template() else {
        return Vec::new();
    };
    let (rows, cols) = template.shape();
    let mut buf = vec![0.0; stack.len()];

    let mut candidates = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            if eligible(row, col) && stack.pixel_into(row, col, &mut buf) {
                candidates.push((row, col));
            }
        }
    }

    let amount = count.min(candidates.len());
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, candidates.len(), amount).into_vec();
    picked.sort_unstable();

    picked
        .into_iter()
        .filter_map(|i| {
            let (row, col) = candidates[i];
            let features = stack.pixel(row, col)?;
            Some(LabeledSample {
                features,
                label: NEGATIVE,
                location: Some(template.pixel_to_geo(col, row)),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Full collection
// ---------------------------------------------------------------------------

/// Collect positives, land-cover negatives and random negatives, in that
/// order, into one sample set
pub fn collect_samples(
    stack: &FeatureStack,
    positives: &[Polygon<f64>],
    landcover: &Raster<u16>,
    params: &SamplingParams,
) -> Result<SampleSet> {
    let mut set = SampleSet::new(stack.keys().to_vec());

    let pos = positive_samples(stack, positives, params.max_positives);
    debug!("{} positive samples from {} polygons", pos.len(), positives.len());
    let tier_a = landcover_negatives(
        stack,
        landcover,
        &params.negative_classes,
        params.landcover_negatives,
        params.landcover_seed,
    )?;
    let tier_b = random_negatives(stack, params.random_negatives, params.random_seed);

    info!(
        "Samples: {} positive, {} land-cover negative, {} random negative",
        pos.len(),
        tier_a.len(),
        tier_b.len()
    );
    set.extend(pos)?;
    set.extend(tier_a)?;
    set.extend(tier_b)?;

    if set.is_empty() {
        return Err(Error::no_data(
            "sampling",
            "no pixel with a complete feature vector in any sampling source",
        ));
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::Window;
    use geo::LineString;
    use paddyscan_core::{GeoTransform, RasterStack};

    fn make_band(rows: usize, cols: usize, value: f64) -> Raster<f64> {
        let mut r = Raster::filled(rows, cols, value);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r
    }

    /// Two-band stack whose first band encodes the pixel index
    fn stack(rows: usize, cols: usize) -> FeatureStack {
        let mut idx = make_band(rows, cols, 0.0);
        for row in 0..rows {
            for col in 0..cols {
                idx.set(row, col, (row * cols + col) as f64).unwrap();
            }
        }
        RasterStack::new()
            .with(FeatureName::Slope, idx)
            .unwrap()
            .with(FeatureName::Elevation, make_band(rows, cols, 10.0))
            .unwrap()
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
            vec![],
        )
    }

    fn landcover(rows: usize, cols: usize, code: u16) -> Raster<u16> {
        let mut r = Raster::filled(rows, cols, code);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r
    }

    #[test]
    fn test_positives_row_major_within_polygon() {
        let s = stack(6, 6);
        // x in 1..3, y in 3..5 -> rows 1..3, cols 1..3
        let samples = positive_samples(&s, &[square(1.0, 3.0, 3.0, 5.0)], 100);
        let ids: Vec<f64> = samples.iter().map(|s| s.features[0]).collect();
        assert_eq!(ids, vec![7.0, 8.0, 13.0, 14.0]);
        assert!(samples.iter().all(|s| s.label == POSITIVE));
    }

    #[test]
    fn test_positives_truncated_and_not_padded() {
        let s = stack(6, 6);
        let polygons = [square(0.0, 0.0, 6.0, 6.0)];
        assert_eq!(positive_samples(&s, &polygons, 5).len(), 5);
        assert_eq!(positive_samples(&s, &polygons, 5000).len(), 36);
    }

    #[test]
    fn test_positives_skip_incomplete_vectors() {
        let mut s = stack(4, 4);
        s = s
            .map_bands(|key, band| {
                let mut b = band.clone();
                if key == FeatureName::Elevation {
                    b.set(0, 0, f64::NAN).unwrap();
                }
                Ok(b)
            })
            .unwrap();
        let samples = positive_samples(&s, &[square(0.0, 0.0, 4.0, 4.0)], 100);
        assert_eq!(samples.len(), 15);
        assert_ne!(samples[0].features[0], 0.0);
    }

    #[test]
    fn test_landcover_negatives_respect_classes() {
        let s = stack(10, 10);
        let mut lc = landcover(10, 10, 40);
        for col in 0..10 {
            lc.set(0, col, 10).unwrap();
        }
        let negatives = landcover_negatives(&s, &lc, &[10, 50], 3000, 42).unwrap();
        assert_eq!(negatives.len(), 10);
        assert!(negatives.iter().all(|n| n.features[0] < 10.0 && n.label == NEGATIVE));
    }

    #[test]
    fn test_random_draw_is_seeded() {
        let s = stack(20, 20);
        let a = random_negatives(&s, 25, 123);
        let b = random_negatives(&s, 25, 123);
        let c = random_negatives(&s, 25, 7);
        assert_eq!(a.len(), 25);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_collect_orders_tiers() {
        let s = stack(10, 10);
        let lc = landcover(10, 10, 80);
        let params = SamplingParams {
            max_positives: 4,
            landcover_negatives: 6,
            random_negatives: 3,
            ..Default::default()
        };
        let set = collect_samples(&s, &[square(0.0, 0.0, 10.0, 10.0)], &lc, &params).unwrap();
        assert_eq!(set.len(), 13);
        assert_eq!(set.count_label(POSITIVE), 4);
        assert!(set.samples()[..4].iter().all(|s| s.label == POSITIVE));
        assert!(set.samples()[4..].iter().all(|s| s.label == NEGATIVE));
        assert_eq!(set.feature_names(), &[FeatureName::Slope, FeatureName::Elevation]);
    }

    #[test]
    fn test_empty_sample_set_is_error() {
        let nan = RasterStack::new()
            .with(FeatureName::Slope, make_band(3, 3, f64::NAN))
            .unwrap();
        let lc = landcover(3, 3, 10);
        let err = collect_samples(&nan, &[], &lc, &SamplingParams::default()).unwrap_err();
        assert!(matches!(err, Error::DataAvailability { .. }));
    }

    #[test]
    fn test_push_rejects_wrong_length() {
        let mut set = SampleSet::new(FeatureName::composite(Window::Planting));
        let bad = LabeledSample {
            features: vec![0.0; 3],
            label: 1,
            location: None,
        };
        assert!(set.push(bad).is_err());
    }
}
