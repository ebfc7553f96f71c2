//! Agronomic rule mask
//!
//! Paddy rice is flooded around transplanting and greens up sharply
//! afterwards. A pixel passes the phenology rule when it shows
//!
//! - (a) a water signal in the planting composite,
//! - (b) canopy vigor in the growth composite,
//! - (c) an NDVI rise from planting to growth.
//!
//! The final candidate mask additionally requires a positive classifier
//! vote, a land-cover code outside the excluded set and gentle terrain.
//! Any non-finite input makes a pixel false.

use crate::bands::{FeatureName, SpectralIndex, Window};
use crate::classification::CLASS_NODATA;
use crate::features::FeatureStack;
use crate::maybe_rayon::*;
use paddyscan_core::raster::Raster;
use paddyscan_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// How the two growth-window vigor tests combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VigorPolicy {
    /// NDVI_B or EVI_B above threshold
    #[default]
    Disjunctive,
    /// NDVI_B and EVI_B above threshold
    Conjunctive,
}

/// Index thresholds of the phenology rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhenologyThresholds {
    pub lswi_planting: f64,
    pub mndwi_planting: f64,
    pub ndvi_growth: f64,
    pub evi_growth: f64,
    /// Minimum NDVI_B - NDVI_E
    pub ndvi_delta: f64,
    pub vigor: VigorPolicy,
}

impl Default for PhenologyThresholds {
    fn default() -> Self {
        Self {
            lswi_planting: 0.10,
            mndwi_planting: 0.15,
            ndvi_growth: 0.40,
            evi_growth: 0.35,
            ndvi_delta: 0.15,
            vigor: VigorPolicy::Disjunctive,
        }
    }
}

/// Index values of one pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexObservation {
    pub lswi_planting: f64,
    pub mndwi_planting: f64,
    pub ndvi_planting: f64,
    pub ndvi_growth: f64,
    pub evi_growth: f64,
}

impl IndexObservation {
    fn is_complete(&self) -> bool {
        [
            self.lswi_planting,
            self.mndwi_planting,
            self.ndvi_planting,
            self.ndvi_growth,
            self.evi_growth,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

impl PhenologyThresholds {
    pub fn water_signal(&self, obs: &IndexObservation) -> bool {
        obs.lswi_planting > self.lswi_planting || obs.mndwi_planting > self.mndwi_planting
    }

    pub fn vigor(&self, obs: &IndexObservation) -> bool {
        let ndvi = obs.ndvi_growth > self.ndvi_growth;
        let evi = obs.evi_growth > self.evi_growth;
        match self.vigor {
            VigorPolicy::Disjunctive => ndvi || evi,
            VigorPolicy::Conjunctive => ndvi && evi,
        }
    }

    pub fn growth_delta(&self, obs: &IndexObservation) -> bool {
        obs.ndvi_growth - obs.ndvi_planting > self.ndvi_delta
    }

    /// (a) and (b) and (c); false when any index is missing
    pub fn evaluate(&self, obs: &IndexObservation) -> bool {
        obs.is_complete() && self.water_signal(obs) && self.vigor(obs) && self.growth_delta(obs)
    }
}

/// Phenology thresholds plus the terrain and land-cover constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateRules {
    #[serde(flatten)]
    pub thresholds: PhenologyThresholds,
    /// Slope in degrees must be strictly below this
    pub slope_threshold: f64,
    /// Land-cover codes that can never be paddy
    pub excluded_classes: Vec<u16>,
}

impl Default for CandidateRules {
    fn default() -> Self {
        Self {
            thresholds: PhenologyThresholds::default(),
            slope_threshold: 4.0,
            // WorldCover: tree cover, built-up, permanent water
            excluded_classes: vec![10, 50, 80],
        }
    }
}

/// Everything the candidate rule looks at for one pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelEvidence {
    pub indices: IndexObservation,
    /// Classifier output, `None` where it has no value
    pub class: Option<u8>,
    /// Land-cover code, `None` where the reference has no value
    pub landcover: Option<u16>,
    pub slope: f64,
}

impl CandidateRules {
    /// Classifier, phenology, land cover and slope must all agree
    pub fn evaluate(&self, px: &PixelEvidence) -> bool {
        let classified = px.class == Some(1);
        let allowed_cover = px
            .landcover
            .is_some_and(|code| !self.excluded_classes.contains(&code));
        let flat = px.slope.is_finite() && px.slope < self.slope_threshold;
        classified && allowed_cover && flat && self.thresholds.evaluate(&px.indices)
    }
}

fn index(stack: &FeatureStack, index: SpectralIndex, window: Window) -> Result<&Raster<f64>> {
    stack.require(FeatureName::Index(index, window))
}

struct IndexBands<'a> {
    lswi_e: &'a Raster<f64>,
    mndwi_e: &'a Raster<f64>,
    ndvi_e: &'a Raster<f64>,
    ndvi_b: &'a Raster<f64>,
    evi_b: &'a Raster<f64>,
}

impl<'a> IndexBands<'a> {
    fn from_stack(stack: &'a FeatureStack) -> Result<Self> {
        Ok(Self {
            lswi_e: index(stack, SpectralIndex::Lswi, Window::Planting)?,
            mndwi_e: index(stack, SpectralIndex::Mndwi, Window::Planting)?,
            ndvi_e: index(stack, SpectralIndex::Ndvi, Window::Planting)?,
            ndvi_b: index(stack, SpectralIndex::Ndvi, Window::Growth)?,
            evi_b: index(stack, SpectralIndex::Evi, Window::Growth)?,
        })
    }

    /// # Safety
    /// `row` and `col` must be within the stack grid.
    unsafe fn at(&self, row: usize, col: usize) -> IndexObservation {
        IndexObservation {
            lswi_planting: self.lswi_e.get_unchecked(row, col),
            mndwi_planting: self.mndwi_e.get_unchecked(row, col),
            ndvi_planting: self.ndvi_e.get_unchecked(row, col),
            ndvi_growth: self.ndvi_b.get_unchecked(row, col),
            evi_growth: self.evi_b.get_unchecked(row, col),
        }
    }
}

/// Per-pixel phenology rule as a 0/1 mask
pub fn phenology_mask(stack: &FeatureStack, thresholds: &PhenologyThresholds) -> Result<Raster<u8>> {
    let bands = IndexBands::from_stack(stack)?;
    let template = bands.ndvi_b;
    let (rows, cols) = template.shape();

    let data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let obs = unsafe { bands.at(row, col) };
                    u8::from(thresholds.evaluate(&obs))
                })
                .collect::<Vec<_>>()
        })
        .collect();

    template.derive(data, None)
}

/// Combined candidate mask (1 = paddy candidate, 0 = rejected)
pub fn candidate_mask(
    stack: &FeatureStack,
    classes: &Raster<u8>,
    landcover: &Raster<u16>,
    rules: &CandidateRules,
) -> Result<Raster<u8>> {
    let bands = IndexBands::from_stack(stack)?;
    let slope = stack.require(FeatureName::Slope)?;
    let template = bands.ndvi_b;
    template.check_aligned(classes, "classification")?;
    template.check_aligned(landcover, "landcover")?;
    if !rules.slope_threshold.is_finite() {
        return Err(Error::config("slope_threshold", "must be finite"));
    }
    let (rows, cols) = template.shape();

    let data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let class = unsafe { classes.get_unchecked(row, col) };
                    let code = unsafe { landcover.get_unchecked(row, col) };
                    let evidence = PixelEvidence {
                        indices: unsafe { bands.at(row, col) },
                        class: (class != CLASS_NODATA && !classes.is_nodata(class)).then_some(class),
                        landcover: (!landcover.is_nodata(code)).then_some(code),
                        slope: unsafe { slope.get_unchecked(row, col) },
                    };
                    u8::from(rules.evaluate(&evidence))
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mask = template.derive(data, None)?;
    info!(
        "Candidate mask: {} pixels pass classifier and phenology rules",
        mask.data().iter().filter(|v| **v == 1).count()
    );
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use paddyscan_core::{GeoTransform, RasterStack};

    fn paddy_pixel() -> PixelEvidence {
        PixelEvidence {
            indices: IndexObservation {
                lswi_planting: 0.2,
                mndwi_planting: 0.0,
                ndvi_planting: 0.2,
                ndvi_growth: 0.5,
                evi_growth: 0.3,
            },
            class: Some(1),
            landcover: Some(40),
            slope: 2.0,
        }
    }

    #[test]
    fn test_flat_flooded_greening_cropland_passes() {
        assert!(CandidateRules::default().evaluate(&paddy_pixel()));
    }

    #[test]
    fn test_steep_slope_rejected() {
        let px = PixelEvidence {
            slope: 10.0,
            ..paddy_pixel()
        };
        assert!(!CandidateRules::default().evaluate(&px));
    }

    #[test]
    fn test_vigor_policy() {
        let rules = CandidateRules::default();
        let mut conj = rules.clone();
        conj.thresholds.vigor = VigorPolicy::Conjunctive;
        // EVI_B 0.3 is below 0.35: only the disjunctive policy accepts
        assert!(rules.evaluate(&paddy_pixel()));
        assert!(!conj.evaluate(&paddy_pixel()));
    }

    #[test]
    fn test_each_condition_required() {
        let rules = CandidateRules::default();
        let mut px = paddy_pixel();
        px.indices.lswi_planting = 0.05;
        assert!(!rules.evaluate(&px));

        let mut px = paddy_pixel();
        px.indices.ndvi_planting = 0.4; // delta 0.1
        assert!(!rules.evaluate(&px));

        let mut px = paddy_pixel();
        px.class = Some(0);
        assert!(!rules.evaluate(&px));

        let mut px = paddy_pixel();
        px.landcover = Some(50);
        assert!(!rules.evaluate(&px));

        let mut px = paddy_pixel();
        px.landcover = None;
        assert!(!rules.evaluate(&px));
    }

    #[test]
    fn test_nan_input_is_false() {
        let rules = CandidateRules::default();
        let mut px = paddy_pixel();
        px.indices.mndwi_planting = f64::NAN;
        assert!(!rules.evaluate(&px));
        let mut px = paddy_pixel();
        px.slope = f64::NAN;
        assert!(!rules.evaluate(&px));
    }

    fn make_band(value: f64) -> Raster<f64> {
        let mut r = Raster::filled(2, 2, value);
        r.set_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        r
    }

    fn stack() -> FeatureStack {
        let mut s = RasterStack::new();
        for (name, v) in [
            (FeatureName::Index(SpectralIndex::Lswi, Window::Planting), 0.2),
            (FeatureName::Index(SpectralIndex::Mndwi, Window::Planting), 0.0),
            (FeatureName::Index(SpectralIndex::Ndvi, Window::Planting), 0.2),
            (FeatureName::Index(SpectralIndex::Ndvi, Window::Growth), 0.5),
            (FeatureName::Index(SpectralIndex::Evi, Window::Growth), 0.3),
            (FeatureName::Slope, 2.0),
        ] {
            s.push(name, make_band(v)).unwrap();
        }
        s
    }

    #[test]
    fn test_candidate_mask_raster() {
        let mut classes: Raster<u8> = Raster::filled(2, 2, 1);
        classes.set_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        classes.set(0, 0, 0).unwrap();
        classes.set(0, 1, CLASS_NODATA).unwrap();
        let mut lc: Raster<u16> = Raster::filled(2, 2, 40);
        lc.set_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        lc.set(1, 0, 80).unwrap();

        let mask = candidate_mask(&stack(), &classes, &lc, &CandidateRules::default()).unwrap();
        assert_eq!(mask.data().iter().copied().collect::<Vec<_>>(), vec![0, 0, 0, 1]);

        let pheno = phenology_mask(&stack(), &PhenologyThresholds::default()).unwrap();
        assert_eq!(pheno.data().iter().filter(|v| **v == 1).count(), 4);
    }

    #[test]
    fn test_thresholds_from_toml() {
        let rules: CandidateRules =
            toml::from_str("slope_threshold = 3.0\nvigor = \"conjunctive\"\nndvi_delta = 0.2").unwrap();
        assert_eq!(rules.slope_threshold, 3.0);
        assert_eq!(rules.thresholds.vigor, VigorPolicy::Conjunctive);
        assert_eq!(rules.thresholds.ndvi_delta, 0.2);
        assert_eq!(rules.thresholds.lswi_planting, 0.10);
        assert_eq!(rules.excluded_classes, vec![10, 50, 80]);
    }
}
