//! Feature stack assembly
//!
//! Concatenates the planting composite, the growth composite, terrain slope
//! and elevation into one stack in [`FeatureName::stack_order`] order, then
//! clips it to the region. The resulting key order is what the classifier is
//! trained on and what it checks at prediction time.

use crate::bands::{FeatureName, Window};
use crate::composite::Composite;
use crate::terrain::{slope, SlopeParams};
use paddyscan_core::raster::{Raster, RasterStack};
use paddyscan_core::{Error, Region, Result};
use tracing::info;

/// Per-pixel feature vectors keyed by typed feature names
pub type FeatureStack = RasterStack<FeatureName>;

/// Build the clipped feature stack.
///
/// `dem` must lie on the composite grid. Slope is derived before clipping so
/// cells along the region boundary see their real neighbours.
pub fn assemble_features(
    planting: &Composite,
    growth: &Composite,
    dem: &Raster<f64>,
    region: &Region,
) -> Result<FeatureStack> {
    if planting.window != Window::Planting || growth.window != Window::Growth {
        return Err(Error::config(
            "composites",
            format!(
                "expected planting then growth, got {} then {}",
                planting.window, growth.window
            ),
        ));
    }

    let mut stack = planting.bands.clone();
    stack.extend(growth.bands.clone())?;

    let template = stack
        .template()
        .ok_or_else(|| Error::no_data("feature stack", "composites hold no bands"))?;
    template.check_aligned(dem, "elevation")?;

    let mut elevation = dem.clone();
    elevation.set_nodata(Some(f64::NAN));
    if let Some(nd) = dem.nodata() {
        if !nd.is_nan() {
            elevation
                .data_mut()
                .mapv_inplace(|v| if (v - nd).abs() < f64::EPSILON { f64::NAN } else { v });
        }
    }

    stack.push(FeatureName::Slope, slope(&elevation, SlopeParams::default())?)?;
    stack.push(FeatureName::Elevation, elevation)?;

    let expected = FeatureName::stack_order();
    if stack.keys() != expected.as_slice() {
        return Err(Error::FeatureMismatch {
            expected: join_names(&expected),
            actual: join_names(stack.keys()),
        });
    }

    let clipped = clip_to_region(&stack, region)?;
    info!(
        "Feature stack: {} bands, {} of {} pixels inside region",
        clipped.len(),
        clipped.template().map(Raster::valid_count).unwrap_or(0),
        clipped.shape().0 * clipped.shape().1
    );
    Ok(clipped)
}

/// Set every band to NaN where the cell center falls outside `region`
pub fn clip_to_region(stack: &FeatureStack, region: &Region) -> Result<FeatureStack> {
    let Some(template) = stack.template() else {
        return Ok(stack.clone());
    };
    let inside = region.mask_for(template)?;
    stack.map_bands(|_, band| {
        let mut out = band.clone();
        out.set_nodata(Some(f64::NAN));
        for (value, flag) in out.data_mut().iter_mut().zip(inside.data().iter()) {
            if *flag == 0 {
                *value = f64::NAN;
            }
        }
        Ok(out)
    })
}

pub(crate) fn join_names(names: &[FeatureName]) -> String {
    names
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
