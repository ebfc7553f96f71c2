//! Cleaned mask to ordered field collection

use super::measurements::{area_m2, compactness, perimeter_m};
use super::polygonize::{aggregate, aggregation_factor, polygonize};
use super::simplify::{refine_polygon, RefineParams};
use paddyscan_core::raster::Raster;
use paddyscan_core::vector::{AttributeValue, FieldCollection, FieldPolygon};
use paddyscan_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Parameters for [`vectorize`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizeParams {
    /// Ground sampling distance of the traced grid, meters (default 10)
    pub scale: f64,
    /// Upper bound on traced grid cells
    pub max_pixels: u64,
    /// Coarsen instead of failing when `max_pixels` is exceeded
    pub best_effort: bool,
    #[serde(flatten)]
    pub refine: RefineParams,
    /// Fields of this area or less are dropped, in areal units (default 0.2)
    pub min_field_area: f64,
    /// Square meters per areal unit (default 1000, one dönüm)
    pub area_unit_m2: f64,
    pub unit_label: String,
}

impl Default for VectorizeParams {
    fn default() -> Self {
        Self {
            scale: 10.0,
            max_pixels: 10_000_000_000_000,
            best_effort: true,
            refine: RefineParams::default(),
            min_field_area: 0.2,
            area_unit_m2: 1000.0,
            unit_label: "dönüm".to_string(),
        }
    }
}

impl VectorizeParams {
    pub fn validate(&self) -> Result<()> {
        if !self.min_field_area.is_finite() || self.min_field_area < 0.0 {
            return Err(Error::config("min_field_area", format!("{} must be >= 0", self.min_field_area)));
        }
        if !self.area_unit_m2.is_finite() || self.area_unit_m2 <= 0.0 {
            return Err(Error::config("area_unit_m2", format!("{} must be positive", self.area_unit_m2)));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(Error::config("vectorize.scale", format!("{} must be positive", self.scale)));
        }
        if self.max_pixels == 0 {
            return Err(Error::config("vectorize.max_pixels", "must be at least 1"));
        }
        let inward = self.refine.buffer_distance;
        if !inward.is_finite() || inward < 0.0 {
            return Err(Error::config(
                "buffer_distance",
                format!("{inward} must be a positive inward distance in meters, e.g. 12 for a -12 m buffer"),
            ));
        }
        for (name, value) in [
            ("simplify_coarse", self.refine.simplify_coarse),
            ("simplify_fine", self.refine.simplify_fine),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::config(name, format!("{value} must be a non-negative distance in meters")));
            }
        }
        Ok(())
    }

    /// `Area: <a> <unit>` with two decimals
    pub fn describe(&self, area: f64) -> String {
        format!("Area: {:.2} {}", area, self.unit_label)
    }
}

/// Convert a cleaned mask into named, measured fields.
///
/// Ids are assigned in trace order before filtering. The result holds only
/// fields with a finite area above `min_field_area`, largest first, ties
/// broken by id.
pub fn vectorize(mask: &Raster<u8>, params: &VectorizeParams) -> Result<FieldCollection> {
    params.validate()?;
    let geographic = mask.is_geographic();
    let factor = aggregation_factor(mask, params.scale, params.max_pixels, params.best_effort)?;
    let grid = if factor > 1 {
        aggregate(mask, factor)?
    } else {
        mask.clone()
    };
    let traced = polygonize(&grid);

    let mut fields = Vec::new();
    let mut next_id = 0usize;
    let mut dropped = 0usize;
    for component in &traced {
        for part in refine_polygon(&component.polygon, &params.refine, geographic) {
            let id = next_id;
            next_id += 1;

            let area = area_m2(&part, geographic) / params.area_unit_m2;
            if !area.is_finite() || area <= params.min_field_area {
                dropped += 1;
                continue;
            }
            let perimeter = perimeter_m(&part, geographic);

            let mut properties = BTreeMap::new();
            properties.insert("component".to_string(), AttributeValue::Int(component.component as i64));
            properties.insert("pixels".to_string(), AttributeValue::Int(component.pixels as i64));

            fields.push(FieldPolygon {
                id,
                name: format!("Field_{id}"),
                description: params.describe(area),
                area,
                perimeter_m: perimeter,
                compactness: compactness(area * params.area_unit_m2, perimeter),
                geometry: part,
                properties,
            });
        }
    }

    fields.sort_by(|a, b| b.area.total_cmp(&a.area).then(a.id.cmp(&b.id)));

    debug!(
        "Vectorized at factor {} ({} m): {} components, {} parts dropped",
        factor,
        params.scale,
        traced.len(),
        dropped
    );
    let collection = FieldCollection::new(fields, mask.crs().cloned());
    info!(
        "Vectorization: {} fields, total {:.2} {}",
        collection.len(),
        collection.total_area(),
        params.unit_label
    );
    Ok(collection)
}
