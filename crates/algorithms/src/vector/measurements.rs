//! Field measurements: area, perimeter, compactness
//!
//! Geographic polygons are measured on the ellipsoid (area) and the sphere
//! (perimeter); projected polygons in map units, assumed to be meters.

use geo::{Area, Euclidean, GeodesicArea, Haversine, Length, Polygon};
use std::f64::consts::PI;

/// Polygon area in square meters
pub fn area_m2(polygon: &Polygon<f64>, geographic: bool) -> f64 {
    if geographic {
        polygon.geodesic_area_unsigned()
    } else {
        polygon.unsigned_area()
    }
}

/// Total length of exterior and interior rings, in meters
pub fn perimeter_m(polygon: &Polygon<f64>, geographic: bool) -> f64 {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| {
            if geographic {
                Haversine.length(ring)
            } else {
                Euclidean.length(ring)
            }
        })
        .sum()
}

/// Isoperimetric quotient `4πA / P²`: 1.0 for a circle, ~0.785 for a
/// square, 0 for a degenerate outline.
pub fn compactness(area_m2: f64, perimeter_m: f64) -> f64 {
    if perimeter_m > 0.0 && area_m2.is_finite() {
        4.0 * PI * area_m2 / (perimeter_m * perimeter_m)
    } else {
        0.0
    }
}
