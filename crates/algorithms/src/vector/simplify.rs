//! Boundary refinement of traced polygons
//!
//! Inward buffer, coarse Douglas-Peucker, zero-buffer repair, fine
//! Douglas-Peucker. Distances are configured in meters; geographic
//! polygons are refined in a local metric frame.

use geo::{Area, BoundingRect, Buffer, Coord, LineString, MapCoords, MultiPolygon, Polygon, Simplify};
use paddyscan_core::crs::METERS_PER_DEGREE;
use serde::{Deserialize, Serialize};

/// Parameters for [`refine_polygon`], all in meters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineParams {
    /// Inward buffer distance in meters, positive (default 12)
    pub buffer_distance: f64,
    /// First simplification tolerance (default 5)
    pub simplify_coarse: f64,
    /// Second simplification tolerance (default 3)
    pub simplify_fine: f64,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            buffer_distance: 12.0,
            simplify_coarse: 5.0,
            simplify_fine: 3.0,
        }
    }
}

/// Equirectangular frame in meters around a reference latitude.
///
/// Longitude degrees shrink by `cos(latitude)`, so buffering and
/// simplifying in this frame keeps distances equal along both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFrame {
    lon0: f64,
    lat0: f64,
    meters_per_lon: f64,
}

impl LocalFrame {
    /// Frame centered on the bounding box of `polygon`
    pub fn around(polygon: &Polygon<f64>) -> Option<Self> {
        let center = polygon.bounding_rect()?.center();
        Some(Self {
            lon0: center.x,
            lat0: center.y,
            meters_per_lon: METERS_PER_DEGREE * center.y.to_radians().cos(),
        })
    }

    pub fn to_meters(&self, c: Coord<f64>) -> Coord<f64> {
        Coord {
            x: (c.x - self.lon0) * self.meters_per_lon,
            y: (c.y - self.lat0) * METERS_PER_DEGREE,
        }
    }

    pub fn to_degrees(&self, c: Coord<f64>) -> Coord<f64> {
        Coord {
            x: c.x / self.meters_per_lon + self.lon0,
            y: c.y / METERS_PER_DEGREE + self.lat0,
        }
    }
}

/// Refine one polygon; a multi-part result comes back as separate parts.
///
/// Parts that collapse below a valid ring are dropped, so a field thinner
/// than twice the buffer distance disappears entirely. Geographic
/// polygons are refined in a [`LocalFrame`] and mapped back to degrees.
pub fn refine_polygon(polygon: &Polygon<f64>, params: &RefineParams, geographic: bool) -> Vec<Polygon<f64>> {
    if !geographic {
        return refine_metric(polygon, params);
    }
    let Some(frame) = LocalFrame::around(polygon) else {
        return Vec::new();
    };
    if frame.meters_per_lon <= 0.0 {
        return Vec::new();
    }
    let projected = polygon.map_coords(|c| frame.to_meters(c));
    refine_metric(&projected, params)
        .into_iter()
        .map(|p| p.map_coords(|c| frame.to_degrees(c)))
        .collect()
}

fn refine_metric(polygon: &Polygon<f64>, params: &RefineParams) -> Vec<Polygon<f64>> {
    let shrunk = if params.buffer_distance > 0.0 {
        polygon.buffer(-params.buffer_distance)
    } else {
        MultiPolygon::new(vec![polygon.clone()])
    };

    let coarse = simplify_parts(&shrunk, params.simplify_coarse);
    let repaired = if coarse.0.is_empty() {
        coarse
    } else {
        let buffered = coarse.buffer(0.0);
        if buffered.0.is_empty() {
            coarse
        } else {
            buffered
        }
    };
    let fine = simplify_parts(&repaired, params.simplify_fine);

    fine.0
        .into_iter()
        .filter(|p| p.exterior().0.len() >= 4 && p.unsigned_area() > 0.0)
        .collect()
}

fn simplify_parts(parts: &MultiPolygon<f64>, tolerance: f64) -> MultiPolygon<f64> {
    if tolerance <= 0.0 {
        return parts.clone();
    }
    MultiPolygon::new(parts.0.iter().map(|p| simplify_polygon(p, tolerance)).collect())
}

fn simplify_polygon(polygon: &Polygon<f64>, tolerance: f64) -> Polygon<f64> {
    let exterior = polygon.exterior().simplify(tolerance);
    let interiors: Vec<LineString<f64>> = polygon
        .interiors()
        .iter()
        .map(|ring| ring.simplify(tolerance))
        .filter(|ring| ring.0.len() >= 4) // Must remain valid ring
        .collect();
    Polygon::new(exterior, interiors)
}
