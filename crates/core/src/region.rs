//! Area of interest

use crate::error::{Error, Result};
use crate::raster::{Raster, RasterElement};
use geo::{BoundingRect, Contains, MultiPolygon, Point, Polygon, Rect};

/// Immutable area-of-interest geometry.
///
/// Built once from a boundary (typically an administrative district) and
/// shared read-only by every stage that clips or samples.
#[derive(Debug, Clone)]
pub struct Region {
    name: Option<String>,
    geometry: MultiPolygon<f64>,
    bbox: Rect<f64>,
}

impl Region {
    pub fn new(geometry: MultiPolygon<f64>) -> Result<Self> {
        let bbox = geometry
            .bounding_rect()
            .ok_or_else(|| Error::no_data("region", "boundary geometry is empty"))?;
        Ok(Self {
            name: None,
            geometry,
            bbox,
        })
    }

    pub fn from_polygon(polygon: Polygon<f64>) -> Result<Self> {
        Self::new(MultiPolygon::new(vec![polygon]))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)`
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        (self.bbox.min().x, self.bbox.min().y, self.bbox.max().x, self.bbox.max().y)
    }

    /// Center of the bounding box
    pub fn center(&self) -> (f64, f64) {
        let c = self.bbox.center();
        (c.x, c.y)
    }

    /// Whether a map point lies inside the region
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let (min_x, min_y, max_x, max_y) = self.bounds();
        if x < min_x || x > max_x || y < min_y || y > max_y {
            return false;
        }
        self.geometry.contains(&Point::new(x, y))
    }

    /// Per-cell membership on `grid`: 1 where the cell center is inside
    pub fn mask_for<T: RasterElement>(&self, grid: &Raster<T>) -> Result<Raster<u8>> {
        let (rows, cols) = grid.shape();
        let mut data = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                let (x, y) = grid.pixel_to_geo(col, row);
                data.push(u8::from(self.contains(x, y)));
            }
        }
        grid.derive(data, None)
    }
}
