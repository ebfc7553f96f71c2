//! Main Raster type

use crate::crs::{CRS, METERS_PER_DEGREE};
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{Array2, ArrayView2};

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores cell values in row-major order together with the
/// transform, CRS and no-data value that place it on the ground.
///
/// # Example
///
/// ```ignore
/// use paddyscan_core::Raster;
///
/// let mut ndvi: Raster<f64> = Raster::filled(100, 100, f64::NAN);
/// ndvi.set(10, 20, 0.62)?;
/// let value = ndvi.get(10, 20)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Create a zeroed raster of another element type sharing this raster's
    /// transform and CRS
    pub fn with_same_meta<U: RasterElement>(&self, rows: usize, cols: usize) -> Raster<U> {
        Raster {
            data: Array2::zeros((rows, cols)),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: None,
        }
    }

    /// Build a raster of another element type on this raster's grid from
    /// row-major data
    pub fn derive<U: RasterElement>(&self, data: Vec<U>, nodata: Option<U>) -> Result<Raster<U>> {
        let (rows, cols) = self.shape();
        let mut out = self.with_same_meta::<U>(rows, cols);
        out.data = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        out.nodata = nodata;
        Ok(out)
    }

    /// Same dimensions and metadata, filled with a value
    pub fn like(&self, fill_value: T) -> Self {
        Self {
            data: Array2::from_elem(self.data.dim(), fill_value),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: self.nodata,
        }
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell size in map units (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Whether the raster uses a geographic (degree-based) CRS
    pub fn is_geographic(&self) -> bool {
        self.crs.as_ref().is_some_and(CRS::is_geographic)
    }

    /// Cell width and height in meters.
    ///
    /// For geographic grids the degree sizes are scaled at the latitude of
    /// the grid center.
    pub fn ground_cell_size(&self) -> (f64, f64) {
        let dx = self.transform.pixel_width.abs();
        let dy = self.transform.pixel_height.abs();
        if !self.is_geographic() {
            return (dx, dy);
        }
        let (_, min_y, _, max_y) = self.bounds();
        let lat = ((min_y + max_y) / 2.0).to_radians();
        (dx * METERS_PER_DEGREE * lat.cos(), dy * METERS_PER_DEGREE)
    }

    /// Ground area of one cell in `row`, in square meters
    pub fn cell_area_m2(&self, row: usize) -> f64 {
        let dx = self.transform.pixel_width.abs();
        let dy = self.transform.pixel_height.abs();
        if !self.is_geographic() {
            return dx * dy;
        }
        let (_, lat) = self.transform.pixel_to_geo(0, row);
        dx * dy * METERS_PER_DEGREE * METERS_PER_DEGREE * lat.to_radians().cos()
    }

    // Coordinate conversion

    /// Map coordinates of the center of pixel (col, row)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Fractional pixel coordinates of a map point
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        self.transform.geo_to_pixel(x, y)
    }

    /// Check that `other` lies on exactly the same grid
    pub fn check_aligned<U: RasterElement>(&self, other: &Raster<U>, band: &str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::SizeMismatch {
                er: self.rows(),
                ec: self.cols(),
                ar: other.rows(),
                ac: other.cols(),
            });
        }
        if !self.transform.is_aligned_with(other.transform()) {
            return Err(Error::Misaligned {
                band: band.to_string(),
                reason: format!("{:?} vs {:?}", self.transform, other.transform()),
            });
        }
        if let (Some(a), Some(b)) = (&self.crs, other.crs()) {
            if !a.is_equivalent(b) {
                return Err(Error::Misaligned {
                    band: band.to_string(),
                    reason: format!("CRS {} vs {}", a, b),
                });
            }
        }
        Ok(())
    }

    // Value checks

    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Number of cells holding data
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !self.is_nodata(**v)).count()
    }

    /// Basic statistics (min, max, mean, valid cell count)
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum = 0.0;
        let mut count = 0usize;

        for &value in self.data.iter() {
            if self.is_nodata(value) {
                continue;
            }
            if min.is_none_or(|m| value < m) {
                min = Some(value);
            }
            if max.is_none_or(|m| value > m) {
                max = Some(value);
            }
            if let Some(v) = value.to_f64() {
                sum += v;
                count += 1;
            }
        }

        RasterStatistics {
            min,
            max,
            mean: (count > 0).then(|| sum / count as f64),
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Basic statistics for a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f32> = Raster::new(100, 200);
        assert_eq!(raster.shape(), (100, 200));
        assert_eq!(raster.len(), 20_000);
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<f64> = Raster::new(10, 10);
        raster.set(5, 5, 42.0).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42.0);
        assert!(raster.get(10, 0).is_err());
    }

    #[test]
    fn test_statistics_skip_nan() {
        let mut raster: Raster<f64> = Raster::filled(4, 4, 1.0);
        raster.set(0, 0, f64::NAN).unwrap();
        raster.set(3, 3, 5.0).unwrap();

        let stats = raster.statistics();
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(5.0));
        assert_eq!(stats.valid_count, 15);
        assert_eq!(stats.nodata_count, 1);
    }

    #[test]
    fn test_derive_keeps_grid() {
        let mut base: Raster<f64> = Raster::new(2, 3);
        base.set_transform(GeoTransform::new(100.0, 50.0, 10.0, -10.0));
        base.set_crs(Some(CRS::from_epsg(32636)));

        let mask = base.derive(vec![1u8, 0, 1, 0, 1, 0], Some(0)).unwrap();
        assert_eq!(mask.shape(), (2, 3));
        assert_eq!(mask.transform(), base.transform());
        assert_eq!(mask.crs(), base.crs());
        assert_eq!(mask.valid_count(), 3);
    }

    #[test]
    fn test_check_aligned_rejects_shifted_grid() {
        let mut a: Raster<f64> = Raster::new(5, 5);
        a.set_transform(GeoTransform::new(0.0, 50.0, 10.0, -10.0));
        let mut b: Raster<u8> = Raster::new(5, 5);
        b.set_transform(GeoTransform::new(10.0, 50.0, 10.0, -10.0));
        assert!(matches!(
            a.check_aligned(&b, "landcover"),
            Err(Error::Misaligned { .. })
        ));
        let c: Raster<u8> = Raster::new(4, 5);
        assert!(matches!(
            a.check_aligned(&c, "landcover"),
            Err(Error::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_check_aligned_rejects_other_crs() {
        let mut a: Raster<f64> = Raster::new(5, 5);
        a.set_crs(Some(CRS::from_epsg(32636)));
        let mut b: Raster<u16> = Raster::new(5, 5);
        b.set_crs(Some(CRS::wgs84()));
        assert!(a.check_aligned(&b, "landcover").is_err());
        b.set_crs(None);
        assert!(a.check_aligned(&b, "landcover").is_ok());
    }

    #[test]
    fn test_ground_cell_size_geographic() {
        let mut r: Raster<f64> = Raster::new(10, 10);
        r.set_transform(GeoTransform::new(35.0, 0.001, 0.0001, -0.0001));
        r.set_crs(Some(CRS::wgs84()));
        let (dx, dy) = r.ground_cell_size();
        assert_relative_eq!(dy, 11.132, epsilon = 1e-6);
        assert!(dx <= dy && dx > 11.0);
    }

    #[test]
    fn test_cell_area_projected() {
        let mut r: Raster<f64> = Raster::new(3, 3);
        r.set_transform(GeoTransform::new(0.0, 30.0, 10.0, -10.0));
        r.set_crs(Some(CRS::from_epsg(32636)));
        assert_relative_eq!(r.cell_area_m2(1), 100.0);
    }
}
