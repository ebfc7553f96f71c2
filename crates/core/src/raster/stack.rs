//! Ordered multi-band stacks on a shared grid

use crate::error::{Error, Result};
use crate::raster::Raster;
use std::fmt::{Debug, Display};

/// Key identifying a band within a [`RasterStack`].
///
/// Keys are typed (enums) rather than strings; `Display` provides the
/// serialized name used in files and logs.
pub trait BandKey: Copy + Eq + Debug + Display + Send + Sync + 'static {}

impl<K> BandKey for K where K: Copy + Eq + Debug + Display + Send + Sync + 'static {}

/// An ordered set of `f64` bands that share extent, resolution and CRS.
///
/// Stacks are built once and then read; transformations return new stacks.
#[derive(Debug, Clone)]
pub struct RasterStack<K: BandKey> {
    keys: Vec<K>,
    bands: Vec<Raster<f64>>,
}

impl<K: BandKey> Default for RasterStack<K> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            bands: Vec::new(),
        }
    }
}

impl<K: BandKey> RasterStack<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a band; rejects duplicate keys and grids that differ from the
    /// first band.
    pub fn push(&mut self, key: K, band: Raster<f64>) -> Result<()> {
        if self.keys.contains(&key) {
            return Err(Error::DuplicateBand(key.to_string()));
        }
        if let Some(first) = self.bands.first() {
            first.check_aligned(&band, &key.to_string())?;
        }
        self.keys.push(key);
        self.bands.push(band);
        Ok(())
    }

    /// Builder-style [`push`](Self::push)
    pub fn with(mut self, key: K, band: Raster<f64>) -> Result<Self> {
        self.push(key, band)?;
        Ok(self)
    }

    /// Concatenate another stack after this one
    pub fn extend(&mut self, other: RasterStack<K>) -> Result<()> {
        for (key, band) in other.keys.into_iter().zip(other.bands) {
            self.push(key, band)?;
        }
        Ok(())
    }

    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, key: K) -> Option<&Raster<f64>> {
        self.position(key).map(|i| &self.bands[i])
    }

    /// Like [`get`](Self::get) but reports the missing band by name
    pub fn require(&self, key: K) -> Result<&Raster<f64>> {
        self.get(key)
            .ok_or_else(|| Error::MissingBand(key.to_string()))
    }

    pub fn position(&self, key: K) -> Option<usize> {
        self.keys.iter().position(|k| *k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &Raster<f64>)> {
        self.keys.iter().copied().zip(self.bands.iter())
    }

    /// The first band, which defines the stack's grid
    pub fn template(&self) -> Option<&Raster<f64>> {
        self.bands.first()
    }

    /// Grid dimensions, `(0, 0)` for an empty stack
    pub fn shape(&self) -> (usize, usize) {
        self.template().map(Raster::shape).unwrap_or((0, 0))
    }

    /// Copy the values at (row, col) into `buf` in band order.
    ///
    /// Returns `false` when any band is non-finite there; `buf` is then
    /// partially written and must not be used.
    pub fn pixel_into(&self, row: usize, col: usize, buf: &mut [f64]) -> bool {
        debug_assert_eq!(buf.len(), self.bands.len());
        for (slot, band) in buf.iter_mut().zip(&self.bands) {
            let v = match band.get(row, col) {
                Ok(v) => v,
                Err(_) => return false,
            };
            if !v.is_finite() {
                return false;
            }
            *slot = v;
        }
        true
    }

    /// Feature vector at (row, col), `None` when any band is missing a value
    pub fn pixel(&self, row: usize, col: usize) -> Option<Vec<f64>> {
        let mut buf = vec![0.0; self.bands.len()];
        self.pixel_into(row, col, &mut buf).then_some(buf)
    }

    /// New stack with `f` applied to every band
    pub fn map_bands<F>(&self, mut f: F) -> Result<Self>
    where
        F: FnMut(K, &Raster<f64>) -> Result<Raster<f64>>,
    {
        let mut out = Self::new();
        for (key, band) in self.iter() {
            out.push(key, f(key, band)?)?;
        }
        Ok(out)
    }

    /// Band names in order, as serialized
    pub fn names(&self) -> Vec<String> {
        self.keys.iter().map(ToString::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GeoTransform;
    use std::fmt;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Band {
        Red,
        Nir,
    }

    impl fmt::Display for Band {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Band::Red => write!(f, "B4"),
                Band::Nir => write!(f, "B8"),
            }
        }
    }

    fn make_band(rows: usize, cols: usize, value: f64) -> Raster<f64> {
        let mut r = Raster::filled(rows, cols, value);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r
    }

    #[test]
    fn test_push_preserves_order() {
        let stack = RasterStack::new()
            .with(Band::Nir, make_band(3, 3, 0.4))
            .unwrap()
            .with(Band::Red, make_band(3, 3, 0.1))
            .unwrap();
        assert_eq!(stack.keys(), &[Band::Nir, Band::Red]);
        assert_eq!(stack.names(), vec!["B8", "B4"]);
        assert_eq!(stack.pixel(1, 1), Some(vec![0.4, 0.1]));
    }

    #[test]
    fn test_duplicate_band_rejected() {
        let mut stack = RasterStack::new();
        stack.push(Band::Red, make_band(3, 3, 0.1)).unwrap();
        let err = stack.push(Band::Red, make_band(3, 3, 0.2)).unwrap_err();
        assert!(matches!(err, Error::DuplicateBand(name) if name == "B4"));
    }

    #[test]
    fn test_misaligned_band_rejected() {
        let mut stack = RasterStack::new();
        stack.push(Band::Red, make_band(3, 3, 0.1)).unwrap();
        assert!(stack.push(Band::Nir, make_band(4, 3, 0.1)).is_err());
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_pixel_with_nan_is_none() {
        let mut nir = make_band(2, 2, 0.5);
        nir.set(0, 1, f64::NAN).unwrap();
        let stack = RasterStack::new()
            .with(Band::Nir, nir)
            .unwrap()
            .with(Band::Red, make_band(2, 2, 0.1))
            .unwrap();
        assert!(stack.pixel(0, 1).is_none());
        assert!(stack.pixel(0, 0).is_some());
    }

    #[test]
    fn test_require_missing_band() {
        let stack: RasterStack<Band> = RasterStack::new();
        assert!(matches!(stack.require(Band::Nir), Err(Error::MissingBand(_))));
        assert_eq!(stack.shape(), (0, 0));
    }
}
