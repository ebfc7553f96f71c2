//! # PaddyScan Core
//!
//! Core types, traits and I/O for the PaddyScan paddy-rice detection
//! pipeline.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced 2D grid
//! - `RasterStack<K>`: ordered bands on a shared grid, keyed by a typed name
//! - `Region`: the immutable area of interest
//! - `FieldPolygon` / `FieldCollection`: vectorized detections
//! - `Error`: the error taxonomy shared by every stage
//! - GeoTIFF and GeoJSON I/O

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod region;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{BandKey, GeoTransform, Raster, RasterElement, RasterStack};
pub use region::Region;
pub use vector::{AttributeValue, FieldCollection, FieldPolygon};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{BandKey, GeoTransform, Raster, RasterElement, RasterStack};
    pub use crate::region::Region;
    pub use crate::vector::{FieldCollection, FieldPolygon};
    pub use crate::Algorithm;
}

/// Core trait for the raster stages of the pipeline.
///
/// Algorithms are pure functions that transform input data according to
/// parameters.
pub trait Algorithm {
    type Input;
    type Output;
    type Params: Default;
    type Error: std::error::Error;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
