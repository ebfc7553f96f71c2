//! Terrain derivatives used as classifier features

mod slope;

pub use slope::{slope, Slope, SlopeParams, SlopeUnits};
