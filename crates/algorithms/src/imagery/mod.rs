//! Imagery: spectral indices and per-pixel cloud masking
//!
//! - Normalized difference: generic two-band index
//! - NDVI, LSWI, MNDWI, EVI: the indices attached to each composite
//! - SCL cloud mask applied to each scene before compositing

mod cloud;
mod indices;

pub use cloud::{mask_clouds, DEFAULT_CLEAR_CLASSES};
pub use indices::{compute_index, evi, lswi, mndwi, ndvi, normalized_difference, EviParams};
