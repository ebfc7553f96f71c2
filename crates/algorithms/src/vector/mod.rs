//! Vectorization of the cleaned mask
//!
//! - Polygonize: block aggregation to the output scale and edge tracing
//! - Simplify: inward buffer, Douglas-Peucker, repair
//! - Measurements: area, perimeter, compactness
//! - Fields: naming, area filter and ordering

mod fields;
mod measurements;
mod polygonize;
mod simplify;

pub use fields::{vectorize, VectorizeParams};
pub use measurements::{area_m2, compactness, perimeter_m};
pub use polygonize::{aggregate, aggregation_factor, polygonize, TracedPolygon};
pub use simplify::{refine_polygon, LocalFrame, RefineParams};
