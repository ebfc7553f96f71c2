//! Reading and writing rasters, boundaries and field collections

mod geojson;
mod geotiff;

pub use self::geojson::{
    field_to_feature, fields_to_geojson, parse_polygons, read_polygons, read_region, write_fields,
};
pub use self::geotiff::{read_geotiff, write_geotiff};
