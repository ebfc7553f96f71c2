//! GeoJSON boundary input and field output

use crate::error::{Error, Result};
use crate::region::Region;
use crate::vector::FieldPolygon;
use geo::{Geometry as GeoGeometry, MultiPolygon, Polygon};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use serde_json::{Map, Number, Value as JsonValue};
use std::fs;
use std::path::Path;

/// All polygons in a GeoJSON document, in document order.
///
/// Multi-polygons are flattened into their parts; non-areal geometries are
/// skipped.
pub fn parse_polygons(text: &str) -> Result<Vec<Polygon<f64>>> {
    let geojson: GeoJson = text.parse()?;
    let geometries: Vec<Geometry> = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features.into_iter().filter_map(|f| f.geometry).collect(),
        GeoJson::Feature(f) => f.geometry.into_iter().collect(),
        GeoJson::Geometry(g) => vec![g],
    };

    let mut polygons = Vec::new();
    for geometry in geometries {
        collect_polygons(GeoGeometry::<f64>::try_from(geometry)?, &mut polygons);
    }
    Ok(polygons)
}

fn collect_polygons(geometry: GeoGeometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        GeoGeometry::Polygon(p) => out.push(p),
        GeoGeometry::MultiPolygon(mp) => out.extend(mp.0),
        GeoGeometry::GeometryCollection(gc) => {
            for g in gc.0 {
                collect_polygons(g, out);
            }
        }
        _ => {}
    }
}

/// Read polygons (e.g. known paddy fields) from a GeoJSON file
pub fn read_polygons<P: AsRef<Path>>(path: P) -> Result<Vec<Polygon<f64>>> {
    parse_polygons(&fs::read_to_string(path)?)
}

/// Read a region boundary; every polygon in the file becomes part of it
pub fn read_region<P: AsRef<Path>>(path: P) -> Result<Region> {
    let path = path.as_ref();
    let polygons = read_polygons(path)?;
    if polygons.is_empty() {
        return Err(Error::no_data(
            "region",
            format!("no polygon in {}", path.display()),
        ));
    }
    let mut region = Region::new(MultiPolygon::new(polygons))?;
    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        region = region.with_name(stem);
    }
    Ok(region)
}

fn number(v: f64) -> JsonValue {
    Number::from_f64(v).map(JsonValue::Number).unwrap_or(JsonValue::Null)
}

/// GeoJSON feature for one field with its attributes as properties
pub fn field_to_feature(field: &FieldPolygon) -> Result<Feature> {
    let mut properties = Map::new();
    properties.insert("name".into(), JsonValue::String(field.name.clone()));
    properties.insert("description".into(), JsonValue::String(field.description.clone()));
    properties.insert("area".into(), number(field.area));
    properties.insert("perimeter_m".into(), number(field.perimeter_m));
    properties.insert("compactness".into(), number(field.compactness));
    for (key, value) in &field.properties {
        properties.insert(key.clone(), serde_json::to_value(value)?);
    }

    Ok(Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::from(&field.geometry))),
        id: Some(geojson::feature::Id::Number(Number::from(field.id as u64))),
        properties: Some(properties),
        foreign_members: None,
    })
}

/// Feature collection for a batch of fields, named by `description`
pub fn fields_to_geojson(fields: &[FieldPolygon], description: &str) -> Result<FeatureCollection> {
    let features = fields.iter().map(field_to_feature).collect::<Result<Vec<_>>>()?;
    let mut foreign_members = Map::new();
    foreign_members.insert("name".into(), JsonValue::String(description.to_string()));
    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    })
}

/// Write a batch of fields as a GeoJSON FeatureCollection
pub fn write_fields<P: AsRef<Path>>(fields: &[FieldPolygon], description: &str, path: P) -> Result<()> {
    let fc = fields_to_geojson(fields, description)?;
    fs::write(path, serde_json::to_string_pretty(&fc)?)?;
    Ok(())
}
