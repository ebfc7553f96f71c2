//! Vector field types produced by vectorization

use crate::crs::CRS;
use geo::Polygon;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// One detected field.
///
/// `area` is in the configured areal unit (dönüm by default), `perimeter_m`
/// in meters. `properties` holds attributes inherited from the parent
/// component when a multi-part geometry is split.
#[derive(Debug, Clone)]
pub struct FieldPolygon {
    pub id: usize,
    pub geometry: Polygon<f64>,
    pub name: String,
    pub description: String,
    pub area: f64,
    pub perimeter_m: f64,
    /// `4πA / P²`, 1.0 for a circle
    pub compactness: f64,
    pub properties: BTreeMap<String, AttributeValue>,
}

impl FieldPolygon {
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    pub fn property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }
}

/// Ordered collection of fields in a single CRS
#[derive(Debug, Clone, Default)]
pub struct FieldCollection {
    pub fields: Vec<FieldPolygon>,
    pub crs: Option<CRS>,
}

impl FieldCollection {
    pub fn new(fields: Vec<FieldPolygon>, crs: Option<CRS>) -> Self {
        Self { fields, crs }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldPolygon> {
        self.fields.iter()
    }

    /// Contiguous sub-slice, clamped to the collection length
    pub fn slice(&self, range: Range<usize>) -> &[FieldPolygon] {
        let end = range.end.min(self.fields.len());
        let start = range.start.min(end);
        &self.fields[start..end]
    }

    /// Sum of field areas in areal units
    pub fn total_area(&self) -> f64 {
        self.fields.iter().map(|f| f.area).sum()
    }
}

impl IntoIterator for FieldCollection {
    type Item = FieldPolygon;
    type IntoIter = std::vec::IntoIter<FieldPolygon>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
