//! Features and geometry kinds

use super::AttributeValue;
use geo_types::Geometry;
use std::collections::HashMap;
use std::fmt;

/// Geometry family of a feature; single and multi variants share a kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    Collection,
}

impl GeometryKind {
    pub fn of(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) | Geometry::MultiPoint(_) => GeometryKind::Point,
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
                GeometryKind::LineString
            }
            Geometry::Polygon(_)
            | Geometry::MultiPolygon(_)
            | Geometry::Rect(_)
            | Geometry::Triangle(_) => GeometryKind::Polygon,
            Geometry::GeometryCollection(_) => GeometryKind::Collection,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GeometryKind::Point => "POINT",
            GeometryKind::LineString => "LINESTRING",
            GeometryKind::Polygon => "POLYGON",
            GeometryKind::Collection => "GEOMETRYCOLLECTION",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone, Default)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes
    pub properties: HashMap<String, AttributeValue>,
    /// Optional feature ID
    pub id: Option<String>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            ..Self::default()
        }
    }

    /// Create a feature with no geometry
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builder-style attribute setter
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set_property(key, value.into());
        self
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// Attribute value, `Null` when absent
    pub fn value(&self, key: &str) -> AttributeValue {
        self.properties.get(key).cloned().unwrap_or(AttributeValue::Null)
    }

    pub fn geometry_kind(&self) -> Option<GeometryKind> {
        self.geometry.as_ref().map(GeometryKind::of)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{point, MultiPoint};

    #[test]
    fn multi_and_single_share_kind() {
        let p = Geometry::Point(point!(x: 1.0, y: 2.0));
        let mp = Geometry::MultiPoint(MultiPoint::from(vec![(1.0, 2.0), (3.0, 4.0)]));
        assert_eq!(GeometryKind::of(&p), GeometryKind::of(&mp));
    }

    #[test]
    fn missing_property_is_null() {
        let f = Feature::empty().with_property("name", "Lisbon");
        assert_eq!(f.value("name"), AttributeValue::from("Lisbon"));
        assert!(f.value("pop").is_null());
    }
}
