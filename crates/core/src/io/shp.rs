//! ESRI Shapefile reading (`.shp` + `.shx` + `.dbf`, optional `.prj`)

use super::read_prj;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use shapefile::dbase::FieldValue;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

fn field_value(value: FieldValue) -> AttributeValue {
    match value {
        FieldValue::Character(s) => s
            .map(|s| AttributeValue::String(s.trim_end().to_string()))
            .unwrap_or(AttributeValue::Null),
        FieldValue::Numeric(n) => match n {
            Some(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => AttributeValue::Int(v as i64),
            Some(v) => AttributeValue::Float(v),
            None => AttributeValue::Null,
        },
        FieldValue::Float(f) => f
            .map(|v| AttributeValue::Float(v as f64))
            .unwrap_or(AttributeValue::Null),
        FieldValue::Logical(b) => b.map(AttributeValue::Bool).unwrap_or(AttributeValue::Null),
        FieldValue::Integer(i) => AttributeValue::Int(i as i64),
        FieldValue::Double(d) => AttributeValue::Float(d),
        FieldValue::Currency(c) => AttributeValue::Float(c),
        FieldValue::Memo(m) => AttributeValue::String(m),
        other => AttributeValue::String(format!("{:?}", other)),
    }
}

/// Read a shapefile into a feature collection.
///
/// Attribute columns are ordered alphabetically; the CRS comes from the
/// `.prj` sidecar and is `None` when there is none.
pub fn read_shapefile<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::file(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        ));
    }
    let mut reader = shapefile::Reader::from_path(path)?;

    let mut features = Vec::new();
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;
        let geometry = match shape {
            shapefile::Shape::NullShape => None,
            shape => Some(
                geo_types::Geometry::<f64>::try_from(shape)
                    .map_err(|e| Error::Other(format!("unsupported shape: {}", e)))?,
            ),
        };
        let fields: HashMap<String, FieldValue> = record.into();
        let mut feature = Feature::empty();
        feature.geometry = geometry;
        for (name, value) in fields {
            feature.set_property(name, field_value(value));
        }
        features.push(feature);
    }

    let crs = read_prj(path)?;
    if crs.is_none() {
        warn!("{} has no .prj sidecar; CRS is unknown", path.display());
    }
    debug!("read {} shapes from {}", features.len(), path.display());
    Ok(FeatureCollection::from_features(features, crs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dbf_values_map_to_attributes() {
        assert_eq!(
            field_value(FieldValue::Character(Some("Lima   ".into()))),
            AttributeValue::from("Lima")
        );
        assert_eq!(field_value(FieldValue::Numeric(Some(12.0))), AttributeValue::Int(12));
        assert_eq!(field_value(FieldValue::Numeric(Some(1.25))), AttributeValue::Float(1.25));
        assert!(field_value(FieldValue::Numeric(None)).is_null());
        assert_eq!(field_value(FieldValue::Logical(Some(true))), AttributeValue::Bool(true));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = read_shapefile("/nonexistent/countries.shp").unwrap_err();
        assert!(err.to_string().contains("countries.shp"));
    }
}
