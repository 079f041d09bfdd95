//! GeoJSON feature collections
//!
//! The CRS is taken from the legacy `crs` member when present and defaults
//! to EPSG:4326 otherwise. Collections in another CRS are written with that
//! member so they read back unchanged.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geojson::{feature::Id, GeoJson, JsonObject, JsonValue};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Parse GeoJSON text (a FeatureCollection, a Feature or a bare Geometry)
pub fn parse_geojson(text: &str) -> Result<FeatureCollection> {
    let geojson: GeoJson = text.parse()?;
    let (features, crs) = match geojson {
        GeoJson::FeatureCollection(fc) => {
            let crs = fc
                .foreign_members
                .as_ref()
                .and_then(|members| members.get("crs"))
                .and_then(crs_member);
            (fc.features, crs)
        }
        GeoJson::Feature(feature) => (vec![feature], None),
        GeoJson::Geometry(geometry) => (vec![geojson::Feature::from(geometry)], None),
    };

    let features = features
        .into_iter()
        .map(convert_feature)
        .collect::<Result<Vec<_>>>()?;
    Ok(FeatureCollection::from_features(
        features,
        Some(crs.unwrap_or_else(CRS::wgs84)),
    ))
}

fn convert_feature(feature: geojson::Feature) -> Result<Feature> {
    let geometry = feature
        .geometry
        .map(geo_types::Geometry::<f64>::try_from)
        .transpose()?;
    let properties = feature
        .properties
        .unwrap_or_default()
        .iter()
        .map(|(k, v)| (k.clone(), AttributeValue::from_json(v)))
        .collect();
    let id = feature.id.map(|id| match id {
        Id::String(s) => s,
        Id::Number(n) => n.to_string(),
    });
    Ok(Feature {
        geometry,
        properties,
        id,
    })
}

/// `{"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}}`
fn crs_member(value: &JsonValue) -> Option<CRS> {
    let name = value.get("properties")?.get("name")?.as_str()?;
    if name.ends_with("CRS84") {
        return Some(CRS::wgs84());
    }
    let code = name.rsplit(':').next()?.parse::<u32>().ok()?;
    Some(CRS::from_epsg(code))
}

/// Serialize a collection as a GeoJSON FeatureCollection
pub fn to_geojson_string(collection: &FeatureCollection) -> Result<String> {
    let crs = collection.crs().ok_or(Error::MissingCrs)?;
    collection.geometry_kind()?;

    let features = collection
        .iter()
        .map(|f| {
            let mut properties = JsonObject::new();
            for column in collection.columns() {
                properties.insert(column.clone(), f.value(column).to_json());
            }
            geojson::Feature {
                bbox: None,
                geometry: f.geometry.as_ref().map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                id: f.id.clone().map(Id::String),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let foreign_members = match crs.epsg() {
        Some(code) if code == 4326 => None,
        Some(code) => {
            let mut members = JsonObject::new();
            members.insert(
                "crs".to_string(),
                serde_json::json!({
                    "type": "name",
                    "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", code) }
                }),
            );
            Some(members)
        }
        None => return Err(Error::UnsupportedCrs(crs.identifier())),
    };

    let fc = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    };
    Ok(GeoJson::from(fc).to_string())
}

/// Read a GeoJSON file
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::file(path, e))?;
    let collection = parse_geojson(&text)?;
    debug!("read {} features from {}", collection.len(), path.display());
    Ok(collection)
}

/// Write a collection as GeoJSON; every geometry must share one kind
pub fn write_geojson<P: AsRef<Path>>(collection: &FeatureCollection, path: P) -> Result<()> {
    let path = path.as_ref();
    let text = to_geojson_string(collection)?;
    fs::write(path, text).map_err(|e| Error::file(path, e))?;
    debug!("wrote {} features to {}", collection.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{point, Geometry, LineString};

    const COUNTRIES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "id": "FRA",
             "properties": {"name": "France", "pop_est": 67059887, "subregion": "Western Europe"},
             "geometry": {"type": "Polygon", "coordinates": [[[2,46],[3,46],[3,47],[2,46]]]}},
            {"type": "Feature",
             "properties": {"name": "Spain", "pop_est": 47076781.5, "subregion": null},
             "geometry": {"type": "MultiPolygon", "coordinates": [[[[-4,40],[-3,40],[-3,41],[-4,40]]]]}}
        ]
    }"#;

    #[test]
    fn parses_properties_and_defaults_to_wgs84() {
        let fc = parse_geojson(COUNTRIES).unwrap();
        assert_eq!(fc.len(), 2);
        assert_eq!(fc.crs().and_then(|c| c.epsg()), Some(4326));
        let france = &fc.features()[0];
        assert_eq!(france.id.as_deref(), Some("FRA"));
        assert_eq!(france.value("pop_est"), AttributeValue::Int(67059887));
        assert!(fc.features()[1].value("subregion").is_null());
        // single and multi polygons are the same kind
        assert!(fc.geometry_kind().is_ok());
    }

    #[test]
    fn legacy_crs_member_round_trips() {
        let fc = FeatureCollection::from_features(
            vec![Feature::new(Geometry::Point(point!(x: 440298.94, y: 4474257.31))).with_property("name", "Madrid")],
            Some(CRS::utm(30, true)),
        );
        let text = to_geojson_string(&fc).unwrap();
        assert!(text.contains("urn:ogc:def:crs:EPSG::32630"));
        let back = parse_geojson(&text).unwrap();
        assert_eq!(back.crs().and_then(|c| c.epsg()), Some(32630));
        assert_eq!(back.features()[0].geometry, fc.features()[0].geometry);
    }

    #[test]
    fn mixed_kinds_and_missing_crs_are_rejected() {
        let mut fc = parse_geojson(COUNTRIES).unwrap();
        fc.push(Feature::new(Geometry::LineString(LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]))));
        assert!(matches!(to_geojson_string(&fc), Err(Error::MixedGeometryTypes { .. })));

        let mut unlabelled = parse_geojson(COUNTRIES).unwrap();
        unlabelled.set_crs(None);
        assert!(matches!(to_geojson_string(&unlabelled), Err(Error::MissingCrs)));
    }
}
