//! Split representation: attribute table plus parallel WKT geometries

use super::{AttributeValue, Feature, FeatureCollection};
use crate::crs::CRS;
use crate::error::{Error, Result};
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use wkt::{ToWkt, TryFromWkt};

/// Attribute rows, WKT geometries and a CRS kept side by side.
///
/// `rows[i]` holds one value per entry of `columns`, and `geometries[i]`
/// is the WKT of the same row (`None` for rows without geometry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<AttributeValue>>,
    pub geometries: Vec<Option<String>>,
    pub crs: Option<CRS>,
}

impl LegacyTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FeatureCollection {
    /// Split into an attribute table and WKT geometries
    pub fn to_legacy(&self) -> LegacyTable {
        let columns = self.columns().to_vec();
        let rows = self
            .iter()
            .map(|f| columns.iter().map(|c| f.value(c)).collect())
            .collect();
        let geometries = self
            .iter()
            .map(|f| f.geometry.as_ref().map(|g| g.wkt_string()))
            .collect();
        LegacyTable {
            columns,
            rows,
            geometries,
            crs: self.crs().cloned(),
        }
    }

    /// Rebuild a collection from the split representation
    pub fn from_legacy(table: &LegacyTable) -> Result<Self> {
        if table.geometries.len() != table.rows.len() {
            return Err(Error::InvalidParameter {
                name: "geometries",
                value: table.geometries.len().to_string(),
                reason: format!("expected one geometry per row ({} rows)", table.rows.len()),
            });
        }

        let mut features = Vec::with_capacity(table.rows.len());
        for (row, wkt) in table.rows.iter().zip(&table.geometries) {
            if row.len() != table.columns.len() {
                return Err(Error::InvalidParameter {
                    name: "rows",
                    value: row.len().to_string(),
                    reason: format!("expected {} values per row", table.columns.len()),
                });
            }
            let mut feature = Feature::empty();
            if let Some(wkt) = wkt {
                let geometry = Geometry::<f64>::try_from_wkt_str(wkt)
                    .map_err(|e| Error::Wkt(format!("{}: {}", e, wkt)))?;
                feature.geometry = Some(geometry);
            }
            for (column, value) in table.columns.iter().zip(row) {
                if !value.is_null() {
                    feature.set_property(column.as_str(), value.clone());
                }
            }
            features.push(feature);
        }

        Ok(Self::with_columns(
            features,
            table.columns.clone(),
            table.crs.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{point, polygon};

    fn sample() -> FeatureCollection {
        FeatureCollection::from_features(
            vec![
                Feature::new(Geometry::Point(point!(x: -3.7, y: 40.42)))
                    .with_property("name", "Madrid")
                    .with_property("pop", 3_223_000_i64),
                Feature::new(Geometry::Polygon(polygon![
                    (x: 0.0, y: 0.0),
                    (x: 1.0, y: 0.0),
                    (x: 1.0, y: 1.0),
                ]))
                .with_property("name", "triangle"),
            ],
            Some(CRS::wgs84()),
        )
    }

    #[test]
    fn round_trip_through_wkt() {
        let fc = sample();
        let table = fc.to_legacy();
        assert_eq!(table.columns, vec!["name", "pop"]);
        assert_eq!(table.rows[1][1], AttributeValue::Null);
        assert!(table.geometries[0].as_deref().unwrap().starts_with("POINT"));

        let back = FeatureCollection::from_legacy(&table).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.columns(), fc.columns());
        assert_eq!(back.crs(), fc.crs());
        assert_eq!(back.features()[0].geometry, fc.features()[0].geometry);
        assert_eq!(back.features()[1].geometry, fc.features()[1].geometry);
        assert_eq!(back.features()[0].value("pop"), AttributeValue::Int(3_223_000));
    }

    #[test]
    fn malformed_wkt_is_an_error() {
        let mut table = sample().to_legacy();
        table.geometries[0] = Some("POINT (1 2".to_string());
        assert!(matches!(
            FeatureCollection::from_legacy(&table),
            Err(Error::Wkt(_))
        ));
    }
}
