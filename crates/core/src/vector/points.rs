//! Point tables loaded from delimited text

use super::{AttributeValue, Feature, FeatureCollection};
use crate::crs::CRS;
use crate::error::{Error, Result};
use geo_types::{Geometry, Point};
use std::io::Read;

/// Which columns hold the coordinates.
///
/// `None` picks `lon`/`lat` when present, then `x`/`y` (case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct PointColumns {
    pub x: Option<String>,
    pub y: Option<String>,
}

impl PointColumns {
    pub fn new(x: &str, y: &str) -> Self {
        Self {
            x: Some(x.to_string()),
            y: Some(y.to_string()),
        }
    }
}

/// Coordinates plus the remaining attribute columns of a delimited file
#[derive(Debug, Clone, PartialEq)]
pub struct PointTable {
    pub x_column: String,
    pub y_column: String,
    /// Attribute columns, in file order, excluding the coordinate columns
    pub columns: Vec<String>,
    pub points: Vec<(f64, f64)>,
    pub records: Vec<Vec<AttributeValue>>,
}

impl PointTable {
    /// Parse CSV-like text with a header row
    pub fn from_reader<R: Read>(reader: R, delimiter: u8, columns: &PointColumns) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv.headers()?.iter().map(str::to_string).collect();
        let xi = coordinate_index(&headers, columns.x.as_deref(), &["lon", "x"])?;
        let yi = coordinate_index(&headers, columns.y.as_deref(), &["lat", "y"])?;

        let attribute_idx: Vec<usize> = (0..headers.len()).filter(|&i| i != xi && i != yi).collect();
        let mut table = PointTable {
            x_column: headers[xi].clone(),
            y_column: headers[yi].clone(),
            columns: attribute_idx.iter().map(|&i| headers[i].clone()).collect(),
            points: Vec::new(),
            records: Vec::new(),
        };

        for (n, record) in csv.records().enumerate() {
            let record = record?;
            // header is line 1
            let line = record.position().map(|p| p.line() as usize).unwrap_or(n + 2);
            let number = |i: usize| -> Result<f64> {
                let text = record.get(i).unwrap_or("");
                text.parse::<f64>().map_err(|_| Error::Parse {
                    line,
                    column: headers[i].clone(),
                    reason: format!("'{}' is not a number", text),
                })
            };
            table.points.push((number(xi)?, number(yi)?));
            table.records.push(
                attribute_idx
                    .iter()
                    .map(|&i| AttributeValue::infer(record.get(i).unwrap_or("")))
                    .collect(),
            );
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point features in the given CRS
    pub fn into_features(self, crs: Option<CRS>) -> FeatureCollection {
        let features = self
            .points
            .into_iter()
            .zip(self.records)
            .map(|((x, y), record)| {
                let mut feature = Feature::new(Geometry::Point(Point::new(x, y)));
                for (column, value) in self.columns.iter().zip(record) {
                    feature.set_property(column.as_str(), value);
                }
                feature
            })
            .collect();
        FeatureCollection::with_columns(features, self.columns, crs)
    }
}

fn coordinate_index(headers: &[String], requested: Option<&str>, fallbacks: &[&str]) -> Result<usize> {
    match requested {
        Some(name) => headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::UnknownColumn(name.to_string())),
        None => fallbacks
            .iter()
            .find_map(|f| headers.iter().position(|h| h.eq_ignore_ascii_case(f)))
            .ok_or_else(|| Error::UnknownColumn(fallbacks.join("/"))),
    }
}
