//! Grouped summaries of feature collections

use super::{AttributeValue, Feature, FeatureCollection};
use crate::error::{Error, Result};
use geo_types::{Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};

/// Reducer applied to one column within each group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryOp {
    Mean,
    Sum,
    Min,
    Max,
    Count,
    First,
}

/// One output column of a summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Name of the output column
    pub name: String,
    pub op: SummaryOp,
    /// Input column; not needed for `Count`
    #[serde(default)]
    pub column: Option<String>,
}

impl Summary {
    fn with(name: &str, op: SummaryOp, column: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            op,
            column: column.map(str::to_string),
        }
    }

    pub fn mean(name: &str, column: &str) -> Self {
        Self::with(name, SummaryOp::Mean, Some(column))
    }

    pub fn sum(name: &str, column: &str) -> Self {
        Self::with(name, SummaryOp::Sum, Some(column))
    }

    pub fn min(name: &str, column: &str) -> Self {
        Self::with(name, SummaryOp::Min, Some(column))
    }

    pub fn max(name: &str, column: &str) -> Self {
        Self::with(name, SummaryOp::Max, Some(column))
    }

    pub fn first(name: &str, column: &str) -> Self {
        Self::with(name, SummaryOp::First, Some(column))
    }

    pub fn count(name: &str) -> Self {
        Self::with(name, SummaryOp::Count, None)
    }

    fn apply(&self, members: &[&Feature]) -> Result<AttributeValue> {
        if self.op == SummaryOp::Count {
            return Ok(AttributeValue::Int(members.len() as i64));
        }
        let column = self.column.as_deref().ok_or_else(|| Error::InvalidParameter {
            name: "column",
            value: self.name.clone(),
            reason: format!("{:?} needs an input column", self.op),
        })?;
        let values: Vec<AttributeValue> = members.iter().map(|f| f.value(column)).collect();

        let numbers: Vec<f64> = values.iter().filter_map(AttributeValue::as_f64).collect();
        let value = match self.op {
            SummaryOp::Mean if numbers.is_empty() => AttributeValue::Null,
            SummaryOp::Mean => AttributeValue::Float(numbers.iter().sum::<f64>() / numbers.len() as f64),
            SummaryOp::Sum => match integer_sum(&values) {
                Some(total) => AttributeValue::Int(total),
                None => AttributeValue::Float(numbers.iter().sum()),
            },
            SummaryOp::Min => values
                .into_iter()
                .filter(|v| !v.is_null())
                .min_by(|a, b| a.total_cmp(b))
                .unwrap_or(AttributeValue::Null),
            SummaryOp::Max => values
                .into_iter()
                .filter(|v| !v.is_null())
                .max_by(|a, b| a.total_cmp(b))
                .unwrap_or(AttributeValue::Null),
            SummaryOp::First => values.into_iter().next().unwrap_or(AttributeValue::Null),
            SummaryOp::Count => AttributeValue::Int(members.len() as i64),
        };
        Ok(value)
    }
}

/// Exact total when every value is an integer or null and the total fits in i64
fn integer_sum(values: &[AttributeValue]) -> Option<i64> {
    values.iter().try_fold(0i64, |total, v| match v {
        AttributeValue::Int(i) => total.checked_add(*i),
        AttributeValue::Null => Some(total),
        _ => None,
    })
}

/// A collection split into groups by one column
pub struct GroupedCollection<'a> {
    source: &'a FeatureCollection,
    column: String,
    groups: Vec<(AttributeValue, Vec<usize>)>,
}

impl FeatureCollection {
    /// Group rows by the values of `column`, in order of first appearance
    pub fn group_by(&self, column: &str) -> Result<GroupedCollection<'_>> {
        if !self.has_column(column) {
            return Err(Error::UnknownColumn(column.to_string()));
        }
        let mut groups: Vec<(AttributeValue, Vec<usize>)> = Vec::new();
        for (i, feature) in self.iter().enumerate() {
            let key = feature.value(column);
            match groups.iter_mut().find(|(k, _)| k.loosely_equals(&key)) {
                Some((_, rows)) => rows.push(i),
                None => groups.push((key, vec![i])),
            }
        }
        Ok(GroupedCollection {
            source: self,
            column: column.to_string(),
            groups,
        })
    }
}

impl<'a> GroupedCollection<'a> {
    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn keys(&self) -> Vec<&AttributeValue> {
        self.groups.iter().map(|(k, _)| k).collect()
    }

    /// One row per group: the key column followed by each summary column.
    ///
    /// Member geometries are combined into one multi-part geometry.
    pub fn summarise(&self, summaries: &[Summary]) -> Result<FeatureCollection> {
        if let Some(missing) = summaries
            .iter()
            .filter_map(|s| s.column.as_deref())
            .find(|c| !self.source.has_column(c))
        {
            return Err(Error::UnknownColumn(missing.to_string()));
        }
        let mut columns = vec![self.column.clone()];
        columns.extend(summaries.iter().map(|s| s.name.clone()));

        let mut features = Vec::with_capacity(self.groups.len());
        for (key, rows) in &self.groups {
            let members: Vec<&Feature> = rows.iter().map(|&i| &self.source.features()[i]).collect();
            let mut feature = Feature {
                geometry: combine_geometries(members.iter().filter_map(|f| f.geometry.as_ref())),
                ..Feature::default()
            };
            feature.set_property(self.column.as_str(), key.clone());
            for summary in summaries {
                feature.set_property(summary.name.as_str(), summary.apply(&members)?);
            }
            features.push(feature);
        }

        Ok(FeatureCollection::with_columns(
            features,
            columns,
            self.source.crs().cloned(),
        ))
    }
}

/// Combine geometries into one multi-part geometry without dissolving shared edges
pub fn combine_geometries<'g>(geometries: impl Iterator<Item = &'g Geometry<f64>>) -> Option<Geometry<f64>> {
    let geometries: Vec<&Geometry<f64>> = geometries.collect();
    if geometries.is_empty() {
        return None;
    }
    if geometries.len() == 1 {
        return Some(geometries[0].clone());
    }

    let mut points: Vec<Point<f64>> = Vec::new();
    let mut lines: Vec<LineString<f64>> = Vec::new();
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    let mut other = false;

    for geometry in &geometries {
        match geometry {
            Geometry::Point(p) => points.push(*p),
            Geometry::MultiPoint(mp) => points.extend(mp.0.iter().copied()),
            Geometry::Line(l) => lines.push(LineString::from(vec![l.start, l.end])),
            Geometry::LineString(ls) => lines.push(ls.clone()),
            Geometry::MultiLineString(mls) => lines.extend(mls.0.iter().cloned()),
            Geometry::Polygon(p) => polygons.push(p.clone()),
            Geometry::MultiPolygon(mp) => polygons.extend(mp.0.iter().cloned()),
            Geometry::Rect(r) => polygons.push(r.to_polygon()),
            Geometry::Triangle(t) => polygons.push(t.to_polygon()),
            Geometry::GeometryCollection(_) => other = true,
        }
    }

    let families = [!points.is_empty(), !lines.is_empty(), !polygons.is_empty()]
        .iter()
        .filter(|b| **b)
        .count();
    if other || families > 1 {
        return Some(Geometry::GeometryCollection(GeometryCollection::from(
            geometries.into_iter().cloned().collect::<Vec<_>>(),
        )));
    }
    if !polygons.is_empty() {
        Some(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
    } else if !lines.is_empty() {
        Some(Geometry::MultiLineString(MultiLineString::new(lines)))
    } else {
        Some(Geometry::MultiPoint(MultiPoint::new(points)))
    }
}
