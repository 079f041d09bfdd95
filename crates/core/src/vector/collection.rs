//! Feature collections: a table of features sharing one CRS

use super::{AttributeValue, Feature, GeometryKind};
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::Extent;
use geo::BoundingRect;
use geo_types::Geometry;

/// Collection of features with an ordered attribute schema.
///
/// The CRS belongs to the collection, so every geometry is interpreted in
/// the same reference system. Table operations return new collections and
/// leave `self` untouched.
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    features: Vec<Feature>,
    columns: Vec<String>,
    crs: Option<CRS>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_crs(crs: Option<CRS>) -> Self {
        Self {
            crs,
            ..Self::default()
        }
    }

    /// Build from features; columns are ordered by first appearance
    pub fn from_features(features: Vec<Feature>, crs: Option<CRS>) -> Self {
        let mut collection = Self::with_crs(crs);
        for feature in features {
            collection.push(feature);
        }
        collection
    }

    /// Build with an explicit column order
    pub fn with_columns(features: Vec<Feature>, columns: Vec<String>, crs: Option<CRS>) -> Self {
        let mut collection = Self {
            features: Vec::with_capacity(features.len()),
            columns,
            crs,
        };
        for feature in features {
            collection.push(feature);
        }
        collection
    }

    pub fn push(&mut self, feature: Feature) {
        let mut new_keys: Vec<&String> = feature
            .properties
            .keys()
            .filter(|k| !self.columns.contains(k))
            .collect();
        new_keys.sort();
        self.columns.extend(new_keys.into_iter().cloned());
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Label the collection with a CRS without touching coordinates
    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    fn require_column(&self, name: &str) -> Result<()> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(Error::UnknownColumn(name.to_string()))
        }
    }

    /// All values of one column in row order
    pub fn column_values(&self, name: &str) -> Result<Vec<AttributeValue>> {
        self.require_column(name)?;
        Ok(self.features.iter().map(|f| f.value(name)).collect())
    }

    /// Keep only the named columns, in the given order
    pub fn select(&self, columns: &[&str]) -> Result<Self> {
        for column in columns {
            self.require_column(column)?;
        }
        let features = self
            .features
            .iter()
            .map(|f| Feature {
                geometry: f.geometry.clone(),
                id: f.id.clone(),
                properties: columns
                    .iter()
                    .filter_map(|c| f.properties.get(*c).map(|v| (c.to_string(), v.clone())))
                    .collect(),
            })
            .collect();
        Ok(Self {
            features,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            crs: self.crs.clone(),
        })
    }

    /// Remove the named columns
    pub fn drop_columns(&self, columns: &[&str]) -> Result<Self> {
        for column in columns {
            self.require_column(column)?;
        }
        let keep: Vec<&str> = self
            .columns
            .iter()
            .map(String::as_str)
            .filter(|c| !columns.contains(c))
            .collect();
        self.select(&keep)
    }

    /// Keep rows for which `predicate` is true
    pub fn filter<P>(&self, mut predicate: P) -> Self
    where
        P: FnMut(&Feature) -> bool,
    {
        Self {
            features: self.features.iter().filter(|f| predicate(f)).cloned().collect(),
            columns: self.columns.clone(),
            crs: self.crs.clone(),
        }
    }

    /// Keep rows whose `column` equals `value`
    pub fn filter_eq(&self, column: &str, value: &AttributeValue) -> Result<Self> {
        self.require_column(column)?;
        Ok(self.filter(|f| f.value(column).loosely_equals(value)))
    }

    /// Add or overwrite a column computed from each feature
    pub fn mutate<F>(&self, name: &str, mut compute: F) -> Self
    where
        F: FnMut(&Feature) -> AttributeValue,
    {
        let mut out = self.clone();
        for feature in &mut out.features {
            let value = compute(feature);
            feature.set_property(name, value);
        }
        if !out.has_column(name) {
            out.columns.push(name.to_string());
        }
        out
    }

    /// First `n` rows
    pub fn head(&self, n: usize) -> Self {
        Self {
            features: self.features.iter().take(n).cloned().collect(),
            columns: self.columns.clone(),
            crs: self.crs.clone(),
        }
    }

    /// Apply a fallible transformation to every geometry
    pub fn try_map_geometries<F>(&self, mut f: F) -> Result<Self>
    where
        F: FnMut(&Geometry<f64>) -> Result<Geometry<f64>>,
    {
        let mut out = self.clone();
        for feature in &mut out.features {
            if let Some(geometry) = &feature.geometry {
                feature.geometry = Some(f(geometry)?);
            }
        }
        Ok(out)
    }

    /// Envelope of all geometries
    pub fn bounding_box(&self) -> Option<Extent> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .filter_map(|g| g.bounding_rect())
            .map(|r| Extent::new(r.min().x, r.max().x, r.min().y, r.max().y))
            .reduce(|a, b| a.union(&b))
    }

    /// Distinct geometry kinds in row order
    pub fn geometry_kinds(&self) -> Vec<GeometryKind> {
        let mut kinds = Vec::new();
        for kind in self.features.iter().filter_map(Feature::geometry_kind) {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
    }

    /// The single geometry kind of this layer.
    ///
    /// `Ok(None)` when no feature has a geometry; an error when kinds are mixed.
    pub fn geometry_kind(&self) -> Result<Option<GeometryKind>> {
        let kinds = self.geometry_kinds();
        match kinds.as_slice() {
            [] => Ok(None),
            [kind] => Ok(Some(*kind)),
            [first, other, ..] => Err(Error::MixedGeometryTypes {
                first: first.to_string(),
                other: other.to_string(),
            }),
        }
    }

    pub fn into_features(self) -> Vec<Feature> {
        self.features
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}
