//! Read cell values at point locations

use geo::Centroid;
use geodeck_core::raster::{Raster, RasterElement, RasterStack};
use geodeck_core::vector::{AttributeValue, Feature, FeatureCollection};
use geodeck_core::{Error, Result, CRS};
use geo_types::{Geometry, Point};
use serde::Serialize;

/// Value of the cell under each point; `None` outside the grid or on no-data
pub fn extract<T: RasterElement>(raster: &Raster<T>, points: &[(f64, f64)]) -> Vec<Option<f64>> {
    points
        .iter()
        .map(|&(x, y)| {
            let (row, col) = raster.cell_at(x, y)?;
            raster.value_f64(row, col)
        })
        .collect()
}

/// Values of every layer at each point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractTable {
    /// Layer names, one per column
    pub layers: Vec<String>,
    pub points: Vec<(f64, f64)>,
    /// One row per point, one value per layer
    pub rows: Vec<Vec<Option<f64>>>,
}

impl ExtractTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one layer across all points
    pub fn column(&self, layer: &str) -> Option<Vec<Option<f64>>> {
        let i = self.layers.iter().position(|l| l == layer)?;
        Some(self.rows.iter().map(|row| row[i]).collect())
    }

    /// Point features carrying one attribute per layer
    pub fn into_features(self, crs: Option<CRS>) -> FeatureCollection {
        let features = self
            .points
            .iter()
            .zip(&self.rows)
            .map(|(&(x, y), values)| {
                let mut feature = Feature::empty();
                if x.is_finite() && y.is_finite() {
                    feature.geometry = Some(Geometry::Point(Point::new(x, y)));
                }
                for (layer, value) in self.layers.iter().zip(values) {
                    let value = value.map(AttributeValue::Float).unwrap_or(AttributeValue::Null);
                    feature.set_property(layer.clone(), value);
                }
                feature
            })
            .collect();
        FeatureCollection::with_columns(features, self.layers, crs)
    }
}

/// Values of every stack layer at each point
pub fn extract_stack(stack: &RasterStack, points: &[(f64, f64)]) -> ExtractTable {
    let layers: Vec<String> = stack.names().into_iter().map(String::from).collect();
    let columns: Vec<Vec<Option<f64>>> = stack.iter().map(|layer| extract(layer, points)).collect();
    let rows = (0..points.len())
        .map(|i| columns.iter().map(|col| col[i]).collect())
        .collect();
    ExtractTable {
        layers,
        points: points.to_vec(),
        rows,
    }
}

/// Sample locations of a feature collection: points as they are, other
/// geometries by their centroid. The collection must share the grid's CRS
/// when both are known.
///
/// There is one location per feature. A feature without a usable geometry
/// gets `(NaN, NaN)`, which extracts as no-data.
pub fn sample_points(collection: &FeatureCollection, grid_crs: Option<&CRS>) -> Result<Vec<(f64, f64)>> {
    if let (Some(a), Some(b)) = (collection.crs(), grid_crs) {
        if !a.is_equivalent(b) {
            return Err(Error::CrsMismatch(a.identifier(), b.identifier()));
        }
    }
    Ok(collection
        .iter()
        .map(|f| {
            f.geometry
                .as_ref()
                .and_then(|g| match g {
                    Geometry::Point(p) => Some(*p),
                    other => other.centroid(),
                })
                .map_or((f64::NAN, f64::NAN), |p| (p.x(), p.y()))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodeck_core::GeoTransform;

    fn layer(name: &str, offset: f64) -> Raster<f64> {
        let data: Vec<f64> = (0..12).map(|v| v as f64 + offset).collect();
        let mut r = Raster::from_vec(data, 3, 4).unwrap().with_name(name);
        r.set_transform(GeoTransform::new(-72.0, -32.0, 1.0, -1.0));
        r.set_nodata(Some(f64::NAN));
        r.set_crs(Some(CRS::wgs84()));
        r
    }

    #[test]
    fn values_under_points() {
        let mut r = layer("alt", 0.0);
        r.set(0, 0, f64::NAN).unwrap();
        let values = extract(
            &r,
            &[(-70.5, -33.5), (-71.5, -32.5), (-80.0, -33.0), (-68.0, -35.0)],
        );
        // (-70.5, -33.5) is row 1, col 1; the corner point sits in the last cell
        assert_eq!(values, vec![Some(5.0), None, None, Some(11.0)]);
    }

    #[test]
    fn stack_table_has_one_column_per_layer() {
        let stack = RasterStack::from_layers(vec![layer("tmin1", 0.0), layer("tmin2", 100.0)]).unwrap();
        let table = extract_stack(&stack, &[(-71.5, -32.5), (-68.5, -34.5)]);
        assert_eq!(table.layers, vec!["tmin1", "tmin2"]);
        assert_eq!(table.rows[0], vec![Some(0.0), Some(100.0)]);
        assert_eq!(table.column("tmin2").unwrap(), vec![Some(100.0), Some(111.0)]);

        let features = table.into_features(Some(CRS::wgs84()));
        assert_eq!(features.len(), 2);
        assert_eq!(features.columns(), &["tmin1".to_string(), "tmin2".to_string()]);
        assert_eq!(
            features.features()[1].value("tmin1"),
            AttributeValue::Float(11.0)
        );
    }

    #[test]
    fn features_without_geometry_keep_their_row() {
        let sites = FeatureCollection::from_features(
            vec![
                Feature::new(Geometry::Point(Point::new(-71.5, -32.5))),
                Feature::empty().with_property("site", "lost"),
                Feature::new(Geometry::Point(Point::new(-68.5, -34.5))),
            ],
            Some(CRS::wgs84()),
        );
        let points = sample_points(&sites, Some(&CRS::wgs84())).unwrap();
        assert_eq!(points.len(), sites.len());
        assert!(points[1].0.is_nan() && points[1].1.is_nan());

        let stack = RasterStack::from_layers(vec![layer("tmin1", 0.0)]).unwrap();
        let table = extract_stack(&stack, &points);
        assert_eq!(table.column("tmin1").unwrap(), vec![Some(0.0), None, Some(11.0)]);

        let features = table.into_features(Some(CRS::wgs84()));
        assert!(features.features()[1].geometry.is_none());
        assert!(features.features()[2].geometry.is_some());
    }

    #[test]
    fn sample_points_checks_crs() {
        let collection = FeatureCollection::from_features(
            vec![Feature::new(Geometry::Point(Point::new(-71.0, -33.0)))],
            Some(CRS::web_mercator()),
        );
        let err = sample_points(&collection, Some(&CRS::wgs84())).unwrap_err();
        assert!(matches!(err, Error::CrsMismatch(_, _)));

        let points = sample_points(&collection, None).unwrap();
        assert_eq!(points, vec![(-71.0, -33.0)]);
    }
}
