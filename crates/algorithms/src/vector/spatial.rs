//! Spatial helpers: centroid, bounding box, label points

use geo::{BoundingRect, Centroid as GeoCentroid, InteriorPoint};
use geo_types::{Geometry, Point};
use geodeck_core::raster::Extent;
use geodeck_core::vector::FeatureCollection;

/// Envelope of a geometry
pub fn bounding_box(geom: &Geometry<f64>) -> Option<Extent> {
    geom.bounding_rect()
        .map(|rect| Extent::new(rect.min().x, rect.max().x, rect.min().y, rect.max().y))
}

/// Centroid of a geometry
pub fn centroid(geom: &Geometry<f64>) -> Option<Point<f64>> {
    match geom {
        Geometry::Point(p) => Some(*p),
        Geometry::Line(l) => Some(l.centroid()),
        Geometry::LineString(ls) => ls.centroid(),
        Geometry::Polygon(p) => p.centroid(),
        Geometry::MultiPoint(mp) => mp.centroid(),
        Geometry::MultiLineString(mls) => mls.centroid(),
        Geometry::MultiPolygon(mp) => mp.centroid(),
        Geometry::Rect(r) => Some(r.centroid()),
        Geometry::Triangle(t) => Some(t.centroid()),
        Geometry::GeometryCollection(gc) => gc.centroid(),
    }
}

/// A point guaranteed to lie on the geometry, for labels and popups.
///
/// Concave polygons (and countries with islands) can have a centroid
/// outside themselves.
pub fn label_point(geom: &Geometry<f64>) -> Option<Point<f64>> {
    geom.interior_point().or_else(|| centroid(geom))
}

/// Label points of every feature with a geometry, in row order
pub fn label_points(collection: &FeatureCollection) -> Vec<Option<Point<f64>>> {
    collection
        .iter()
        .map(|f| f.geometry.as_ref().and_then(label_point))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Contains, LineString, MultiPolygon, Polygon};

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (x0, y0),
                (x0 + size, y0),
                (x0 + size, y0 + size),
                (x0, y0 + size),
                (x0, y0),
            ]),
            vec![],
        )
    }

    #[test]
    fn test_bounding_box() {
        let bb = bounding_box(&Geometry::Polygon(square(1.0, 2.0, 3.0))).unwrap();
        assert_eq!(bb, Extent::new(1.0, 4.0, 2.0, 5.0));
    }

    #[test]
    fn test_centroid_polygon() {
        let c = centroid(&Geometry::Polygon(square(0.0, 0.0, 10.0))).unwrap();
        assert!((c.x() - 5.0).abs() < 1e-10);
        assert!((c.y() - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_centroid_point() {
        let p = Point::new(3.0, 7.0);
        assert_eq!(centroid(&Geometry::Point(p)), Some(p));
    }

    #[test]
    fn label_point_lies_on_split_geometry() {
        // two islands: the centroid falls in the strait between them
        let islands = MultiPolygon::new(vec![square(0.0, 0.0, 1.0), square(5.0, 0.0, 1.0)]);
        let geometry = Geometry::MultiPolygon(islands.clone());
        let c = centroid(&geometry).unwrap();
        assert!(!islands.contains(&c));
        let label = label_point(&geometry).unwrap();
        assert!(islands.contains(&label));
    }
}
