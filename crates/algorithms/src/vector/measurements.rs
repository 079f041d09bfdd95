//! Geometric measurements: area, length, perimeter

use geo::{Area as GeoArea, Euclidean, GeodesicArea, Geometry, Length};
use geodeck_core::vector::FeatureCollection;

/// Planar area of a geometry.
///
/// Returns unsigned area in CRS units squared (square degrees for a
/// geographic CRS; see [`feature_areas`] for square metres).
pub fn area(geom: &Geometry<f64>) -> f64 {
    match geom {
        Geometry::Polygon(p) => p.unsigned_area(),
        Geometry::MultiPolygon(mp) => mp.unsigned_area(),
        Geometry::Rect(r) => r.unsigned_area(),
        Geometry::GeometryCollection(gc) => gc.0.iter().map(area).sum(),
        _ => 0.0,
    }
}

/// Area on the WGS84 ellipsoid, in square metres, of a lon/lat geometry
pub fn geodesic_area(geom: &Geometry<f64>) -> f64 {
    match geom {
        Geometry::Polygon(p) => p.geodesic_area_unsigned(),
        Geometry::MultiPolygon(mp) => mp.geodesic_area_unsigned(),
        Geometry::Rect(r) => r.to_polygon().geodesic_area_unsigned(),
        Geometry::GeometryCollection(gc) => gc.0.iter().map(geodesic_area).sum(),
        _ => 0.0,
    }
}

/// Euclidean length of a linear geometry in CRS units
pub fn length(geom: &Geometry<f64>) -> f64 {
    match geom {
        Geometry::LineString(ls) => ls.length::<Euclidean>(),
        Geometry::MultiLineString(mls) => mls.0.iter().map(|ls| ls.length::<Euclidean>()).sum(),
        Geometry::Line(l) => {
            let dx = l.end.x - l.start.x;
            let dy = l.end.y - l.start.y;
            (dx * dx + dy * dy).sqrt()
        }
        _ => 0.0,
    }
}

/// Total length of exterior and interior rings
pub fn perimeter(geom: &Geometry<f64>) -> f64 {
    let rings = |p: &geo::Polygon<f64>| {
        p.exterior().length::<Euclidean>()
            + p.interiors().iter().map(|r| r.length::<Euclidean>()).sum::<f64>()
    };
    match geom {
        Geometry::Polygon(p) => rings(p),
        Geometry::MultiPolygon(mp) => mp.0.iter().map(rings).sum(),
        _ => 0.0,
    }
}

/// Area of every feature in square metres when the collection is geographic,
/// in CRS units squared otherwise. Features without geometry measure 0.
pub fn feature_areas(collection: &FeatureCollection) -> Vec<f64> {
    let geographic = collection.crs().map_or(false, |c| c.is_geographic());
    collection
        .iter()
        .map(|f| match &f.geometry {
            Some(g) if geographic => geodesic_area(g),
            Some(g) => area(g),
            None => 0.0,
        })
        .collect()
}
