//! Reproject feature collections

use geo::{CoordsIter, MapCoords};
use geo_types::{Coord, Geometry};
use geodeck_core::crs::Transformer;
use geodeck_core::vector::FeatureCollection;
use geodeck_core::{Error, Result, CRS};
use tracing::debug;

/// Transform every coordinate of a geometry
pub fn transform_geometry(geometry: &Geometry<f64>, transformer: &Transformer) -> Result<Geometry<f64>> {
    let t = *transformer;
    let out = geometry.map_coords(move |c: Coord<f64>| {
        let (x, y) = t.transform(c.x, c.y);
        Coord { x, y }
    });
    if !out.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite()) {
        return Err(Error::Other(
            "reprojection produced non-finite coordinates".to_string(),
        ));
    }
    Ok(out)
}

/// Reproject a collection into `target`.
///
/// Attributes are untouched; the result carries `target` as its CRS.
/// A collection without a CRS is an [`Error::MissingCrs`].
pub fn transform(collection: &FeatureCollection, target: &CRS) -> Result<FeatureCollection> {
    let source = collection.crs().ok_or(Error::MissingCrs)?;
    let transformer = Transformer::new(source, target)?;
    let mut out = if transformer.is_identity() {
        collection.clone()
    } else {
        collection.try_map_geometries(|g| transform_geometry(g, &transformer))?
    };
    out.set_crs(Some(target.clone()));
    debug!(
        "transformed {} features {} -> {}",
        collection.len(),
        source,
        target
    );
    Ok(out)
}
