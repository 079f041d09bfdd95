//! Crop a raster to an extent
//!
//! The requested extent is intersected with the raster and the intersection
//! is snapped outward to whole cells of the source grid, so the result is
//! always an exact sub-grid of the input.

use geodeck_core::raster::{Extent, Raster, RasterElement};
use geodeck_core::{Error, Result};
use ndarray::s;
use tracing::debug;

/// Tolerance, in cells, before a boundary snaps to the next cell
const SNAP_EPS: f64 = 1e-9;

/// Row and column window `(row0, row1, col0, col1)` covering `extent`,
/// half-open and clamped to the grid
pub(crate) fn cell_window<T: RasterElement>(
    raster: &Raster<T>,
    extent: &Extent,
) -> Option<(usize, usize, usize, usize)> {
    let overlap = raster.extent().intersection(extent)?;
    let (rows, cols) = raster.shape();

    let mut col_lo = f64::INFINITY;
    let mut col_hi = f64::NEG_INFINITY;
    let mut row_lo = f64::INFINITY;
    let mut row_hi = f64::NEG_INFINITY;
    for (x, y) in overlap.corners() {
        let (c, r) = raster.geo_to_pixel(x, y);
        col_lo = col_lo.min(c);
        col_hi = col_hi.max(c);
        row_lo = row_lo.min(r);
        row_hi = row_hi.max(r);
    }

    let col0 = ((col_lo + SNAP_EPS).floor().max(0.0) as usize).min(cols);
    let col1 = ((col_hi - SNAP_EPS).ceil().max(0.0) as usize).min(cols);
    let row0 = ((row_lo + SNAP_EPS).floor().max(0.0) as usize).min(rows);
    let row1 = ((row_hi - SNAP_EPS).ceil().max(0.0) as usize).min(rows);

    if col1 <= col0 || row1 <= row0 {
        return None;
    }
    Some((row0, row1, col0, col1))
}

/// Crop `raster` to `extent`.
///
/// The result covers the cells of the source that intersect `extent`; its
/// extent never exceeds the source extent. An extent that does not overlap
/// the raster is an [`Error::ExtentOutside`].
pub fn crop<T: RasterElement>(raster: &Raster<T>, extent: &Extent) -> Result<Raster<T>> {
    let (row0, row1, col0, col1) = cell_window(raster, extent).ok_or(Error::ExtentOutside {
        xmin: extent.xmin,
        xmax: extent.xmax,
        ymin: extent.ymin,
        ymax: extent.ymax,
    })?;

    let data = raster.data().slice(s![row0..row1, col0..col1]).to_owned();
    let mut out = raster.derive(data, raster.transform().offset(col0, row0));
    out.set_nodata(raster.nodata());

    debug!(
        "crop {:?}: rows {}..{}, cols {}..{} -> {} x {}",
        raster.name(),
        row0,
        row1,
        col0,
        col1,
        out.rows(),
        out.cols()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geodeck_core::GeoTransform;

    /// 10 x 10 grid of 1-degree cells over (0..10, 0..10), value = row * 10 + col
    fn grid() -> Raster<f64> {
        let data: Vec<f64> = (0..100).map(|v| v as f64).collect();
        let mut r = Raster::from_vec(data, 10, 10).unwrap();
        r.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));
        r.set_nodata(Some(f64::NAN));
        r
    }

    #[test]
    fn aligned_extent_is_exact() {
        let out = crop(&grid(), &Extent::new(2.0, 5.0, 3.0, 7.0)).unwrap();
        assert_eq!(out.shape(), (4, 3));
        let e = out.extent();
        assert_relative_eq!(e.xmin, 2.0);
        assert_relative_eq!(e.xmax, 5.0);
        assert_relative_eq!(e.ymin, 3.0);
        assert_relative_eq!(e.ymax, 7.0);
        // top-left cell of the crop is row 3, col 2 of the source
        assert_eq!(out.value_f64(0, 0), Some(32.0));
    }

    #[test]
    fn unaligned_extent_snaps_outward() {
        let out = crop(&grid(), &Extent::new(2.5, 4.2, 3.1, 6.9)).unwrap();
        let e = out.extent();
        assert_relative_eq!(e.xmin, 2.0);
        assert_relative_eq!(e.xmax, 5.0);
        assert_relative_eq!(e.ymin, 3.0);
        assert_relative_eq!(e.ymax, 7.0);
        assert_relative_eq!(out.resolution().0, 1.0);
    }

    #[test]
    fn contained_extent_never_grows() {
        let source = grid();
        let out = crop(&source, &Extent::new(0.5, 9.5, 0.5, 9.5)).unwrap();
        assert!(source.extent().contains(&out.extent()));
        let out = crop(&source, &Extent::new(-5.0, 20.0, -5.0, 20.0)).unwrap();
        assert_eq!(out.shape(), (10, 10));
    }

    #[test]
    fn disjoint_extent_is_an_error() {
        let err = crop(&grid(), &Extent::new(20.0, 30.0, 20.0, 30.0)).unwrap_err();
        assert!(matches!(err, Error::ExtentOutside { .. }));
    }

    #[test]
    fn keeps_metadata() {
        let mut source = grid().with_name("tmin1");
        source.set_crs(Some(geodeck_core::CRS::wgs84()));
        let out = crop(&source, &Extent::new(0.0, 2.0, 0.0, 2.0)).unwrap();
        assert_eq!(out.name(), Some("tmin1"));
        assert_eq!(out.crs().and_then(|c| c.epsg()), Some(4326));
        assert!(out.nodata().map_or(false, |v| v.is_nan()));
    }
}
