//! Raster reprojection onto a new grid
//!
//! The target grid covers the source extent transformed into the target CRS
//! (edges densified so curved boundaries are enclosed). Each target cell
//! centre is mapped back into the source grid and sampled.

use geodeck_core::crs::Transformer;
use geodeck_core::raster::{Extent, GeoTransform, Raster, RasterElement};
use geodeck_core::{Error, Result, CRS};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Points sampled along each edge when transforming an extent
const EDGE_SAMPLES: usize = 21;

/// Resampling method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resample {
    /// Value of the source cell under the target centre; use for categories
    Nearest,
    /// Distance-weighted mean of the four nearest source centres
    #[default]
    Bilinear,
}

/// Parameters for [`project_raster`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectParams {
    /// Target cell size (x, y) in target CRS units; `None` keeps the
    /// source's row and column counts
    pub resolution: Option<(f64, f64)>,
    pub method: Resample,
}

/// Transform an extent between CRS, returning the envelope of its densified boundary
pub fn transform_extent(extent: &Extent, from: &CRS, to: &CRS) -> Result<Extent> {
    let transformer = Transformer::new(from, to)?;
    if transformer.is_identity() {
        return Ok(*extent);
    }

    let mut xmin = f64::INFINITY;
    let mut xmax = f64::NEG_INFINITY;
    let mut ymin = f64::INFINITY;
    let mut ymax = f64::NEG_INFINITY;
    let steps = (EDGE_SAMPLES - 1) as f64;
    for i in 0..EDGE_SAMPLES {
        let t = i as f64 / steps;
        let x = extent.xmin + t * extent.width();
        let y = extent.ymin + t * extent.height();
        for (px, py) in [(x, extent.ymin), (x, extent.ymax), (extent.xmin, y), (extent.xmax, y)] {
            let (tx, ty) = transformer.transform(px, py);
            if tx.is_finite() && ty.is_finite() {
                xmin = xmin.min(tx);
                xmax = xmax.max(tx);
                ymin = ymin.min(ty);
                ymax = ymax.max(ty);
            }
        }
    }
    if !(xmin < xmax && ymin < ymax) {
        return Err(Error::UnsupportedCrs(format!(
            "extent {} has no valid image in {}",
            extent,
            to.identifier()
        )));
    }
    Ok(Extent::new(xmin, xmax, ymin, ymax))
}

/// Reproject `raster` into `target`.
///
/// A raster without a CRS is an [`Error::MissingCrs`]. The output is `f64`
/// with NaN as no-data; cells whose centre falls outside the source are
/// no-data.
pub fn project_raster<T: RasterElement>(
    raster: &Raster<T>,
    target: &CRS,
    params: &ProjectParams,
) -> Result<Raster<f64>> {
    let source_crs = raster.crs().ok_or(Error::MissingCrs)?;
    let extent = transform_extent(&raster.extent(), source_crs, target)?;

    let (rows, cols) = match params.resolution {
        Some((rx, ry)) => {
            if !(rx > 0.0 && ry > 0.0) {
                return Err(Error::InvalidParameter {
                    name: "resolution",
                    value: format!("{}, {}", rx, ry),
                    reason: "must be positive".into(),
                });
            }
            (
                (extent.height() / ry).ceil().max(1.0) as usize,
                (extent.width() / rx).ceil().max(1.0) as usize,
            )
        }
        None => raster.shape(),
    };
    let transform = match params.resolution {
        Some((rx, ry)) => GeoTransform::new(extent.xmin, extent.ymax, rx, -ry),
        None => GeoTransform::from_extent(&extent, rows, cols),
    };

    // target -> source
    let back = Transformer::new(target, source_crs)?;
    let data = Array2::from_shape_fn((rows, cols), |(row, col)| {
        let (x, y) = transform.pixel_to_geo(col, row);
        let (sx, sy) = back.transform(x, y);
        match params.method {
            Resample::Nearest => nearest(raster, sx, sy),
            Resample::Bilinear => bilinear(raster, sx, sy),
        }
        .unwrap_or(f64::NAN)
    });

    let mut out = raster.derive(data, transform);
    out.set_crs(Some(target.clone()));
    out.set_nodata(Some(f64::NAN));
    debug!(
        "project {:?} {} -> {}: {} x {} cells, {:?}",
        raster.name(),
        source_crs,
        target,
        rows,
        cols,
        params.method
    );
    Ok(out)
}

fn nearest<T: RasterElement>(raster: &Raster<T>, x: f64, y: f64) -> Option<f64> {
    let (row, col) = raster.cell_at(x, y)?;
    raster.value_f64(row, col)
}

fn bilinear<T: RasterElement>(raster: &Raster<T>, x: f64, y: f64) -> Option<f64> {
    // only points inside the source grid are sampled
    nearest(raster, x, y)?;

    let (col, row) = raster.geo_to_pixel(x, y);
    let (fc, fr) = (col - 0.5, row - 0.5);
    let (c0, r0) = (fc.floor(), fr.floor());
    let (dx, dy) = (fc - c0, fr - r0);

    let mut sum = 0.0;
    let mut weight = 0.0;
    for (dr, dc, w) in [
        (0.0, 0.0, (1.0 - dx) * (1.0 - dy)),
        (0.0, 1.0, dx * (1.0 - dy)),
        (1.0, 0.0, (1.0 - dx) * dy),
        (1.0, 1.0, dx * dy),
    ] {
        let (r, c) = (r0 + dr, c0 + dc);
        if r < 0.0 || c < 0.0 || w <= 0.0 {
            continue;
        }
        if let Some(v) = raster.value_f64(r as usize, c as usize) {
            sum += w * v;
            weight += w;
        }
    }
    if weight > 0.0 {
        Some(sum / weight)
    } else {
        nearest(raster, x, y)
    }
}
