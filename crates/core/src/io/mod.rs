//! I/O operations for reading and writing geospatial data
//!
//! Rasters: GeoTIFF, ESRI BIL and the R `raster` native grid. Vectors:
//! GeoJSON and (read-only) ESRI Shapefile. Points: delimited text.

mod bil;
mod delimited;
mod discover;
mod geotiff;
mod grd;
mod json;
mod raw;
mod shp;

pub use bil::{read_bil, read_bil_stack, write_bil};
pub use delimited::{read_points, sniff_delimiter, PointReadOptions};
pub use discover::{list_files, natural_cmp};
pub use geotiff::{read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer};
pub use grd::{read_grd, read_grd_stack, write_grd, write_grd_stack};
pub use json::{parse_geojson, read_geojson, to_geojson_string, write_geojson};
pub use shp::read_shapefile;

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{CellType, Raster, RasterElement, RasterStack};
use crate::vector::FeatureCollection;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Raster file formats, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    GeoTiff,
    Bil,
    Grd,
}

impl RasterFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = extension(path);
        match ext.as_str() {
            "tif" | "tiff" => Ok(RasterFormat::GeoTiff),
            "bil" => Ok(RasterFormat::Bil),
            "grd" | "gri" => Ok(RasterFormat::Grd),
            _ => Err(Error::UnsupportedFormat(format!(
                "raster extension '.{}' ({})",
                ext,
                path.display()
            ))),
        }
    }
}

/// Vector file formats, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorFormat {
    GeoJson,
    Shapefile,
}

impl VectorFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = extension(path);
        match ext.as_str() {
            "geojson" | "json" => Ok(VectorFormat::GeoJson),
            "shp" => Ok(VectorFormat::Shapefile),
            _ => Err(Error::UnsupportedFormat(format!(
                "vector extension '.{}' ({})",
                ext,
                path.display()
            ))),
        }
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Read a single-layer raster, dispatching on the file extension
pub fn read_raster<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let raster = match RasterFormat::from_path(path)? {
        RasterFormat::GeoTiff => read_geotiff(path)?,
        RasterFormat::Bil => read_bil(path)?,
        RasterFormat::Grd => read_grd(path)?,
    };
    info!(
        "loaded raster {} ({} x {} cells, {})",
        path.display(),
        raster.rows(),
        raster.cols(),
        raster.crs().map(|c| c.identifier()).unwrap_or_else(|| "no CRS".into())
    );
    Ok(raster)
}

/// Write a raster, dispatching on the file extension
pub fn write_raster<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    match RasterFormat::from_path(path)? {
        RasterFormat::GeoTiff => write_geotiff(raster, path)?,
        RasterFormat::Bil => write_bil(raster, path)?,
        RasterFormat::Grd => write_grd(raster, path)?,
    }
    info!("exported raster to {}", path.display());
    Ok(())
}

/// Read every band of one raster file into a stack
pub fn read_raster_stack<P: AsRef<Path>>(path: P) -> Result<RasterStack> {
    let path = path.as_ref();
    match RasterFormat::from_path(path)? {
        RasterFormat::GeoTiff => RasterStack::from_layers(vec![read_geotiff::<f64, _>(path)?]),
        RasterFormat::Bil => read_bil_stack(path),
        RasterFormat::Grd => read_grd_stack(path),
    }
}

/// Write a stack: one multi-band file for `.grd`, otherwise one file per layer
/// named `<stem>_<layer>.<ext>` next to `path`
pub fn write_stack<P: AsRef<Path>>(stack: &RasterStack, path: P) -> Result<()> {
    let path = path.as_ref();
    if RasterFormat::from_path(path)? == RasterFormat::Grd {
        return write_grd_stack(stack, path, CellType::Float64);
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("stack");
    let ext = extension(path);
    for layer in stack.iter() {
        let name = layer.name().unwrap_or("layer");
        write_raster(layer, path.with_file_name(format!("{}_{}.{}", stem, name, ext)))?;
    }
    Ok(())
}

/// Build a stack from the files in `dir` whose name matches `pattern`.
///
/// Files are stacked in natural order (`tmin2` before `tmin10`) and each
/// layer is named after its file stem.
pub fn read_stack<P: AsRef<Path>>(dir: P, pattern: &str) -> Result<RasterStack> {
    let files = list_files(dir, pattern)?;
    let mut stack = RasterStack::new();
    for file in &files {
        stack.push(read_raster::<f64, _>(file)?)?;
    }
    info!("stacked {} layers: {}", stack.nlayers(), stack.names().join(", "));
    Ok(stack)
}

/// Read a vector layer, dispatching on the file extension
pub fn read_vector<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let path = path.as_ref();
    let collection = match VectorFormat::from_path(path)? {
        VectorFormat::GeoJson => read_geojson(path)?,
        VectorFormat::Shapefile => read_shapefile(path)?,
    };
    info!(
        "loaded {} features ({} columns) from {}",
        collection.len(),
        collection.columns().len(),
        path.display()
    );
    Ok(collection)
}

/// Write a vector layer; only GeoJSON is writable
pub fn write_vector<P: AsRef<Path>>(collection: &FeatureCollection, path: P) -> Result<()> {
    let path = path.as_ref();
    match VectorFormat::from_path(path)? {
        VectorFormat::GeoJson => write_geojson(collection, path)?,
        VectorFormat::Shapefile => {
            return Err(Error::UnsupportedFormat(
                "shapefile export; write .geojson instead".to_string(),
            ))
        }
    }
    info!("exported {} features to {}", collection.len(), path.display());
    Ok(())
}

/// CRS from the `.prj` sidecar next to `path`, if there is one
pub(crate) fn read_prj(path: &Path) -> Result<Option<CRS>> {
    let prj = path.with_extension("prj");
    if !prj.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(&prj).map_err(|e| Error::file(&prj, e))?;
    CRS::parse(text.trim()).map(Some)
}

/// Write a `.prj` sidecar next to `path`
pub(crate) fn write_prj(path: &Path, crs: &CRS) -> Result<()> {
    let Some(wkt) = crs.to_wkt() else {
        warn!("no WKT known for {}; skipping .prj", crs.identifier());
        return Ok(());
    };
    let prj = path.with_extension("prj");
    fs::write(&prj, wkt).map_err(|e| Error::file(&prj, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{Extent, GeoTransform};

    fn layer(name: &str, value: f64) -> Raster<f64> {
        let mut r = Raster::filled(4, 6, value).with_name(name);
        r.set_transform(GeoTransform::from_extent(&Extent::new(-75.0, -69.0, -18.0, -14.0), 4, 6));
        r.set_crs(Some(CRS::wgs84()));
        r
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        assert!(matches!(
            read_raster::<f64, _>("dem.asc"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(matches!(read_vector("roads.kml"), Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = read_raster::<f64, _>("/no/such/dir/dem.tif").unwrap_err();
        assert!(matches!(err, Error::FileAccess { .. }));
        assert!(err.to_string().contains("dem.tif"));
    }

    #[test]
    fn stack_from_directory_in_natural_order() {
        let dir = tempfile::tempdir().unwrap();
        for (i, month) in [1, 2, 10].into_iter().enumerate() {
            write_raster(&layer("x", i as f64), dir.path().join(format!("tmin{}.bil", month))).unwrap();
        }
        let stack = read_stack(dir.path(), r"^tmin\d+\.bil$").unwrap();
        assert_eq!(stack.names(), vec!["tmin1", "tmin2", "tmin10"]);
        assert_eq!(stack.layer("tmin10").unwrap().value_f64(0, 0), Some(2.0));
        assert_eq!(stack.crs().and_then(|c| c.epsg()), Some(4326));
    }

    #[test]
    fn grd_stack_keeps_double_precision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clim.grd");
        let mut fine = layer("fine", 0.1);
        fine.set(2, 3, 12.345678901).unwrap();
        let stack = RasterStack::from_layers(vec![fine, layer("tiny", 1e-7)]).unwrap();
        write_stack(&stack, &path).unwrap();

        let back = read_raster_stack(&path).unwrap();
        assert_eq!(back.names(), vec!["fine", "tiny"]);
        for (written, read) in stack.iter().zip(back.iter()) {
            assert_eq!(read.data(), written.data());
        }
        assert_eq!(back.layer("fine").unwrap().get(2, 3).unwrap(), 12.345678901);
    }

    #[test]
    fn prj_sidecar_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zone.bil");
        write_prj(&path, &CRS::utm(18, false)).unwrap();
        let crs = read_prj(&path).unwrap().unwrap();
        assert_eq!(crs.epsg(), Some(32718));
    }
}
