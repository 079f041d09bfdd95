//! ESRI BIL rasters: a `.bil` binary file described by a `.hdr` text header
//!
//! `ULXMAP`/`ULYMAP` give the centre of the upper-left cell, `XDIM`/`YDIM`
//! the cell size. The CRS comes from an optional `.prj` sidecar.

use super::raw::{self, BandLayout, Endian, RawLayout};
use super::{read_prj, write_prj};
use crate::error::{Error, Result};
use crate::raster::{CellType, GeoTransform, Raster, RasterElement, RasterStack};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

#[derive(Debug)]
struct BilHeader {
    raw: RawLayout,
    transform: GeoTransform,
    nodata: Option<f64>,
}

fn parse_header(text: &str, file: &str) -> Result<BilHeader> {
    let fields: HashMap<String, String> = text
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let mut parts = line.splitn(2, char::is_whitespace);
            let key = parts.next()?.to_ascii_uppercase();
            let value = parts.next().unwrap_or("").trim().to_string();
            Some((key, value))
        })
        .collect();

    let header_err = |reason: String| Error::Header {
        file: file.to_string(),
        reason,
    };
    let number = |key: &str| -> Result<Option<f64>> {
        fields
            .get(key)
            .map(|v| raw::header_number(file, key, v))
            .transpose()
    };
    let count = |key: &str| -> Result<Option<usize>> {
        Ok(number(key)?.map(|v| v as usize))
    };

    let rows = count("NROWS")?.ok_or_else(|| header_err("missing NROWS".into()))?;
    let cols = count("NCOLS")?.ok_or_else(|| header_err("missing NCOLS".into()))?;
    let bands = count("NBANDS")?.unwrap_or(1).max(1);
    let nbits = count("NBITS")?.unwrap_or(8);
    let pixel_type = fields
        .get("PIXELTYPE")
        .map(|p| p.to_ascii_uppercase())
        .unwrap_or_default();

    let cell_type = match (nbits, pixel_type.as_str()) {
        (8, "SIGNEDINT") => CellType::Int8,
        (8, _) => CellType::UInt8,
        (16, "SIGNEDINT") => CellType::Int16,
        (16, _) => CellType::UInt16,
        (32, "FLOAT") => CellType::Float32,
        (32, "SIGNEDINT") => CellType::Int32,
        (32, _) => CellType::UInt32,
        (64, "FLOAT") => CellType::Float64,
        (bits, kind) => {
            return Err(Error::UnsupportedDataType(format!(
                "BIL with NBITS {} PIXELTYPE {}",
                bits, kind
            )))
        }
    };

    let endian = match fields.get("BYTEORDER").map(|b| b.to_ascii_uppercase()) {
        Some(b) if b.starts_with('M') => Endian::Big,
        _ => Endian::Little,
    };
    let layout = match fields.get("LAYOUT") {
        Some(l) => BandLayout::parse(l).ok_or_else(|| header_err(format!("unknown LAYOUT {}", l)))?,
        None => BandLayout::Bil,
    };

    let xdim = number("XDIM")?.unwrap_or(1.0);
    let ydim = number("YDIM")?.unwrap_or(1.0);
    let ulx = number("ULXMAP")?.unwrap_or(0.0);
    let uly = number("ULYMAP")?.unwrap_or((rows.saturating_sub(1)) as f64 * ydim);

    Ok(BilHeader {
        raw: RawLayout {
            rows,
            cols,
            bands,
            cell_type,
            endian,
            layout,
        },
        transform: GeoTransform::new(ulx - xdim / 2.0, uly + ydim / 2.0, xdim, -ydim),
        nodata: number("NODATA")?,
    })
}

fn read_bil_bands<T: RasterElement>(path: &Path) -> Result<Vec<Raster<T>>> {
    let hdr_path = path.with_extension("hdr");
    let text = fs::read_to_string(&hdr_path).map_err(|e| Error::file(&hdr_path, e))?;
    let header = parse_header(&text, &hdr_path.display().to_string())?;

    let bands = raw::read_bands(&mut raw::open_data(path, &header.raw)?, &header.raw)?;
    let crs = read_prj(path)?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("layer")
        .to_string();
    let nbands = bands.len();

    debug!(
        "read BIL {} ({}x{}, {} band(s), {:?})",
        path.display(),
        header.raw.rows,
        header.raw.cols,
        nbands,
        header.raw.cell_type
    );

    bands
        .into_iter()
        .enumerate()
        .map(|(i, samples)| {
            let mut raster: Raster<T> = raw::samples_to_raster(
                samples,
                header.raw.rows,
                header.raw.cols,
                header.raw.cell_type,
                header.nodata,
            )?;
            raster.set_transform(header.transform);
            raster.set_crs(crs.clone());
            raster.set_name(if nbands == 1 {
                stem.clone()
            } else {
                format!("{}.{}", stem, i + 1)
            });
            Ok(raster)
        })
        .collect()
}

/// Read the first band of a BIL raster
pub fn read_bil<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    read_bil_bands(path)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::Header {
            file: path.display().to_string(),
            reason: "no bands".into(),
        })
}

/// Read every band of a BIL raster into a stack
pub fn read_bil_stack<P: AsRef<Path>>(path: P) -> Result<RasterStack> {
    RasterStack::from_layers(read_bil_bands::<f64>(path.as_ref())?)
}

fn header_text(raw: &RawLayout, transform: &GeoTransform, nodata: f64) -> String {
    let (xdim, ydim) = transform.resolution();
    let (ulx, uly) = transform.pixel_to_geo(0, 0);
    let nbits = raw.cell_type.size() * 8;
    let pixel_type = if raw.cell_type.is_float() {
        "FLOAT"
    } else if raw.cell_type.is_signed() {
        "SIGNEDINT"
    } else {
        "UNSIGNEDINT"
    };
    let row_bytes = raw.cols * raw.cell_type.size();
    let byte_order = match raw.endian {
        Endian::Little => "I",
        Endian::Big => "M",
    };

    let mut out = String::new();
    let mut line = |key: &str, value: String| {
        out.push_str(&format!("{:<14} {}\n", key, value));
    };
    line("BYTEORDER", byte_order.to_string());
    line("LAYOUT", raw.layout.name().to_string());
    line("NROWS", raw.rows.to_string());
    line("NCOLS", raw.cols.to_string());
    line("NBANDS", raw.bands.to_string());
    line("NBITS", nbits.to_string());
    line("BANDROWBYTES", row_bytes.to_string());
    line("TOTALROWBYTES", (row_bytes * raw.bands).to_string());
    line("PIXELTYPE", pixel_type.to_string());
    line("ULXMAP", format!("{}", ulx));
    line("ULYMAP", format!("{}", uly));
    line("XDIM", format!("{}", xdim));
    line("YDIM", format!("{}", ydim));
    line("NODATA", raw::format_number(nodata));
    out
}

/// Write a single-band BIL raster in the raster's own cell type, with a
/// `.hdr` header and, when the CRS is known, a `.prj` sidecar
pub fn write_bil<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let cell_type = T::CELL_TYPE;
    let raw = RawLayout {
        rows: raster.rows(),
        cols: raster.cols(),
        bands: 1,
        cell_type,
        endian: Endian::Little,
        layout: BandLayout::Bil,
    };
    let nodata = raw::nodata_for(raster, cell_type);

    let hdr_path = path.with_extension("hdr");
    fs::write(&hdr_path, header_text(&raw, raster.transform(), nodata))
        .map_err(|e| Error::file(&hdr_path, e))?;

    let file = File::create(path).map_err(|e| Error::file(path, e))?;
    let mut writer = BufWriter::new(file);
    raw::write_bands(&mut writer, &raw, &[raw::raster_to_samples(raster, nodata)])?;
    writer.flush().map_err(|e| Error::file(path, e))?;

    if let Some(crs) = raster.crs() {
        write_prj(path, crs)?;
    }
    debug!("wrote BIL {}", path.display());
    Ok(())
}
