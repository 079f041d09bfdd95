//! Native grid format of the R `raster` package: a `.grd` INI-style header
//! next to a `.gri` binary file. Multi-band files map to a [`RasterStack`].

use super::raw::{self, BandLayout, Endian, RawLayout};
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{CellType, Extent, GeoTransform, Raster, RasterElement, RasterStack};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

const LAYER_SEPARATOR: &str = ":|:";

fn datatype_name(cell: CellType) -> &'static str {
    match cell {
        CellType::Int8 => "INT1S",
        CellType::UInt8 => "INT1U",
        CellType::Int16 => "INT2S",
        CellType::UInt16 => "INT2U",
        CellType::Int32 => "INT4S",
        CellType::UInt32 => "INT4U",
        CellType::Float32 => "FLT4S",
        CellType::Float64 => "FLT8S",
    }
}

fn parse_datatype(name: &str) -> Option<CellType> {
    match name.trim().to_ascii_uppercase().as_str() {
        "INT1S" => Some(CellType::Int8),
        "INT1U" | "LOG1S" => Some(CellType::UInt8),
        "INT2S" => Some(CellType::Int16),
        "INT2U" => Some(CellType::UInt16),
        "INT4S" => Some(CellType::Int32),
        "INT4U" => Some(CellType::UInt32),
        "FLT4S" => Some(CellType::Float32),
        "FLT8S" => Some(CellType::Float64),
        _ => None,
    }
}

/// `section.key` → value, keys lower-cased
fn parse_ini(text: &str) -> HashMap<String, String> {
    let mut section = String::new();
    let mut fields = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = name.trim().to_ascii_lowercase();
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            fields.insert(
                format!("{}.{}", section, key.trim().to_ascii_lowercase()),
                value.trim().to_string(),
            );
        }
    }
    fields
}

struct GrdHeader {
    raw: RawLayout,
    extent: Extent,
    crs: Option<CRS>,
    nodata: Option<f64>,
    names: Vec<String>,
}

fn parse_header(text: &str, file: &str) -> Result<GrdHeader> {
    let fields = parse_ini(text);
    let require = |key: &str| -> Result<&String> {
        fields.get(key).ok_or_else(|| Error::Header {
            file: file.to_string(),
            reason: format!("missing {}", key),
        })
    };
    let number = |key: &str| -> Result<f64> { raw::header_number(file, key, require(key)?) };

    let rows = number("georeference.nrows")? as usize;
    let cols = number("georeference.ncols")? as usize;
    let extent = Extent::new(
        number("georeference.xmin")?,
        number("georeference.xmax")?,
        number("georeference.ymin")?,
        number("georeference.ymax")?,
    );

    let datatype = require("data.datatype")?;
    let cell_type = parse_datatype(datatype)
        .ok_or_else(|| Error::UnsupportedDataType(format!("grd datatype {}", datatype)))?;
    let endian = match fields.get("data.byteorder").map(|b| b.to_ascii_lowercase()) {
        Some(b) if b == "big" => Endian::Big,
        _ => Endian::Little,
    };
    let bands = match fields.get("data.nbands") {
        Some(n) => raw::header_number(file, "data.nbands", n)? as usize,
        None => 1,
    }
    .max(1);
    let layout = match fields.get("data.bandorder") {
        Some(order) => BandLayout::parse(order).ok_or_else(|| Error::Header {
            file: file.to_string(),
            reason: format!("unknown bandorder {}", order),
        })?,
        None => BandLayout::Bil,
    };

    let nodata = match fields.get("data.nodatavalue") {
        Some(v) => Some(raw::header_number(file, "data.nodatavalue", v)?),
        None => None,
    };
    let crs = fields
        .get("georeference.projection")
        .map(|p| p.trim())
        .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case("NA"))
        .map(CRS::parse)
        .transpose()?;
    let names = fields
        .get("description.layername")
        .map(|n| n.split(LAYER_SEPARATOR).map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();

    Ok(GrdHeader {
        raw: RawLayout {
            rows,
            cols,
            bands,
            cell_type,
            endian,
            layout,
        },
        extent,
        crs,
        nodata,
        names,
    })
}

fn read_grd_bands<T: RasterElement>(path: &Path) -> Result<Vec<Raster<T>>> {
    let grd_path = path.with_extension("grd");
    let text = fs::read_to_string(&grd_path).map_err(|e| Error::file(&grd_path, e))?;
    let header = parse_header(&text, &grd_path.display().to_string())?;

    let gri_path = path.with_extension("gri");
    let bands = raw::read_bands(&mut raw::open_data(&gri_path, &header.raw)?, &header.raw)?;
    let transform = GeoTransform::from_extent(&header.extent, header.raw.rows, header.raw.cols);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("layer")
        .to_string();

    debug!(
        "read grd {} ({}x{}, {} band(s))",
        grd_path.display(),
        header.raw.rows,
        header.raw.cols,
        bands.len()
    );

    let nbands = bands.len();
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
            raster.set_transform(transform);
            raster.set_crs(header.crs.clone());
            let name = match header.names.get(i) {
                Some(name) if !name.is_empty() => name.clone(),
                _ if nbands == 1 => stem.clone(),
                _ => format!("{}.{}", stem, i + 1),
            };
            raster.set_name(name);
            Ok(raster)
        })
        .collect()
}

/// Read the first band of a `.grd`/`.gri` pair
pub fn read_grd<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    read_grd_bands(path)?.into_iter().next().ok_or_else(|| Error::Header {
        file: path.display().to_string(),
        reason: "no bands".into(),
    })
}

/// Read every band of a `.grd`/`.gri` pair into a stack
pub fn read_grd_stack<P: AsRef<Path>>(path: P) -> Result<RasterStack> {
    RasterStack::from_layers(read_grd_bands::<f64>(path.as_ref())?)
}

fn write_grd_bands<T: RasterElement>(layers: &[&Raster<T>], path: &Path, cell_type: CellType) -> Result<()> {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("layer");
    let first = layers.first().ok_or_else(|| Error::InvalidParameter {
        name: "layers",
        value: "0".into(),
        reason: "nothing to write".into(),
    })?;
    let raw = RawLayout {
        rows: first.rows(),
        cols: first.cols(),
        bands: layers.len(),
        cell_type,
        endian: Endian::Little,
        layout: BandLayout::Bil,
    };
    let nodata = raw::nodata_for(first, cell_type);
    let bands: Vec<Vec<f64>> = layers
        .iter()
        .map(|layer| raw::raster_to_samples(layer, nodata))
        .collect();

    let (min, max) = bands
        .iter()
        .flatten()
        .filter(|v| **v != nodata)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let extent = first.extent();
    let projection = first
        .crs()
        .map(|c| c.to_proj4().unwrap_or_else(|| c.identifier()))
        .unwrap_or_else(|| "NA".to_string());
    let names: Vec<String> = layers
        .iter()
        .enumerate()
        .map(|(i, l)| match l.name() {
            Some(name) => name.to_string(),
            None if layers.len() == 1 => stem.to_string(),
            None => format!("{}.{}", stem, i + 1),
        })
        .collect();

    let header = format!(
        "[general]\ncreator=geodeck\n\
         [georeference]\nnrows={}\nncols={}\nxmin={}\nymin={}\nxmax={}\nymax={}\nprojection={}\n\
         [data]\ndatatype={}\nbyteorder=little\nnbands={}\nbandorder=BIL\ncategorical=FALSE\n\
         minvalue={}\nmaxvalue={}\nnodatavalue={}\n\
         [description]\nlayername={}\n",
        raw.rows,
        raw.cols,
        extent.xmin,
        extent.ymin,
        extent.xmax,
        extent.ymax,
        projection,
        datatype_name(cell_type),
        raw.bands,
        raw::format_number(if min.is_finite() { min } else { nodata }),
        raw::format_number(if max.is_finite() { max } else { nodata }),
        raw::format_number(nodata),
        names.join(LAYER_SEPARATOR),
    );

    let grd_path = path.with_extension("grd");
    fs::write(&grd_path, header).map_err(|e| Error::file(&grd_path, e))?;

    let gri_path = path.with_extension("gri");
    let file = File::create(&gri_path).map_err(|e| Error::file(&gri_path, e))?;
    let mut writer = BufWriter::new(file);
    raw::write_bands(&mut writer, &raw, &bands)?;
    writer.flush().map_err(|e| Error::file(&gri_path, e))?;
    debug!("wrote grd {} ({} band(s))", grd_path.display(), raw.bands);
    Ok(())
}

/// Write one raster in its own cell type
pub fn write_grd<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    write_grd_bands(&[raster], path.as_ref(), T::CELL_TYPE)
}

/// Write a stack as one multi-band file with the given cell type
pub fn write_grd_stack<P: AsRef<Path>>(stack: &RasterStack, path: P, cell_type: CellType) -> Result<()> {
    let layers: Vec<&Raster<f64>> = stack.iter().collect();
    write_grd_bands(&layers, path.as_ref(), cell_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(name: &str, offset: f64) -> Raster<f64> {
        let mut r = Raster::from_vec((0..6).map(|v| v as f64 * 0.25 + offset).collect(), 2, 3).unwrap();
        r.set_transform(GeoTransform::from_extent(&Extent::new(-80.0, -77.0, -2.0, 0.0), 2, 3));
        r.set_crs(Some(CRS::wgs84()));
        r.with_name(name)
    }

    #[test]
    fn header_sections_are_parsed() {
        let text = "[georeference]\nnrows=2\nncols=3\nxmin=0\nymin=0\nxmax=3\nymax=2\n\
                    projection=+proj=longlat +datum=WGS84 +no_defs\n\
                    [data]\ndatatype=INT2S\nbyteorder=big\nnbands=2\nbandorder=BSQ\nnodatavalue=-32768\n\
                    [description]\nlayername=a:|:b\n";
        let header = parse_header(text, "t.grd").unwrap();
        assert_eq!(header.raw.cell_type, CellType::Int16);
        assert_eq!(header.raw.endian, Endian::Big);
        assert_eq!(header.raw.layout, BandLayout::Bsq);
        assert_eq!(header.names, vec!["a", "b"]);
        assert_eq!(header.crs.and_then(|c| c.epsg()), Some(4326));
    }

    #[test]
    fn stack_round_trip_keeps_names_and_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmin.grd");
        let mut first = layer("tmin1", 0.0);
        first.set(1, 1, f64::NAN).unwrap();
        let stack = RasterStack::from_layers(vec![first, layer("tmin2", 10.0)]).unwrap();
        write_grd_stack(&stack, &path, CellType::Float64).unwrap();

        let back = read_grd_stack(&path).unwrap();
        assert_eq!(back.names(), vec!["tmin1", "tmin2"]);
        assert_eq!(back.extent(), stack.extent());
        assert_eq!(back.layer("tmin2").unwrap().value_f64(1, 2), Some(11.25));
        assert_eq!(back.layer("tmin1").unwrap().value_f64(1, 1), None);
    }

    #[test]
    fn single_int_layer_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alt.grd");
        let mut r = Raster::from_vec(vec![120i32, 450, 2300, -2147483647], 2, 2).unwrap();
        r.set_nodata(Some(-2147483647));
        write_grd(&r, &path).unwrap();
        let back: Raster<i32> = read_grd(&path).unwrap();
        assert_eq!(back.data(), r.data());
        assert_eq!(back.nodata(), Some(-2147483647));
        assert_eq!(back.name(), Some("alt"));
    }
}
