//! Native GeoTIFF reading/writing with the `tiff` crate
//!
//! Georeferencing is carried by ModelPixelScale + ModelTiepoint (or a
//! ModelTransformation matrix), the CRS by an EPSG entry in the
//! GeoKeyDirectory and no-data by the GDAL_NODATA ASCII tag.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{CellType, GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKindStandard, TiffValue};
use tiff::tags::Tag;
use tracing::debug;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE: u32 = 1024;
const GT_RASTER_TYPE: u32 = 1025;
const GEOGRAPHIC_TYPE: u32 = 2048;
const PROJECTED_CS_TYPE: u32 = 3072;

/// Read a GeoTIFF file into a Raster named after the file stem
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::file(path, e))?;
    let mut raster = decode_geotiff(file)?;
    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        raster.set_name(stem);
    }
    debug!("read GeoTIFF {} ({}x{})", path.display(), raster.rows(), raster.cols());
    Ok(raster)
}

/// Read a GeoTIFF from an in-memory buffer
pub fn read_geotiff_from_buffer<T: RasterElement>(data: &[u8]) -> Result<Raster<T>> {
    decode_geotiff(Cursor::new(data))
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;
    let rows = height as usize;
    let cols = width as usize;

    let values: Vec<f64> = match decoder.read_image()? {
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        _ => return Err(Error::UnsupportedDataType("unsupported TIFF pixel format".to_string())),
    };

    if values.len() != rows * cols {
        // more than one sample per pixel
        return Err(Error::UnsupportedDataType(format!(
            "{} samples for a {}x{} single-band grid",
            values.len(),
            rows,
            cols
        )));
    }

    let nodata = read_nodata(&mut decoder);
    let data: Vec<T> = values
        .into_iter()
        .map(|v| match nodata {
            Some(nd) if v == nd => T::from_f64(nd),
            _ => T::from_f64(v),
        })
        .collect();

    let mut raster = Raster::from_vec(data, rows, cols)?;
    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));
    match nodata {
        Some(nd) => raster.set_nodata(Some(T::from_f64(nd))),
        None if T::is_float() => raster.set_nodata(Some(T::default_nodata())),
        None => {}
    }
    Ok(raster)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE)).ok();
    let tiepoint = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT)).ok();

    if let (Some(scale), Some(tiepoint)) = (&scale, &tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    // 4x4 row-major matrix
    let t = decoder.get_tag_f64_vec(Tag::Unknown(MODEL_TRANSFORMATION)).ok()?;
    if t.len() >= 16 {
        return Some(GeoTransform {
            origin_x: t[3],
            origin_y: t[7],
            pixel_width: t[0],
            pixel_height: t[5],
            row_rotation: t[1],
            col_rotation: t[4],
        });
    }
    None
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u32_vec(Tag::Unknown(GEO_KEY_DIRECTORY)).ok()?;
    // header: [version, revision, minor, count], then 4 values per key
    let count = *keys.get(3)? as usize;
    keys.get(4..)?
        .chunks_exact(4)
        .take(count)
        .find(|key| matches!(key[0], PROJECTED_CS_TYPE | GEOGRAPHIC_TYPE) && key[1] == 0 && key[3] > 0 && key[3] != 32767)
        .map(|key| CRS::from_epsg(key[3]))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(Tag::Unknown(GDAL_NODATA)).ok()?;
    let text = text.trim_end_matches('\0').trim();
    match text.to_ascii_lowercase().as_str() {
        "nan" => Some(f64::NAN),
        other => other.parse::<f64>().ok(),
    }
}

/// Write a Raster to a GeoTIFF file, keeping the raster's own sample type
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::file(path, e))?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer)?;
    writer.flush().map_err(|e| Error::file(path, e))?;
    debug!("wrote GeoTIFF {}", path.display());
    Ok(())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T: RasterElement>(raster: &Raster<T>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_geotiff(raster, &mut Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer)?;
    match T::CELL_TYPE {
        CellType::Float64 => encode_image::<colortype::Gray64Float, _, _>(&mut encoder, raster, &float_cells(raster))?,
        CellType::Float32 => {
            let data: Vec<f32> = float_cells(raster).into_iter().map(|v| v as f32).collect();
            encode_image::<colortype::Gray32Float, _, _>(&mut encoder, raster, &data)?
        }
        CellType::Int8 => encode_image::<colortype::GrayI8, _, _>(&mut encoder, raster, &int_cells::<_, i8>(raster))?,
        CellType::UInt8 => encode_image::<colortype::Gray8, _, _>(&mut encoder, raster, &int_cells::<_, u8>(raster))?,
        CellType::Int16 => encode_image::<colortype::GrayI16, _, _>(&mut encoder, raster, &int_cells::<_, i16>(raster))?,
        CellType::UInt16 => encode_image::<colortype::Gray16, _, _>(&mut encoder, raster, &int_cells::<_, u16>(raster))?,
        CellType::Int32 => encode_image::<colortype::GrayI32, _, _>(&mut encoder, raster, &int_cells::<_, i32>(raster))?,
        CellType::UInt32 => encode_image::<colortype::Gray32, _, _>(&mut encoder, raster, &int_cells::<_, u32>(raster))?,
    }
    Ok(())
}

/// Float cells with no-data replaced by the finite sentinel, or NaN
fn float_cells<T: RasterElement>(raster: &Raster<T>) -> Vec<f64> {
    let fill = finite_nodata(raster).unwrap_or(f64::NAN);
    raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                fill
            } else {
                v.to_f64().unwrap_or(fill)
            }
        })
        .collect()
}

/// Integer cells keep their value; the no-data sentinel is itself a cell value
fn int_cells<T, U>(raster: &Raster<T>) -> Vec<U>
where
    T: RasterElement,
    U: num_traits::NumCast + num_traits::Zero,
{
    raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or_else(U::zero))
        .collect()
}

fn finite_nodata<T: RasterElement>(raster: &Raster<T>) -> Option<f64> {
    raster
        .nodata()
        .and_then(|nd| nd.to_f64())
        .filter(|nd| nd.is_finite())
}

fn encode_image<C, T, W>(encoder: &mut TiffEncoder<W>, raster: &Raster<T>, data: &[C::Inner]) -> Result<()>
where
    C: ColorType,
    [C::Inner]: TiffValue,
    T: RasterElement,
    W: Write + Seek,
{
    let (rows, cols) = raster.shape();
    let mut image = encoder.new_image::<C>(cols as u32, rows as u32)?;
    write_geo_tags(image.encoder(), raster)?;
    image.write_data(data)?;
    Ok(())
}

fn write_geo_tags<T, W>(dir: &mut DirectoryEncoder<'_, W, TiffKindStandard>, raster: &Raster<T>) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let gt = raster.transform();
    if gt.row_rotation == 0.0 && gt.col_rotation == 0.0 {
        let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
        dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])?;
        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        dir.write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])?;
    } else {
        let matrix = [
            gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
            gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        dir.write_tag(Tag::Unknown(MODEL_TRANSFORMATION), &matrix[..])?;
    }

    let geokeys = geo_key_directory(raster.crs());
    dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), &geokeys[..])?;

    if raster.nodata().is_some() {
        let text = match finite_nodata(raster) {
            Some(nd) => format!("{}", nd),
            None => "nan".to_string(),
        };
        dir.write_tag(Tag::Unknown(GDAL_NODATA), text.as_str())?;
    }
    Ok(())
}

/// GeoKeyDirectory entries: model type, raster-is-area and the EPSG code
fn geo_key_directory(crs: Option<&CRS>) -> Vec<u16> {
    let mut keys: Vec<[u16; 4]> = Vec::new();
    match crs.and_then(|c| c.epsg().map(|code| (c.is_geographic(), code))) {
        Some((true, code)) if code <= u16::MAX as u32 => {
            keys.push([GT_MODEL_TYPE as u16, 0, 1, 2]);
            keys.push([GT_RASTER_TYPE as u16, 0, 1, 1]);
            keys.push([GEOGRAPHIC_TYPE as u16, 0, 1, code as u16]);
        }
        Some((false, code)) if code <= u16::MAX as u32 => {
            keys.push([GT_MODEL_TYPE as u16, 0, 1, 1]);
            keys.push([GT_RASTER_TYPE as u16, 0, 1, 1]);
            keys.push([PROJECTED_CS_TYPE as u16, 0, 1, code as u16]);
        }
        _ => {
            keys.push([GT_MODEL_TYPE as u16, 0, 1, 1]);
            keys.push([GT_RASTER_TYPE as u16, 0, 1, 1]);
        }
    }
    let mut directory = vec![1, 1, 0, keys.len() as u16];
    directory.extend(keys.into_iter().flatten());
    directory
}
