//! Raw binary cell data shared by the header-plus-binary formats (BIL, GRD)

use crate::error::{Error, Result};
use crate::raster::{CellType, Raster, RasterElement};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

/// Byte order of the binary file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Interleaving of bands in a multi-band file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandLayout {
    /// Band interleaved by line
    Bil,
    /// Band sequential
    Bsq,
    /// Band interleaved by pixel
    Bip,
}

impl BandLayout {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_uppercase().as_str() {
            "BIL" => Some(BandLayout::Bil),
            "BSQ" => Some(BandLayout::Bsq),
            "BIP" => Some(BandLayout::Bip),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BandLayout::Bil => "BIL",
            BandLayout::Bsq => "BSQ",
            BandLayout::Bip => "BIP",
        }
    }

    /// Position of (band, row, col) in the flat sample sequence
    fn index(&self, band: usize, row: usize, col: usize, rows: usize, cols: usize, bands: usize) -> usize {
        match self {
            BandLayout::Bil => (row * bands + band) * cols + col,
            BandLayout::Bsq => (band * rows + row) * cols + col,
            BandLayout::Bip => (row * cols + col) * bands + band,
        }
    }
}

/// Grid description shared by the readers and writers
#[derive(Debug, Clone, Copy)]
pub struct RawLayout {
    pub rows: usize,
    pub cols: usize,
    pub bands: usize,
    pub cell_type: CellType,
    pub endian: Endian,
    pub layout: BandLayout,
}

impl RawLayout {
    /// Bytes of cell data the header describes, `None` on overflow
    pub fn byte_len(&self) -> Option<u64> {
        [self.cols, self.bands, self.cell_type.size()]
            .into_iter()
            .try_fold(self.rows as u64, |total, n| total.checked_mul(n as u64))
    }
}

/// Open a binary data file after checking its size against the header
pub fn open_data(path: &Path, layout: &RawLayout) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|e| Error::file(path, e))?;
    let actual = file.metadata().map_err(|e| Error::file(path, e))?.len();
    match layout.byte_len() {
        Some(expected) if expected == actual => Ok(BufReader::new(file)),
        expected => Err(Error::Header {
            file: path.display().to_string(),
            reason: format!(
                "{} rows x {} cols x {} band(s) of {:?} need {} bytes, file has {}",
                layout.rows,
                layout.cols,
                layout.bands,
                layout.cell_type,
                expected.map_or_else(|| "too many".to_string(), |n| n.to_string()),
                actual
            ),
        }),
    }
}

/// Read every band as f64 samples, one `Vec` per band in row-major order
pub fn read_bands<R: Read>(reader: &mut R, layout: &RawLayout) -> Result<Vec<Vec<f64>>> {
    let cells = layout.rows * layout.cols;
    let samples = match layout.endian {
        Endian::Little => read_samples::<LittleEndian, R>(reader, layout.cell_type, cells * layout.bands)?,
        Endian::Big => read_samples::<BigEndian, R>(reader, layout.cell_type, cells * layout.bands)?,
    };

    let mut bands = vec![Vec::with_capacity(cells); layout.bands];
    for (band, out) in bands.iter_mut().enumerate() {
        for row in 0..layout.rows {
            for col in 0..layout.cols {
                let i = layout
                    .layout
                    .index(band, row, col, layout.rows, layout.cols, layout.bands);
                out.push(samples[i]);
            }
        }
    }
    Ok(bands)
}

/// Write bands (row-major f64 samples) in the requested layout
pub fn write_bands<W: Write>(writer: &mut W, layout: &RawLayout, bands: &[Vec<f64>]) -> Result<()> {
    let total = layout.rows * layout.cols * layout.bands;
    let mut samples = vec![0.0; total];
    for (band, values) in bands.iter().enumerate() {
        for row in 0..layout.rows {
            for col in 0..layout.cols {
                let i = layout
                    .layout
                    .index(band, row, col, layout.rows, layout.cols, layout.bands);
                samples[i] = values[row * layout.cols + col];
            }
        }
    }
    match layout.endian {
        Endian::Little => write_samples::<LittleEndian, W>(writer, layout.cell_type, &samples)?,
        Endian::Big => write_samples::<BigEndian, W>(writer, layout.cell_type, &samples)?,
    }
    Ok(())
}

fn read_samples<B: ByteOrder, R: Read>(reader: &mut R, cell: CellType, count: usize) -> std::io::Result<Vec<f64>> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let v = match cell {
            CellType::Int8 => reader.read_i8()? as f64,
            CellType::UInt8 => reader.read_u8()? as f64,
            CellType::Int16 => reader.read_i16::<B>()? as f64,
            CellType::UInt16 => reader.read_u16::<B>()? as f64,
            CellType::Int32 => reader.read_i32::<B>()? as f64,
            CellType::UInt32 => reader.read_u32::<B>()? as f64,
            CellType::Float32 => reader.read_f32::<B>()? as f64,
            CellType::Float64 => reader.read_f64::<B>()?,
        };
        out.push(v);
    }
    Ok(out)
}

fn write_samples<B: ByteOrder, W: Write>(writer: &mut W, cell: CellType, samples: &[f64]) -> std::io::Result<()> {
    for &v in samples {
        match cell {
            CellType::Int8 => writer.write_i8(v.round() as i8)?,
            CellType::UInt8 => writer.write_u8(v.round() as u8)?,
            CellType::Int16 => writer.write_i16::<B>(v.round() as i16)?,
            CellType::UInt16 => writer.write_u16::<B>(v.round() as u16)?,
            CellType::Int32 => writer.write_i32::<B>(v.round() as i32)?,
            CellType::UInt32 => writer.write_u32::<B>(v.round() as u32)?,
            CellType::Float32 => writer.write_f32::<B>(v as f32)?,
            CellType::Float64 => writer.write_f64::<B>(v)?,
        }
    }
    Ok(())
}

/// Value as it reads back after a trip through `cell`
pub fn quantize(value: f64, cell: CellType) -> f64 {
    match cell {
        CellType::Float32 => value as f32 as f64,
        CellType::Float64 => value,
        _ => value.round(),
    }
}

/// No-data value written for `cell` when the raster has none of its own
pub fn default_nodata(cell: CellType) -> f64 {
    match cell {
        CellType::Int8 => -127.0,
        CellType::UInt8 => 255.0,
        CellType::Int16 => -32768.0,
        CellType::UInt16 => 65535.0,
        CellType::Int32 => -2147483647.0,
        CellType::UInt32 => 4294967295.0,
        CellType::Float32 => -3.4e38,
        CellType::Float64 => -1.7e308,
    }
}

/// Build a raster from samples, mapping the file's no-data value.
///
/// Float rasters get NaN for no-data cells; integer rasters keep the
/// sentinel and record it as their no-data value.
pub fn samples_to_raster<T: RasterElement>(
    samples: Vec<f64>,
    rows: usize,
    cols: usize,
    cell: CellType,
    nodata: Option<f64>,
) -> Result<Raster<T>> {
    let nodata = nodata.map(|nd| quantize(nd, cell));
    let is_nodata = |v: f64| v.is_nan() || nodata.map_or(false, |nd| v == nd);

    let data: Vec<T> = if T::is_float() {
        samples
            .into_iter()
            .map(|v| if is_nodata(v) { T::default_nodata() } else { T::from_f64(v) })
            .collect()
    } else {
        samples.into_iter().map(T::from_f64).collect()
    };

    let mut raster = Raster::from_vec(data, rows, cols)?;
    if T::is_float() {
        raster.set_nodata(Some(T::default_nodata()));
    } else if let Some(nd) = nodata {
        raster.set_nodata(Some(T::from_f64(nd)));
    }
    Ok(raster)
}

/// Cell values of a raster as f64 samples, no-data replaced by `fill`
pub fn raster_to_samples<T: RasterElement>(raster: &Raster<T>, fill: f64) -> Vec<f64> {
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

/// The no-data value to store for a raster written as `cell`
pub fn nodata_for<T: RasterElement>(raster: &Raster<T>, cell: CellType) -> f64 {
    raster
        .nodata()
        .and_then(|nd| nd.to_f64())
        .filter(|nd| nd.is_finite())
        .unwrap_or_else(|| default_nodata(cell))
}

/// Header text for a number; very large or small magnitudes use exponent form
pub fn format_number(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-6..1e15).contains(&magnitude) {
        format!("{:e}", value)
    } else {
        format!("{}", value)
    }
}

/// Parse a numeric header value
pub fn header_number(file: &str, key: &str, value: &str) -> Result<f64> {
    value.trim().parse::<f64>().map_err(|_| Error::Header {
        file: file.to_string(),
        reason: format!("{} = '{}' is not a number", key, value.trim()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn layouts_round_trip_two_bands() {
        let bands = vec![vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0]];
        for layout in [BandLayout::Bil, BandLayout::Bsq, BandLayout::Bip] {
            for endian in [Endian::Little, Endian::Big] {
                let raw = RawLayout {
                    rows: 2,
                    cols: 3,
                    bands: 2,
                    cell_type: CellType::Int16,
                    endian,
                    layout,
                };
                let mut buf = Vec::new();
                write_bands(&mut buf, &raw, &bands).unwrap();
                assert_eq!(buf.len(), 24);
                let back = read_bands(&mut Cursor::new(buf), &raw).unwrap();
                assert_eq!(back, bands);
            }
        }
    }

    #[test]
    fn bil_interleaves_rows() {
        let raw = RawLayout {
            rows: 2,
            cols: 2,
            bands: 2,
            cell_type: CellType::UInt8,
            endian: Endian::Little,
            layout: BandLayout::Bil,
        };
        let mut buf = Vec::new();
        write_bands(&mut buf, &raw, &[vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]]).unwrap();
        assert_eq!(buf, vec![1, 2, 5, 6, 3, 4, 7, 8]);
    }

    #[test]
    fn data_file_size_must_match_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dem.gri");
        std::fs::write(&path, vec![0u8; 10]).unwrap();
        let mut raw = RawLayout {
            rows: 2,
            cols: 3,
            bands: 1,
            cell_type: CellType::Int16,
            endian: Endian::Little,
            layout: BandLayout::Bsq,
        };
        assert!(matches!(open_data(&path, &raw), Err(Error::Header { .. })));

        raw.rows = usize::MAX;
        assert_eq!(raw.byte_len(), None);
        assert!(matches!(open_data(&path, &raw), Err(Error::Header { .. })));

        raw.rows = 1;
        raw.cols = 5;
        let bands = read_bands(&mut open_data(&path, &raw).unwrap(), &raw).unwrap();
        assert_eq!(bands, vec![vec![0.0; 5]]);
    }

    #[test]
    fn float32_nodata_is_matched_after_quantizing() {
        let nd = -3.4e38;
        let samples = vec![1.5, nd as f32 as f64];
        let r: Raster<f64> = samples_to_raster(samples, 1, 2, CellType::Float32, Some(nd)).unwrap();
        assert_eq!(r.value_f64(0, 0), Some(1.5));
        assert_eq!(r.value_f64(0, 1), None);
    }
}
