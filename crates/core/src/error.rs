//! Error types for geodeck

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for geodeck operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot open {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Geotransform mismatch between layers '{0}' and '{1}'")]
    TransformMismatch(String, String),

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Invalid CRS definition: '{0}'")]
    InvalidCrs(String),

    #[error("Unsupported CRS for reprojection: {0}")]
    UnsupportedCrs(String),

    #[error("CRS is not set")]
    MissingCrs,

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Malformed header in {file}: {reason}")]
    Header { file: String, reason: String },

    #[error("No files in {dir} match pattern '{pattern}'")]
    NoMatchingFiles { dir: PathBuf, pattern: String },

    #[error("Extent ({xmin}, {xmax}, {ymin}, {ymax}) does not overlap the raster")]
    ExtentOutside {
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
    },

    #[error("Aggregation factor {factor} does not evenly divide {cells} {axis}")]
    IndivisibleFactor {
        factor: usize,
        cells: usize,
        axis: &'static str,
    },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Features mix geometry types ({first} and {other}); a layer holds one type")]
    MixedGeometryTypes { first: String, other: String },

    #[error("Parse error at line {line}, column '{column}': {reason}")]
    Parse {
        line: usize,
        column: String,
        reason: String,
    },

    #[error("WKT error: {0}")]
    Wkt(String),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid regular expression: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap an I/O error with the path that caused it
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FileAccess {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for geodeck operations
pub type Result<T> = std::result::Result<T, Error>;
