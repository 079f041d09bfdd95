//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// On-disk cell encoding, shared by the binary grid formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl CellType {
    /// Bytes per cell
    pub fn size(self) -> usize {
        match self {
            CellType::Int8 | CellType::UInt8 => 1,
            CellType::Int16 | CellType::UInt16 => 2,
            CellType::Int32 | CellType::UInt32 | CellType::Float32 => 4,
            CellType::Float64 => 8,
        }
    }

    /// Whether cells hold floating point values
    pub fn is_float(self) -> bool {
        matches!(self, CellType::Float32 | CellType::Float64)
    }

    /// Whether integer cells are signed
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            CellType::Int8 | CellType::Int16 | CellType::Int32 | CellType::Float32 | CellType::Float64
        )
    }
}

/// Trait for types that can be stored in a raster cell.
///
/// This trait bounds the types that can be used as raster values,
/// ensuring they support necessary numeric operations.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Natural on-disk encoding for this type
    const CELL_TYPE: CellType;

    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Whether this type is a floating point type
    fn is_float() -> bool {
        Self::CELL_TYPE.is_float()
    }

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// Convert from f64, falling back to the default no-data value when the
    /// value cannot be represented
    fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            return Self::default_nodata();
        }
        num_traits::cast(value).unwrap_or_else(Self::default_nodata)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty, $cell:expr) => {
        impl RasterElement for $t {
            const CELL_TYPE: CellType = $cell;

            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata.map_or(false, |nd| *self == nd)
            }

            fn from_f64(value: f64) -> Self {
                if value.is_nan() {
                    return Self::default_nodata();
                }
                num_traits::cast(value.round()).unwrap_or_else(Self::default_nodata)
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty, $cell:expr) => {
        impl RasterElement for $t {
            const CELL_TYPE: CellType = $cell;

            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) if nd.is_nan() => false,
                    Some(nd) => (self - nd).abs() <= <$t>::EPSILON * 100.0 * nd.abs().max(1.0),
                    None => false,
                }
            }
        }
    };
}

impl_raster_element_int!(i8, CellType::Int8);
impl_raster_element_int!(i16, CellType::Int16);
impl_raster_element_int!(i32, CellType::Int32);
impl_raster_element_int!(u8, CellType::UInt8);
impl_raster_element_int!(u16, CellType::UInt16);
impl_raster_element_int!(u32, CellType::UInt32);
impl_raster_element_float!(f32, CellType::Float32);
impl_raster_element_float!(f64, CellType::Float64);
