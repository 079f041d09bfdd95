//! Raster-to-RGBA rendering using color schemes.

use crate::scheme::{evaluate, ColorScheme, Rgb};
use geodeck_core::raster::{Raster, RasterElement, RasterStack};

/// Parameters for colormap rendering.
#[derive(Debug, Clone)]
pub struct ColormapParams {
    /// Color scheme to use.
    pub scheme: ColorScheme,
    /// Minimum value for normalization. Values below this are clamped.
    pub min: f64,
    /// Maximum value for normalization. Values above this are clamped.
    pub max: f64,
    /// Color for nodata pixels (RGBA). Default: fully transparent.
    pub nodata_color: [u8; 4],
}

impl ColormapParams {
    /// Create params with the given scheme; min/max must be set separately
    /// or use [`auto_params`] to detect from data.
    pub fn new(scheme: ColorScheme) -> Self {
        Self::with_range(scheme, 0.0, 1.0)
    }

    /// Create params with explicit min/max range.
    pub fn with_range(scheme: ColorScheme, min: f64, max: f64) -> Self {
        Self {
            scheme,
            min,
            max,
            nodata_color: [0, 0, 0, 0],
        }
    }

    /// Position of `value` in the range, unclamped
    pub fn normalize(&self, value: f64) -> f64 {
        let range = self.max - self.min;
        if range.abs() > f64::EPSILON {
            (value - self.min) / range
        } else {
            0.0
        }
    }

    /// RGBA color of a value; non-finite values get the nodata color
    pub fn color(&self, value: f64) -> [u8; 4] {
        if !value.is_finite() {
            return self.nodata_color;
        }
        let Rgb { r, g, b } = evaluate(self.scheme, self.normalize(value));
        [r, g, b, 255]
    }
}

/// Min/max of the finite values, widened so the range is never empty
fn finite_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

    // Handle edge case: all nodata or constant raster
    if !min.is_finite() || !max.is_finite() {
        (0.0, 1.0)
    } else if (max - min).abs() < f64::EPSILON {
        (min, min + 1.0)
    } else {
        (min, max)
    }
}

fn valid_values<T: RasterElement>(raster: &Raster<T>) -> impl Iterator<Item = f64> + '_ {
    let nodata = raster.nodata();
    raster
        .data()
        .iter()
        .filter(move |v| !v.is_nodata(nodata))
        .filter_map(|v| v.to_f64())
}

/// Auto-detect min/max from a raster, returning `ColormapParams` ready to use.
///
/// Scans all valid (non-nodata) cells to find the data range.
pub fn auto_params<T: RasterElement>(raster: &Raster<T>, scheme: ColorScheme) -> ColormapParams {
    let (min, max) = finite_range(valid_values(raster));
    ColormapParams::with_range(scheme, min, max)
}

/// One range over every layer of a stack, so panels share a color scale.
pub fn auto_params_stack(stack: &RasterStack, scheme: ColorScheme) -> ColormapParams {
    let (min, max) = finite_range(stack.iter().flat_map(|layer| valid_values(layer)));
    ColormapParams::with_range(scheme, min, max)
}

/// Convert a raster to an RGBA pixel buffer.
///
/// Returns a `Vec<u8>` of length `rows * cols * 4` in row-major order.
/// Nodata pixels are rendered with `params.nodata_color` (default: transparent black).
pub fn raster_to_rgba<T: RasterElement>(raster: &Raster<T>, params: &ColormapParams) -> Vec<u8> {
    let nodata = raster.nodata();
    let mut rgba = Vec::with_capacity(raster.len() * 4);

    for val in raster.data().iter() {
        let pixel = if val.is_nodata(nodata) {
            params.nodata_color
        } else {
            params.color(val.to_f64().unwrap_or(f64::NAN))
        };
        rgba.extend_from_slice(&pixel);
    }

    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_to_rgba_basic() {
        let mut r = Raster::<f64>::new(2, 2);
        r.set(0, 0, 0.0).unwrap();
        r.set(0, 1, 0.5).unwrap();
        r.set(1, 0, 1.0).unwrap();
        r.set(1, 1, f64::NAN).unwrap();
        r.set_nodata(Some(f64::NAN));

        let params = ColormapParams::with_range(ColorScheme::Grayscale, 0.0, 1.0);
        let rgba = raster_to_rgba(&r, &params);

        assert_eq!(rgba.len(), 16);
        assert_eq!(&rgba[0..4], &[0, 0, 0, 255]);
        assert_eq!(&rgba[4..8], &[128, 128, 128, 255]);
        assert_eq!(&rgba[8..12], &[255, 255, 255, 255]);
        // NaN -> transparent
        assert_eq!(&rgba[12..16], &[0, 0, 0, 0]);
    }

    #[test]
    fn integer_sentinel_is_transparent() {
        let mut r: Raster<i16> = Raster::from_vec(vec![-9999, 100], 1, 2).unwrap();
        r.set_nodata(Some(-9999));
        let params = auto_params(&r, ColorScheme::Terrain);
        assert!((params.min - 100.0).abs() < f64::EPSILON);
        let rgba = raster_to_rgba(&r, &params);
        assert_eq!(rgba[3], 0);
        assert_eq!(rgba[7], 255);
    }

    #[test]
    fn auto_params_range() {
        let r = Raster::from_vec(vec![10.0, 50.0, 100.0], 1, 3).unwrap();
        let params = auto_params(&r, ColorScheme::Terrain);
        assert!((params.min - 10.0).abs() < f64::EPSILON);
        assert!((params.max - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn auto_params_all_nodata() {
        let mut r = Raster::<f64>::filled(1, 2, f64::NAN);
        r.set_nodata(Some(f64::NAN));
        let params = auto_params(&r, ColorScheme::Terrain);
        assert!((params.min - 0.0).abs() < f64::EPSILON);
        assert!((params.max - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn auto_params_constant_raster() {
        let r = Raster::<f64>::filled(2, 2, 42.0);
        let params = auto_params(&r, ColorScheme::Terrain);
        assert!((params.min - 42.0).abs() < f64::EPSILON);
        assert!((params.max - 43.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stack_range_spans_all_layers() {
        let a = Raster::filled(2, 2, 1.0).with_name("a");
        let b = Raster::filled(2, 2, 9.0).with_name("b");
        let stack = RasterStack::from_layers(vec![a, b]).unwrap();
        let params = auto_params_stack(&stack, ColorScheme::Viridis);
        assert_eq!((params.min, params.max), (1.0, 9.0));
    }
}
