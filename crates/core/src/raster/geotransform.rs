//! Affine geotransformation for rasters

use super::Extent;
use serde::{Deserialize, Serialize};

/// Affine transformation coefficients for georeferencing rasters.
///
/// Converts between pixel coordinates (col, row) and map coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// For north-up grids the rotations are 0 and `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Cell size in X direction
    pub pixel_width: f64,
    /// Cell size in Y direction, usually negative
    pub pixel_height: f64,
    /// Rotation about X axis (usually 0)
    pub row_rotation: f64,
    /// Rotation about Y axis (usually 0)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a new GeoTransform with no rotation (north-up grid)
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// North-up transform covering `extent` with `rows` x `cols` cells
    pub fn from_extent(extent: &Extent, rows: usize, cols: usize) -> Self {
        Self::new(
            extent.xmin,
            extent.ymax,
            extent.width() / cols.max(1) as f64,
            -extent.height() / rows.max(1) as f64,
        )
    }

    /// Create from GDAL-style array [origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    /// Convert to GDAL-style array
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Map coordinates of the pixel center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.fractional_to_geo(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Map coordinates of the pixel's top-left corner
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        self.fractional_to_geo(col as f64, row as f64)
    }

    /// Map coordinates of a fractional pixel position
    pub fn fractional_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Convert map coordinates to fractional pixel coordinates (col, row).
    ///
    /// Use `.floor()` to get integer indices.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;

        if det.abs() < 1e-15 {
            return (f64::NAN, f64::NAN);
        }

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;

        (col, row)
    }

    /// Cell size as (x, y), both positive
    pub fn resolution(&self) -> (f64, f64) {
        (self.pixel_width.abs(), self.pixel_height.abs())
    }

    /// Get the cell size (assumes square pixels and no rotation)
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Check if this is a north-up grid (no rotation)
    pub fn is_north_up(&self) -> bool {
        self.row_rotation.abs() < 1e-10
            && self.col_rotation.abs() < 1e-10
            && self.pixel_height < 0.0
    }

    /// Calculate the bounding box (min_x, min_y, max_x, max_y) for a raster of given dimensions
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let (x0, y0) = self.pixel_to_geo_corner(0, 0);
        let (x1, y1) = self.pixel_to_geo_corner(width, 0);
        let (x2, y2) = self.pixel_to_geo_corner(0, height);
        let (x3, y3) = self.pixel_to_geo_corner(width, height);

        let min_x = x0.min(x1).min(x2).min(x3);
        let max_x = x0.max(x1).max(x2).max(x3);
        let min_y = y0.min(y1).min(y2).min(y3);
        let max_y = y0.max(y1).max(y2).max(y3);

        (min_x, min_y, max_x, max_y)
    }

    /// Extent of a raster of `cols` x `rows` cells
    pub fn extent(&self, cols: usize, rows: usize) -> Extent {
        Extent::from_bounds(self.bounds(cols, rows))
    }

    /// Same grid shifted so that `(col, row)` becomes the origin
    pub fn offset(&self, col: usize, row: usize) -> Self {
        let (origin_x, origin_y) = self.pixel_to_geo_corner(col, row);
        Self {
            origin_x,
            origin_y,
            ..*self
        }
    }

    /// Same origin, cells scaled by the given factors
    pub fn scaled(&self, factor_x: f64, factor_y: f64) -> Self {
        Self {
            pixel_width: self.pixel_width * factor_x,
            pixel_height: self.pixel_height * factor_y,
            row_rotation: self.row_rotation * factor_y,
            col_rotation: self.col_rotation * factor_x,
            ..*self
        }
    }

    /// Coefficient-wise comparison, `tolerance` is a fraction of the cell size
    pub fn approx_eq(&self, other: &GeoTransform, tolerance: f64) -> bool {
        let scale = self.pixel_width.abs().max(self.pixel_height.abs()).max(1e-12);
        self.to_gdal()
            .iter()
            .zip(other.to_gdal().iter())
            .all(|(a, b)| (a - b).abs() <= tolerance * scale)
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_to_geo_roundtrip() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);

        let (x, y) = gt.pixel_to_geo(5, 10);
        let (col, row) = gt.geo_to_pixel(x, y);

        assert_relative_eq!(col, 5.5, epsilon = 1e-10);
        assert_relative_eq!(row, 10.5, epsilon = 1e-10);
    }

    #[test]
    fn extent_round_trip() {
        let extent = Extent::new(-180.0, 180.0, -60.0, 90.0);
        let gt = GeoTransform::from_extent(&extent, 900, 2160);
        assert_relative_eq!(gt.pixel_width, 1.0 / 6.0, epsilon = 1e-12);
        assert_relative_eq!(gt.pixel_height, -1.0 / 6.0, epsilon = 1e-12);

        let back = gt.extent(2160, 900);
        assert_relative_eq!(back.xmin, -180.0, epsilon = 1e-9);
        assert_relative_eq!(back.ymax, 90.0, epsilon = 1e-9);
        assert_relative_eq!(back.ymin, -60.0, epsilon = 1e-9);
    }

    #[test]
    fn offset_and_scale() {
        let gt = GeoTransform::new(0.0, 100.0, 1.0, -1.0);
        let shifted = gt.offset(10, 20);
        assert_relative_eq!(shifted.origin_x, 10.0);
        assert_relative_eq!(shifted.origin_y, 80.0);

        let coarse = gt.scaled(4.0, 4.0);
        assert_eq!(coarse.resolution(), (4.0, 4.0));
        assert!(gt.approx_eq(&GeoTransform::new(0.0, 100.0 + 1e-12, 1.0, -1.0), 1e-9));
        assert!(!gt.approx_eq(&coarse, 1e-9));
    }
}
