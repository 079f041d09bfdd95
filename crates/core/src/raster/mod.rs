//! Raster data structures: single grids and layer stacks

mod element;
mod extent;
mod geotransform;
mod grid;
mod stack;

pub use element::{CellType, RasterElement};
pub use extent::Extent;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use stack::RasterStack;
