//! # geodeck core
//!
//! Core types, traits and I/O for the geodeck workflow.
//!
//! This crate provides:
//! - `Raster<T>` and `RasterStack`: georeferenced grids and named layer stacks
//! - `GeoTransform` and `Extent`: affine georeferencing
//! - `CRS`: coordinate reference systems and pure-Rust projection math
//! - `FeatureCollection`: vector features with table operations
//! - I/O for GeoTIFF, BIL, R native grids, GeoJSON, Shapefile and CSV points

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{Extent, GeoTransform, Raster, RasterElement, RasterStack};
pub use vector::{AttributeValue, Feature, FeatureCollection};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{Transformer, CRS};
    pub use crate::error::{Error, Result};
    pub use crate::raster::{Extent, GeoTransform, Raster, RasterElement, RasterStack};
    pub use crate::vector::{AttributeValue, Feature, FeatureCollection, Summary};
    pub use crate::Algorithm;
}

/// Core trait for the workflow's processing steps.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
