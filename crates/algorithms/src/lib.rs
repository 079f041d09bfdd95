//! # geodeck algorithms
//!
//! Operations on geodeck rasters and feature collections.
//!
//! ## Available Algorithm Categories
//!
//! - **raster**: crop, aggregate, disaggregate, extract, project (plus stack variants)
//! - **vector**: reprojection, area, centroid, bounding box

pub mod raster;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::raster::{
        aggregate, aggregate_stack, crop, crop_stack, disaggregate, extract, extract_stack,
        project_raster, project_stack, Aggregate, AggregateParams, ExtractTable, ProjectParams,
        Reducer, Remainder, Resample,
    };
    pub use crate::vector::{area, centroid, feature_areas, transform};
    pub use geodeck_core::prelude::*;
}
