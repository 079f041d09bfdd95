//! Vector operations
//!
//! - Transform: reproject every coordinate of a feature collection
//! - Measurements: planar and geodesic area, length, perimeter
//! - Spatial: centroid, bounding box, label points

mod measurements;
mod spatial;
mod transform;

pub use measurements::{area, feature_areas, geodesic_area, length, perimeter};
pub use spatial::{bounding_box, centroid, label_point, label_points};
pub use transform::{transform, transform_geometry};
