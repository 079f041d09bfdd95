//! Vector data: features, collections and their table operations

mod attribute;
mod collection;
mod feature;
mod legacy;
mod points;
mod summarise;

pub use attribute::AttributeValue;
pub use collection::FeatureCollection;
pub use feature::{Feature, GeometryKind};
pub use legacy::LegacyTable;
pub use points::{PointColumns, PointTable};
pub use summarise::{combine_geometries, GroupedCollection, Summary, SummaryOp};
