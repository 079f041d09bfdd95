//! Raster operations
//!
//! - Crop: narrow the extent, snapping to whole cells
//! - Aggregate / disaggregate: change resolution by an integer factor
//! - Extract: read cell values at point locations
//! - Project: reproject onto a grid in another CRS
//!
//! Every operation has a stack variant that applies it layer by layer,
//! so the stack's shared-grid invariant holds for the result.

mod aggregate;
mod crop;
mod extract;
mod project;

pub use aggregate::{
    aggregate, disaggregate, Aggregate, AggregateParams, Disaggregate, DisaggregateParams, Reducer,
    Remainder,
};
pub use crop::crop;
pub use extract::{extract, extract_stack, sample_points, ExtractTable};
pub use project::{project_raster, transform_extent, ProjectParams, Resample};

use geodeck_core::raster::{Extent, RasterStack};
use geodeck_core::{Result, CRS};

/// Crop every layer of a stack
pub fn crop_stack(stack: &RasterStack, extent: &Extent) -> Result<RasterStack> {
    stack.map_layers(|layer| crop(layer, extent))
}

/// Aggregate every layer of a stack
pub fn aggregate_stack(stack: &RasterStack, params: &AggregateParams) -> Result<RasterStack> {
    stack.map_layers(|layer| aggregate(layer, params))
}

/// Reproject every layer of a stack onto the same target grid
pub fn project_stack(stack: &RasterStack, target: &CRS, params: &ProjectParams) -> Result<RasterStack> {
    stack.map_layers(|layer| project_raster(layer, target, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodeck_core::{GeoTransform, Raster};

    fn stack() -> RasterStack {
        let layers = ["tmin1", "tmin2", "tmin3"].iter().enumerate().map(|(i, name)| {
            let mut r = Raster::filled(6, 12, i as f64).with_name(*name);
            r.set_transform(GeoTransform::new(-75.0, -15.0, 0.5, -0.5));
            r.set_crs(Some(CRS::wgs84()));
            r
        });
        RasterStack::from_layers(layers).unwrap()
    }

    #[test]
    fn stack_variants_keep_names_and_shared_grid() {
        let s = stack();
        let cropped = crop_stack(&s, &Extent::new(-74.0, -72.0, -17.0, -16.0)).unwrap();
        assert_eq!(cropped.names(), vec!["tmin1", "tmin2", "tmin3"]);
        assert_eq!(cropped.shape(), Some((2, 4)));

        let coarse = aggregate_stack(&s, &AggregateParams::new(3, Reducer::Mean)).unwrap();
        assert_eq!(coarse.shape(), Some((2, 4)));
        assert_eq!(coarse.layer("tmin3").unwrap().value_f64(1, 3), Some(2.0));

        let merc = project_stack(&s, &CRS::web_mercator(), &ProjectParams::default()).unwrap();
        assert_eq!(merc.nlayers(), 3);
        assert_eq!(merc.crs().and_then(|c| c.epsg()), Some(3857));
    }

    #[test]
    fn indivisible_factor_fails_the_whole_stack() {
        let err = aggregate_stack(&stack(), &AggregateParams::new(4, Reducer::Mean)).unwrap_err();
        assert!(matches!(err, geodeck_core::Error::IndivisibleFactor { .. }));
    }
}
