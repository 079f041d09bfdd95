//! # geodeck colormap
//!
//! Everything that turns data into pictures:
//!
//! - color schemes with a multi-stop interpolation engine
//! - raster → RGBA conversion ([`raster_to_rgba`])
//! - static PNG plots of rasters, stacks and feature collections ([`plot`])
//! - interactive Leaflet pages ([`WebMap`])
//! - KMZ export for Google Earth ([`kmz`])
//!
//! ## Usage
//!
//! ```ignore
//! use geodeck_colormap::{plot_raster, ColorScheme, PlotOptions};
//!
//! let options = PlotOptions { scheme: ColorScheme::Temperature, ..Default::default() };
//! plot_raster(&tmin, &options)?.save_png("tmin.png")?;
//! ```

mod error;
pub mod kmz;
pub mod plot;
mod render;
mod scheme;
mod web_map;

pub use error::{RenderError, Result};
pub use kmz::{write_kmz_features, write_kmz_raster};
pub use plot::{
    encode_png, level_plot, overlay_features, plot_features, plot_raster, raster_image, save_png, MapFrame, Plot,
    PlotOptions,
};
pub use render::{auto_params, auto_params_stack, raster_to_rgba, ColormapParams};
pub use scheme::{category, evaluate, ColorScheme, ColorStop, Rgb};
pub use web_map::WebMap;
