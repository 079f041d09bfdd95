//! Deck steps
//!
//! Every step names its inputs and its output binding explicitly; nothing
//! is read from ambient state.

use geodeck_algorithms::raster::{AggregateParams, ProjectParams};
use geodeck_colormap::{ColorScheme, PlotOptions};
use geodeck_core::raster::Extent;
use geodeck_core::vector::Summary;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which geocoding service a `geocode` step calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocodeService {
    #[default]
    Nominatim,
    /// Needs the runner's API key
    Google,
}

/// Plot appearance, all optional in the deck file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotStyle {
    pub scheme: ColorScheme,
    pub width: u32,
    pub height: u32,
    /// Fixed color scale range
    pub range: Option<(f64, f64)>,
    /// Column coloring polygons and points
    pub fill: Option<String>,
    pub legend: bool,
}

impl Default for PlotStyle {
    fn default() -> Self {
        let defaults = PlotOptions::default();
        Self {
            scheme: defaults.scheme,
            width: defaults.width,
            height: defaults.height,
            range: None,
            fill: None,
            legend: defaults.legend,
        }
    }
}

impl PlotStyle {
    pub fn options(&self) -> PlotOptions {
        PlotOptions {
            scheme: self.scheme,
            width: self.width,
            height: self.height,
            range: self.range,
            fill_column: self.fill.clone(),
            legend: self.legend,
            ..PlotOptions::default()
        }
    }
}

fn default_area_column() -> String {
    "area".to_string()
}

fn default_points_crs() -> String {
    "EPSG:4326".to_string()
}

/// One demonstration step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Load a GeoJSON or Shapefile layer
    ReadVector { path: PathBuf, into: String },
    /// Load a single raster; `crs` labels files that carry none
    ReadRaster {
        path: PathBuf,
        #[serde(default)]
        crs: Option<String>,
        into: String,
    },
    /// Stack the files in `dir` whose name matches `pattern`
    ReadStack { dir: PathBuf, pattern: String, into: String },
    /// Load points from delimited text
    ReadPoints {
        path: PathBuf,
        #[serde(default)]
        x: Option<String>,
        #[serde(default)]
        y: Option<String>,
        #[serde(default = "default_points_crs")]
        crs: String,
        into: String,
    },
    Select { input: String, columns: Vec<String>, into: String },
    /// Keep rows whose `column` equals `equals`
    Filter {
        input: String,
        column: String,
        equals: serde_json::Value,
        into: String,
    },
    /// Group by `by` and reduce each group
    Summarise {
        input: String,
        by: String,
        summaries: Vec<Summary>,
        into: String,
    },
    /// Add a column with each feature's area (m² for geographic data)
    Area {
        input: String,
        #[serde(default = "default_area_column")]
        column: String,
        into: String,
    },
    /// Replace the CRS label of a layer, raster or stack
    SetCrs { input: String, crs: String, into: String },
    /// Reproject a vector layer
    Transform { input: String, crs: String, into: String },
    /// Write the split attribute table + WKT representation as JSON
    ToLegacy { input: String, path: PathBuf },
    FromLegacy { path: PathBuf, into: String },
    /// Crop to an explicit extent or to the extent of another binding
    Crop {
        input: String,
        #[serde(default)]
        extent: Option<Extent>,
        #[serde(default)]
        like: Option<String>,
        into: String,
    },
    Aggregate {
        input: String,
        #[serde(default)]
        params: AggregateParams,
        into: String,
    },
    Disaggregate { input: String, factor: usize, into: String },
    /// Read raster or stack values at the points of a layer
    Extract { input: String, points: String, into: String },
    /// Reproject a raster or stack
    Project {
        input: String,
        crs: String,
        #[serde(default)]
        params: ProjectParams,
        into: String,
    },
    /// Export any binding; the format follows the extension
    Write {
        input: String,
        path: PathBuf,
        #[serde(default)]
        style: PlotStyle,
    },
    Geocode {
        address: String,
        #[serde(default)]
        service: GeocodeService,
        into: String,
    },
    /// Download WorldClim layers and stack them
    Worldclim {
        variable: String,
        resolution: f64,
        dir: PathBuf,
        into: String,
    },
    /// Render a PNG; vector `overlay` is drawn on top
    Plot {
        input: String,
        path: PathBuf,
        #[serde(default)]
        overlay: Option<String>,
        #[serde(default)]
        style: PlotStyle,
    },
    /// Write an interactive Leaflet page
    WebMap {
        path: PathBuf,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        raster: Option<String>,
        #[serde(default)]
        features: Option<String>,
        #[serde(default)]
        popup: Vec<String>,
        #[serde(default)]
        markers: Vec<String>,
        #[serde(default)]
        style: PlotStyle,
    },
    /// Print a binding
    Show { input: String },
}

impl Step {
    pub fn op(&self) -> &'static str {
        match self {
            Step::ReadVector { .. } => "read_vector",
            Step::ReadRaster { .. } => "read_raster",
            Step::ReadStack { .. } => "read_stack",
            Step::ReadPoints { .. } => "read_points",
            Step::Select { .. } => "select",
            Step::Filter { .. } => "filter",
            Step::Summarise { .. } => "summarise",
            Step::Area { .. } => "area",
            Step::SetCrs { .. } => "set_crs",
            Step::Transform { .. } => "transform",
            Step::ToLegacy { .. } => "to_legacy",
            Step::FromLegacy { .. } => "from_legacy",
            Step::Crop { .. } => "crop",
            Step::Aggregate { .. } => "aggregate",
            Step::Disaggregate { .. } => "disaggregate",
            Step::Extract { .. } => "extract",
            Step::Project { .. } => "project",
            Step::Write { .. } => "write",
            Step::Geocode { .. } => "geocode",
            Step::Worldclim { .. } => "worldclim",
            Step::Plot { .. } => "plot",
            Step::WebMap { .. } => "web_map",
            Step::Show { .. } => "show",
        }
    }

    /// Name the step binds, if it produces a value
    pub fn output(&self) -> Option<&str> {
        match self {
            Step::ReadVector { into, .. }
            | Step::ReadRaster { into, .. }
            | Step::ReadStack { into, .. }
            | Step::ReadPoints { into, .. }
            | Step::Select { into, .. }
            | Step::Filter { into, .. }
            | Step::Summarise { into, .. }
            | Step::Area { into, .. }
            | Step::SetCrs { into, .. }
            | Step::Transform { into, .. }
            | Step::FromLegacy { into, .. }
            | Step::Crop { into, .. }
            | Step::Aggregate { into, .. }
            | Step::Disaggregate { into, .. }
            | Step::Extract { into, .. }
            | Step::Project { into, .. }
            | Step::Geocode { into, .. }
            | Step::Worldclim { into, .. } => Some(into),
            Step::ToLegacy { .. }
            | Step::Write { .. }
            | Step::Plot { .. }
            | Step::WebMap { .. }
            | Step::Show { .. } => None,
        }
    }

    /// Short title for the slide header
    pub fn title(&self) -> String {
        match self.output() {
            Some(into) => format!("{} → {}", self.op(), into),
            None => match self {
                Step::ToLegacy { path, .. }
                | Step::Write { path, .. }
                | Step::Plot { path, .. }
                | Step::WebMap { path, .. } => format!("{} → {}", self.op(), path.display()),
                Step::Show { input } => format!("{} {}", self.op(), input),
                _ => self.op().to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodeck_algorithms::raster::{Reducer, Remainder};

    #[test]
    fn steps_parse_from_json() {
        let steps: Vec<Step> = serde_json::from_str(
            r#"[
                {"op": "read_stack", "dir": "data", "pattern": "^tmin\\d+\\.bil$", "into": "tmin"},
                {"op": "aggregate", "input": "tmin", "params": {"factor_x": 3, "factor_y": 3, "reducer": "median", "remainder": "expand"}, "into": "coarse"},
                {"op": "filter", "input": "world", "column": "subregion", "equals": "Western Europe", "into": "west"},
                {"op": "summarise", "input": "west", "by": "subregion", "summaries": [{"name": "pop", "op": "mean", "column": "pop_est"}], "into": "avg"},
                {"op": "plot", "input": "tmin", "path": "tmin.png", "style": {"scheme": "temperature"}}
            ]"#,
        )
        .unwrap();

        assert_eq!(steps.len(), 5);
        match &steps[1] {
            Step::Aggregate { params, .. } => {
                assert_eq!((params.factor_x, params.factor_y), (3, 3));
                assert_eq!(params.reducer, Reducer::Median);
                assert_eq!(params.remainder, Remainder::Expand);
                assert!(params.na_rm);
            }
            other => panic!("unexpected step {:?}", other),
        }
        match &steps[4] {
            Step::Plot { style, overlay, .. } => {
                assert_eq!(style.scheme, ColorScheme::Temperature);
                assert_eq!(style.width, 800);
                assert!(overlay.is_none());
            }
            other => panic!("unexpected step {:?}", other),
        }
        assert_eq!(steps[0].output(), Some("tmin"));
        assert_eq!(steps[4].output(), None);
        assert_eq!(steps[3].title(), "summarise → avg");
        assert_eq!(steps[4].title(), "plot → tmin.png");
    }

    #[test]
    fn unknown_op_is_rejected() {
        let err = serde_json::from_str::<Step>(r#"{"op": "buffer", "input": "x", "into": "y"}"#).unwrap_err();
        assert!(err.to_string().contains("buffer"));
    }

    #[test]
    fn points_default_to_wgs84() {
        let step: Step = serde_json::from_str(r#"{"op": "read_points", "path": "sites.csv", "into": "sites"}"#).unwrap();
        assert!(matches!(step, Step::ReadPoints { ref crs, .. } if crs == "EPSG:4326"));
    }
}
