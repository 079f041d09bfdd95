//! Deck runner
//!
//! A deck is a JSON file listing steps in order. The runner executes them
//! one after the other against a [`Session`], printing a slide after each
//! step. The first failing step aborts the run.

pub mod session;
pub mod step;

pub use session::{DeckError, Grid, Result, Session, Value, ValueKind};
pub use step::{GeocodeService, PlotStyle, Step};

use crate::slide::{describe, Slide};
use geodeck_algorithms::raster::{
    aggregate, aggregate_stack, crop, crop_stack, disaggregate, extract_stack, project_raster, project_stack,
    sample_points,
};
use geodeck_algorithms::vector::{feature_areas, transform};
use geodeck_colormap::{
    auto_params, level_plot, overlay_features, plot_features, plot_raster, write_kmz_features, write_kmz_raster,
    ColormapParams, Plot, PlotOptions, WebMap,
};
use geodeck_core::io::{
    read_points, read_raster, read_stack, read_vector, write_raster, write_stack, write_vector, PointReadOptions,
};
use geodeck_core::raster::{Extent, RasterStack};
use geodeck_core::vector::{AttributeValue, FeatureCollection, LegacyTable, PointColumns};
use geodeck_core::CRS;
use geodeck_remote::blocking::{self, Provider};
use geodeck_remote::{Resolution, Variable, WorldClim};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A deck file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<Step>,
}

impl Deck {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// Executes steps against a session
pub struct Runner {
    session: Session,
    /// Relative paths in steps are resolved against this directory
    base_dir: PathBuf,
    api_key: Option<String>,
}

impl Runner {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            session: Session::new(),
            base_dir: base_dir.into(),
            api_key: None,
        }
    }

    /// Key for `geocode` steps using the Google service
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    fn path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Run every step, handing each slide to `show` as soon as it is ready
    pub fn run<F: FnMut(&Slide)>(&mut self, deck: &Deck, mut show: F) -> Result<Vec<Slide>> {
        info!("running deck '{}' ({} steps)", deck.title, deck.steps.len());
        let mut slides = Vec::with_capacity(deck.steps.len());
        for (i, step) in deck.steps.iter().enumerate() {
            let index = i + 1;
            let body = self.execute(step).map_err(|e| DeckError::Step {
                index,
                op: step.op(),
                source: Box::new(e),
            })?;
            let slide = Slide {
                index,
                title: step.title(),
                body,
            };
            show(&slide);
            slides.push(slide);
        }
        Ok(slides)
    }

    /// Execute one step and return the slide body
    pub fn execute(&mut self, step: &Step) -> Result<String> {
        debug!("executing {:?}", step);
        let produced = match step {
            Step::ReadVector { path, .. } => Value::Vector(read_vector(self.path(path))?),
            Step::ReadRaster { path, crs, .. } => {
                let mut raster = read_raster::<f64, _>(self.path(path))?;
                if let Some(crs) = crs {
                    raster.set_crs(Some(CRS::parse(crs)?));
                }
                Value::Raster(raster)
            }
            Step::ReadStack { dir, pattern, .. } => Value::Stack(read_stack(self.path(dir), pattern)?),
            Step::ReadPoints { path, x, y, crs, .. } => {
                let options = PointReadOptions {
                    columns: PointColumns {
                        x: x.clone(),
                        y: y.clone(),
                    },
                    delimiter: None,
                };
                let table = read_points(self.path(path), &options)?;
                Value::Points(table.into_features(Some(CRS::parse(crs)?)))
            }
            Step::Select { input, columns, .. } => {
                let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
                self.same_kind(input, |fc| fc.select(&columns))?
            }
            Step::Filter { input, column, equals, .. } => {
                let wanted = AttributeValue::from_json(equals);
                self.same_kind(input, |fc| fc.filter_eq(column, &wanted))?
            }
            Step::Summarise { input, by, summaries, .. } => {
                Value::Vector(self.session.features(input)?.group_by(by)?.summarise(summaries)?)
            }
            Step::Area { input, column, .. } => self.same_kind(input, |fc| {
                let areas = feature_areas(fc);
                let mut row = 0;
                Ok(fc.mutate(column, |_| {
                    let value = AttributeValue::Float(areas[row]);
                    row += 1;
                    value
                }))
            })?,
            Step::SetCrs { input, crs, .. } => {
                let crs = CRS::parse(crs)?;
                match self.session.get(input)? {
                    Value::Vector(fc) => {
                        let mut fc = fc.clone();
                        fc.set_crs(Some(crs));
                        Value::Vector(fc)
                    }
                    Value::Points(fc) => {
                        let mut fc = fc.clone();
                        fc.set_crs(Some(crs));
                        Value::Points(fc)
                    }
                    Value::Raster(r) => {
                        let mut r = r.clone();
                        r.set_crs(Some(crs));
                        Value::Raster(r)
                    }
                    Value::Stack(s) => {
                        let mut s = s.clone();
                        s.set_crs(Some(crs));
                        Value::Stack(s)
                    }
                    other => {
                        return Err(DeckError::WrongKind {
                            name: input.clone(),
                            expected: "a layer, raster or stack",
                            found: other.kind(),
                        })
                    }
                }
            }
            Step::Transform { input, crs, .. } => {
                let target = CRS::parse(crs)?;
                self.same_kind(input, |fc| transform(fc, &target))?
            }
            Step::ToLegacy { input, path } => {
                let table = self.session.features(input)?.to_legacy();
                let path = self.path(path);
                fs::write(&path, serde_json::to_string_pretty(&table)?)?;
                return Ok(format!(
                    "{} rows, {} columns, {} WKT geometries\nwrote {}\n",
                    table.len(),
                    table.columns.len(),
                    table.geometries.iter().flatten().count(),
                    path.display()
                ));
            }
            Step::FromLegacy { path, .. } => {
                let text = fs::read_to_string(self.path(path))?;
                let table: LegacyTable = serde_json::from_str(&text)?;
                Value::Vector(FeatureCollection::from_legacy(&table)?)
            }
            Step::Crop { input, extent, like, .. } => {
                let extent = self.crop_extent(extent.as_ref(), like.as_deref())?;
                match self.session.grid(input)? {
                    Grid::Raster(r) => Value::Raster(crop(r, &extent)?),
                    Grid::Stack(s) => Value::Stack(crop_stack(s, &extent)?),
                }
            }
            Step::Aggregate { input, params, .. } => match self.session.grid(input)? {
                Grid::Raster(r) => Value::Raster(aggregate(r, params)?),
                Grid::Stack(s) => Value::Stack(aggregate_stack(s, params)?),
            },
            Step::Disaggregate { input, factor, .. } => match self.session.grid(input)? {
                Grid::Raster(r) => Value::Raster(disaggregate(r, *factor)?),
                Grid::Stack(s) => Value::Stack(s.map_layers(|layer| disaggregate(layer, *factor))?),
            },
            Step::Extract { input, points, .. } => {
                let stack = match self.session.grid(input)? {
                    Grid::Raster(r) => RasterStack::from_layers(vec![r.clone()])?,
                    Grid::Stack(s) => s.clone(),
                };
                let coords = sample_points(self.session.features(points)?, stack.crs())?;
                Value::Table(extract_stack(&stack, &coords))
            }
            Step::Project { input, crs, params, .. } => {
                let target = CRS::parse(crs)?;
                match self.session.grid(input)? {
                    Grid::Raster(r) => Value::Raster(project_raster(r, &target, params)?),
                    Grid::Stack(s) => Value::Stack(project_stack(s, &target, params)?),
                }
            }
            Step::Write { input, path, style } => return self.write(input, &self.path(path), style),
            Step::Geocode { address, service, .. } => {
                let provider = match service {
                    GeocodeService::Nominatim => Provider::Nominatim,
                    GeocodeService::Google => Provider::Google {
                        api_key: self.api_key.clone().ok_or_else(|| {
                            DeckError::InvalidStep("the google geocoder needs an API key".to_string())
                        })?,
                    },
                };
                let mut results = blocking::geocode(&provider, &[address.as_str()])?;
                match results.pop() {
                    Some(location) => Value::Location(location),
                    None => return Err(DeckError::InvalidStep(format!("no result for '{}'", address))),
                }
            }
            Step::Worldclim { variable, resolution, dir, .. } => {
                let dataset = WorldClim::new(variable.parse::<Variable>()?, Resolution::from_minutes(*resolution)?);
                let dir = self.path(dir);
                blocking::download_worldclim(&dataset, &dir)?;
                Value::Stack(read_stack(&dir, &dataset.layer_pattern())?)
            }
            Step::Plot { input, path, overlay, style } => {
                let path = self.path(path);
                let options = style.options();
                let mut plot = match self.session.get(input)? {
                    Value::Raster(r) => plot_raster(r, &options)?,
                    Value::Stack(s) => level_plot(s, &options)?,
                    Value::Vector(fc) | Value::Points(fc) => plot_features(fc, &options)?,
                    other => {
                        return Err(DeckError::WrongKind {
                            name: input.clone(),
                            expected: "something plottable",
                            found: other.kind(),
                        })
                    }
                };
                if let Some(name) = overlay {
                    let layer = self.session.features(name)?;
                    let outlines = PlotOptions {
                        fill: None,
                        fill_column: None,
                        ..options.clone()
                    };
                    overlay_features(&mut plot, layer, &outlines)?;
                }
                plot.save_png(&path)?;
                return Ok(plot_note(&plot, &path));
            }
            Step::WebMap {
                path,
                title,
                raster,
                features,
                popup,
                markers,
                style,
            } => {
                let path = self.path(path);
                let mut map = WebMap::new(title.clone().unwrap_or_else(|| "geodeck".to_string()));
                if let Some(name) = raster {
                    let r = self.session.raster(name)?;
                    let params = match style.range {
                        Some((min, max)) => ColormapParams::with_range(style.scheme, min, max),
                        None => auto_params(r, style.scheme),
                    };
                    map = map.raster_overlay(r, &params)?;
                }
                if let Some(name) = features {
                    let fc = self.session.features(name)?;
                    let popup: Vec<&str> = popup.iter().map(String::as_str).collect();
                    let fill = match &style.fill {
                        Some(column) => Some((column.as_str(), numeric_scale(fc, column, style)?)),
                        None => None,
                    };
                    map = map.features(
                        name.as_str(),
                        fc,
                        &popup,
                        fill.as_ref().map(|(c, p)| (*c, p)),
                    )?;
                }
                for name in markers {
                    let l = self.session.location(name)?;
                    map = map.marker(l.lon, l.lat, l.address.as_str());
                }
                map.save(&path)?;
                return Ok(format!("wrote interactive map {}\n", path.display()));
            }
            Step::Show { input } => return Ok(describe(self.session.get(input)?)),
        };

        let body = describe(&produced);
        if let Some(name) = step.output() {
            self.session.bind(name, produced);
        }
        Ok(body)
    }

    /// Apply `f` to a vector layer or point table, keeping its kind
    fn same_kind<F>(&self, input: &str, f: F) -> Result<Value>
    where
        F: FnOnce(&FeatureCollection) -> geodeck_core::Result<FeatureCollection>,
    {
        match self.session.get(input)? {
            Value::Vector(fc) => Ok(Value::Vector(f(fc)?)),
            Value::Points(fc) => Ok(Value::Points(f(fc)?)),
            other => Err(DeckError::WrongKind {
                name: input.to_string(),
                expected: "a vector layer or point table",
                found: other.kind(),
            }),
        }
    }

    fn crop_extent(&self, extent: Option<&Extent>, like: Option<&str>) -> Result<Extent> {
        match (extent, like) {
            (Some(e), None) => Ok(*e),
            (None, Some(name)) => {
                let found = match self.session.get(name)? {
                    Value::Vector(fc) | Value::Points(fc) => fc.bounding_box(),
                    Value::Raster(r) => Some(r.extent()),
                    Value::Stack(s) => s.extent(),
                    other => {
                        return Err(DeckError::WrongKind {
                            name: name.to_string(),
                            expected: "something with an extent",
                            found: other.kind(),
                        })
                    }
                };
                found.ok_or_else(|| DeckError::InvalidStep(format!("'{}' has no extent", name)))
            }
            _ => Err(DeckError::InvalidStep(
                "crop needs exactly one of `extent` or `like`".to_string(),
            )),
        }
    }

    fn write(&self, input: &str, path: &Path, style: &PlotStyle) -> Result<String> {
        let kmz = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("kmz"));
        match self.session.get(input)? {
            Value::Vector(fc) | Value::Points(fc) if kmz => write_kmz_features(fc, path)?,
            Value::Vector(fc) | Value::Points(fc) => write_vector(fc, path)?,
            Value::Raster(r) if kmz => {
                let params = match style.range {
                    Some((min, max)) => ColormapParams::with_range(style.scheme, min, max),
                    None => auto_params(r, style.scheme),
                };
                write_kmz_raster(r, &params, path)?
            }
            Value::Raster(r) => write_raster(r, path)?,
            Value::Stack(s) => write_stack(s, path)?,
            Value::Table(t) => write_table_csv(t, path)?,
            Value::Location(l) => write_vector(&geodeck_remote::to_features(std::slice::from_ref(l)), path)?,
        }
        Ok(format!("wrote {}\n", path.display()))
    }
}

/// Color scale over a numeric column, honoring a fixed range
fn numeric_scale(fc: &FeatureCollection, column: &str, style: &PlotStyle) -> Result<ColormapParams> {
    if let Some((min, max)) = style.range {
        return Ok(ColormapParams::with_range(style.scheme, min, max));
    }
    let values: Vec<f64> = fc
        .column_values(column)?
        .iter()
        .filter_map(AttributeValue::as_f64)
        .collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok(if min.is_finite() && max > min {
        ColormapParams::with_range(style.scheme, min, max)
    } else {
        ColormapParams::new(style.scheme)
    })
}

fn plot_note(plot: &Plot, path: &Path) -> String {
    let mut note = format!(
        "{} x {} PNG with {} panel(s)\n",
        plot.width(),
        plot.height(),
        plot.frames.len()
    );
    if let Some(scale) = &plot.scale {
        note.push_str(&format!("color scale {} from {} to {}\n", scale.scheme, scale.min, scale.max));
    }
    note.push_str(&format!("wrote {}\n", path.display()));
    note
}

/// One CSV row per point: x, y, then one column per layer
pub fn write_table_csv(table: &geodeck_algorithms::raster::ExtractTable, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec!["x".to_string(), "y".to_string()];
    header.extend(table.layers.iter().cloned());
    writer.write_record(&header)?;
    let coord = |c: f64| if c.is_finite() { c.to_string() } else { "NA".to_string() };
    for (&(x, y), values) in table.points.iter().zip(&table.rows) {
        let mut record = vec![coord(x), coord(y)];
        record.extend(values.iter().map(|v| v.map(|v| v.to_string()).unwrap_or_else(|| "NA".to_string())));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
