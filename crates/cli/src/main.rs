//! geodeck CLI - spatial data walkthroughs from the terminal

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geodeck_algorithms::raster::{
    aggregate_stack, crop_stack, disaggregate, extract_stack, project_stack, sample_points, AggregateParams,
    ProjectParams, Reducer, Remainder, Resample,
};
use geodeck_algorithms::vector::{feature_areas, transform};
use geodeck_cli::deck::write_table_csv;
use geodeck_cli::slide::{describe_features, describe_location, describe_raster, describe_stack, describe_table};
use geodeck_cli::{Deck, Runner};
use geodeck_colormap::{
    auto_params, level_plot, plot_features, plot_raster, write_kmz_features, write_kmz_raster, ColorScheme,
    ColormapParams, PlotOptions, WebMap,
};
use geodeck_core::io::{
    read_points, read_raster, read_raster_stack, read_stack, read_vector, write_stack, write_vector,
    PointReadOptions, RasterFormat,
};
use geodeck_core::raster::{Extent, RasterStack};
use geodeck_core::vector::{AttributeValue, FeatureCollection, PointColumns, Summary};
use geodeck_core::CRS;
use geodeck_remote::blocking::{self, Provider};
use geodeck_remote::{to_features, Resolution, Variable, WorldClim};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geodeck")]
#[command(author, version, about = "Spatial data walkthroughs: vectors, rasters, maps", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe a raster or vector file
    Info {
        /// Input file
        input: PathBuf,
    },
    /// Vector layer operations
    Vector {
        #[command(subcommand)]
        command: VectorCommands,
    },
    /// Raster and stack operations
    Raster {
        #[command(subcommand)]
        command: RasterCommands,
    },
    /// Geocode one or more addresses
    Geocode {
        /// Addresses to look up
        #[arg(required = true)]
        addresses: Vec<String>,
        /// Service: nominatim, google
        #[arg(short, long, default_value = "nominatim")]
        provider: String,
        /// API key for the google service
        #[arg(long)]
        api_key: Option<String>,
        /// Write the results as GeoJSON points
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Download WorldClim climate layers
    Worldclim {
        /// Variable: tmin, tmax, tavg, prec, bio, alt
        #[arg(long = "var")]
        variable: String,
        /// Resolution in arc-minutes: 0.5, 2.5, 5, 10
        #[arg(long = "res", default_value = "10")]
        resolution: String,
        /// Download directory
        #[arg(short, long, default_value = "worldclim")]
        dir: PathBuf,
    },
    /// Run a deck file, printing a slide after each step
    Run {
        /// Deck file (JSON)
        deck: PathBuf,
        /// API key for google geocode steps
        #[arg(long)]
        api_key: Option<String>,
    },
}

// ─── Vector subcommands ─────────────────────────────────────────────────

#[derive(Subcommand)]
enum VectorCommands {
    /// Summary and first rows of a layer
    Info {
        /// Input GeoJSON or Shapefile
        input: PathBuf,
    },
    /// Keep features whose column equals a value
    Filter {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long)]
        column: String,
        /// Value to match; numbers match numerically
        #[arg(short, long)]
        equals: String,
    },
    /// Group by a column and reduce the others
    Summarise {
        input: PathBuf,
        output: PathBuf,
        /// Grouping column
        #[arg(short, long)]
        by: String,
        /// Reductions as op:column (mean, sum, min, max, first) or count
        #[arg(short, long = "summary", required = true)]
        summaries: Vec<String>,
    },
    /// Add an `area` column (m² for geographic layers)
    Area { input: PathBuf, output: PathBuf },
    /// Reproject a layer
    Transform {
        input: PathBuf,
        output: PathBuf,
        /// Target CRS, e.g. EPSG:32718
        #[arg(long)]
        crs: String,
    },
    /// Convert between formats (.geojson, .kmz)
    Convert { input: PathBuf, output: PathBuf },
    /// Plot a layer to PNG
    Plot {
        input: PathBuf,
        output: PathBuf,
        /// Column coloring the features
        #[arg(short, long)]
        fill: Option<String>,
        #[arg(short, long, default_value = "viridis")]
        scheme: String,
    },
}

// ─── Raster subcommands ─────────────────────────────────────────────────

#[derive(Subcommand)]
enum RasterCommands {
    /// Crop to an extent or to the bounding box of a vector layer
    Crop {
        input: PathBuf,
        output: PathBuf,
        /// xmin,xmax,ymin,ymax
        #[arg(long, conflicts_with = "like")]
        extent: Option<String>,
        /// Vector file whose bounding box is the crop window
        #[arg(long)]
        like: Option<PathBuf>,
    },
    /// Coarsen by an integer factor
    Aggregate {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long, default_value = "2")]
        factor: usize,
        /// Vertical factor; defaults to --factor
        #[arg(long)]
        factor_y: Option<usize>,
        /// Reducer: mean, sum, min, max, median, modal
        #[arg(long, default_value = "mean")]
        fun: String,
        /// Partial blocks: strict, expand, truncate
        #[arg(long, default_value = "strict")]
        remainder: String,
        /// Let no-data in a block make the result no-data
        #[arg(long)]
        keep_na: bool,
    },
    /// Refine by an integer factor
    Disaggregate {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long, default_value = "2")]
        factor: usize,
    },
    /// Read layer values at points from a CSV or vector file
    Extract {
        input: PathBuf,
        points: PathBuf,
        /// Output CSV
        output: PathBuf,
    },
    /// Reproject onto a grid in another CRS
    Project {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        crs: String,
        /// Target cell size in target units
        #[arg(long)]
        res: Option<f64>,
        /// nearest, bilinear
        #[arg(long, default_value = "bilinear")]
        method: String,
    },
    /// Plot a raster (or every layer of a stack) to PNG
    Plot {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long, default_value = "terrain")]
        scheme: String,
        /// Vector layer drawn on top
        #[arg(long)]
        overlay: Option<PathBuf>,
    },
    /// Stack the files of a directory matching a pattern
    Stack {
        dir: PathBuf,
        /// Regular expression on file names
        pattern: String,
        /// Output (.grd keeps every layer in one file)
        output: PathBuf,
    },
    /// Export a geographic raster to KMZ or an interactive HTML map
    Export {
        input: PathBuf,
        /// .kmz or .html
        output: PathBuf,
        #[arg(short, long, default_value = "terrain")]
        scheme: String,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set up logging")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn read_grid(path: &Path) -> Result<RasterStack> {
    let pb = spinner("Reading raster...");
    let stack = read_raster_stack(path).context("Failed to read raster")?;
    pb.finish_and_clear();
    Ok(stack)
}

fn write_grid(stack: &RasterStack, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    match stack.layers() {
        [single] => geodeck_core::io::write_raster(single, path),
        _ => write_stack(stack, path),
    }
    .context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn read_layer(path: &Path) -> Result<FeatureCollection> {
    let pb = spinner("Reading layer...");
    let layer = read_vector(path).with_context(|| format!("Failed to read {}", path.display()))?;
    pb.finish_and_clear();
    Ok(layer)
}

fn write_layer(layer: &FeatureCollection, path: &Path) -> Result<()> {
    if has_extension(path, "kmz") {
        write_kmz_features(layer, path).context("Failed to write KMZ")?;
    } else {
        write_vector(layer, path).context("Failed to write output")?;
    }
    Ok(())
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn parse_scheme(s: &str) -> Result<ColorScheme> {
    s.parse::<ColorScheme>().map_err(|e| anyhow::anyhow!(e))
}

fn parse_extent(s: &str) -> Result<Extent> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .context("Extent must be four numbers: xmin,xmax,ymin,ymax")?;
    match parts.as_slice() {
        &[xmin, xmax, ymin, ymax] => Ok(Extent::new(xmin, xmax, ymin, ymax)),
        _ => anyhow::bail!("Extent must be four numbers: xmin,xmax,ymin,ymax, got: {}", s),
    }
}

fn parse_remainder(s: &str) -> Result<Remainder> {
    match s.to_lowercase().as_str() {
        "strict" => Ok(Remainder::Strict),
        "expand" => Ok(Remainder::Expand),
        "truncate" => Ok(Remainder::Truncate),
        _ => anyhow::bail!("Unknown remainder: {}. Use strict, expand, or truncate.", s),
    }
}

fn parse_resample(s: &str) -> Result<Resample> {
    match s.to_lowercase().as_str() {
        "nearest" | "ngb" => Ok(Resample::Nearest),
        "bilinear" => Ok(Resample::Bilinear),
        _ => anyhow::bail!("Unknown method: {}. Use nearest or bilinear.", s),
    }
}

/// `mean:pop_est`, `sum:area` or `count`
fn parse_summary(s: &str) -> Result<Summary> {
    let spec = s.trim();
    if spec.eq_ignore_ascii_case("count") {
        return Ok(Summary::count("count"));
    }
    let (op, column) = spec
        .split_once(':')
        .with_context(|| format!("Summary must be op:column or count, got: {}", s))?;
    let name = format!("{}_{}", op.to_lowercase(), column);
    let summary = match op.to_lowercase().as_str() {
        "mean" => Summary::mean(&name, column),
        "sum" => Summary::sum(&name, column),
        "min" => Summary::min(&name, column),
        "max" => Summary::max(&name, column),
        "first" => Summary::first(&name, column),
        _ => anyhow::bail!("Unknown summary: {}. Use mean, sum, min, max, first or count.", op),
    };
    Ok(summary)
}

fn is_raster_file(path: &Path) -> bool {
    RasterFormat::from_path(path).is_ok()
}

/// Points from delimited text or any vector layer
fn read_sample_points(path: &Path) -> Result<FeatureCollection> {
    if has_extension(path, "csv") || has_extension(path, "txt") {
        let options = PointReadOptions {
            columns: PointColumns::default(),
            delimiter: None,
        };
        let table = read_points(path, &options).context("Failed to read points")?;
        Ok(table.into_features(Some(CRS::wgs84())))
    } else {
        read_layer(path)
    }
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            if is_raster_file(&input) {
                let stack = read_grid(&input)?;
                println!("File: {}", input.display());
                match stack.layers() {
                    [single] => print!("{}", describe_raster(single)),
                    _ => print!("{}", describe_stack(&stack)),
                }
            } else {
                let layer = read_layer(&input)?;
                println!("File: {}", input.display());
                print!("{}", describe_features(&layer));
            }
        }

        Commands::Vector { command } => run_vector(command)?,
        Commands::Raster { command } => run_raster(command)?,

        // ── Remote data ──────────────────────────────────────────────
        Commands::Geocode {
            addresses,
            provider,
            api_key,
            output,
        } => {
            let provider = match provider.to_lowercase().as_str() {
                "nominatim" | "osm" => Provider::Nominatim,
                "google" => Provider::Google {
                    api_key: api_key.context("The google provider needs --api-key")?,
                },
                _ => anyhow::bail!("Unknown provider: {}. Use nominatim or google.", provider),
            };
            let pb = spinner("Geocoding...");
            let results = blocking::geocode(&provider, &addresses).context("Geocoding failed")?;
            pb.finish_and_clear();
            for result in &results {
                print!("{}", describe_location(result));
            }
            if let Some(output) = output {
                write_layer(&to_features(&results), &output)?;
                println!("Locations saved to: {}", output.display());
            }
        }

        Commands::Worldclim {
            variable,
            resolution,
            dir,
        } => {
            let variable: Variable = variable.parse()?;
            let resolution: Resolution = resolution.parse()?;
            let dataset = WorldClim::new(variable, resolution);
            let pb = spinner(&format!("Downloading {}...", dataset.archive_name()));
            let start = Instant::now();
            let files = blocking::download_worldclim(&dataset, &dir).context("Download failed")?;
            pb.finish_and_clear();
            for file in &files {
                println!("  {}", file.display());
            }
            done(&format!("{} layers", files.len()), &dir, start.elapsed());
        }

        // ── Decks ────────────────────────────────────────────────────
        Commands::Run { deck, api_key } => {
            let loaded = Deck::load(&deck).with_context(|| format!("Failed to load deck {}", deck.display()))?;
            let base = deck.parent().map(Path::to_path_buf).unwrap_or_default();
            println!("{}", loaded.title);
            if let Some(description) = &loaded.description {
                println!("{}", description);
            }
            println!();
            let start = Instant::now();
            let mut runner = Runner::new(base).with_api_key(api_key);
            let slides = runner.run(&loaded, |slide| println!("{}", slide))?;
            info!("{} slides in {:.2?}", slides.len(), start.elapsed());
        }
    }

    Ok(())
}

fn run_vector(command: VectorCommands) -> Result<()> {
    match command {
        VectorCommands::Info { input } => {
            let layer = read_layer(&input)?;
            print!("{}", describe_features(&layer));
        }

        VectorCommands::Filter {
            input,
            output,
            column,
            equals,
        } => {
            let layer = read_layer(&input)?;
            let value = equals
                .parse::<f64>()
                .map(AttributeValue::Float)
                .unwrap_or(AttributeValue::String(equals));
            let start = Instant::now();
            let kept = layer.filter_eq(&column, &value).context("Failed to filter")?;
            let elapsed = start.elapsed();
            info!("kept {} of {} features", kept.len(), layer.len());
            write_layer(&kept, &output)?;
            done("Filtered layer", &output, elapsed);
        }

        VectorCommands::Summarise {
            input,
            output,
            by,
            summaries,
        } => {
            let summaries = summaries.iter().map(|s| parse_summary(s)).collect::<Result<Vec<_>>>()?;
            let layer = read_layer(&input)?;
            let start = Instant::now();
            let grouped = layer
                .group_by(&by)
                .and_then(|g| g.summarise(&summaries))
                .context("Failed to summarise")?;
            let elapsed = start.elapsed();
            print!("{}", describe_features(&grouped));
            write_layer(&grouped, &output)?;
            done("Summary", &output, elapsed);
        }

        VectorCommands::Area { input, output } => {
            let layer = read_layer(&input)?;
            let start = Instant::now();
            let areas = feature_areas(&layer);
            let mut row = 0;
            let with_area = layer.mutate("area", |_| {
                let value = AttributeValue::Float(areas[row]);
                row += 1;
                value
            });
            let elapsed = start.elapsed();
            write_layer(&with_area, &output)?;
            done("Areas", &output, elapsed);
        }

        VectorCommands::Transform { input, output, crs } => {
            let target = CRS::parse(&crs).context("Invalid CRS")?;
            let layer = read_layer(&input)?;
            let start = Instant::now();
            let projected = transform(&layer, &target).context("Failed to transform")?;
            let elapsed = start.elapsed();
            write_layer(&projected, &output)?;
            done("Transformed layer", &output, elapsed);
        }

        VectorCommands::Convert { input, output } => {
            let layer = read_layer(&input)?;
            let start = Instant::now();
            write_layer(&layer, &output)?;
            done("Converted layer", &output, start.elapsed());
        }

        VectorCommands::Plot {
            input,
            output,
            fill,
            scheme,
        } => {
            let options = PlotOptions {
                scheme: parse_scheme(&scheme)?,
                fill_column: fill,
                ..PlotOptions::default()
            };
            let layer = read_layer(&input)?;
            let start = Instant::now();
            let plot = plot_features(&layer, &options).context("Failed to plot")?;
            plot.save_png(&output).context("Failed to write PNG")?;
            done("Plot", &output, start.elapsed());
        }
    }
    Ok(())
}

fn run_raster(command: RasterCommands) -> Result<()> {
    match command {
        RasterCommands::Crop {
            input,
            output,
            extent,
            like,
        } => {
            let window = match (extent, like) {
                (Some(e), None) => parse_extent(&e)?,
                (None, Some(layer)) => read_layer(&layer)?
                    .bounding_box()
                    .context("The --like layer has no geometries")?,
                _ => anyhow::bail!("Give either --extent or --like"),
            };
            let stack = read_grid(&input)?;
            let start = Instant::now();
            let cropped = crop_stack(&stack, &window).context("Failed to crop")?;
            let elapsed = start.elapsed();
            write_grid(&cropped, &output)?;
            done("Cropped raster", &output, elapsed);
        }

        RasterCommands::Aggregate {
            input,
            output,
            factor,
            factor_y,
            fun,
            remainder,
            keep_na,
        } => {
            let reducer = Reducer::parse(&fun)
                .with_context(|| format!("Unknown function: {}. Use mean, sum, min, max, median, modal.", fun))?;
            let params = AggregateParams {
                factor_x: factor,
                factor_y: factor_y.unwrap_or(factor),
                reducer,
                remainder: parse_remainder(&remainder)?,
                na_rm: !keep_na,
            };
            let stack = read_grid(&input)?;
            let start = Instant::now();
            let coarse = aggregate_stack(&stack, &params).context("Failed to aggregate")?;
            let elapsed = start.elapsed();
            write_grid(&coarse, &output)?;
            done("Aggregated raster", &output, elapsed);
        }

        RasterCommands::Disaggregate { input, output, factor } => {
            let stack = read_grid(&input)?;
            let start = Instant::now();
            let fine = stack
                .map_layers(|layer| disaggregate(layer, factor))
                .context("Failed to disaggregate")?;
            let elapsed = start.elapsed();
            write_grid(&fine, &output)?;
            done("Disaggregated raster", &output, elapsed);
        }

        RasterCommands::Extract { input, points, output } => {
            let stack = read_grid(&input)?;
            let layer = read_sample_points(&points)?;
            let start = Instant::now();
            let coords = sample_points(&layer, stack.crs()).context("Failed to place points")?;
            let table = extract_stack(&stack, &coords);
            let elapsed = start.elapsed();
            print!("{}", describe_table(&table));
            write_table_csv(&table, &output).context("Failed to write CSV")?;
            done("Extracted values", &output, elapsed);
        }

        RasterCommands::Project {
            input,
            output,
            crs,
            res,
            method,
        } => {
            let target = CRS::parse(&crs).context("Invalid CRS")?;
            let params = ProjectParams {
                resolution: res.map(|r| (r, r)),
                method: parse_resample(&method)?,
            };
            let stack = read_grid(&input)?;
            let start = Instant::now();
            let projected = project_stack(&stack, &target, &params).context("Failed to project")?;
            let elapsed = start.elapsed();
            write_grid(&projected, &output)?;
            done("Projected raster", &output, elapsed);
        }

        RasterCommands::Plot {
            input,
            output,
            scheme,
            overlay,
        } => {
            let options = PlotOptions {
                scheme: parse_scheme(&scheme)?,
                ..PlotOptions::default()
            };
            let stack = read_grid(&input)?;
            let start = Instant::now();
            let mut plot = match stack.layers() {
                [single] => plot_raster(single, &options),
                _ => level_plot(&stack, &options),
            }
            .context("Failed to plot")?;
            if let Some(overlay) = overlay {
                let layer = read_layer(&overlay)?;
                let outlines = PlotOptions {
                    fill: None,
                    ..options.clone()
                };
                geodeck_colormap::overlay_features(&mut plot, &layer, &outlines).context("Failed to draw overlay")?;
            }
            plot.save_png(&output).context("Failed to write PNG")?;
            done("Plot", &output, start.elapsed());
        }

        RasterCommands::Stack { dir, pattern, output } => {
            let pb = spinner("Stacking layers...");
            let start = Instant::now();
            let stack = read_stack(&dir, &pattern).context("Failed to build stack")?;
            pb.finish_and_clear();
            print!("{}", describe_stack(&stack));
            write_stack(&stack, &output).context("Failed to write stack")?;
            done("Stack", &output, start.elapsed());
        }

        RasterCommands::Export { input, output, scheme } => {
            let raster = read_raster::<f64, _>(&input).context("Failed to read raster")?;
            let params: ColormapParams = auto_params(&raster, parse_scheme(&scheme)?);
            let start = Instant::now();
            if has_extension(&output, "kmz") {
                write_kmz_raster(&raster, &params, &output).context("Failed to write KMZ")?;
            } else if has_extension(&output, "html") {
                let title = raster.name().unwrap_or("geodeck").to_string();
                WebMap::new(title)
                    .raster_overlay(&raster, &params)
                    .and_then(|map| map.save(&output))
                    .context("Failed to write web map")?;
            } else {
                anyhow::bail!("Export writes .kmz or .html, got: {}", output.display());
            }
            done("Export", &output, start.elapsed());
        }
    }
    Ok(())
}
