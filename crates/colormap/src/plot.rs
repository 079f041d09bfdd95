//! Static plots rendered to RGBA images
//!
//! Rasters are sampled at each pixel centre, polygons are scan-filled
//! (even-odd rule, holes respected), lines use Bresenham and points are
//! drawn as filled circles. Every plot keeps the map frame(s) it drew into,
//! so features can be overlaid afterwards.

use crate::error::{RenderError, Result};
use crate::render::{auto_params, auto_params_stack, ColormapParams};
use crate::scheme::{category, evaluate, ColorScheme, Rgb};
use geo_types::{Geometry, LineString, Polygon};
use geodeck_core::raster::{Extent, Raster, RasterElement, RasterStack};
use geodeck_core::vector::{AttributeValue, FeatureCollection};
use geodeck_core::{Error, CRS};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

const LEGEND_HEIGHT: u32 = 14;
const GUTTER: u32 = 8;

/// Options shared by every plot
#[derive(Debug, Clone)]
pub struct PlotOptions {
    /// Image size in pixels
    pub width: u32,
    pub height: u32,
    pub margin: u32,
    pub scheme: ColorScheme,
    /// Value range of the color scale; detected from the data when `None`
    pub range: Option<(f64, f64)>,
    /// Column whose values color polygons and points
    pub fill_column: Option<String>,
    /// Fill color when no column is chosen or the value is null;
    /// `None` draws outlines only
    pub fill: Option<Rgb>,
    pub outline: Rgb,
    pub point_radius: u32,
    pub background: [u8; 4],
    /// Draw a color bar under the map
    pub legend: bool,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            margin: 10,
            scheme: ColorScheme::Terrain,
            range: None,
            fill_column: None,
            fill: Some(Rgb::new(200, 200, 200)),
            outline: Rgb::new(60, 60, 60),
            point_radius: 4,
            background: [255, 255, 255, 255],
            legend: true,
        }
    }
}

impl PlotOptions {
    fn scale_or(&self, detect: impl FnOnce() -> ColormapParams) -> ColormapParams {
        match self.range {
            Some((min, max)) => ColormapParams::with_range(self.scheme, min, max),
            None => detect(),
        }
    }

    fn fill_rgba(&self) -> [u8; 4] {
        self.fill.map_or([0; 4], Rgb::rgba)
    }

    fn legend_space(&self) -> u32 {
        if self.legend {
            LEGEND_HEIGHT + GUTTER
        } else {
            0
        }
    }

    /// Drawable area below the margins and above the legend
    fn map_area(&self) -> Result<(u32, u32)> {
        let width = self.width.saturating_sub(2 * self.margin);
        let height = self
            .height
            .saturating_sub(2 * self.margin + self.legend_space());
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidOption(format!(
                "{} x {} image leaves no room for the map",
                self.width, self.height
            )));
        }
        Ok((width, height))
    }
}

/// Placement of a map extent inside an image
#[derive(Debug, Clone, PartialEq)]
pub struct MapFrame {
    pub extent: Extent,
    pub crs: Option<CRS>,
    /// Top-left pixel of the map area
    pub x0: u32,
    pub y0: u32,
    pub width: u32,
    pub height: u32,
}

impl MapFrame {
    /// Largest frame keeping the extent's aspect ratio inside the
    /// `width` x `height` box at (`x0`, `y0`), centred in it.
    pub fn fit(extent: &Extent, crs: Option<CRS>, x0: u32, y0: u32, width: u32, height: u32) -> Result<Self> {
        if !(extent.width() > 0.0 && extent.height() > 0.0) {
            return Err(RenderError::InvalidOption(format!("degenerate extent {}", extent)));
        }
        let scale = (width as f64 / extent.width()).min(height as f64 / extent.height());
        let fw = ((extent.width() * scale).round() as u32).clamp(1, width.max(1));
        let fh = ((extent.height() * scale).round() as u32).clamp(1, height.max(1));
        Ok(Self {
            extent: *extent,
            crs,
            x0: x0 + (width.saturating_sub(fw)) / 2,
            y0: y0 + (height.saturating_sub(fh)) / 2,
            width: fw,
            height: fh,
        })
    }

    /// Map coordinates to (fractional) pixel coordinates
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.x0 as f64 + (x - self.extent.xmin) / self.extent.width() * self.width as f64,
            self.y0 as f64 + (self.extent.ymax - y) / self.extent.height() * self.height as f64,
        )
    }

    /// Pixel coordinates to map coordinates
    pub fn to_geo(&self, px: f64, py: f64) -> (f64, f64) {
        (
            self.extent.xmin + (px - self.x0 as f64) / self.width as f64 * self.extent.width(),
            self.extent.ymax - (py - self.y0 as f64) / self.height as f64 * self.extent.height(),
        )
    }

    fn contains_pixel(&self, px: i64, py: i64) -> bool {
        px >= self.x0 as i64
            && py >= self.y0 as i64
            && px < (self.x0 + self.width) as i64
            && py < (self.y0 + self.height) as i64
    }
}

/// A rendered plot
#[derive(Debug, Clone)]
pub struct Plot {
    pub image: RgbaImage,
    /// Map area of each panel
    pub frames: Vec<MapFrame>,
    /// Color scale shown in the legend, if any
    pub scale: Option<ColormapParams>,
}

impl Plot {
    fn blank(width: u32, height: u32, background: [u8; 4]) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, Rgba(background)),
            frames: Vec::new(),
            scale: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_png(&self.image, path)
    }

    /// PNG-encoded bytes of the image
    pub fn to_png(&self) -> Result<Vec<u8>> {
        encode_png(&self.image)
    }
}

/// Write an image as PNG
pub fn save_png<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<()> {
    let path = path.as_ref();
    image.save_with_format(path, ImageFormat::Png)?;
    debug!("saved {} x {} PNG to {}", image.width(), image.height(), path.display());
    Ok(())
}

/// Encode an image as PNG in memory
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// One image pixel per raster cell, colored through `params`
pub fn raster_image<T: RasterElement>(raster: &Raster<T>, params: &ColormapParams) -> Result<RgbaImage> {
    let rgba = crate::render::raster_to_rgba(raster, params);
    RgbaImage::from_raw(raster.cols() as u32, raster.rows() as u32, rgba)
        .ok_or(RenderError::Empty("raster has no cells"))
}

/// Plot a raster with a color bar
pub fn plot_raster<T: RasterElement>(raster: &Raster<T>, options: &PlotOptions) -> Result<Plot> {
    if raster.is_empty() {
        return Err(RenderError::Empty("raster has no cells"));
    }
    let params = options.scale_or(|| auto_params(raster, options.scheme));
    let (width, height) = options.map_area()?;
    let frame = MapFrame::fit(
        &raster.extent(),
        raster.crs().cloned(),
        options.margin,
        options.margin,
        width,
        height,
    )?;

    let mut plot = Plot::blank(options.width, options.height, options.background);
    draw_raster(&mut plot.image, &frame, raster, &params);
    if options.legend {
        draw_colorbar(&mut plot.image, &params, options.margin, options.margin + height + GUTTER, width);
    }
    plot.frames.push(frame);
    plot.scale = Some(params);
    Ok(plot)
}

/// Plot every layer of a stack in a grid of panels sharing one color scale
pub fn level_plot(stack: &RasterStack, options: &PlotOptions) -> Result<Plot> {
    let extent = stack.extent().ok_or(RenderError::Empty("stack has no layers"))?;
    let n = stack.nlayers() as u32;
    let ncols = (n as f64).sqrt().ceil() as u32;
    let nrows = n.div_ceil(ncols);

    let params = options.scale_or(|| auto_params_stack(stack, options.scheme));
    let (width, height) = options.map_area()?;
    let panel_w = width.saturating_sub(GUTTER * (ncols - 1)) / ncols;
    let panel_h = height.saturating_sub(GUTTER * (nrows - 1)) / nrows;
    if panel_w == 0 || panel_h == 0 {
        return Err(RenderError::InvalidOption(format!(
            "{} x {} image is too small for {} panels",
            options.width, options.height, n
        )));
    }

    let mut plot = Plot::blank(options.width, options.height, options.background);
    for (i, layer) in stack.iter().enumerate() {
        let (row, col) = (i as u32 / ncols, i as u32 % ncols);
        let frame = MapFrame::fit(
            &extent,
            layer.crs().cloned(),
            options.margin + col * (panel_w + GUTTER),
            options.margin + row * (panel_h + GUTTER),
            panel_w,
            panel_h,
        )?;
        draw_raster(&mut plot.image, &frame, layer, &params);
        draw_border(&mut plot.image, &frame, options.outline.rgba());
        plot.frames.push(frame);
    }
    if options.legend {
        draw_colorbar(&mut plot.image, &params, options.margin, options.margin + height + GUTTER, width);
    }
    plot.scale = Some(params);
    debug!("level plot of {} layers in {} x {} panels", n, nrows, ncols);
    Ok(plot)
}

/// Plot a feature collection.
///
/// With `fill_column` set, numeric columns are colored through the scheme
/// and other columns get one categorical color per distinct value.
pub fn plot_features(collection: &FeatureCollection, options: &PlotOptions) -> Result<Plot> {
    let bbox = collection
        .bounding_box()
        .ok_or(RenderError::Empty("no feature has a geometry"))?;
    // pad so single points and straight lines have an area
    let pad = (bbox.width().max(bbox.height()) * 0.05).max(1e-6);
    let extent = bbox.buffered(pad);

    let (colors, scale) = feature_colors(collection, options)?;
    let numeric = scale.is_some();
    let legend = options.legend && numeric;
    let area_options = PlotOptions {
        legend,
        ..options.clone()
    };
    let (width, height) = area_options.map_area()?;
    let frame = MapFrame::fit(
        &extent,
        collection.crs().cloned(),
        options.margin,
        options.margin,
        width,
        height,
    )?;

    let mut plot = Plot::blank(options.width, options.height, options.background);
    draw_features(&mut plot.image, &frame, collection, &colors, options);
    if let (true, Some(params)) = (legend, &scale) {
        draw_colorbar(&mut plot.image, params, options.margin, options.margin + height + GUTTER, width);
    }
    plot.frames.push(frame);
    plot.scale = scale;
    Ok(plot)
}

/// Draw features on top of an existing plot, in every panel.
///
/// The collection must be in the plot's CRS when both are known.
pub fn overlay_features(plot: &mut Plot, collection: &FeatureCollection, options: &PlotOptions) -> Result<()> {
    let (colors, _) = feature_colors(collection, options)?;
    for frame in &plot.frames {
        if let (Some(a), Some(b)) = (frame.crs.as_ref(), collection.crs()) {
            if !a.is_equivalent(b) {
                return Err(Error::CrsMismatch(a.identifier(), b.identifier()).into());
            }
        }
        draw_features(&mut plot.image, frame, collection, &colors, options);
    }
    Ok(())
}

/// Per-feature fill colors, plus the scale when the column is numeric
fn feature_colors(
    collection: &FeatureCollection,
    options: &PlotOptions,
) -> Result<(Vec<[u8; 4]>, Option<ColormapParams>)> {
    let Some(column) = &options.fill_column else {
        return Ok((vec![options.fill_rgba(); collection.len()], None));
    };
    let values = collection.column_values(column)?;

    let numeric = values.iter().all(|v| v.is_null() || v.as_f64().is_some());
    if numeric {
        let params = options.scale_or(|| {
            let finite: Vec<f64> = values.iter().filter_map(AttributeValue::as_f64).collect();
            let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
            let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            match (min.is_finite(), max > min) {
                (true, true) => ColormapParams::with_range(options.scheme, min, max),
                (true, false) => ColormapParams::with_range(options.scheme, min, min + 1.0),
                _ => ColormapParams::new(options.scheme),
            }
        });
        let colors = values
            .iter()
            .map(|v| v.as_f64().map_or(options.fill_rgba(), |x| params.color(x)))
            .collect();
        return Ok((colors, Some(params)));
    }

    let mut keys: Vec<&AttributeValue> = Vec::new();
    let colors = values
        .iter()
        .map(|v| {
            if v.is_null() {
                return options.fill_rgba();
            }
            let idx = match keys.iter().position(|k| k.loosely_equals(v)) {
                Some(i) => i,
                None => {
                    keys.push(v);
                    keys.len() - 1
                }
            };
            category(idx).rgba()
        })
        .collect();
    Ok((colors, None))
}

// ─── Drawing primitives ────────────────────────────────────────────────

fn put(image: &mut RgbaImage, frame: &MapFrame, px: i64, py: i64, color: [u8; 4]) {
    if color[3] == 0 || !frame.contains_pixel(px, py) {
        return;
    }
    let (x, y) = (px as u32, py as u32);
    if x >= image.width() || y >= image.height() {
        return;
    }
    if color[3] == 255 {
        image.put_pixel(x, y, Rgba(color));
        return;
    }
    let dst = image.get_pixel_mut(x, y);
    let a = color[3] as f64 / 255.0;
    for c in 0..3 {
        dst.0[c] = (color[c] as f64 * a + dst.0[c] as f64 * (1.0 - a)).round() as u8;
    }
    dst.0[3] = dst.0[3].max(color[3]);
}

fn draw_raster<T: RasterElement>(image: &mut RgbaImage, frame: &MapFrame, raster: &Raster<T>, params: &ColormapParams) {
    for py in frame.y0..frame.y0 + frame.height {
        for px in frame.x0..frame.x0 + frame.width {
            let (x, y) = frame.to_geo(px as f64 + 0.5, py as f64 + 0.5);
            let Some((row, col)) = raster.cell_at(x, y) else {
                continue;
            };
            let color = match raster.value_f64(row, col) {
                Some(v) => params.color(v),
                None => params.nodata_color,
            };
            put(image, frame, px as i64, py as i64, color);
        }
    }
}

fn draw_colorbar(image: &mut RgbaImage, params: &ColormapParams, x0: u32, y0: u32, width: u32) {
    let steps = width.max(2) - 1;
    for i in 0..width {
        let Rgb { r, g, b } = evaluate(params.scheme, i as f64 / steps as f64);
        for y in y0..(y0 + LEGEND_HEIGHT).min(image.height()) {
            if x0 + i < image.width() {
                image.put_pixel(x0 + i, y, Rgba([r, g, b, 255]));
            }
        }
    }
}

fn draw_border(image: &mut RgbaImage, frame: &MapFrame, color: [u8; 4]) {
    let (x0, y0) = (frame.x0 as i64, frame.y0 as i64);
    let (x1, y1) = (x0 + frame.width as i64 - 1, y0 + frame.height as i64 - 1);
    for (a, b) in [((x0, y0), (x1, y0)), ((x1, y0), (x1, y1)), ((x1, y1), (x0, y1)), ((x0, y1), (x0, y0))] {
        draw_line(image, frame, a, b, color);
    }
}

/// Clip a segment to the frame's pixel rectangle (Liang-Barsky)
fn clip_to_frame(frame: &MapFrame, (x0, y0): (i64, i64), (x1, y1): (i64, i64)) -> Option<((i64, i64), (i64, i64))> {
    if frame.contains_pixel(x0, y0) && frame.contains_pixel(x1, y1) {
        return Some(((x0, y0), (x1, y1)));
    }
    let (xmin, ymin) = (frame.x0 as f64, frame.y0 as f64);
    let xmax = xmin + frame.width as f64 - 1.0;
    let ymax = ymin + frame.height as f64 - 1.0;
    let (fx, fy) = (x0 as f64, y0 as f64);
    let (dx, dy) = (x1 as f64 - fx, y1 as f64 - fy);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in [(-dx, fx - xmin), (dx, xmax - fx), (-dy, fy - ymin), (dy, ymax - fy)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }
    let at = |t: f64| ((fx + t * dx).round() as i64, (fy + t * dy).round() as i64);
    Some((at(t0), at(t1)))
}

fn draw_line(image: &mut RgbaImage, frame: &MapFrame, from: (i64, i64), to: (i64, i64), color: [u8; 4]) {
    let Some(((mut x0, mut y0), (x1, y1))) = clip_to_frame(frame, from, to) else {
        return;
    };
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put(image, frame, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn fill_circle(image: &mut RgbaImage, frame: &MapFrame, (cx, cy): (f64, f64), radius: u32, fill: [u8; 4], outline: [u8; 4]) {
    let r = radius as f64;
    let (cx_i, cy_i) = (cx.floor() as i64, cy.floor() as i64);
    let ri = radius as i64 + 1;
    for py in cy_i - ri..=cy_i + ri {
        for px in cx_i - ri..=cx_i + ri {
            let d = ((px as f64 + 0.5 - cx).powi(2) + (py as f64 + 0.5 - cy).powi(2)).sqrt();
            if d <= r - 1.0 {
                put(image, frame, px, py, fill);
            } else if d <= r {
                put(image, frame, px, py, outline);
            }
        }
    }
}

/// Scan-fill rings with the even-odd rule, sampling at pixel centres
fn fill_rings(image: &mut RgbaImage, frame: &MapFrame, rings: &[Vec<(f64, f64)>], color: [u8; 4]) {
    let ymin = rings.iter().flatten().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let ymax = rings.iter().flatten().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    if !ymin.is_finite() || !ymax.is_finite() {
        return;
    }
    let top = (ymin.floor() as i64).max(frame.y0 as i64);
    let bottom = (ymax.ceil() as i64).min((frame.y0 + frame.height) as i64);

    let mut crossings = Vec::new();
    for py in top..bottom {
        let y = py as f64 + 0.5;
        crossings.clear();
        for ring in rings {
            for edge in ring.windows(2) {
                let ((x0, y0), (x1, y1)) = (edge[0], edge[1]);
                if (y0 <= y && y < y1) || (y1 <= y && y < y0) {
                    crossings.push(x0 + (y - y0) / (y1 - y0) * (x1 - x0));
                }
            }
        }
        crossings.sort_by(f64::total_cmp);
        for pair in crossings.chunks(2) {
            if let [a, b] = pair {
                let start = ((a - 0.5).ceil() as i64).max(frame.x0 as i64);
                let end = ((b - 0.5).floor() as i64).min((frame.x0 + frame.width) as i64 - 1);
                for px in start..=end {
                    put(image, frame, px, py, color);
                }
            }
        }
    }
}

fn ring_pixels(frame: &MapFrame, ring: &LineString<f64>) -> Vec<(f64, f64)> {
    ring.coords().map(|c| frame.to_pixel(c.x, c.y)).collect()
}

fn stroke(image: &mut RgbaImage, frame: &MapFrame, pixels: &[(f64, f64)], color: [u8; 4]) {
    for seg in pixels.windows(2) {
        let a = (seg[0].0.floor() as i64, seg[0].1.floor() as i64);
        let b = (seg[1].0.floor() as i64, seg[1].1.floor() as i64);
        draw_line(image, frame, a, b, color);
    }
}

fn draw_polygon(image: &mut RgbaImage, frame: &MapFrame, polygon: &Polygon<f64>, fill: [u8; 4], outline: [u8; 4]) {
    let rings: Vec<Vec<(f64, f64)>> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| ring_pixels(frame, ring))
        .collect();
    fill_rings(image, frame, &rings, fill);
    for ring in &rings {
        stroke(image, frame, ring, outline);
    }
}

fn draw_geometry(
    image: &mut RgbaImage,
    frame: &MapFrame,
    geometry: &Geometry<f64>,
    fill: [u8; 4],
    options: &PlotOptions,
) {
    let outline = options.outline.rgba();
    match geometry {
        Geometry::Point(p) => {
            fill_circle(image, frame, frame.to_pixel(p.x(), p.y()), options.point_radius, fill, outline)
        }
        Geometry::MultiPoint(mp) => {
            for p in mp {
                fill_circle(image, frame, frame.to_pixel(p.x(), p.y()), options.point_radius, fill, outline);
            }
        }
        Geometry::Line(l) => {
            let a = frame.to_pixel(l.start.x, l.start.y);
            let b = frame.to_pixel(l.end.x, l.end.y);
            stroke(image, frame, &[a, b], outline);
        }
        Geometry::LineString(ls) => stroke(image, frame, &ring_pixels(frame, ls), outline),
        Geometry::MultiLineString(mls) => {
            for ls in mls {
                stroke(image, frame, &ring_pixels(frame, ls), outline);
            }
        }
        Geometry::Polygon(p) => draw_polygon(image, frame, p, fill, outline),
        Geometry::MultiPolygon(mp) => {
            for p in mp {
                draw_polygon(image, frame, p, fill, outline);
            }
        }
        Geometry::Rect(r) => draw_polygon(image, frame, &r.to_polygon(), fill, outline),
        Geometry::Triangle(t) => draw_polygon(image, frame, &t.to_polygon(), fill, outline),
        Geometry::GeometryCollection(gc) => {
            for g in gc {
                draw_geometry(image, frame, g, fill, options);
            }
        }
    }
}

fn draw_features(
    image: &mut RgbaImage,
    frame: &MapFrame,
    collection: &FeatureCollection,
    colors: &[[u8; 4]],
    options: &PlotOptions,
) {
    for (feature, fill) in collection.iter().zip(colors) {
        if let Some(geometry) = &feature.geometry {
            draw_geometry(image, frame, geometry, *fill, options);
        }
    }
}
