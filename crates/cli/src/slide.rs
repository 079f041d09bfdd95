//! Text summaries printed after each step

use crate::deck::session::Value;
use geodeck_algorithms::raster::ExtractTable;
use geodeck_core::raster::{Raster, RasterStack};
use geodeck_core::vector::FeatureCollection;
use geodeck_remote::GeocodeResult;
use std::fmt::{self, Write as _};

const PREVIEW_ROWS: usize = 6;

/// Result of one step, formatted like a slide
#[derive(Debug, Clone, PartialEq)]
pub struct Slide {
    pub index: usize,
    pub title: String,
    pub body: String,
}

impl fmt::Display for Slide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = format!("── {}. {} ", self.index, self.title);
        let rule = "─".repeat(60usize.saturating_sub(header.chars().count()));
        writeln!(f, "{}{}", header, rule)?;
        for line in self.body.lines() {
            writeln!(f, "  {}", line)?;
        }
        Ok(())
    }
}

fn crs_label(crs: Option<&geodeck_core::CRS>) -> String {
    crs.map(|c| c.identifier()).unwrap_or_else(|| "no CRS".to_string())
}

fn number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{:.4}", v)
    }
}

/// Describe any session value
pub fn describe(value: &Value) -> String {
    match value {
        Value::Vector(fc) | Value::Points(fc) => describe_features(fc),
        Value::Raster(r) => describe_raster(r),
        Value::Stack(s) => describe_stack(s),
        Value::Table(t) => describe_table(t),
        Value::Location(l) => describe_location(l),
    }
}

pub fn describe_features(fc: &FeatureCollection) -> String {
    let mut out = String::new();
    let kind = match fc.geometry_kind() {
        Ok(Some(kind)) => kind.name().to_string(),
        Ok(None) => "no geometry".to_string(),
        Err(_) => "mixed geometries".to_string(),
    };
    let _ = writeln!(
        out,
        "{} features, {} columns, {}, {}",
        fc.len(),
        fc.columns().len(),
        kind,
        crs_label(fc.crs())
    );
    if let Some(bbox) = fc.bounding_box() {
        let _ = writeln!(out, "bbox {}", bbox);
    }
    if fc.columns().is_empty() {
        return out;
    }

    let columns = fc.columns();
    let rows: Vec<Vec<String>> = fc
        .iter()
        .take(PREVIEW_ROWS)
        .map(|f| columns.iter().map(|c| f.value(c).to_string()).collect())
        .collect();
    out.push_str(&text_table(columns, &rows));
    if fc.len() > PREVIEW_ROWS {
        let _ = writeln!(out, "... {} more rows", fc.len() - PREVIEW_ROWS);
    }
    out
}

pub fn describe_raster(r: &Raster<f64>) -> String {
    let mut out = String::new();
    let (rx, ry) = r.resolution();
    let _ = writeln!(
        out,
        "raster '{}': {} rows x {} cols, resolution {} x {}, {}",
        r.name().unwrap_or("unnamed"),
        r.rows(),
        r.cols(),
        number(rx),
        number(ry.abs()),
        crs_label(r.crs())
    );
    let _ = writeln!(out, "extent {}", r.extent());
    let stats = r.statistics();
    match (stats.min, stats.max, stats.mean) {
        (Some(min), Some(max), Some(mean)) => {
            let _ = writeln!(
                out,
                "min {}  max {}  mean {}  ({} no-data cells)",
                number(min),
                number(max),
                number(mean),
                stats.nodata_count
            );
        }
        _ => {
            let _ = writeln!(out, "all cells are no-data");
        }
    }
    out
}

pub fn describe_stack(s: &RasterStack) -> String {
    let mut out = String::new();
    let (rows, cols) = s.shape().unwrap_or((0, 0));
    let _ = writeln!(
        out,
        "stack of {} layers: {}",
        s.nlayers(),
        s.names().join(", ")
    );
    let _ = writeln!(out, "{} rows x {} cols, {}", rows, cols, crs_label(s.crs()));
    if let Some(extent) = s.extent() {
        let _ = writeln!(out, "extent {}", extent);
    }
    out
}

pub fn describe_table(t: &ExtractTable) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} points x {} layers", t.len(), t.layers.len());
    let mut header = vec!["x".to_string(), "y".to_string()];
    header.extend(t.layers.iter().cloned());
    let rows: Vec<Vec<String>> = t
        .points
        .iter()
        .zip(&t.rows)
        .take(PREVIEW_ROWS)
        .map(|(&(x, y), values)| {
            let mut row = vec![number(x), number(y)];
            row.extend(values.iter().map(|v| v.map(number).unwrap_or_else(|| "NA".to_string())));
            row
        })
        .collect();
    out.push_str(&text_table(&header, &rows));
    if t.len() > PREVIEW_ROWS {
        let _ = writeln!(out, "... {} more rows", t.len() - PREVIEW_ROWS);
    }
    out
}

pub fn describe_location(l: &GeocodeResult) -> String {
    format!("{}\nlon {:.6}  lat {:.6}\n", l.address, l.lon, l.lat)
}

/// Left-aligned columns separated by two spaces
fn text_table(header: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }
    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    let mut out = String::new();
    let _ = writeln!(out, "{}", line(header));
    for row in rows {
        let _ = writeln!(out, "{}", line(row));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{Geometry, Point};
    use geodeck_core::raster::GeoTransform;
    use geodeck_core::vector::Feature;
    use geodeck_core::CRS;

    #[test]
    fn slide_has_a_numbered_header() {
        let slide = Slide {
            index: 3,
            title: "aggregate → coarse".into(),
            body: "line one\nline two".into(),
        };
        let text = slide.to_string();
        assert!(text.starts_with("── 3. aggregate → coarse ─"));
        assert!(text.contains("\n  line one\n  line two\n"));
    }

    #[test]
    fn raster_summary_reports_grid_and_values() {
        let mut r = Raster::from_vec(vec![1.0, 2.0, 3.0, f64::NAN], 2, 2).unwrap().with_name("tmin1");
        r.set_transform(GeoTransform::new(-82.0, -8.0, 0.5, -0.5));
        r.set_nodata(Some(f64::NAN));
        r.set_crs(Some(CRS::wgs84()));
        let text = describe_raster(&r);
        assert!(text.contains("raster 'tmin1': 2 rows x 2 cols, resolution 0.5000 x 0.5000, EPSG:4326"));
        assert!(text.contains("min 1  max 3  mean 2  (1 no-data cells)"));
    }

    #[test]
    fn feature_summary_previews_rows() {
        let fc = FeatureCollection::from_features(
            vec![
                Feature::new(Geometry::Point(Point::new(2.35, 48.86))).with_property("name", "Paris"),
                Feature::new(Geometry::Point(Point::new(4.9, 52.37))).with_property("name", "Amsterdam"),
            ],
            Some(CRS::wgs84()),
        );
        let text = describe_features(&fc);
        assert!(text.starts_with("2 features, 1 columns, POINT, EPSG:4326"));
        assert!(text.contains("\nname\nParis\nAmsterdam\n"));
    }

    #[test]
    fn table_summary_prints_na() {
        let t = ExtractTable {
            layers: vec!["tmin1".into()],
            points: vec![(-77.0, -12.0), (0.0, 0.0)],
            rows: vec![vec![Some(14.5)], vec![None]],
        };
        let text = describe_table(&t);
        assert!(text.contains("x    y    tmin1"));
        assert!(text.contains("-77  -12  14.5000"));
        assert!(text.contains("0    0    NA"));
    }
}
