//! Self-contained interactive maps (Leaflet + OpenStreetMap tiles)

use crate::error::{RenderError, Result};
use crate::plot::{encode_png, raster_image};
use crate::render::ColormapParams;
use crate::scheme::{category, evaluate, Rgb};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use geodeck_core::io::to_geojson_string;
use geodeck_core::raster::{Raster, RasterElement};
use geodeck_core::vector::{AttributeValue, FeatureCollection};
use geodeck_core::CRS;
use serde_json::json;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::info;

const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";
const OSM_TILES: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
const OSM_ATTRIBUTION: &str = "&copy; OpenStreetMap contributors";

fn require_geographic(what: &'static str, crs: Option<&CRS>) -> Result<()> {
    match crs {
        Some(c) if c.epsg() == Some(4326) => Ok(()),
        Some(c) => Err(RenderError::NotGeographic {
            what,
            found: c.identifier(),
        }),
        None => Err(RenderError::NotGeographic {
            what,
            found: "no CRS".to_string(),
        }),
    }
}

#[derive(Debug, Clone)]
struct ImageOverlay {
    name: String,
    data_url: String,
    /// south, west, north, east
    bounds: [f64; 4],
    opacity: f64,
}

#[derive(Debug, Clone)]
struct GeoJsonLayer {
    name: String,
    geojson: serde_json::Value,
    popup_columns: Vec<String>,
    /// One fill color per feature, hex
    colors: Vec<String>,
}

#[derive(Debug, Clone)]
struct Marker {
    lon: f64,
    lat: f64,
    label: String,
}

/// Builder for a Leaflet page.
///
/// Everything is embedded in the HTML (rasters as base64 PNG, features as
/// GeoJSON) except the Leaflet library and the base tiles.
#[derive(Debug, Clone)]
pub struct WebMap {
    title: String,
    overlays: Vec<ImageOverlay>,
    layers: Vec<GeoJsonLayer>,
    markers: Vec<Marker>,
}

impl WebMap {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            overlays: Vec::new(),
            layers: Vec::new(),
            markers: Vec::new(),
        }
    }

    /// Add a raster as an image overlay; the raster must be in EPSG:4326
    pub fn raster_overlay<T: RasterElement>(
        mut self,
        raster: &Raster<T>,
        params: &ColormapParams,
    ) -> Result<Self> {
        require_geographic("raster overlay", raster.crs())?;
        let png = encode_png(&raster_image(raster, params)?)?;
        let e = raster.extent();
        self.overlays.push(ImageOverlay {
            name: raster.name().unwrap_or("raster").to_string(),
            data_url: format!("data:image/png;base64,{}", STANDARD.encode(png)),
            bounds: [e.ymin, e.xmin, e.ymax, e.xmax],
            opacity: 0.7,
        });
        Ok(self)
    }

    /// Add a feature layer with popups showing `popup_columns`.
    ///
    /// With `fill` set to a numeric column and a scale, features are colored
    /// through it; a text column gets one categorical color per value.
    pub fn features(
        mut self,
        name: impl Into<String>,
        collection: &FeatureCollection,
        popup_columns: &[&str],
        fill: Option<(&str, &ColormapParams)>,
    ) -> Result<Self> {
        require_geographic("feature layer", collection.crs())?;
        for column in popup_columns {
            if !collection.has_column(column) {
                return Err(geodeck_core::Error::UnknownColumn(column.to_string()).into());
            }
        }
        let colors = match fill {
            None => vec![Rgb::new(51, 136, 255).hex(); collection.len()],
            Some((column, params)) => fill_colors(&collection.column_values(column)?, params),
        };
        let geojson: serde_json::Value = serde_json::from_str(&to_geojson_string(collection)?)?;
        self.layers.push(GeoJsonLayer {
            name: name.into(),
            geojson,
            popup_columns: popup_columns.iter().map(|c| c.to_string()).collect(),
            colors,
        });
        Ok(self)
    }

    /// Add a labelled marker at a longitude/latitude
    pub fn marker(mut self, lon: f64, lat: f64, label: impl Into<String>) -> Self {
        self.markers.push(Marker {
            lon,
            lat,
            label: label.into(),
        });
        self
    }

    /// South-west and north-east corners covering everything on the map
    fn bounds(&self) -> Option<[[f64; 2]; 2]> {
        let mut pts: Vec<(f64, f64)> = Vec::new();
        for o in &self.overlays {
            pts.push((o.bounds[0], o.bounds[1]));
            pts.push((o.bounds[2], o.bounds[3]));
        }
        for l in &self.layers {
            collect_coords(&l.geojson, &mut pts);
        }
        pts.extend(self.markers.iter().map(|m| (m.lat, m.lon)));

        let (mut south, mut west) = (f64::INFINITY, f64::INFINITY);
        let (mut north, mut east) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (lat, lon) in pts {
            south = south.min(lat);
            north = north.max(lat);
            west = west.min(lon);
            east = east.max(lon);
        }
        south.is_finite().then_some([[south, west], [north, east]])
    }

    /// Render the page
    pub fn to_html(&self) -> String {
        let mut script = String::new();
        let _ = writeln!(script, "var map = L.map('map');");
        let _ = writeln!(
            script,
            "L.tileLayer({}, {{maxZoom: 19, attribution: {}}}).addTo(map);",
            json!(OSM_TILES),
            json!(OSM_ATTRIBUTION)
        );
        let _ = writeln!(script, "var overlays = {{}};");

        for o in &self.overlays {
            let _ = writeln!(
                script,
                "overlays[{}] = L.imageOverlay({}, [[{}, {}], [{}, {}]], {{opacity: {}}}).addTo(map);",
                json!(o.name),
                json!(o.data_url),
                o.bounds[0],
                o.bounds[1],
                o.bounds[2],
                o.bounds[3],
                o.opacity
            );
        }

        for (i, l) in self.layers.iter().enumerate() {
            let _ = writeln!(script, "var colors{} = {};", i, json!(l.colors));
            let _ = writeln!(script, "var popup{} = {};", i, json!(l.popup_columns));
            let _ = writeln!(
                script,
                "overlays[{name}] = L.geoJSON({data}, {{\n  \
                   style: function (f) {{ return {{color: '#333333', weight: 1, fillOpacity: 0.6, fillColor: colors{i}[f.properties.__index]}}; }},\n  \
                   pointToLayer: function (f, latlng) {{ return L.circleMarker(latlng, {{radius: 5}}); }},\n  \
                   onEachFeature: function (f, layer) {{\n    \
                     var rows = popup{i}.map(function (c) {{ return '<b>' + escapeHtml(c) + '</b>: ' + escapeHtml(String(f.properties[c])); }});\n    \
                     if (rows.length) {{ layer.bindPopup(rows.join('<br>')); }}\n  \
                   }}\n}}).addTo(map);",
                name = json!(l.name),
                data = indexed(&l.geojson),
                i = i
            );
        }

        for m in &self.markers {
            let _ = writeln!(
                script,
                "L.marker([{}, {}]).addTo(map).bindPopup({});",
                m.lat,
                m.lon,
                json!(escape_html(&m.label))
            );
        }

        let _ = writeln!(script, "L.control.layers(null, overlays).addTo(map);");
        match self.bounds() {
            Some([[s, w], [n, e]]) if s < n || w < e => {
                let _ = writeln!(script, "map.fitBounds([[{}, {}], [{}, {}]]);", s, w, n, e);
            }
            Some([[lat, lon], _]) => {
                let _ = writeln!(script, "map.setView([{}, {}], 12);", lat, lon);
            }
            None => {
                let _ = writeln!(script, "map.setView([0, 0], 2);");
            }
        }

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<link rel="stylesheet" href="{css}">
<script src="{js}"></script>
<style>html, body, #map {{ height: 100%; margin: 0; }}</style>
</head>
<body>
<div id="map"></div>
<script>
function escapeHtml(s) {{
  return s.replace(/&/g, '&amp;').replace(/</g, '&lt;').replace(/>/g, '&gt;').replace(/"/g, '&quot;');
}}
{script}</script>
</body>
</html>
"#,
            title = escape_html(&self.title),
            css = LEAFLET_CSS,
            js = LEAFLET_JS,
            script = script
        )
    }

    /// Write the page to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_html())?;
        info!(
            "wrote web map to {} ({} overlays, {} feature layers, {} markers)",
            path.display(),
            self.overlays.len(),
            self.layers.len(),
            self.markers.len()
        );
        Ok(())
    }
}

fn fill_colors(values: &[AttributeValue], params: &ColormapParams) -> Vec<String> {
    let mut keys: Vec<&AttributeValue> = Vec::new();
    values
        .iter()
        .map(|v| match v {
            AttributeValue::Null => "#c8c8c8".to_string(),
            AttributeValue::Int(_) | AttributeValue::Float(_) => {
                let x = v.as_f64().unwrap_or(f64::NAN);
                if x.is_finite() {
                    evaluate(params.scheme, params.normalize(x)).hex()
                } else {
                    "#c8c8c8".to_string()
                }
            }
            _ => {
                let idx = match keys.iter().position(|k| k.loosely_equals(v)) {
                    Some(i) => i,
                    None => {
                        keys.push(v);
                        keys.len() - 1
                    }
                };
                category(idx).hex()
            }
        })
        .collect()
}

/// Tag each feature with its position so the style callback can find its color
fn indexed(geojson: &serde_json::Value) -> serde_json::Value {
    let mut out = geojson.clone();
    if let Some(features) = out.get_mut("features").and_then(|f| f.as_array_mut()) {
        for (i, feature) in features.iter_mut().enumerate() {
            if let Some(props) = feature.get_mut("properties").and_then(|p| p.as_object_mut()) {
                props.insert("__index".to_string(), json!(i));
            }
        }
    }
    out
}

/// (lat, lon) of every position in a GeoJSON value
fn collect_coords(value: &serde_json::Value, out: &mut Vec<(f64, f64)>) {
    match value {
        serde_json::Value::Array(items) => {
            if let [x, y, ..] = items.as_slice() {
                if let (Some(lon), Some(lat)) = (x.as_f64(), y.as_f64()) {
                    out.push((lat, lon));
                    return;
                }
            }
            for item in items {
                collect_coords(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for (key, v) in map {
                if key != "properties" {
                    collect_coords(v, out);
                }
            }
        }
        _ => {}
    }
}

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::ColorScheme;
    use geo_types::{polygon, Geometry};
    use geodeck_core::raster::{Extent, GeoTransform};
    use geodeck_core::vector::Feature;

    fn peru_grid(crs: CRS) -> Raster<f64> {
        let mut r = Raster::from_vec((0..12).map(f64::from).collect(), 3, 4).unwrap();
        r.set_transform(GeoTransform::from_extent(&Extent::new(-82.0, -70.0, -18.0, -9.0), 3, 4));
        r.set_crs(Some(crs));
        r.with_name("tmin1")
    }

    fn regions() -> FeatureCollection {
        FeatureCollection::from_features(
            vec![Feature::new(Geometry::Polygon(polygon![
                (x: -77.0, y: -12.0),
                (x: -76.0, y: -12.0),
                (x: -76.0, y: -11.0),
                (x: -77.0, y: -12.0),
            ]))
            .with_property("name", "Lima <metro>")
            .with_property("pop", 9_700_000i64)],
            Some(CRS::wgs84()),
        )
    }

    #[test]
    fn page_embeds_overlay_features_and_markers() {
        let params = ColormapParams::with_range(ColorScheme::Temperature, 0.0, 11.0);
        let html = WebMap::new("Peru & friends")
            .raster_overlay(&peru_grid(CRS::wgs84()), &params)
            .unwrap()
            .features("regions", &regions(), &["name", "pop"], Some(("pop", &params)))
            .unwrap()
            .marker(-71.54, -16.41, "Arequipa")
            .to_html();

        assert!(html.contains("<title>Peru &amp; friends</title>"));
        assert!(html.contains("L.imageOverlay(\"data:image/png;base64,iVBOR"));
        assert!(html.contains("[[-18, -82], [-9, -70]]"));
        assert!(html.contains("L.geoJSON("));
        assert!(html.contains("\"__index\":0"));
        assert!(html.contains("L.marker([-16.41, -71.54])"));
        assert!(html.contains("map.fitBounds([[-18, -82], [-9, -70]]);"));
    }

    #[test]
    fn marker_labels_are_escaped() {
        let html = WebMap::new("m").marker(0.0, 0.0, "<script>alert(1)</script>").to_html();
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn projected_data_is_rejected() {
        let params = ColormapParams::new(ColorScheme::Viridis);
        let err = WebMap::new("m")
            .raster_overlay(&peru_grid(CRS::utm(18, false)), &params)
            .unwrap_err();
        assert!(matches!(err, RenderError::NotGeographic { .. }));
        assert!(err.to_string().contains("32718"));
    }

    #[test]
    fn unknown_popup_column_is_an_error() {
        let err = WebMap::new("m").features("r", &regions(), &["gdp"], None).unwrap_err();
        assert!(matches!(err, RenderError::Core(geodeck_core::Error::UnknownColumn(_))));
    }

    #[test]
    fn save_writes_html() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.html");
        WebMap::new("empty").save(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("<!DOCTYPE html>"));
        assert!(text.contains("map.setView([0, 0], 2);"));
    }
}
