//! KMZ export for Google Earth
//!
//! A KMZ file is a zip holding `doc.kml`. Rasters become a ground overlay
//! whose image is stored next to it as `overlay.png`; features become
//! placemarks.

use crate::error::{RenderError, Result};
use crate::plot::{encode_png, raster_image};
use crate::render::ColormapParams;
use crate::web_map::escape_html;
use geo_types::{Geometry, LineString, Polygon};
use geodeck_core::raster::{Raster, RasterElement};
use geodeck_core::vector::FeatureCollection;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;
use zip::write::{SimpleFileOptions, ZipWriter};

const KML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
<Document>
"#;
const KML_FOOTER: &str = "</Document>\n</kml>\n";

fn require_geographic(what: &'static str, crs: Option<&geodeck_core::CRS>) -> Result<()> {
    if crs.and_then(|c| c.epsg()) == Some(4326) {
        return Ok(());
    }
    Err(RenderError::NotGeographic {
        what,
        found: crs.map(|c| c.identifier()).unwrap_or_else(|| "no CRS".to_string()),
    })
}

fn write_archive(path: &Path, entries: &[(&str, &[u8])]) -> Result<()> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(content)?;
    }
    zip.finish()?;
    Ok(())
}

/// Write a raster as a KMZ ground overlay; the raster must be in EPSG:4326
pub fn write_kmz_raster<T, P>(raster: &Raster<T>, params: &ColormapParams, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    require_geographic("KMZ raster", raster.crs())?;
    let png = encode_png(&raster_image(raster, params)?)?;
    let e = raster.extent();
    let name = escape_html(raster.name().unwrap_or("raster"));

    let mut kml = String::from(KML_HEADER);
    let _ = write!(
        kml,
        "<GroundOverlay>\n<name>{}</name>\n<Icon><href>overlay.png</href></Icon>\n\
         <LatLonBox><north>{}</north><south>{}</south><east>{}</east><west>{}</west></LatLonBox>\n\
         </GroundOverlay>\n",
        name, e.ymax, e.ymin, e.xmax, e.xmin
    );
    kml.push_str(KML_FOOTER);

    write_archive(path, &[("doc.kml", kml.as_bytes()), ("overlay.png", &png)])?;
    info!("exported {} x {} raster overlay to {}", raster.rows(), raster.cols(), path.display());
    Ok(())
}

/// Write features as KMZ placemarks; the collection must be in EPSG:4326.
///
/// Each placemark carries every column as `ExtendedData`.
pub fn write_kmz_features<P: AsRef<Path>>(collection: &FeatureCollection, path: P) -> Result<()> {
    let path = path.as_ref();
    require_geographic("KMZ features", collection.crs())?;

    let mut kml = String::from(KML_HEADER);
    for (i, feature) in collection.iter().enumerate() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        let name = feature
            .id
            .clone()
            .unwrap_or_else(|| format!("feature {}", i + 1));
        let _ = writeln!(kml, "<Placemark>\n<name>{}</name>", escape_html(&name));
        if !collection.columns().is_empty() {
            kml.push_str("<ExtendedData>\n");
            for column in collection.columns() {
                let _ = writeln!(
                    kml,
                    "<Data name=\"{}\"><value>{}</value></Data>",
                    escape_html(column),
                    escape_html(&feature.value(column).to_string())
                );
            }
            kml.push_str("</ExtendedData>\n");
        }
        write_geometry(&mut kml, geometry);
        kml.push_str("</Placemark>\n");
    }
    kml.push_str(KML_FOOTER);

    write_archive(path, &[("doc.kml", kml.as_bytes())])?;
    info!("exported {} placemarks to {}", collection.len(), path.display());
    Ok(())
}

fn coordinates(line: &LineString<f64>) -> String {
    line.coords()
        .map(|c| format!("{},{}", c.x, c.y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_polygon(kml: &mut String, polygon: &Polygon<f64>) {
    let _ = writeln!(
        kml,
        "<Polygon><outerBoundaryIs><LinearRing><coordinates>{}</coordinates></LinearRing></outerBoundaryIs>",
        coordinates(polygon.exterior())
    );
    for hole in polygon.interiors() {
        let _ = writeln!(
            kml,
            "<innerBoundaryIs><LinearRing><coordinates>{}</coordinates></LinearRing></innerBoundaryIs>",
            coordinates(hole)
        );
    }
    kml.push_str("</Polygon>\n");
}

fn write_geometry(kml: &mut String, geometry: &Geometry<f64>) {
    match geometry {
        Geometry::Point(p) => {
            let _ = writeln!(kml, "<Point><coordinates>{},{}</coordinates></Point>", p.x(), p.y());
        }
        Geometry::Line(l) => {
            let _ = writeln!(
                kml,
                "<LineString><coordinates>{},{} {},{}</coordinates></LineString>",
                l.start.x, l.start.y, l.end.x, l.end.y
            );
        }
        Geometry::LineString(ls) => {
            let _ = writeln!(kml, "<LineString><coordinates>{}</coordinates></LineString>", coordinates(ls));
        }
        Geometry::Polygon(p) => write_polygon(kml, p),
        Geometry::Rect(r) => write_polygon(kml, &r.to_polygon()),
        Geometry::Triangle(t) => write_polygon(kml, &t.to_polygon()),
        Geometry::MultiPoint(mp) => {
            kml.push_str("<MultiGeometry>\n");
            for p in mp {
                write_geometry(kml, &Geometry::Point(*p));
            }
            kml.push_str("</MultiGeometry>\n");
        }
        Geometry::MultiLineString(mls) => {
            kml.push_str("<MultiGeometry>\n");
            for ls in mls {
                let _ = writeln!(kml, "<LineString><coordinates>{}</coordinates></LineString>", coordinates(ls));
            }
            kml.push_str("</MultiGeometry>\n");
        }
        Geometry::MultiPolygon(mp) => {
            kml.push_str("<MultiGeometry>\n");
            for p in mp {
                write_polygon(kml, p);
            }
            kml.push_str("</MultiGeometry>\n");
        }
        Geometry::GeometryCollection(gc) => {
            kml.push_str("<MultiGeometry>\n");
            for g in gc {
                write_geometry(kml, g);
            }
            kml.push_str("</MultiGeometry>\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::ColorScheme;
    use geo_types::{polygon, Point};
    use geodeck_core::raster::{Extent, GeoTransform};
    use geodeck_core::vector::Feature;
    use geodeck_core::CRS;
    use std::io::Read;

    fn read_entry(path: &Path, name: &str) -> Vec<u8> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut out = Vec::new();
        entry.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn raster_becomes_ground_overlay() {
        let mut r = Raster::filled(2, 3, 5.0).with_name("alt");
        r.set_transform(GeoTransform::from_extent(&Extent::new(-75.0, -72.0, -14.0, -12.0), 2, 3));
        r.set_crs(Some(CRS::wgs84()));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alt.kmz");
        write_kmz_raster(&r, &ColormapParams::new(ColorScheme::Terrain), &path).unwrap();

        let kml = String::from_utf8(read_entry(&path, "doc.kml")).unwrap();
        assert!(kml.contains("<name>alt</name>"));
        assert!(kml.contains("<north>-12</north><south>-14</south><east>-72</east><west>-75</west>"));
        let png = read_entry(&path, "overlay.png");
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
    }

    #[test]
    fn features_become_placemarks() {
        let collection = FeatureCollection::from_features(
            vec![
                Feature::new(Geometry::Point(Point::new(2.35, 48.86))).with_property("city", "Paris"),
                Feature::new(Geometry::Polygon(polygon![
                    (x: 0.0, y: 0.0),
                    (x: 1.0, y: 0.0),
                    (x: 1.0, y: 1.0),
                    (x: 0.0, y: 0.0),
                ]))
                .with_property("city", "R&D"),
            ],
            Some(CRS::wgs84()),
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cities.kmz");
        write_kmz_features(&collection, &path).unwrap();

        let kml = String::from_utf8(read_entry(&path, "doc.kml")).unwrap();
        assert_eq!(kml.matches("<Placemark>").count(), 2);
        assert!(kml.contains("<Point><coordinates>2.35,48.86</coordinates></Point>"));
        assert!(kml.contains("<coordinates>0,0 1,0 1,1 0,0</coordinates>"));
        assert!(kml.contains("<value>R&amp;D</value>"));
    }

    #[test]
    fn projected_collection_is_rejected() {
        let collection = FeatureCollection::from_features(
            vec![Feature::new(Geometry::Point(Point::new(500000.0, 0.0)))],
            Some(CRS::utm(31, true)),
        );
        let dir = tempfile::tempdir().unwrap();
        let err = write_kmz_features(&collection, dir.path().join("x.kmz")).unwrap_err();
        assert!(matches!(err, RenderError::NotGeographic { .. }));
    }
}
