//! Tests against the real services.
//!
//! All tests here are `#[ignore]`d because they need network access.
//! Run with: `cargo test -p geodeck-remote -- --ignored`

use geodeck_remote::blocking::{self, Provider};
use geodeck_remote::{Geocoder, NominatimGeocoder, ReqwestClient, Resolution, Variable, WorldClim};

#[tokio::test]
#[ignore]
async fn nominatim_finds_lima() {
    let geocoder = NominatimGeocoder::new(ReqwestClient::new().expect("client"));
    let r = geocoder.geocode("Plaza Mayor, Lima, Peru").await.expect("geocode");
    println!("{} -> ({}, {})", r.address, r.lon, r.lat);
    assert!((r.lon + 77.03).abs() < 0.1);
    assert!((r.lat + 12.05).abs() < 0.1);
}

#[test]
#[ignore]
fn blocking_geocode_of_unknown_place_fails() {
    let result = blocking::geocode(&Provider::Nominatim, &["zzzz-no-such-place-qqqq"]);
    assert!(result.is_err());
}

/// Downloads the coarsest elevation archive (a few MB).
#[test]
#[ignore]
fn worldclim_elevation_download() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dataset = WorldClim::new(Variable::Alt, Resolution::Min10);
    let layers = blocking::download_worldclim(&dataset, dir.path()).expect("download");
    assert_eq!(layers.len(), Variable::Alt.layer_count());

    let dem: geodeck_core::Raster<f64> = geodeck_core::io::read_raster(&layers[0]).expect("read");
    assert_eq!(dem.crs().and_then(|c| c.epsg()), Some(4326));
}
