//! Address geocoding.
//!
//! Two providers: OpenStreetMap Nominatim (no key) and the Google
//! Geocoding API (key required). Both return the best match only.

use crate::error::{RemoteError, Result};
use crate::http::AsyncHttpClient;
use geo_types::{Geometry, Point};
use geodeck_core::vector::{Feature, FeatureCollection};
use geodeck_core::CRS;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::info;

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
pub const GOOGLE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// A geocoded address in WGS84 longitude/latitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    /// Address as the provider formatted it
    pub address: String,
    pub lon: f64,
    pub lat: f64,
}

impl GeocodeResult {
    pub fn to_feature(&self) -> Feature {
        Feature::new(Geometry::Point(Point::new(self.lon, self.lat))).with_property("address", self.address.as_str())
    }
}

/// Point features in EPSG:4326 with an `address` column.
pub fn to_features(results: &[GeocodeResult]) -> FeatureCollection {
    FeatureCollection::with_columns(
        results.iter().map(GeocodeResult::to_feature).collect(),
        vec!["address".to_string()],
        Some(CRS::wgs84()),
    )
}

/// Turns a free-text address into coordinates.
pub trait Geocoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Best match for `address`; no match is [`RemoteError::NotFound`].
    fn geocode(&self, address: &str) -> impl Future<Output = Result<GeocodeResult>> + Send;
}

fn check_address(address: &str) -> Result<&str> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(RemoteError::InvalidParameter {
            name: "address",
            value: address.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    Ok(trimmed)
}

fn parse_coord(service: &'static str, field: &str, value: &str) -> Result<f64> {
    value.parse().map_err(|_| RemoteError::BadResponse {
        service,
        reason: format!("{} '{}' is not a number", field, value),
    })
}

// ─── Nominatim ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

/// OpenStreetMap Nominatim geocoder.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder<C> {
    client: C,
    base_url: String,
}

impl<C: AsyncHttpClient> NominatimGeocoder<C> {
    pub fn new(client: C) -> Self {
        Self::with_base_url(client, NOMINATIM_URL)
    }

    /// Use a self-hosted Nominatim instance
    pub fn with_base_url(client: C, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn search_url(&self, address: &str) -> String {
        format!(
            "{}/search?q={}&format=json&limit=1",
            self.base_url,
            urlencoding::encode(address)
        )
    }
}

impl<C: AsyncHttpClient> Geocoder for NominatimGeocoder<C> {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    async fn geocode(&self, address: &str) -> Result<GeocodeResult> {
        let address = check_address(address)?;
        let body = self.client.get(&self.search_url(address)).await?;
        let places: Vec<NominatimPlace> = serde_json::from_slice(&body)?;
        let place = places
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::NotFound(format!("no match for '{}'", address)))?;

        let result = GeocodeResult {
            lon: parse_coord("nominatim", "lon", &place.lon)?,
            lat: parse_coord("nominatim", "lat", &place.lat)?,
            address: place.display_name,
        };
        info!("geocoded '{}' -> ({:.5}, {:.5})", address, result.lon, result.lat);
        Ok(result)
    }
}

// ─── Google ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    formatted_address: String,
    geometry: GoogleGeometry,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: GoogleLocation,
}

#[derive(Debug, Deserialize)]
struct GoogleLocation {
    lat: f64,
    lng: f64,
}

/// Google Geocoding API client.
#[derive(Debug, Clone)]
pub struct GoogleGeocoder<C> {
    client: C,
    api_key: String,
    base_url: String,
}

impl<C: AsyncHttpClient> GoogleGeocoder<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RemoteError::InvalidParameter {
                name: "api key",
                value: String::new(),
                reason: "the Google geocoder needs a key".to_string(),
            });
        }
        Ok(Self {
            client,
            api_key,
            base_url: GOOGLE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn search_url(&self, address: &str) -> String {
        format!(
            "{}?address={}&key={}",
            self.base_url,
            urlencoding::encode(address),
            urlencoding::encode(&self.api_key)
        )
    }
}

impl<C: AsyncHttpClient> Geocoder for GoogleGeocoder<C> {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn geocode(&self, address: &str) -> Result<GeocodeResult> {
        let address = check_address(address)?;
        let body = self.client.get(&self.search_url(address)).await?;
        let response: GoogleResponse = serde_json::from_slice(&body)?;
        let detail = response.error_message.unwrap_or_default();

        match response.status.as_str() {
            "OK" => {}
            "ZERO_RESULTS" => return Err(RemoteError::NotFound(format!("no match for '{}'", address))),
            "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" | "REQUEST_DENIED" => {
                return Err(RemoteError::Provider(format!("{} {}", response.status, detail).trim_end().to_string()))
            }
            other => {
                return Err(RemoteError::BadResponse {
                    service: "google",
                    reason: format!("status {} {}", other, detail).trim_end().to_string(),
                })
            }
        }

        let best = response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::NotFound(format!("no match for '{}'", address)))?;
        let result = GeocodeResult {
            address: best.formatted_address,
            lon: best.geometry.location.lng,
            lat: best.geometry.location.lat,
        };
        info!("geocoded '{}' -> ({:.5}, {:.5})", address, result.lon, result.lat);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::MockClient;

    const LIMA: &str = r#"[{"place_id":1,"lat":"-12.0463731","lon":"-77.042754","display_name":"Lima, Perú"}]"#;

    #[tokio::test]
    async fn nominatim_parses_first_match() {
        let geocoder = NominatimGeocoder::new(MockClient::default().with(NOMINATIM_URL, LIMA));
        let r = geocoder.geocode("  Lima, Peru ").await.unwrap();
        assert_eq!(r.address, "Lima, Perú");
        assert!((r.lon + 77.042754).abs() < 1e-9);
        assert!((r.lat + 12.0463731).abs() < 1e-9);
    }

    #[tokio::test]
    async fn nominatim_url_is_encoded() {
        let geocoder = NominatimGeocoder::new(MockClient::default().with(NOMINATIM_URL, LIMA));
        geocoder.geocode("Plaza de Armas, Cusco").await.unwrap();
        assert_eq!(
            geocoder.client.requested(),
            vec!["https://nominatim.openstreetmap.org/search?q=Plaza%20de%20Armas%2C%20Cusco&format=json&limit=1"]
        );
    }

    #[tokio::test]
    async fn nominatim_empty_answer_is_not_found() {
        let geocoder = NominatimGeocoder::new(MockClient::default().with(NOMINATIM_URL, "[]"));
        assert!(matches!(geocoder.geocode("Atlantis").await, Err(RemoteError::NotFound(_))));
    }

    #[tokio::test]
    async fn empty_address_is_rejected_before_any_request() {
        let geocoder = NominatimGeocoder::new(MockClient::default());
        assert!(matches!(
            geocoder.geocode("   ").await,
            Err(RemoteError::InvalidParameter { .. })
        ));
        assert!(geocoder.client.requested().is_empty());
    }

    #[tokio::test]
    async fn rate_limit_is_a_provider_error() {
        let geocoder = NominatimGeocoder::new(MockClient::default().with_status(NOMINATIM_URL, 429));
        assert!(matches!(geocoder.geocode("Lima").await, Err(RemoteError::Provider(_))));
    }

    #[tokio::test]
    async fn google_ok_and_failure_statuses() {
        let ok = r#"{"status":"OK","results":[{"formatted_address":"Arequipa, Peru",
            "geometry":{"location":{"lat":-16.409047,"lng":-71.537451}}}]}"#;
        let g = GoogleGeocoder::new(MockClient::default().with(GOOGLE_URL, ok), "k").unwrap();
        let r = g.geocode("Arequipa").await.unwrap();
        assert_eq!(r.address, "Arequipa, Peru");
        assert_eq!((r.lon, r.lat), (-71.537451, -16.409047));

        let denied = r#"{"status":"REQUEST_DENIED","results":[],"error_message":"The provided API key is invalid."}"#;
        let g = GoogleGeocoder::new(MockClient::default().with(GOOGLE_URL, denied), "bad").unwrap();
        let err = g.geocode("Arequipa").await.unwrap_err();
        assert!(matches!(&err, RemoteError::Provider(m) if m.contains("API key is invalid")));

        let quota = r#"{"status":"OVER_QUERY_LIMIT","results":[]}"#;
        let g = GoogleGeocoder::new(MockClient::default().with(GOOGLE_URL, quota), "k").unwrap();
        assert!(matches!(g.geocode("Arequipa").await, Err(RemoteError::Provider(_))));

        let none = r#"{"status":"ZERO_RESULTS","results":[]}"#;
        let g = GoogleGeocoder::new(MockClient::default().with(GOOGLE_URL, none), "k").unwrap();
        assert!(matches!(g.geocode("Atlantis").await, Err(RemoteError::NotFound(_))));
    }

    #[test]
    fn google_requires_a_key() {
        assert!(GoogleGeocoder::new(MockClient::default(), " ").is_err());
    }

    #[test]
    fn results_become_point_features() {
        let fc = to_features(&[GeocodeResult {
            address: "Lima".into(),
            lon: -77.0,
            lat: -12.0,
        }]);
        assert_eq!(fc.len(), 1);
        assert_eq!(fc.columns(), ["address".to_string()]);
        assert_eq!(fc.crs().and_then(|c| c.epsg()), Some(4326));
    }
}
