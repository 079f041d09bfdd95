//! Blocking (synchronous) API.
//!
//! Wraps the async geocoders and downloads with a single-threaded Tokio
//! runtime so callers don't need to manage their own async runtime.

use crate::error::{RemoteError, Result};
use crate::geocode::{GeocodeResult, Geocoder, GoogleGeocoder, NominatimGeocoder};
use crate::http::ReqwestClient;
use crate::worldclim::WorldClim;
use std::path::{Path, PathBuf};

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| RemoteError::Network(format!("failed to start async runtime: {}", e)))
}

/// Geocoding service to use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    Nominatim,
    Google { api_key: String },
}

/// Blocking wrapper around a [`Geocoder`].
pub struct GeocoderBlocking<G> {
    rt: tokio::runtime::Runtime,
    inner: G,
}

impl<G: Geocoder> GeocoderBlocking<G> {
    pub fn new(inner: G) -> Result<Self> {
        Ok(Self { rt: runtime()?, inner })
    }

    /// Geocode one address (blocking).
    pub fn geocode(&self, address: &str) -> Result<GeocodeResult> {
        self.rt.block_on(self.inner.geocode(address))
    }

    /// Geocode several addresses in order; the first failure aborts.
    pub fn geocode_all<S: AsRef<str>>(&self, addresses: &[S]) -> Result<Vec<GeocodeResult>> {
        addresses.iter().map(|a| self.geocode(a.as_ref())).collect()
    }
}

/// One-shot: geocode addresses with the chosen provider.
pub fn geocode<S: AsRef<str>>(provider: &Provider, addresses: &[S]) -> Result<Vec<GeocodeResult>> {
    let client = ReqwestClient::new()?;
    match provider {
        Provider::Nominatim => GeocoderBlocking::new(NominatimGeocoder::new(client))?.geocode_all(addresses),
        Provider::Google { api_key } => {
            GeocoderBlocking::new(GoogleGeocoder::new(client, api_key.as_str())?)?.geocode_all(addresses)
        }
    }
}

/// One-shot: download and extract a WorldClim archive into `dir`.
pub fn download_worldclim(dataset: &WorldClim, dir: &Path) -> Result<Vec<PathBuf>> {
    let client = ReqwestClient::new()?;
    runtime()?.block_on(dataset.download(&client, dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::NOMINATIM_URL;
    use crate::http::tests::MockClient;

    #[test]
    fn blocking_geocoder_runs_without_an_outer_runtime() {
        let body = r#"[{"lat":"48.8566","lon":"2.3522","display_name":"Paris, France"}]"#;
        let geocoder = GeocoderBlocking::new(NominatimGeocoder::new(MockClient::default().with(NOMINATIM_URL, body)))
            .unwrap();
        let results = geocoder.geocode_all(&["Paris", "Paris, France"]).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].lat, 48.8566);
    }

    #[test]
    fn first_failure_aborts() {
        let geocoder = GeocoderBlocking::new(NominatimGeocoder::new(MockClient::default().with(NOMINATIM_URL, "[]")))
            .unwrap();
        assert!(matches!(geocoder.geocode_all(&["nowhere", "Lima"]), Err(RemoteError::NotFound(_))));
    }
}
