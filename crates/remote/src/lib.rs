//! # geodeck remote
//!
//! Network-backed data sources for the geodeck workflow:
//!
//! - address geocoding through OpenStreetMap Nominatim or the Google API
//! - WorldClim climate grids, downloaded and unpacked on demand
//!
//! The async API is generic over [`AsyncHttpClient`]; [`blocking`] wraps it
//! for synchronous callers.

pub mod blocking;
pub mod error;
pub mod geocode;
pub mod http;
pub mod worldclim;

pub use error::{RemoteError, Result};
pub use geocode::{to_features, GeocodeResult, Geocoder, GoogleGeocoder, NominatimGeocoder};
pub use http::{AsyncHttpClient, ReqwestClient};
pub use worldclim::{extract_archive, Resolution, Variable, WorldClim};
