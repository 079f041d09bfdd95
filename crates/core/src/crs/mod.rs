//! Coordinate Reference System handling

mod projection;

pub use projection::{transform_coord, Projection, Transformer};

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string, resolving the EPSG authority when present
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        let wkt = wkt.into();
        let epsg = wkt_authority(&wkt).or_else(|| esri_wkt_name(&wkt));
        Self {
            wkt: Some(wkt),
            epsg,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string, resolving the EPSG code when unambiguous
    pub fn from_proj(proj: impl Into<String>) -> Self {
        let proj = proj.into();
        let epsg = proj_to_epsg(&proj);
        Self {
            wkt: None,
            epsg,
            proj: Some(proj),
        }
    }

    /// Parse any textual CRS definition.
    ///
    /// Accepts `EPSG:4326`, a bare code (`4326`), a PROJ string
    /// (`+proj=longlat +datum=WGS84`) or WKT.
    pub fn parse(definition: &str) -> Result<Self> {
        let def = definition.trim();
        if def.is_empty() {
            return Err(Error::InvalidCrs(definition.to_string()));
        }

        let lower = def.to_ascii_lowercase();
        if let Some(code) = lower.strip_prefix("epsg:") {
            return code
                .trim()
                .parse::<u32>()
                .map(Self::from_epsg)
                .map_err(|_| Error::InvalidCrs(definition.to_string()));
        }
        if let Ok(code) = def.parse::<u32>() {
            return Ok(Self::from_epsg(code));
        }
        if def.starts_with('+') {
            if !lower.contains("+proj=") && !lower.contains("+init=") {
                return Err(Error::InvalidCrs(definition.to_string()));
            }
            return Ok(Self::from_proj(def));
        }

        const WKT_ROOTS: [&str; 6] = ["GEOGCS", "PROJCS", "GEOGCRS", "PROJCRS", "GEODCRS", "COMPD_CS"];
        let upper = def.to_ascii_uppercase();
        if WKT_ROOTS.iter().any(|root| upper.starts_with(root)) && def.ends_with(']') {
            return Ok(Self::from_wkt(def));
        }

        Err(Error::InvalidCrs(definition.to_string()))
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::from_epsg(3857)
    }

    /// UTM zone on WGS84 (EPSG:326xx / 327xx)
    pub fn utm(zone: u32, north: bool) -> Self {
        Self::from_epsg(if north { 32600 + zone } else { 32700 + zone })
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Whether coordinates are longitude/latitude degrees
    pub fn is_geographic(&self) -> bool {
        match self.epsg {
            Some(code) => projection::is_geographic_epsg(code),
            None => self
                .proj
                .as_deref()
                .map(|p| p.contains("+proj=longlat") || p.contains("+proj=latlong"))
                .unwrap_or(false),
        }
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return normalize_proj(a) == normalize_proj(b);
        }

        false
    }

    /// PROJ string for this CRS, derived from the EPSG code when not stored
    pub fn to_proj4(&self) -> Option<String> {
        if let Some(proj) = &self.proj {
            return Some(proj.clone());
        }
        let code = self.epsg?;
        if projection::is_geographic_epsg(code) {
            return Some("+proj=longlat +datum=WGS84 +no_defs".to_string());
        }
        if code == 3857 {
            return Some(
                "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +wktext +no_defs"
                    .to_string(),
            );
        }
        projection::parse_utm_epsg(code).map(|(zone, north)| {
            format!(
                "+proj=utm +zone={}{} +datum=WGS84 +units=m +no_defs",
                zone,
                if north { "" } else { " +south" }
            )
        })
    }

    /// WKT for this CRS, derived from the EPSG code when not stored
    pub fn to_wkt(&self) -> Option<String> {
        if let Some(wkt) = &self.wkt {
            return Some(wkt.clone());
        }
        let code = self.epsg?;
        const GEOGCS_WGS84: &str = "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563]],PRIMEM[\"Greenwich\",0],UNIT[\"degree\",0.0174532925199433]";
        if code == 4326 {
            return Some(format!("{},AUTHORITY[\"EPSG\",\"4326\"]]", GEOGCS_WGS84));
        }
        if code == 3857 {
            return Some(format!(
                "PROJCS[\"WGS 84 / Pseudo-Mercator\",{}],PROJECTION[\"Mercator_1SP\"],PARAMETER[\"central_meridian\",0],PARAMETER[\"scale_factor\",1],PARAMETER[\"false_easting\",0],PARAMETER[\"false_northing\",0],UNIT[\"metre\",1],AUTHORITY[\"EPSG\",\"3857\"]]",
                GEOGCS_WGS84
            ));
        }
        projection::parse_utm_epsg(code).map(|(zone, north)| {
            format!(
                "PROJCS[\"WGS 84 / UTM zone {}{}\",{}],PROJECTION[\"Transverse_Mercator\"],PARAMETER[\"latitude_of_origin\",0],PARAMETER[\"central_meridian\",{}],PARAMETER[\"scale_factor\",0.9996],PARAMETER[\"false_easting\",500000],PARAMETER[\"false_northing\",{}],UNIT[\"metre\",1],AUTHORITY[\"EPSG\",\"{}\"]]",
                zone,
                if north { "N" } else { "S" },
                GEOGCS_WGS84,
                projection::utm_central_meridian(zone),
                if north { 0 } else { 10_000_000 },
                code
            )
        })
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            let end = wkt.char_indices().nth(50).map(|(i, _)| i).unwrap_or(wkt.len());
            return format!("WKT:{}", &wkt[..end]);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl std::str::FromStr for CRS {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn normalize_proj(proj: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = proj
        .split_whitespace()
        .filter(|t| *t != "+no_defs" && *t != "+wktext")
        .collect();
    tokens.sort_unstable();
    tokens
}

fn proj_params(proj: &str) -> Vec<(String, Option<String>)> {
    proj.split_whitespace()
        .filter_map(|token| token.strip_prefix('+'))
        .map(|token| match token.split_once('=') {
            Some((k, v)) => (k.to_ascii_lowercase(), Some(v.to_string())),
            None => (token.to_ascii_lowercase(), None),
        })
        .collect()
}

fn proj_to_epsg(proj: &str) -> Option<u32> {
    let params = proj_params(proj);
    let get = |key: &str| -> Option<&str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    };
    let has = |key: &str| params.iter().any(|(k, _)| k == key);

    if let Some(init) = get("init") {
        let lower = init.to_ascii_lowercase();
        return lower.strip_prefix("epsg:").and_then(|c| c.parse().ok());
    }

    let wgs84_datum = match (get("datum"), get("ellps")) {
        (Some(d), _) => d.eq_ignore_ascii_case("WGS84"),
        (None, Some(e)) => e.eq_ignore_ascii_case("WGS84"),
        (None, None) => true,
    };

    match get("proj")? {
        "longlat" | "latlong" if wgs84_datum => Some(4326),
        "merc" if get("a") == Some("6378137") && get("b") == Some("6378137") => Some(3857),
        "utm" if wgs84_datum => {
            let zone: u32 = get("zone")?.parse().ok()?;
            if !(1..=60).contains(&zone) {
                return None;
            }
            Some(if has("south") { 32700 + zone } else { 32600 + zone })
        }
        _ => None,
    }
}

fn wkt_authority(wkt: &str) -> Option<u32> {
    static AUTHORITY: OnceLock<Regex> = OnceLock::new();
    let re = AUTHORITY.get_or_init(|| {
        Regex::new(r#"(?:AUTHORITY|ID)\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#).unwrap()
    });
    // The outermost authority is the last one in the string.
    re.captures_iter(wkt)
        .last()
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// ESRI `.prj` files name the CRS instead of citing an authority
fn esri_wkt_name(wkt: &str) -> Option<u32> {
    static ROOT: OnceLock<Regex> = OnceLock::new();
    static UTM: OnceLock<Regex> = OnceLock::new();
    let root = ROOT.get_or_init(|| Regex::new(r#"^\s*(PROJCS|GEOGCS)\[\s*"([^"]+)""#).unwrap());
    let utm = UTM.get_or_init(|| Regex::new(r"(?i)^WGS_(?:1984|84)_UTM_Zone_(\d{1,2})([NS])$").unwrap());

    let caps = root.captures(wkt)?;
    let name = caps.get(2)?.as_str();
    match (caps.get(1)?.as_str(), name) {
        ("GEOGCS", "GCS_WGS_1984" | "WGS 84" | "WGS84") => Some(4326),
        ("PROJCS", "WGS_1984_Web_Mercator_Auxiliary_Sphere" | "WGS 84 / Pseudo-Mercator") => Some(3857),
        ("PROJCS", name) => {
            let c = utm.captures(name)?;
            let zone: u32 = c.get(1)?.as_str().parse().ok()?;
            let hemisphere = c.get(2)?.as_str();
            (1..=60).contains(&zone).then(|| {
                if hemisphere.eq_ignore_ascii_case("N") {
                    32600 + zone
                } else {
                    32700 + zone
                }
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
    }

    #[test]
    fn test_crs_equivalence() {
        let a = CRS::parse("+proj=longlat +datum=WGS84 +no_defs").unwrap();
        let b = CRS::wgs84();
        assert!(a.is_equivalent(&b));
        assert!(a.is_geographic());
    }

    #[test]
    fn esri_prj_names_resolve() {
        let gcs = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
        assert_eq!(CRS::from_wkt(gcs).epsg(), Some(4326));
        let utm = r#"PROJCS["WGS_1984_UTM_Zone_18S",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]]],PROJECTION["Transverse_Mercator"]]"#;
        assert_eq!(CRS::from_wkt(utm).epsg(), Some(32718));
    }

    #[test]
    fn parse_forms() {
        assert_eq!(CRS::parse("EPSG:3857").unwrap().epsg(), Some(3857));
        assert_eq!(CRS::parse("epsg:32633").unwrap().epsg(), Some(32633));
        assert_eq!(CRS::parse("4326").unwrap().epsg(), Some(4326));
        assert_eq!(
            CRS::parse("+proj=utm +zone=33 +south +datum=WGS84").unwrap().epsg(),
            Some(32733)
        );
        assert_eq!(CRS::parse("+init=epsg:3035").unwrap().epsg(), Some(3035));
    }

    #[test]
    fn parse_wkt_authority() {
        let wkt = CRS::utm(30, true).to_wkt().unwrap();
        let crs = CRS::parse(&wkt).unwrap();
        assert_eq!(crs.epsg(), Some(32630));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(CRS::parse(""), Err(Error::InvalidCrs(_))));
        assert!(matches!(CRS::parse("not a crs"), Err(Error::InvalidCrs(_))));
        assert!(matches!(CRS::parse("EPSG:abc"), Err(Error::InvalidCrs(_))));
    }

    #[test]
    fn proj4_from_epsg() {
        let proj = CRS::utm(21, false).to_proj4().unwrap();
        assert!(proj.contains("+zone=21"));
        assert!(proj.contains("+south"));
        assert_eq!(CRS::from_proj(proj).epsg(), Some(32721));
    }
}
