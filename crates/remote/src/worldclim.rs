//! WorldClim global climate grids.
//!
//! Version 2.1 monthly climatologies (1970-2000) are published as one zip
//! per variable and resolution, each holding GeoTIFF layers
//! (`wc2.1_10m_tmin_01.tif` ... `_12.tif`).

use crate::error::{RemoteError, Result};
use crate::http::AsyncHttpClient;
use geodeck_core::io::natural_cmp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

pub const WORLDCLIM_URL: &str = "https://geodata.ucdavis.edu/climate/worldclim/2_1/base";

/// Climate variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variable {
    /// Minimum temperature (°C), 12 monthly layers
    Tmin,
    /// Maximum temperature (°C), 12 monthly layers
    Tmax,
    /// Average temperature (°C), 12 monthly layers
    Tavg,
    /// Precipitation (mm), 12 monthly layers
    Prec,
    /// 19 bioclimatic variables
    Bio,
    /// Elevation (m), one layer
    Alt,
}

impl Variable {
    pub const ALL: &[Variable] = &[
        Variable::Tmin,
        Variable::Tmax,
        Variable::Tavg,
        Variable::Prec,
        Variable::Bio,
        Variable::Alt,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Variable::Tmin => "tmin",
            Variable::Tmax => "tmax",
            Variable::Tavg => "tavg",
            Variable::Prec => "prec",
            Variable::Bio => "bio",
            Variable::Alt => "alt",
        }
    }

    /// Name used in the published file names
    fn file_key(&self) -> &'static str {
        match self {
            Variable::Alt => "elev",
            other => other.name(),
        }
    }

    /// Number of layers in the archive
    pub fn layer_count(&self) -> usize {
        match self {
            Variable::Bio => 19,
            Variable::Alt => 1,
            _ => 12,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variable {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = match s.trim().to_ascii_lowercase().as_str() {
            "tmean" => "tavg".to_string(),
            "elev" => "alt".to_string(),
            other => other.to_string(),
        };
        Variable::ALL
            .iter()
            .copied()
            .find(|v| v.name() == wanted)
            .ok_or_else(|| RemoteError::InvalidParameter {
                name: "variable",
                value: s.to_string(),
                reason: "expected one of tmin, tmax, tavg, prec, bio, alt".to_string(),
            })
    }
}

/// Spatial resolution in arc-minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// 0.5' (30 arc-seconds, about 1 km)
    Min0_5,
    Min2_5,
    Min5,
    Min10,
}

impl Resolution {
    pub fn minutes(&self) -> f64 {
        match self {
            Resolution::Min0_5 => 0.5,
            Resolution::Min2_5 => 2.5,
            Resolution::Min5 => 5.0,
            Resolution::Min10 => 10.0,
        }
    }

    pub fn from_minutes(minutes: f64) -> Result<Self> {
        [Resolution::Min0_5, Resolution::Min2_5, Resolution::Min5, Resolution::Min10]
            .into_iter()
            .find(|r| (r.minutes() - minutes).abs() < 1e-9)
            .ok_or_else(|| RemoteError::InvalidParameter {
                name: "resolution",
                value: minutes.to_string(),
                reason: "expected 0.5, 2.5, 5 or 10 arc-minutes".to_string(),
            })
    }

    fn file_key(&self) -> &'static str {
        match self {
            Resolution::Min0_5 => "30s",
            Resolution::Min2_5 => "2.5m",
            Resolution::Min5 => "5m",
            Resolution::Min10 => "10m",
        }
    }
}

impl FromStr for Resolution {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self> {
        let minutes = s.trim().trim_end_matches('m').parse::<f64>().map_err(|_| RemoteError::InvalidParameter {
            name: "resolution",
            value: s.to_string(),
            reason: "expected 0.5, 2.5, 5 or 10 arc-minutes".to_string(),
        })?;
        Resolution::from_minutes(minutes)
    }
}

/// One downloadable archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldClim {
    pub variable: Variable,
    pub resolution: Resolution,
}

impl WorldClim {
    pub fn new(variable: Variable, resolution: Resolution) -> Self {
        Self { variable, resolution }
    }

    /// Archive name, e.g. `wc2.1_10m_tmin.zip`
    pub fn archive_name(&self) -> String {
        format!("wc2.1_{}_{}.zip", self.resolution.file_key(), self.variable.file_key())
    }

    pub fn url(&self) -> String {
        format!("{}/{}", WORLDCLIM_URL, self.archive_name())
    }

    /// Regular expression matching the extracted layer files
    pub fn layer_pattern(&self) -> String {
        format!(
            r"^wc2\.1_{}_{}(_\d+)?\.tif$",
            regex_escape(self.resolution.file_key()),
            self.variable.file_key()
        )
    }

    /// Download the archive into `dir` and extract it.
    ///
    /// An archive already present in `dir` is reused instead of downloaded
    /// again. Returns the extracted `.tif` layers in natural order.
    pub async fn download<C: AsyncHttpClient>(&self, client: &C, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let archive = dir.join(self.archive_name());

        let bytes = if archive.exists() {
            info!("using cached {}", archive.display());
            fs::read(&archive)?
        } else {
            let url = self.url();
            info!("downloading {}", url);
            let bytes = client.get(&url).await?;
            fs::write(&archive, &bytes)?;
            debug!("saved {} bytes to {}", bytes.len(), archive.display());
            bytes
        };

        let layers = extract_archive(&bytes, dir)?;
        if layers.is_empty() {
            return Err(RemoteError::BadResponse {
                service: "worldclim",
                reason: format!("{} holds no GeoTIFF layers", self.archive_name()),
            });
        }
        info!("extracted {} layers of {} into {}", layers.len(), self.variable, dir.display());
        Ok(layers)
    }
}

fn regex_escape(s: &str) -> String {
    s.replace('.', r"\.")
}

/// Extract every entry of a zip into `dir`; returns the `.tif` files in natural order.
///
/// Entries whose path would escape `dir` are skipped.
pub fn extract_archive(bytes: &[u8], dir: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut layers = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            debug!("skipping unsafe entry {}", entry.name());
            continue;
        };
        let target = dir.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;

        let is_tif = target
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("tif"));
        if is_tif {
            layers.push(target);
        }
    }

    layers.sort_by(|a, b| {
        let a = a.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let b = b.file_name().and_then(|n| n.to_str()).unwrap_or("");
        natural_cmp(a, b)
    });
    Ok(layers)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::http::tests::MockClient;
    use std::io::Write;
    use zip::write::{SimpleFileOptions, ZipWriter};

    /// In-memory zip with the given (name, content) entries
    pub fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut cursor);
            let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
            for (name, content) in entries {
                zip.start_file(*name, options).unwrap();
                zip.write_all(content).unwrap();
            }
            zip.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn urls_follow_the_published_layout() {
        let wc = WorldClim::new(Variable::Tmin, Resolution::Min10);
        assert_eq!(wc.url(), "https://geodata.ucdavis.edu/climate/worldclim/2_1/base/wc2.1_10m_tmin.zip");
        let alt = WorldClim::new(Variable::Alt, Resolution::Min2_5);
        assert_eq!(alt.archive_name(), "wc2.1_2.5m_elev.zip");
        let fine = WorldClim::new(Variable::Bio, Resolution::Min0_5);
        assert_eq!(fine.archive_name(), "wc2.1_30s_bio.zip");
    }

    #[test]
    fn parameters_are_validated() {
        assert_eq!("TMIN".parse::<Variable>().unwrap(), Variable::Tmin);
        assert_eq!("tmean".parse::<Variable>().unwrap(), Variable::Tavg);
        assert!(matches!("wind".parse::<Variable>(), Err(RemoteError::InvalidParameter { name: "variable", .. })));

        assert_eq!("2.5".parse::<Resolution>().unwrap(), Resolution::Min2_5);
        assert_eq!("10m".parse::<Resolution>().unwrap(), Resolution::Min10);
        assert!(matches!(Resolution::from_minutes(1.0), Err(RemoteError::InvalidParameter { name: "resolution", .. })));
        assert!("fine".parse::<Resolution>().is_err());
    }

    #[test]
    fn extraction_keeps_tifs_in_natural_order_and_skips_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = zip_of(&[
            ("wc2.1_10m_tmin_10.tif", b"10"),
            ("wc2.1_10m_tmin_02.tif", b"2"),
            ("readme.txt", b"hi"),
            ("../evil.tif", b"x"),
        ]);
        let layers = extract_archive(&bytes, dir.path()).unwrap();
        let names: Vec<_> = layers.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
        assert_eq!(names, vec!["wc2.1_10m_tmin_02.tif", "wc2.1_10m_tmin_10.tif"]);
        assert!(dir.path().join("readme.txt").exists());
        assert!(!dir.path().parent().unwrap().join("evil.tif").exists());
    }

    #[tokio::test]
    async fn download_extracts_and_then_reuses_the_archive() {
        let dir = tempfile::tempdir().unwrap();
        let wc = WorldClim::new(Variable::Prec, Resolution::Min10);
        let bytes = zip_of(&[("wc2.1_10m_prec_01.tif", b"1"), ("wc2.1_10m_prec_02.tif", b"2")]);
        let client = MockClient::default().with(WORLDCLIM_URL, bytes);

        let layers = wc.download(&client, dir.path()).await.unwrap();
        assert_eq!(layers.len(), 2);
        assert!(dir.path().join("wc2.1_10m_prec.zip").exists());

        let again = wc.download(&client, dir.path()).await.unwrap();
        assert_eq!(again, layers);
        assert_eq!(client.requested().len(), 1);
    }

    #[tokio::test]
    async fn missing_archive_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockClient::default().with_status(WORLDCLIM_URL, 404);
        let err = WorldClim::new(Variable::Tmax, Resolution::Min5)
            .download(&client, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));
    }

    #[test]
    fn layer_pattern_matches_extracted_names() {
        let pattern = WorldClim::new(Variable::Tmin, Resolution::Min2_5).layer_pattern();
        let matches = matches_pattern(&pattern);
        assert!(matches("wc2.1_2.5m_tmin_01.tif"));
        assert!(!matches("wc2.1_2.5m_tmax_01.tif"));
    }

    /// Checks a pattern through the core directory listing
    fn matches_pattern(pattern: &str) -> impl Fn(&str) -> bool + '_ {
        move |name| {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join(name), b"").unwrap();
            geodeck_core::io::list_files(dir.path(), pattern).is_ok()
        }
    }
}
