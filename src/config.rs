use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Flat directory scanned for uploaded photos.
    pub photo_library_path: PathBuf,
    /// Public path prefix joined with each file name to form its URL.
    pub url_prefix: String,
    /// Recognized image extensions, matched case-insensitively.
    pub extensions: Vec<String>,
    /// Minimum age of the last write before a file is considered complete.
    #[serde(with = "humantime_serde")]
    pub settle_threshold: Duration,
    /// Photos returned by the shuffle endpoint, and the minimum to return any.
    pub shuffle_count: usize,
    /// Photos returned by the rotation endpoint, and the minimum to return any.
    pub rotation_window: usize,
    /// Size of one sequential batch.
    pub batch_size: usize,
    /// Optional deterministic seed for the shuffle random source.
    pub shuffle_seed: Option<u64>,
    /// Maximum number of metadata reads in flight during one scan.
    pub scan_max_concurrent_stats: usize,
    /// Socket address the HTTP server listens on.
    pub bind_address: SocketAddr,
    /// Serve the photo directory itself under `url-prefix`.
    pub serve_photos: bool,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        serde_yaml::from_str(&s)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(mut self) -> Result<Self> {
        self.extensions = self
            .extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        self.extensions.sort();
        self.extensions.dedup();
        ensure!(
            !self.extensions.is_empty(),
            "extensions must list at least one image extension"
        );
        ensure!(self.shuffle_count > 0, "shuffle-count must be greater than zero");
        ensure!(
            self.rotation_window > 0,
            "rotation-window must be greater than zero"
        );
        ensure!(self.batch_size > 0, "batch-size must be greater than zero");
        ensure!(
            self.scan_max_concurrent_stats > 0,
            "scan-max-concurrent-stats must be greater than zero"
        );
        ensure!(
            self.url_prefix.starts_with('/'),
            "url-prefix must start with '/'"
        );
        Ok(self)
    }

    /// Public URL for a file in the photo directory.
    pub fn photo_url(&self, name: &str) -> String {
        format!("{}/{}", self.url_prefix.trim_end_matches('/'), name)
    }

    pub fn extension_refs(&self) -> Vec<&str> {
        self.extensions.iter().map(String::as_str).collect()
    }

    fn default_extensions() -> Vec<String> {
        ["jpg", "jpeg", "png", "webp"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    const fn default_settle_threshold() -> Duration {
        Duration::from_millis(2000)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            photo_library_path: PathBuf::from("public/photos"),
            url_prefix: "/photos".to_string(),
            extensions: Self::default_extensions(),
            settle_threshold: Self::default_settle_threshold(),
            shuffle_count: 16,
            rotation_window: 8,
            batch_size: 16,
            shuffle_seed: None,
            scan_max_concurrent_stats: 32,
            bind_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 3000)),
            serve_photos: true,
        }
    }
}
