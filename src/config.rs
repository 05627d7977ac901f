//! Configuration types for download batches.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default number of downloads allowed to run at the same time.
pub const DEFAULT_CONCURRENT_FILES: usize = 3;

/// Default byte source shared by every request of a batch.
pub const DEFAULT_SOURCE_URL: &str = "http://localhost:3000/test-image.png";

/// Configuration for download batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Maximum number of concurrent downloads.
    pub concurrent_files: usize,
    /// URL every request of a batch is fetched from.
    pub source_url: String,
    /// Pause after a successful delivery before the slot is released, in milliseconds.
    pub settle_delay_ms: u64,
    /// Directory the file sink writes finished artifacts into.
    pub output_dir: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            concurrent_files: DEFAULT_CONCURRENT_FILES,
            source_url: DEFAULT_SOURCE_URL.to_string(),
            settle_delay_ms: 0,
            output_dir: PathBuf::from("."),
        }
    }
}

impl DownloadConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of concurrent downloads.
    #[must_use]
    pub const fn with_concurrent_files(mut self, concurrent: usize) -> Self {
        self.concurrent_files = concurrent;
        self
    }

    /// Sets the source URL.
    #[must_use]
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    /// Sets the post-delivery settle delay.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Returns the settle delay as a [`Duration`].
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Checks the configuration before any task is started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the concurrency limit is zero or the
    /// source URL is not an absolute `http`/`https` URL.
    pub fn validate(&self) -> Result<()> {
        if self.concurrent_files < 1 {
            return Err(Error::Config(
                "concurrent_files must be at least 1".to_string(),
            ));
        }
        let url = reqwest::Url::parse(&self.source_url)
            .map_err(|e| Error::Config(format!("invalid source_url {:?}: {e}", self.source_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "unsupported scheme in source_url: {}",
                url.scheme()
            )));
        }
        Ok(())
    }
}

/// Application configuration as stored on disk.
///
/// ```toml
/// [download]
/// concurrent_files = 3
/// source_url = "http://localhost:3000/test-image.png"
/// settle_delay_ms = 0
/// output_dir = "."
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Download configuration.
    pub download: DownloadConfig,
}

impl AppConfig {
    /// Returns the default config file location (`$XDG_CONFIG_HOME/parallel-dl/config.toml`).
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parallel-dl")
            .join("config.toml")
    }

    /// Loads configuration from `path`, falling back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let config: Self = toml::from_str(&contents)?;
                log::info!("Loaded config from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}
