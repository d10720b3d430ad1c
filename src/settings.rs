//! Run settings.
//!
//! Everything that tunes a merge run outside the date itself: the mirror to
//! fetch from, how far forward to search past an archive gap, fetch timeout,
//! and the snapshot cache. Settings come from an optional YAML file with
//! sensible defaults, and a couple of fields can be overridden from the
//! command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default statistics mirror, the RIPE NCC public archive.
pub const DEFAULT_MIRROR_URL: &str = "https://ftp.ripe.net/pub/stats";

/// Settings for one merge run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Base URL of the statistics archive.
    pub mirror_url: String,

    /// How many days past the target date the nearest-snapshot search may
    /// look before giving up on a registry.
    pub search_window_days: u32,

    /// HTTP timeout per snapshot request.
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,

    /// Directory for caching downloaded snapshot files. No caching when
    /// unset.
    pub cache_dir: Option<PathBuf>,

    /// Serve everything from the cache; uncached snapshots count as absent.
    pub offline: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            mirror_url: DEFAULT_MIRROR_URL.to_string(),
            search_window_days: 14,
            fetch_timeout: Duration::from_secs(30),
            cache_dir: None,
            offline: false,
        }
    }
}

/// Settings loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid settings: {0}")]
    Invalid(String),
}

impl Settings {
    /// Load settings from a YAML file and validate them.
    pub fn load(path: &Path) -> Result<Settings, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let settings: Settings =
            serde_yaml::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.mirror_url.trim().is_empty() {
            return Err(SettingsError::Invalid("mirror_url must not be empty".to_string()));
        }
        if self.fetch_timeout.is_zero() {
            return Err(SettingsError::Invalid("fetch_timeout must be positive".to_string()));
        }
        Ok(())
    }
}
