use log::{debug, error};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_METADATA_TIMEOUT_SECS: u64 = 60;

/// Settings read from `<config_dir>/vidgrab/config.toml`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Address the web UI listens on.
    pub bind: String,
    /// Directory holding the binaries installed by `vidgrab install`.
    pub libs_dir: Option<PathBuf>,
    /// Explicit muxer path; skips the search when it exists.
    pub ffmpeg: Option<PathBuf>,
    /// Explicit extractor path; skips the search when it exists.
    pub yt_dlp: Option<PathBuf>,
    /// Upper bound for one metadata lookup. Zero disables it.
    pub metadata_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            libs_dir: None,
            ffmpeg: None,
            yt_dlp: None,
            metadata_timeout_secs: DEFAULT_METADATA_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vidgrab").join("config.toml"))
    }

    /// Loads the user's config file, falling back to defaults.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory on this platform, using defaults");
                Self::default()
            }
        }
    }

    /// Loads settings from `path`. A missing, empty or malformed file gives the defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.is_file() {
            return Self::default();
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                error!("Could not read config file {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match toml::from_str::<Settings>(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                error!("Malformed config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Where `vidgrab install` puts its binaries: the configured directory, else
    /// `<data_dir>/vidgrab/libs`, else `./libs`.
    pub fn managed_libs_dir(&self) -> PathBuf {
        self.libs_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join("vidgrab").join("libs")))
            .unwrap_or_else(|| PathBuf::from("libs"))
    }

    pub fn metadata_timeout(&self) -> Option<Duration> {
        (self.metadata_timeout_secs > 0).then(|| Duration::from_secs(self.metadata_timeout_secs))
    }
}
