use std::path::Path;
use std::time::Duration;

use cvm_core::{DEFAULT_MARKER_FILE, DEFAULT_RETRY_DELAYS_SECS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid settings in {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_binary_name")]
    pub binary_name: String,

    #[serde(default = "default_download_url_template")]
    pub download_url_template: String,

    /// GitHub `owner/name` queried for `latest`.
    #[serde(default = "default_latest_release_repo")]
    pub latest_release_repo: String,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_marker_file")]
    pub marker_file: String,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,

    #[serde(default = "default_retry_delays")]
    pub retry_delays_secs: Vec<u64>,
}

fn default_binary_name() -> String {
    "cli".to_string()
}

fn default_download_url_template() -> String {
    "https://github.com/{repo}/releases/download/v{version}/{binary}-{os}-{arch}".to_string()
}

fn default_latest_release_repo() -> String {
    "cvm-rs/cli".to_string()
}

fn default_command_timeout() -> u64 {
    30
}

fn default_http_timeout() -> u64 {
    10
}

fn default_marker_file() -> String {
    DEFAULT_MARKER_FILE.to_string()
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_retry_delays() -> Vec<u64> {
    DEFAULT_RETRY_DELAYS_SECS.to_vec()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            binary_name: default_binary_name(),
            download_url_template: default_download_url_template(),
            latest_release_repo: default_latest_release_repo(),
            command_timeout_secs: default_command_timeout(),
            http_timeout_secs: default_http_timeout(),
            marker_file: default_marker_file(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
            retry_delays_secs: default_retry_delays(),
        }
    }
}

impl Settings {
    /// A missing file yields the defaults. A file that cannot be read or
    /// parsed is an error; callers fall back to the defaults and warn.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
