//! Client configuration.
//!
//! Settings come from `~/.config/docchat/config.json` when present; every
//! field is optional and falls back to [`ClientConfig::default`]. Front ends
//! layer their own overrides (command-line flags, environment) on top.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/chat";

pub const DEFAULT_GREETING: &str =
    "Hi, what would you like to learn about Ethereum? E.g., what's Ethereum? what's Shanghai/Shapella upgrade?";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Home directory not set")]
    NoHomeDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Streaming answer endpoint.
    pub endpoint: String,

    pub connect_timeout_secs: u64,

    /// Longest silence tolerated while streaming. `0` disables the limit.
    pub idle_timeout_secs: u64,

    /// Questions longer than this (in characters) are rejected.
    pub max_question_chars: usize,

    /// Assistant message the conversation opens with. `None` opens empty.
    pub greeting: Option<String>,

    /// Directory for per-exchange wire logs.
    pub log_dir: Option<PathBuf>,

    /// Where the conversation is saved after every answer.
    pub transcript_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout_secs: 10,
            idle_timeout_secs: 60,
            max_question_chars: 512,
            greeting: Some(DEFAULT_GREETING.to_string()),
            log_dir: None,
            transcript_path: None,
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    /// Load a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from the default location.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(&default_config_path()?)
    }
}

/// `~/.config/docchat/config.json`
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(paths::config_dir()
        .map_err(|_| ConfigError::NoHomeDir)?
        .join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.max_question_chars, 512);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(60)));
        assert!(config.greeting.as_deref().unwrap().contains("Ethereum"));
    }

    #[test]
    fn zero_idle_timeout_disables_limit() {
        let config = ClientConfig {
            idle_timeout_secs: 0,
            ..ClientConfig::default()
        };
        assert_eq!(config.idle_timeout(), None);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = ClientConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"endpoint": "https://chat.example/api/chat", "idleTimeoutSecs": 5, "greeting": null}"#,
        )
        .unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.endpoint, "https://chat.example/api/chat");
        assert_eq!(config.idle_timeout_secs, 5);
        assert_eq!(config.greeting, None);
        assert_eq!(config.max_question_chars, 512);
    }

    #[test]
    fn invalid_json_is_reported_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = ClientConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }));
        assert!(err.to_string().contains("config.json"));
    }
}
