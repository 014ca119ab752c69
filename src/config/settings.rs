//! Application settings persisted as JSON

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::constants::config::{
    APP_DIR, DEFAULT_SERVER_URL, FILENAME, MAX_WINDOW_DIMENSION, MIN_WINDOW_DIMENSION,
};
use crate::constants::polling::{
    DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_INTERVAL_SECS, MAX_INTERVAL_SECS, MIN_INTERVAL_SECS,
};
use crate::poller::PollerConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_window_width")]
    pub window_width: u16,
    #[serde(default = "default_window_height")]
    pub window_height: u16,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_window_width() -> u16 {
    1280
}

fn default_window_height() -> u16 {
    800
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            log_level: default_log_level(),
            poll_interval_secs: default_poll_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

impl Settings {
    pub fn path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path.push(FILENAME);
        path
    }

    /// Load from the default location, writing defaults if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, creating default config");
            let settings = Settings::default();
            settings.save_to(path)?;
            return Ok(settings);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let mut settings: Settings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON from {:?}", path))?;
        settings.validate_and_clamp();

        info!(path = %path.display(), server = %settings.server_url, "Loaded config");
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        fs::write(path, json).with_context(|| format!("Failed to write config to {:?}", path))?;

        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_secs(self.poll_interval_secs),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
        }
    }

    fn validate_and_clamp(&mut self) {
        if self.server_url.trim().is_empty() {
            warn!(using = DEFAULT_SERVER_URL, "server_url is empty, using default");
            self.server_url = default_server_url();
        }

        if self.poll_interval_secs < MIN_INTERVAL_SECS {
            warn!(poll_interval_secs = self.poll_interval_secs, min = MIN_INTERVAL_SECS, "poll_interval_secs below minimum, clamping");
            self.poll_interval_secs = MIN_INTERVAL_SECS;
        } else if self.poll_interval_secs > MAX_INTERVAL_SECS {
            warn!(poll_interval_secs = self.poll_interval_secs, max = MAX_INTERVAL_SECS, "poll_interval_secs exceeds maximum, clamping");
            self.poll_interval_secs = MAX_INTERVAL_SECS;
        }

        // A fetch must finish before the next tick is due
        if self.fetch_timeout_secs == 0 {
            warn!(using = 1, "fetch_timeout_secs is zero, clamping");
            self.fetch_timeout_secs = 1;
        } else if self.fetch_timeout_secs > self.poll_interval_secs {
            warn!(fetch_timeout_secs = self.fetch_timeout_secs, max = self.poll_interval_secs, "fetch_timeout_secs exceeds poll interval, clamping");
            self.fetch_timeout_secs = self.poll_interval_secs;
        }

        if self.window_width < MIN_WINDOW_DIMENSION {
            warn!(window_width = self.window_width, min = MIN_WINDOW_DIMENSION, using = default_window_width(), "window_width below minimum, using default");
            self.window_width = default_window_width();
        } else if self.window_width > MAX_WINDOW_DIMENSION {
            warn!(window_width = self.window_width, max = MAX_WINDOW_DIMENSION, "window_width exceeds maximum, clamping");
            self.window_width = MAX_WINDOW_DIMENSION;
        }

        if self.window_height < MIN_WINDOW_DIMENSION {
            warn!(window_height = self.window_height, min = MIN_WINDOW_DIMENSION, using = default_window_height(), "window_height below minimum, using default");
            self.window_height = default_window_height();
        } else if self.window_height > MAX_WINDOW_DIMENSION {
            warn!(window_height = self.window_height, max = MAX_WINDOW_DIMENSION, "window_height exceeds maximum, clamping");
            self.window_height = MAX_WINDOW_DIMENSION;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(path.exists());

        let reloaded = Settings::load_from(&path).unwrap();
        assert_eq!(reloaded, settings);
    }

    #[test]
    fn test_partial_file_uses_field_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"server_url": "http://meerkat:8585"}"#).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.server_url, "http://meerkat:8585");
        assert_eq!(settings.poll_interval_secs, 30);
        assert_eq!(settings.fetch_timeout_secs, 10);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"server_url": " ", "poll_interval_secs": 1, "fetch_timeout_secs": 60, "window_width": 10, "window_height": 60000}"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.server_url, DEFAULT_SERVER_URL);
        assert_eq!(settings.poll_interval_secs, MIN_INTERVAL_SECS);
        assert_eq!(settings.fetch_timeout_secs, MIN_INTERVAL_SECS);
        assert_eq!(settings.window_width, 1280);
        assert_eq!(settings.window_height, MAX_WINDOW_DIMENSION);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }

    #[test]
    fn test_poller_config() {
        let settings = Settings {
            poll_interval_secs: 60,
            fetch_timeout_secs: 5,
            ..Settings::default()
        };
        let config = settings.poller_config();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
    }
}
