//! Application-level configuration loading, including the photo deck shape
//! and voting-window bounds.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PHENOEVAL_BACK_CONFIG_PATH";
/// Number of photos evaluated per session when the config does not say.
const DEFAULT_PHOTO_COUNT: u16 = 30;
/// Per-photo voting window used when a session does not specify one.
const DEFAULT_PHOTO_DURATION_SECS: u32 = 30;
/// Shortest accepted voting window.
const MIN_PHOTO_DURATION_SECS: u32 = 5;
/// Longest accepted voting window.
const MAX_PHOTO_DURATION_SECS: u32 = 600;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    photo_count: u16,
    default_photo_duration_secs: u32,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        photo_count = app_config.photo_count,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Number of photos evaluated per session.
    pub fn photo_count(&self) -> u16 {
        self.photo_count
    }

    /// Per-photo voting window used when a session does not specify one.
    pub fn default_photo_duration_secs(&self) -> u32 {
        self.default_photo_duration_secs
    }

    /// Resolve a requested per-photo duration to the accepted range, using
    /// the configured default when absent.
    pub fn clamp_photo_duration(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_photo_duration_secs)
            .clamp(MIN_PHOTO_DURATION_SECS, MAX_PHOTO_DURATION_SECS)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            photo_count: DEFAULT_PHOTO_COUNT,
            default_photo_duration_secs: DEFAULT_PHOTO_DURATION_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    photo_count: Option<u16>,
    photo_duration_secs: Option<u32>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            photo_count: value.photo_count.unwrap_or(DEFAULT_PHOTO_COUNT).max(1),
            default_photo_duration_secs: value
                .photo_duration_secs
                .unwrap_or(DEFAULT_PHOTO_DURATION_SECS)
                .clamp(MIN_PHOTO_DURATION_SECS, MAX_PHOTO_DURATION_SECS),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_clamping_enforces_bounds() {
        let config = AppConfig::default();
        assert_eq!(config.clamp_photo_duration(None), 30);
        assert_eq!(config.clamp_photo_duration(Some(1)), 5);
        assert_eq!(config.clamp_photo_duration(Some(45)), 45);
        assert_eq!(config.clamp_photo_duration(Some(10_000)), 600);
    }

    #[test]
    fn raw_config_zero_photo_count_is_rejected() {
        let config: AppConfig = RawConfig {
            photo_count: Some(0),
            photo_duration_secs: None,
        }
        .into();
        assert_eq!(config.photo_count(), 1);
    }
}
