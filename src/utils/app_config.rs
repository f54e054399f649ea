/// Optional user configuration file
/// Stored in ~/.config/dropwatch/config.toml

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::ConfigError;

/// Settings read from the config file; every field is optional and
/// environment variables or flags take precedence over it
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub api_url: Option<String>,
    /// Poll interval in humantime form ("30s", "1m")
    pub interval: Option<String>,
    pub concurrency: Option<usize>,
    pub request_timeout: Option<String>,
    pub mountpoint: Option<String>,
    pub clear_screen: Option<bool>,
}

impl AppConfig {
    /// Get config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dropwatch").join("config.toml"))
    }

    /// Load configuration from the default location, empty if absent
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "interval = \"1m\"").unwrap();
        writeln!(file, "concurrency = 4").unwrap();
        writeln!(file, "mountpoint = \"/data\"").unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.interval.as_deref(), Some("1m"));
        assert_eq!(config.concurrency, Some(4));
        assert_eq!(config.mountpoint.as_deref(), Some("/data"));
        assert_eq!(config.api_url, None);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "intervall = \"1m\"").unwrap();

        assert!(matches!(
            AppConfig::load_from(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
