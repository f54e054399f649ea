/// Runtime configuration
///
/// Resolved from command-line flags, the process environment (after loading
/// a .env file) and the optional config file, in that order of precedence.

use std::fmt;
use std::time::Duration;

use crate::core::error::ConfigError;
use crate::utils::{
    mask_sensitive, AppConfig, DEFAULT_API_URL, DEFAULT_CONCURRENCY, DEFAULT_POLL_INTERVAL,
    DEFAULT_REQUEST_TIMEOUT, ENV_API_TOKEN, ENV_API_URL, ENV_HOST_ID, ROOT_MOUNTPOINT,
};

/// Values given on the command line, all optional
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub interval: Option<Duration>,
    pub concurrency: Option<usize>,
    pub mountpoint: Option<String>,
    pub no_clear: bool,
}

#[derive(Clone)]
pub struct Config {
    pub api_token: String,
    /// Default host for `show`; the polling loop always enumerates
    pub host_id: Option<u64>,
    pub api_url: String,
    pub interval: Duration,
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub mountpoint: String,
    pub clear_screen: bool,
}

impl Config {
    /// Resolve configuration from the real process environment
    pub fn load(overrides: &Overrides) -> Result<Self, ConfigError> {
        let file = AppConfig::load()?;
        Self::resolve(overrides, |key| std::env::var(key).ok(), &file)
    }

    /// Resolve configuration from explicit sources
    pub fn resolve<F>(overrides: &Overrides, env: F, file: &AppConfig) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_token = env(ENV_API_TOKEN)
            .map(|t| t.trim().to_string())
            .ok_or(ConfigError::Missing(ENV_API_TOKEN))?;

        let host_id = match env(ENV_HOST_ID).filter(|v| !v.trim().is_empty()) {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key: ENV_HOST_ID.to_string(),
                reason: e.to_string(),
            })?),
            None => None,
        };

        let api_url = overrides
            .api_url
            .clone()
            .or_else(|| env(ENV_API_URL))
            .or_else(|| file.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let interval = match overrides.interval {
            Some(d) => d,
            None => parse_duration_setting("interval", file.interval.as_deref())?
                .unwrap_or(DEFAULT_POLL_INTERVAL),
        };

        let request_timeout = parse_duration_setting("request_timeout", file.request_timeout.as_deref())?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let config = Self {
            api_token,
            host_id,
            api_url: api_url.trim_end_matches('/').to_string(),
            interval,
            concurrency: overrides
                .concurrency
                .or(file.concurrency)
                .unwrap_or(DEFAULT_CONCURRENCY),
            request_timeout,
            mountpoint: overrides
                .mountpoint
                .clone()
                .or_else(|| file.mountpoint.clone())
                .unwrap_or_else(|| ROOT_MOUNTPOINT.to_string()),
            clear_screen: !overrides.no_clear && file.clear_screen.unwrap_or(true),
        };

        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.api_token.is_empty() {
            errors.push(format!("{} must not be empty", ENV_API_TOKEN));
        }
        if self.interval.is_zero() {
            errors.push("interval must be greater than zero".to_string());
        }
        if self.concurrency == 0 {
            errors.push("concurrency must be at least 1".to_string());
        }
        if self.request_timeout.is_zero() {
            errors.push("request_timeout must be greater than zero".to_string());
        }
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            errors.push(format!("API URL '{}' must start with http:// or https://", self.api_url));
        }
        if !self.mountpoint.starts_with('/') {
            errors.push(format!("mountpoint '{}' must be an absolute path", self.mountpoint));
        }

        errors
    }

    /// Printable (key, value) pairs with the token masked
    pub fn display_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            (ENV_API_TOKEN, mask_sensitive(&self.api_token, 4)),
            (
                ENV_HOST_ID,
                self.host_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "<not set>".to_string()),
            ),
            (ENV_API_URL, self.api_url.clone()),
            ("interval", humantime::format_duration(self.interval).to_string()),
            ("concurrency", self.concurrency.to_string()),
            (
                "request_timeout",
                humantime::format_duration(self.request_timeout).to_string(),
            ),
            ("mountpoint", self.mountpoint.clone()),
            ("clear_screen", self.clear_screen.to_string()),
        ]
    }
}

// Hand-written so the token never ends up in logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_token", &mask_sensitive(&self.api_token, 4))
            .field("host_id", &self.host_id)
            .field("api_url", &self.api_url)
            .field("interval", &self.interval)
            .field("concurrency", &self.concurrency)
            .field("request_timeout", &self.request_timeout)
            .field("mountpoint", &self.mountpoint)
            .field("clear_screen", &self.clear_screen)
            .finish()
    }
}

fn parse_duration_setting(key: &str, raw: Option<&str>) -> Result<Option<Duration>, ConfigError> {
    raw.map(|value| {
        humantime::parse_duration(value).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        })
    })
    .transpose()
}
