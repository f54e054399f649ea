/// Error types for the API client, metric reduction and configuration

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum MetricsError {
    #[error("cannot compute percentage of {used} over {total}")]
    NonFinite { used: f64, total: f64 },

    #[error("sample value {0:?} is not a number")]
    BadSample(String),

    #[error("series has no samples")]
    EmptySeries,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set (add it to the environment or a .env file)")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("configuration errors: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
