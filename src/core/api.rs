/// DigitalOcean API client
///
/// Read-only access to the droplet listing and the droplet monitoring
/// time-series endpoints. Every request is authenticated with the bearer
/// token; nothing is retried.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::core::config::Config;
use crate::core::error::{ApiError, MetricsError};
use crate::utils::{DROPLETS_PATH, DROPLETS_PER_PAGE, GRANULARITY, MONITORING_PATH};

/// A managed droplet
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Host {
    pub id: u64,
    pub name: String,
    #[serde(rename = "size_slug")]
    pub size: String,
}

/// Droplet time series exposed by the monitoring API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Cpu,
    MemoryAvailable,
    MemoryTotal,
    Load5,
    FilesystemSize,
    FilesystemFree,
}

impl Metric {
    /// Final path segment of the metric endpoint
    pub fn path(&self) -> &'static str {
        match self {
            Metric::Cpu => "cpu",
            Metric::MemoryAvailable => "memory_available",
            Metric::MemoryTotal => "memory_total",
            Metric::Load5 => "load_5",
            Metric::FilesystemSize => "filesystem_size",
            Metric::FilesystemFree => "filesystem_free",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Query window, sent as ISO-8601 UTC timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window of `length` ending at `end`
    pub fn trailing(end: DateTime<Utc>, length: Duration) -> Self {
        let length = chrono::Duration::from_std(length).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            start: end - length,
            end,
        }
    }

    pub fn start_param(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn end_param(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Sample value; the API sends numbers as strings but plain numbers are accepted too
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Text(String),
    Number(f64),
}

impl SampleValue {
    pub fn as_f64(&self) -> Result<f64, MetricsError> {
        match self {
            SampleValue::Number(n) => Ok(*n),
            SampleValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| MetricsError::BadSample(s.clone())),
        }
    }

    /// Value exactly as reported
    pub fn as_text(&self) -> String {
        match self {
            SampleValue::Text(s) => s.clone(),
            SampleValue::Number(n) => n.to_string(),
        }
    }
}

/// `[timestamp, value]` pair
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sample(pub f64, pub SampleValue);

/// One labelled time series
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Series {
    #[serde(rename = "metric", default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub values: Vec<Sample>,
}

impl Series {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Most recent sample; the API returns samples in chronological order
    pub fn latest(&self) -> Option<&SampleValue> {
        self.values.last().map(|sample| &sample.1)
    }

    pub fn latest_f64(&self) -> Result<f64, MetricsError> {
        self.latest().ok_or(MetricsError::EmptySeries)?.as_f64()
    }
}

#[derive(Debug, Deserialize)]
struct DropletsPage {
    #[serde(default)]
    droplets: Vec<Host>,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    #[serde(default)]
    pages: Option<Pages>,
}

#[derive(Debug, Default, Deserialize)]
struct Pages {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DropletEnvelope {
    droplet: Host,
}

#[derive(Debug, Deserialize)]
struct MetricsResponse {
    data: MetricsData,
}

#[derive(Debug, Deserialize)]
struct MetricsData {
    #[serde(default)]
    result: Vec<Series>,
}

/// Read operations the poller needs from the provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MonitoringApi: Send + Sync {
    /// All droplets on the account, in API order
    async fn list_hosts(&self) -> Result<Vec<Host>, ApiError>;

    async fn get_host(&self, id: u64) -> Result<Host, ApiError>;

    /// Every series the API returns for `metric` on one host
    async fn query(
        &self,
        metric: Metric,
        host_id: u64,
        window: &TimeWindow,
    ) -> Result<Vec<Series>, ApiError>;
}

#[derive(Clone)]
pub struct DigitalOceanClient {
    client: Client,
    base_url: String,
    token: String,
}

impl DigitalOceanClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dropwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| ApiError::Transport {
                url: base_url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            base_url,
            token: token.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(&config.api_url, &config.api_token, config.request_timeout)
    }

    /// GET `url` and decode the JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        debug!(url, ?query, "GET");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;

        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status,
                body: body.trim().to_string(),
            });
        }

        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl MonitoringApi for DigitalOceanClient {
    async fn list_hosts(&self) -> Result<Vec<Host>, ApiError> {
        let mut hosts = Vec::new();
        let mut url = format!("{}{}", self.base_url, DROPLETS_PATH);
        let mut query = vec![("per_page", DROPLETS_PER_PAGE.to_string())];

        loop {
            let page: DropletsPage = self.get_json(&url, &query).await?;
            hosts.extend(page.droplets);

            // The next link already carries its own query string
            match page.links.pages.and_then(|p| p.next) {
                Some(next) if next != url => {
                    url = next;
                    query.clear();
                }
                _ => break,
            }
        }

        debug!(count = hosts.len(), "listed droplets");
        Ok(hosts)
    }

    async fn get_host(&self, id: u64) -> Result<Host, ApiError> {
        let url = format!("{}{}/{}", self.base_url, DROPLETS_PATH, id);
        let envelope: DropletEnvelope = self.get_json(&url, &[]).await?;
        Ok(envelope.droplet)
    }

    async fn query(
        &self,
        metric: Metric,
        host_id: u64,
        window: &TimeWindow,
    ) -> Result<Vec<Series>, ApiError> {
        let url = format!("{}{}/{}", self.base_url, MONITORING_PATH, metric.path());
        let query = [
            ("host_id", host_id.to_string()),
            ("start", window.start_param()),
            ("end", window.end_param()),
            ("granularity", GRANULARITY.to_string()),
        ];

        let response: MetricsResponse = self.get_json(&url, &query).await?;
        Ok(response.data.result)
    }
}
