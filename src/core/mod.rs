pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod poller;

pub use api::{DigitalOceanClient, Host, MonitoringApi};
pub use config::{Config, Overrides};
pub use metrics::MetricSnapshot;
pub use poller::Poller;
