/// DigitalOcean API endpoints and monitoring defaults

use std::time::Duration;

/// Public API root, overridable with DO_API_URL
pub const DEFAULT_API_URL: &str = "https://api.digitalocean.com";

/// Host listing endpoint
pub const DROPLETS_PATH: &str = "/v2/droplets";

/// Prefix of every droplet time-series endpoint
pub const MONITORING_PATH: &str = "/v2/monitoring/metrics/droplet";

/// Largest page size the droplet listing accepts
pub const DROPLETS_PER_PAGE: u32 = 200;

/// Sampling interval requested from the monitoring API
pub const GRANULARITY: &str = "1m";

/// Poll interval, also the length of the trailing metrics window
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Hosts fetched at the same time within one cycle
pub const DEFAULT_CONCURRENCY: usize = 8;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Filesystem reported in the File Storage column
pub const ROOT_MOUNTPOINT: &str = "/";

/// Shown for CPU, Memory and Load when a value could not be retrieved
pub const NOT_AVAILABLE: &str = "N/A";

pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

// Progress bars
pub const BAR_WIDTH: usize = 20;
pub const BAR_FILLED: char = '▮';
pub const BAR_EMPTY: char = '▯';

/// Table column (header, width) pairs
pub const COLUMNS: [(&str, usize); 6] = [
    ("Name", 25),
    ("Size", 15),
    ("CPU", 25),
    ("Memory", 30),
    ("Load 5m", 10),
    ("File Storage", 30),
];

// Environment keys
pub const ENV_API_TOKEN: &str = "DO_API_TOKEN";
pub const ENV_HOST_ID: &str = "DROPLET_ID";
pub const ENV_API_URL: &str = "DO_API_URL";
