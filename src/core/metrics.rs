/// Per-droplet metrics collection
///
/// Queries the monitoring API for one droplet and reduces each time series
/// to its latest sample. The four metric groups (CPU, memory, filesystem,
/// load) are independent: a failure in one is logged and leaves only that
/// field empty.

use anyhow::{Context, Result};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::core::api::{Host, Metric, MonitoringApi, Series, TimeWindow};
use crate::utils::{describe_capacity, percentage};

/// Utilization of one droplet for one polling cycle
///
/// `None` means the value could not be retrieved; the renderer decides how
/// to show it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSnapshot {
    pub name: String,
    pub size: String,
    /// "NN.NN%"
    pub cpu: Option<String>,
    /// "NN.NN% (used GB/total GB)"
    pub memory: Option<String>,
    /// Raw 5-minute load average as reported
    pub load_5: Option<String>,
    /// "NN.NN% (used GB/total GB)" for the configured mountpoint
    pub filesystem: Option<String>,
}

impl MetricSnapshot {
    pub fn for_host(host: &Host) -> Self {
        Self {
            name: host.name.clone(),
            size: host.size.clone(),
            ..Default::default()
        }
    }
}

/// Collect a snapshot for `host`; never fails
pub async fn fetch_metrics<A>(
    api: &A,
    host: &Host,
    window: &TimeWindow,
    mountpoint: &str,
) -> MetricSnapshot
where
    A: MonitoringApi + ?Sized,
{
    let mut snapshot = MetricSnapshot::for_host(host);

    snapshot.cpu = settle(host, "cpu", cpu_usage(api, host.id, window).await);
    snapshot.memory = settle(host, "memory", memory_usage(api, host.id, window).await);
    snapshot.filesystem = settle(
        host,
        "filesystem",
        filesystem_usage(api, host.id, window, mountpoint).await,
    );
    snapshot.load_5 = settle(host, "load_5", load_average(api, host.id, window).await);

    snapshot
}

fn settle(host: &Host, group: &str, result: Result<Option<String>>) -> Option<String> {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(
                host = %host.name,
                host_id = host.id,
                metric = group,
                "failed to fetch metrics: {:#}",
                e
            );
            None
        }
    }
}

/// Share of user+system time over idle+user+system, from the latest sample per mode
async fn cpu_usage<A>(api: &A, host_id: u64, window: &TimeWindow) -> Result<Option<String>>
where
    A: MonitoringApi + ?Sized,
{
    let series = api.query(Metric::Cpu, host_id, window).await?;

    let mut total_idle = 0.0;
    let mut total_active = 0.0;

    for entry in &series {
        if entry.latest().is_none() {
            continue;
        }
        match entry.label("mode") {
            Some("idle") => total_idle += entry.latest_f64()?,
            Some("user") | Some("system") => total_active += entry.latest_f64()?,
            _ => {}
        }
    }

    let total_time = total_idle + total_active;
    if total_time == 0.0 {
        return Ok(None);
    }

    Ok(Some(format!("{}%", percentage(total_active, total_time)?)))
}

async fn memory_usage<A>(api: &A, host_id: u64, window: &TimeWindow) -> Result<Option<String>>
where
    A: MonitoringApi + ?Sized,
{
    let available = api.query(Metric::MemoryAvailable, host_id, window).await?;
    let total = api.query(Metric::MemoryTotal, host_id, window).await?;

    let available = first_latest(&available).context("memory_available")?;
    let total = first_latest(&total).context("memory_total")?;

    match (available, total) {
        (Some(available), Some(total)) if available != 0.0 && total != 0.0 => {
            let used = total - available;
            Ok(Some(describe_capacity(used, total)?))
        }
        _ => Ok(None),
    }
}

/// Usage of `mountpoint`, pairing size and free series on (device, mountpoint)
async fn filesystem_usage<A>(
    api: &A,
    host_id: u64,
    window: &TimeWindow,
    mountpoint: &str,
) -> Result<Option<String>>
where
    A: MonitoringApi + ?Sized,
{
    let sizes = api.query(Metric::FilesystemSize, host_id, window).await?;
    let frees = api.query(Metric::FilesystemFree, host_id, window).await?;

    let free_by_key: HashMap<(&str, &str), &Series> =
        frees.iter().map(|entry| (filesystem_key(entry), entry)).collect();

    for size_entry in &sizes {
        let key = filesystem_key(size_entry);
        if key.1 != mountpoint {
            continue;
        }

        let Some(free_entry) = free_by_key.get(&key) else {
            debug!(device = key.0, mountpoint = key.1, "no free-space series for filesystem");
            continue;
        };

        let size = size_entry.latest_f64().context("filesystem_size")?;
        let free = free_entry.latest_f64().context("filesystem_free")?;

        return Ok(Some(describe_capacity(size - free, size)?));
    }

    Ok(None)
}

async fn load_average<A>(api: &A, host_id: u64, window: &TimeWindow) -> Result<Option<String>>
where
    A: MonitoringApi + ?Sized,
{
    let series = api.query(Metric::Load5, host_id, window).await?;
    Ok(series
        .first()
        .and_then(|entry| entry.latest())
        .map(|value| value.as_text()))
}

fn filesystem_key(series: &Series) -> (&str, &str) {
    (
        series.label("device").unwrap_or_default(),
        series.label("mountpoint").unwrap_or_default(),
    )
}

/// Latest value of the first series, if there is one
fn first_latest(series: &[Series]) -> Result<Option<f64>> {
    match series.first() {
        Some(entry) if entry.latest().is_some() => Ok(Some(entry.latest_f64()?)),
        _ => Ok(None),
    }
}
