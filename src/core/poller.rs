/// Polling loop
///
/// Each cycle lists droplets, fetches every droplet's metrics with bounded
/// concurrency and redraws the table. Cycles never overlap: the next tick is
/// only awaited once the previous cycle has finished.

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::io::Write;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::core::api::{MonitoringApi, TimeWindow};
use crate::core::config::Config;
use crate::core::metrics::{fetch_metrics, MetricSnapshot};
use crate::screens::TableRenderer;

pub struct Poller<A> {
    api: A,
    interval: Duration,
    concurrency: usize,
    mountpoint: String,
}

impl<A: MonitoringApi> Poller<A> {
    pub fn new(api: A, config: &Config) -> Self {
        Self {
            api,
            interval: config.interval,
            concurrency: config.concurrency.max(1),
            mountpoint: config.mountpoint.clone(),
        }
    }

    /// Snapshots for every droplet, in listing order
    ///
    /// Fails only when the droplet list itself cannot be fetched.
    pub async fn collect(&self) -> Result<Vec<MetricSnapshot>> {
        let window = TimeWindow::trailing(Utc::now(), self.interval);
        let hosts = self
            .api
            .list_hosts()
            .await
            .context("Failed to list droplets")?;

        info!(hosts = hosts.len(), concurrency = self.concurrency, "polling droplets");

        let snapshots = stream::iter(hosts.iter())
            .map(|host| fetch_metrics(&self.api, host, &window, &self.mountpoint))
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        Ok(snapshots)
    }

    /// Snapshot for a single droplet looked up by id
    pub async fn collect_one(&self, host_id: u64) -> Result<MetricSnapshot> {
        let window = TimeWindow::trailing(Utc::now(), self.interval);
        let host = self
            .api
            .get_host(host_id)
            .await
            .with_context(|| format!("Failed to look up droplet {}", host_id))?;

        Ok(fetch_metrics(&self.api, &host, &window, &self.mountpoint).await)
    }

    /// One cycle: collect, then draw
    pub async fn run_cycle<W: Write>(&self, renderer: &mut TableRenderer<W>) -> Result<()> {
        let snapshots = self.collect().await?;
        renderer
            .draw(&snapshots, Local::now())
            .context("Failed to write table")?;
        Ok(())
    }

    /// Poll until Ctrl-C
    pub async fn run<W: Write>(&self, renderer: &mut TableRenderer<W>) -> Result<()> {
        self.run_until(renderer, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await
    }

    /// Poll immediately, then on every interval tick, until `shutdown` resolves
    ///
    /// A failed cycle is logged and the loop carries on with the next tick.
    pub async fn run_until<W, F>(&self, renderer: &mut TableRenderer<W>, shutdown: F) -> Result<()>
    where
        W: Write,
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut cycles: u64 = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(cycles, "stopping");
                    break;
                }
                _ = async {
                    ticker.tick().await;
                    if let Err(e) = self.run_cycle(&mut *renderer).await {
                        error!("Polling cycle failed: {:#}", e);
                    }
                } => {
                    cycles += 1;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::api::{Host, Metric, MockMonitoringApi, Sample, SampleValue, Series};
    use crate::core::config::Overrides;
    use crate::core::error::ApiError;
    use crate::utils::AppConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn config(interval: Duration, concurrency: usize) -> Config {
        let overrides = Overrides {
            interval: Some(interval),
            concurrency: Some(concurrency),
            ..Default::default()
        };
        Config::resolve(
            &overrides,
            |key| (key == "DO_API_TOKEN").then(|| "test-token-123".to_string()),
            &AppConfig::default(),
        )
        .unwrap()
    }

    fn hosts(count: u64) -> Vec<Host> {
        (1..=count)
            .map(|id| Host {
                id,
                name: format!("node-{}", id),
                size: "s-1vcpu-1gb".to_string(),
            })
            .collect()
    }

    fn load_series(host_id: u64) -> Vec<Series> {
        vec![Series {
            labels: Default::default(),
            values: vec![Sample(1714564800.0, SampleValue::Text(format!("{}.00", host_id)))],
        }]
    }

    /// Tracks how many calls are running at once
    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
        total: AtomicUsize,
    }

    impl Gauge {
        fn enter(&self) {
            self.total.fetch_add(1, Ordering::SeqCst);
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }

        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        fn total(&self) -> usize {
            self.total.load(Ordering::SeqCst)
        }
    }

    /// API that answers after fixed delays
    struct SlowApi {
        hosts: u64,
        list_delay: Duration,
        query_delay: Duration,
        listing: Arc<Gauge>,
        querying: Arc<Gauge>,
    }

    #[async_trait::async_trait]
    impl MonitoringApi for SlowApi {
        async fn list_hosts(&self) -> Result<Vec<Host>, ApiError> {
            self.listing.enter();
            tokio::time::sleep(self.list_delay).await;
            self.listing.exit();
            Ok(hosts(self.hosts))
        }

        async fn get_host(&self, id: u64) -> Result<Host, ApiError> {
            Ok(Host {
                id,
                name: format!("node-{}", id),
                size: "s-1vcpu-1gb".to_string(),
            })
        }

        async fn query(
            &self,
            _metric: Metric,
            _host_id: u64,
            _window: &TimeWindow,
        ) -> Result<Vec<Series>, ApiError> {
            self.querying.enter();
            tokio::time::sleep(self.query_delay).await;
            self.querying.exit();
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycles_never_overlap() {
        let listing = Arc::new(Gauge::default());
        let api = SlowApi {
            hosts: 0,
            list_delay: Duration::from_secs(70),
            query_delay: Duration::ZERO,
            listing: listing.clone(),
            querying: Arc::default(),
        };

        let poller = Poller::new(api, &config(Duration::from_secs(30), 8));
        let mut renderer = TableRenderer::new(Vec::new(), false, false);
        poller
            .run_until(&mut renderer, tokio::time::sleep(Duration::from_secs(200)))
            .await
            .unwrap();

        // Cycles start at 0s, 70s and 140s; the third is still listing at 200s
        assert_eq!(listing.peak(), 1);
        assert_eq!(listing.total(), 3);
        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(output.matches("Updated").count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_respect_concurrency_limit() {
        let querying = Arc::new(Gauge::default());
        let api = SlowApi {
            hosts: 10,
            list_delay: Duration::ZERO,
            query_delay: Duration::from_secs(1),
            listing: Arc::default(),
            querying: querying.clone(),
        };

        let poller = Poller::new(api, &config(Duration::from_secs(30), 3));
        let snapshots = poller.collect().await.unwrap();

        assert_eq!(snapshots.len(), 10);
        assert_eq!(querying.peak(), 3);
        // Six queries per droplet
        assert_eq!(querying.total(), 60);
    }

    #[tokio::test]
    async fn test_collect_keeps_listing_order() {
        let mut api = MockMonitoringApi::new();
        api.expect_list_hosts().times(1).returning(|| Ok(hosts(5)));
        api.expect_query().returning(|metric, host_id, _| match metric {
            Metric::Load5 => Ok(load_series(host_id)),
            _ => Ok(Vec::new()),
        });

        let poller = Poller::new(api, &config(Duration::from_secs(30), 2));
        let snapshots = poller.collect().await.unwrap();

        let names: Vec<&str> = snapshots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["node-1", "node-2", "node-3", "node-4", "node-5"]);
        assert_eq!(snapshots[2].load_5.as_deref(), Some("3.00"));
    }

    #[tokio::test]
    async fn test_listing_failure_skips_render() {
        let mut api = MockMonitoringApi::new();
        api.expect_list_hosts().returning(|| {
            Err(ApiError::Status {
                url: "http://localhost/v2/droplets".to_string(),
                status: reqwest::StatusCode::UNAUTHORIZED,
                body: "unable to authenticate you".to_string(),
            })
        });
        api.expect_query().never();

        let poller = Poller::new(api, &config(Duration::from_secs(30), 8));
        let mut renderer = TableRenderer::new(Vec::new(), false, false);

        assert!(poller.run_cycle(&mut renderer).await.is_err());
        assert!(renderer.into_inner().is_empty());
    }

    #[tokio::test]
    async fn test_no_hosts_renders_header() {
        let mut api = MockMonitoringApi::new();
        api.expect_list_hosts().returning(|| Ok(Vec::new()));

        let poller = Poller::new(api, &config(Duration::from_secs(30), 8));
        let mut renderer = TableRenderer::new(Vec::new(), false, false);
        poller.run_cycle(&mut renderer).await.unwrap();

        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(output.contains("Load 5m"));
        assert!(output.contains("0 droplets"));
    }

    #[tokio::test]
    async fn test_run_polls_immediately() {
        let listed = Arc::new(AtomicUsize::new(0));
        let counter = listed.clone();

        let mut api = MockMonitoringApi::new();
        api.expect_list_hosts().returning(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        });

        let poller = Poller::new(api, &config(Duration::from_secs(3600), 8));
        let mut renderer = TableRenderer::new(Vec::new(), false, false);
        poller
            .run_until(&mut renderer, tokio::time::sleep(Duration::from_millis(200)))
            .await
            .unwrap();

        assert_eq!(listed.load(Ordering::SeqCst), 1);
        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(output.matches("Updated").count(), 1);
    }

    #[tokio::test]
    async fn test_collect_one() {
        let mut api = MockMonitoringApi::new();
        api.expect_get_host()
            .withf(|id| *id == 7)
            .returning(|id| {
                Ok(Host {
                    id,
                    name: "solo".to_string(),
                    size: "s-2vcpu-2gb".to_string(),
                })
            });
        api.expect_query().returning(|_, _, _| Ok(Vec::new()));

        let poller = Poller::new(api, &config(Duration::from_secs(30), 8));
        let snapshot = poller.collect_one(7).await.unwrap();

        assert_eq!(snapshot.name, "solo");
        assert_eq!(snapshot.cpu, None);
    }
}
