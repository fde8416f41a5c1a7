//! Prometheus Metrics Registry - Feed Observability
//!
//! Registers the oracle feed metrics and renders them in the text
//! exposition format for the admin server's `/metrics` route.

use std::time::Duration;

use anyhow::Context;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

use crate::domain::oracle::{PerformanceIndex, PortCode};
use crate::ports::feed_observer::FeedObserver;

/// Centralized Prometheus metrics for the oracle feed.
///
/// All metrics follow the naming convention `port_exchange_feed_*`.
pub struct FeedMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Completed cycles by outcome (complete, partial, stopped).
    pub cycles_total: IntCounterVec,
    /// Per-port results (published, fetch, publish, skipped).
    pub port_updates_total: IntCounterVec,
    /// Last published index per port, in basis points.
    pub performance_index: IntGaugeVec,
    /// Wall-clock cycle duration.
    pub cycle_duration_seconds: Histogram,
    /// 1 while a cycle holds the run-lock.
    pub cycle_in_progress: IntGauge,
}

impl FeedMetrics {
    /// Create and register all feed metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let cycles_total = IntCounterVec::new(
            Opts::new("port_exchange_feed_cycles_total", "Completed feed cycles"),
            &["outcome"],
        )?;

        let port_updates_total = IntCounterVec::new(
            Opts::new(
                "port_exchange_feed_port_updates_total",
                "Per-port feed results",
            ),
            &["port", "result"],
        )?;

        let performance_index = IntGaugeVec::new(
            Opts::new(
                "port_exchange_feed_performance_index",
                "Last published performance index (basis points)",
            ),
            &["port"],
        )?;

        let cycle_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "port_exchange_feed_cycle_duration_seconds",
                "Feed cycle duration in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0]),
        )?;

        let cycle_in_progress = IntGauge::new(
            "port_exchange_feed_cycle_in_progress",
            "Whether a feed cycle is running (1=yes, 0=no)",
        )?;

        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(port_updates_total.clone()))?;
        registry.register(Box::new(performance_index.clone()))?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;
        registry.register(Box::new(cycle_in_progress.clone()))?;

        Ok(Self {
            registry,
            cycles_total,
            port_updates_total,
            performance_index,
            cycle_duration_seconds,
            cycle_in_progress,
        })
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Metrics output was not UTF-8")
    }
}

impl FeedObserver for FeedMetrics {
    fn cycle_started(&self) {
        self.cycle_in_progress.set(1);
    }

    fn port_published(&self, port: &PortCode, index: PerformanceIndex) {
        self.port_updates_total
            .with_label_values(&[port.as_str(), "published"])
            .inc();
        self.performance_index
            .with_label_values(&[port.as_str()])
            .set(i64::from(index.value()));
    }

    fn port_failed(&self, port: &PortCode, stage: &'static str) {
        self.port_updates_total
            .with_label_values(&[port.as_str(), stage])
            .inc();
    }

    fn cycle_finished(&self, outcome: &'static str, elapsed: Duration) {
        self.cycles_total.with_label_values(&[outcome]).inc();
        self.cycle_duration_seconds.observe(elapsed.as_secs_f64());
        self.cycle_in_progress.set(0);
    }
}
