//! ---
//! dts_section: "03-observability"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Metrics collection and export utilities."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use tracing::error;

/// Shared registry type used across crates.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Encode every family in `registry` using the text exposition format.
pub fn encode_text(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let families = registry.gather();
    encoder.encode_to_string(&families).map_err(|err| {
        error!(error = %err, "failed to encode metrics");
        anyhow::Error::new(err).context("metrics encoding error")
    })
}

/// Metrics recorded by the daemon process itself.
#[derive(Clone)]
pub struct DaemonMetrics {
    starts_total: IntCounter,
    config_load_seconds: Histogram,
}

impl DaemonMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let starts_total = IntCounter::with_opts(Opts::new(
            "dtsd_starts_total",
            "Total number of times the DTS daemon has initialised",
        ))?;
        registry.register(Box::new(starts_total.clone()))?;

        let buckets = prometheus::exponential_buckets(0.001, 2.0, 16)
            .context("failed to construct histogram buckets")?;
        let config_load_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "dtsd_config_load_seconds",
                "Time spent loading and validating configuration",
            )
            .buckets(buckets),
        )?;
        registry.register(Box::new(config_load_seconds.clone()))?;

        Ok(Self {
            starts_total,
            config_load_seconds,
        })
    }

    pub fn inc_start(&self) {
        self.starts_total.inc();
    }

    pub fn observe_config_load(&self, seconds: f64) {
        self.config_load_seconds.observe(seconds);
    }
}

/// Counters and gauges describing the feed controller.
#[derive(Clone, Debug)]
pub struct FeedMetrics {
    ticks: IntCounterVec,
    push_events: IntCounterVec,
    alerts_active: IntGauge,
    paused: IntGauge,
}

impl FeedMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let ticks = IntCounterVec::new(
            Opts::new(
                "dts_feed_ticks_total",
                "Feed updates applied, labelled by trigger (metric, temperature, push)",
            ),
            &["source"],
        )?;
        registry.register(Box::new(ticks.clone()))?;

        let push_events = IntCounterVec::new(
            Opts::new(
                "dts_push_events_total",
                "Events received over the push channel by kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(push_events.clone()))?;

        let alerts_active = IntGauge::with_opts(Opts::new(
            "dts_alerts_active",
            "Alerts currently displayed",
        ))?;
        registry.register(Box::new(alerts_active.clone()))?;

        let paused = IntGauge::with_opts(Opts::new(
            "dts_feed_paused",
            "Indicator (0/1) whether synthetic updates are paused",
        ))?;
        registry.register(Box::new(paused.clone()))?;

        Ok(Self {
            ticks,
            push_events,
            alerts_active,
            paused,
        })
    }

    pub fn record_tick(&self, source: &str) {
        self.ticks.with_label_values(&[source]).inc();
    }

    pub fn record_push_event(&self, kind: &str) {
        self.push_events.with_label_values(&[kind]).inc();
    }

    pub fn set_alerts_active(&self, count: usize) {
        self.alerts_active.set(count as i64);
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.set(i64::from(paused));
    }
}
