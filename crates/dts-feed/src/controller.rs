//! ---
//! dts_section: "02-telemetry-feed"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Feed controller owning all telemetry state and update rules."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dts_common::config::FeedConfig;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::alerts::{Alert, AlertBoard, AlertId, AlertPayload};
use crate::buffers::{Sample, SlotBuffer, TimeSeriesBuffer};
use crate::gauge::{ScalarGauge, TemperatureBand};
use crate::random::RandomSource;
use crate::sink::RenderSink;

pub const VOLTAGE: &str = "voltage";
pub const CURRENT: &str = "current";
pub const TEMPERATURE: &str = "temperature";

/// Partial metric update as carried by a `sensorData` push event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricUpdate {
    #[serde(default)]
    pub voltage: Option<f64>,
    #[serde(default)]
    pub current: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

impl MetricUpdate {
    pub fn is_empty(&self) -> bool {
        self.voltage.is_none() && self.current.is_none() && self.temperature.is_none()
    }
}

/// Copy of the complete feed state handed to readers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedSnapshot {
    pub voltage: Vec<Sample>,
    pub current: Vec<f64>,
    /// Most recently written current slot; `None` until the first current update.
    pub current_latest: Option<f64>,
    pub temperature: f64,
    pub temperature_display: i64,
    pub temperature_band: TemperatureBand,
    pub alerts: Vec<Alert>,
    pub paused: bool,
    pub push_connected: bool,
    pub updated_at: DateTime<Utc>,
}

impl FeedSnapshot {
    /// Reduce to the latest reading per metric, in the `sensorData` shape.
    pub fn latest(&self) -> MetricUpdate {
        MetricUpdate {
            voltage: self.voltage.last().map(|sample| sample.value),
            current: self.current_latest,
            temperature: Some(self.temperature),
        }
    }
}

/// Sole owner of the telemetry buffers, gauge, and alert list.
///
/// Every trigger (timer, push event, user command) reaches the state through
/// `&mut self`, so there is exactly one writer regardless of the source.
pub struct FeedController {
    config: FeedConfig,
    rng: Box<dyn RandomSource>,
    sink: Arc<dyn RenderSink>,
    voltage: TimeSeriesBuffer,
    current: SlotBuffer,
    temperature: ScalarGauge,
    alerts: AlertBoard,
    paused: bool,
    push_connected: bool,
    updated_at: DateTime<Utc>,
}

impl FeedController {
    /// Build an unseeded controller. Call [`FeedController::initialize`] before use.
    pub fn new(config: FeedConfig, rng: Box<dyn RandomSource>, sink: Arc<dyn RenderSink>) -> Self {
        let voltage = TimeSeriesBuffer::new(config.voltage.capacity);
        let current = SlotBuffer::new(config.current.seed.clone());
        let temperature = ScalarGauge::new(
            config.temperature.initial,
            config.temperature.low,
            config.temperature.high,
        );
        let alerts = AlertBoard::new(config.alert_ttl);
        Self {
            config,
            rng,
            sink,
            voltage,
            current,
            temperature,
            alerts,
            paused: false,
            push_connected: false,
            updated_at: Utc::now(),
        }
    }

    /// Construct and seed in one step.
    pub fn seeded(
        config: FeedConfig,
        rng: Box<dyn RandomSource>,
        sink: Arc<dyn RenderSink>,
    ) -> Self {
        let mut controller = Self::new(config, rng, sink);
        controller.initialize(Utc::now());
        controller
    }

    /// Seed the buffers with synthetic history ending at `now`.
    pub fn initialize(&mut self, now: DateTime<Utc>) {
        let spacing = chrono::Duration::from_std(self.config.voltage.seed_spacing)
            .unwrap_or_else(|_| chrono::Duration::seconds(5));
        self.voltage.clear();
        for offset in (0..self.voltage.capacity()).rev() {
            let value = self.draw_voltage();
            self.voltage.push(now - spacing * offset as i32, value);
        }
        self.current = SlotBuffer::new(self.config.current.seed.clone());
        self.temperature = ScalarGauge::new(
            self.config.temperature.initial,
            self.config.temperature.low,
            self.config.temperature.high,
        );
        self.updated_at = now;
        debug!(
            voltage_points = self.voltage.len(),
            current_slots = self.current.len(),
            temperature = self.temperature.value(),
            "feed seeded"
        );

        self.sink.render_series(VOLTAGE, &self.voltage.points());
        self.sink.render_series(CURRENT, &self.current.points());
        self.sink.render_gauge(TEMPERATURE, self.temperature.value());
    }

    /// Synthetic metric cycle: append a voltage sample and overwrite one current slot.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        let voltage = self.draw_voltage();
        self.append_voltage(now, voltage);
        let current = self
            .rng
            .uniform_int(self.config.current.min, self.config.current.max);
        self.overwrite_current(f64::from(current));
        self.updated_at = now;
    }

    /// Bounded random walk of the temperature gauge.
    pub fn temperature_tick(&mut self) -> f64 {
        let step = self.config.temperature.max_step;
        let delta = self.rng.uniform(-step, step);
        let value = self.temperature.step(delta);
        self.updated_at = Utc::now();
        self.sink.render_gauge(TEMPERATURE, value);
        value
    }

    /// Apply an externally supplied update. Absent fields are left alone.
    pub fn on_push(&mut self, update: &MetricUpdate, now: DateTime<Utc>) {
        if let Some(voltage) = finite(VOLTAGE, update.voltage) {
            self.append_voltage(now, voltage);
        }
        if let Some(current) = finite(CURRENT, update.current) {
            self.overwrite_current(current);
        }
        if let Some(temperature) = finite(TEMPERATURE, update.temperature) {
            self.temperature.set(temperature);
            self.temperature_tick();
        }
        self.updated_at = now;
    }

    /// Show an alert; it lapses `alert_ttl` after `now`.
    pub fn on_alert(&mut self, payload: AlertPayload, now: Instant) -> AlertId {
        let alert = Alert::from_payload(payload, Utc::now());
        self.sink.render_alert(&alert);
        debug!(alert_id = %alert.id, kind = %alert.kind, "alert posted");
        self.alerts.post(alert, now)
    }

    /// Remove one alert; returns false if it was already gone.
    pub fn expire_alert(&mut self, id: AlertId) -> bool {
        match self.alerts.remove(id) {
            Some(_) => {
                self.sink.retire_alert(id);
                true
            }
            None => false,
        }
    }

    /// Remove every alert whose lifetime ended before `now`.
    pub fn expire_alerts(&mut self, now: Instant) -> usize {
        let expired = self.alerts.expire(now);
        for alert in &expired {
            self.sink.retire_alert(alert.id);
        }
        expired.len()
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_push_connected(&mut self, connected: bool) {
        self.push_connected = connected;
    }

    pub fn voltage(&self) -> &TimeSeriesBuffer {
        &self.voltage
    }

    pub fn current(&self) -> &SlotBuffer {
        &self.current
    }

    pub fn temperature(&self) -> &ScalarGauge {
        &self.temperature
    }

    pub fn alerts(&self) -> &AlertBoard {
        &self.alerts
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn latest(&self) -> MetricUpdate {
        MetricUpdate {
            voltage: self.voltage.latest().map(|sample| sample.value),
            current: self.current.latest(),
            temperature: Some(self.temperature.value()),
        }
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            voltage: self.voltage.samples().copied().collect(),
            current: self.current.values().to_vec(),
            current_latest: self.current.latest(),
            temperature: self.temperature.value(),
            temperature_display: self.temperature.display(),
            temperature_band: self.temperature.band(),
            alerts: self.alerts.alerts(),
            paused: self.paused,
            push_connected: self.push_connected,
            updated_at: self.updated_at,
        }
    }

    fn draw_voltage(&mut self) -> f64 {
        let spread = self.config.voltage.spread;
        self.config.voltage.nominal + self.rng.uniform(-spread, spread)
    }

    fn append_voltage(&mut self, now: DateTime<Utc>, value: f64) {
        self.voltage.push(now, value);
        self.sink.render_series(VOLTAGE, &self.voltage.points());
    }

    fn overwrite_current(&mut self, value: f64) {
        if self.current.is_empty() {
            return;
        }
        let index = self.rng.index(self.current.len());
        self.current.overwrite(index, value);
        self.sink.render_series(CURRENT, &self.current.points());
    }
}

fn finite(metric: &str, value: Option<f64>) -> Option<f64> {
    match value {
        Some(v) if v.is_finite() => Some(v),
        Some(v) => {
            warn!(metric, value = %v, "ignoring non-finite pushed value");
            None
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{FixedRandom, SeededRandom};
    use crate::sink::{RecordingSink, RenderEvent};
    use std::time::Duration;

    fn controller_with(rng: Box<dyn RandomSource>) -> (FeedController, RecordingSink) {
        let sink = RecordingSink::new();
        let controller = FeedController::seeded(FeedConfig::default(), rng, Arc::new(sink.clone()));
        (controller, sink)
    }

    #[test]
    fn initialize_seeds_history() {
        let now = Utc::now();
        let sink = RecordingSink::new();
        let mut controller = FeedController::new(
            FeedConfig::default(),
            Box::new(SeededRandom::from_seed(1)),
            Arc::new(sink.clone()),
        );
        controller.initialize(now);

        let samples: Vec<&Sample> = controller.voltage().samples().collect();
        assert_eq!(samples.len(), 20);
        assert_eq!(samples[0].timestamp, now - chrono::Duration::seconds(95));
        assert_eq!(samples[19].timestamp, now);
        for pair in samples.windows(2) {
            assert_eq!(
                pair[1].timestamp - pair[0].timestamp,
                chrono::Duration::seconds(5)
            );
        }
        assert!(samples.iter().all(|s| (200.0..240.0).contains(&s.value)));
        assert_eq!(
            controller.current().values(),
            &[45.0, 78.0, 52.0, 68.0, 85.0, 72.0]
        );
        assert_eq!(controller.temperature().value(), 65.0);
        assert_eq!(sink.last_gauge(TEMPERATURE), Some(65.0));
        assert_eq!(sink.last_series(VOLTAGE).map(|p| p.len()), Some(20));
    }

    #[test]
    fn zero_draw_yields_nominal_voltage() {
        let (mut controller, _sink) = controller_with(Box::new(FixedRandom::Value(0.0)));
        controller.tick(Utc::now());
        assert_eq!(controller.voltage().latest().unwrap().value, 220.0);
        assert_eq!(controller.voltage().len(), 20);
    }

    #[test]
    fn voltage_buffer_stays_bounded_across_ticks() {
        let (mut controller, _sink) = controller_with(Box::new(SeededRandom::from_seed(3)));
        for _ in 0..100 {
            controller.tick(Utc::now());
            assert!(controller.voltage().len() <= 20);
        }
        assert_eq!(controller.voltage().len(), 20);
    }

    #[test]
    fn current_tick_overwrites_single_slot() {
        let (mut controller, _sink) = controller_with(Box::new(FixedRandom::Upper));
        controller.tick(Utc::now());
        assert_eq!(
            controller.current().values(),
            &[45.0, 78.0, 52.0, 68.0, 85.0, 119.0]
        );

        let (mut seeded, _sink) = controller_with(Box::new(SeededRandom::from_seed(11)));
        for _ in 0..200 {
            let before = seeded.current().values().to_vec();
            seeded.tick(Utc::now());
            let after = seeded.current().values();
            assert_eq!(after.len(), 6);
            let changed = before.iter().zip(after).filter(|(a, b)| a != b).count();
            assert!(changed <= 1);
            assert!(after.iter().all(|v| (20.0..=119.0).contains(v) || before.contains(v)));
        }
    }

    #[test]
    fn max_draw_moves_temperature_by_full_step() {
        let (mut controller, _sink) = controller_with(Box::new(FixedRandom::Upper));
        assert_eq!(controller.temperature_tick(), 70.0);
        assert_eq!(controller.temperature_tick(), 75.0);
        assert_eq!(controller.temperature_tick(), 80.0);
        assert_eq!(controller.temperature_tick(), 85.0);
        assert_eq!(controller.temperature_tick(), 85.0);
    }

    #[test]
    fn temperature_never_leaves_bounds() {
        let (mut controller, _sink) = controller_with(Box::new(SeededRandom::from_seed(99)));
        for _ in 0..5_000 {
            let value = controller.temperature_tick();
            assert!((45.0..=85.0).contains(&value));
        }
    }

    #[test]
    fn push_applies_supplied_values() {
        let (mut controller, sink) = controller_with(Box::new(FixedRandom::Lower));
        sink.take();
        controller.on_push(
            &MetricUpdate {
                voltage: Some(231.5),
                current: Some(64.0),
                temperature: Some(80.0),
            },
            Utc::now(),
        );
        assert_eq!(controller.voltage().latest().unwrap().value, 231.5);
        assert_eq!(controller.voltage().len(), 20);
        assert_eq!(controller.current().values()[0], 64.0);
        // Pushed temperature is overwritten, then stepped by the lowest draw.
        assert_eq!(controller.temperature().value(), 75.0);
        assert_eq!(sink.last_gauge(TEMPERATURE), Some(75.0));
    }

    #[test]
    fn push_ignores_missing_and_non_finite_fields() {
        let (mut controller, sink) = controller_with(Box::new(SeededRandom::from_seed(5)));
        let before = controller.snapshot();
        sink.take();
        controller.on_push(
            &MetricUpdate {
                voltage: Some(f64::NAN),
                current: None,
                temperature: Some(f64::INFINITY),
            },
            Utc::now(),
        );
        let after = controller.snapshot();
        assert_eq!(before.voltage, after.voltage);
        assert_eq!(before.current, after.current);
        assert_eq!(before.temperature, after.temperature);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn alerts_expire_after_ttl_only() {
        let (mut controller, sink) = controller_with(Box::new(FixedRandom::Lower));
        let t0 = Instant::now();
        let id = controller.on_alert(
            AlertPayload {
                kind: "danger".into(),
                icon: "⚡".into(),
                message: "Breaker trip".into(),
            },
            t0,
        );
        assert_eq!(controller.expire_alerts(t0 + Duration::from_millis(9_999)), 0);
        assert!(controller.alerts().contains(id));
        assert_eq!(controller.expire_alerts(t0 + Duration::from_millis(10_001)), 1);
        assert!(controller.alerts().is_empty());
        assert!(!controller.expire_alert(id));
        assert!(sink.events().contains(&RenderEvent::Retired(id)));
    }

    #[test]
    fn snapshot_reports_band_and_flags() {
        let (mut controller, _sink) = controller_with(Box::new(FixedRandom::Upper));
        controller.temperature_tick();
        controller.set_paused(true);
        controller.set_push_connected(true);
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.temperature_display, 70);
        assert_eq!(snapshot.temperature_band, TemperatureBand::Elevated);
        assert!(snapshot.paused);
        assert!(snapshot.push_connected);
        assert_eq!(controller.latest().temperature, Some(70.0));
        assert_eq!(controller.latest().current, None);
        assert_eq!(snapshot.latest(), controller.latest());
    }

    #[test]
    fn latest_reading_uses_push_shape() {
        let (mut controller, _sink) = controller_with(Box::new(FixedRandom::Value(0.0)));
        controller.on_push(
            &MetricUpdate {
                voltage: Some(231.5),
                current: Some(64.0),
                temperature: Some(70.0),
            },
            Utc::now(),
        );
        let latest = controller.latest();
        assert_eq!(
            latest,
            MetricUpdate {
                voltage: Some(231.5),
                current: Some(64.0),
                temperature: Some(70.0),
            }
        );
        let wire = serde_json::to_value(&latest).unwrap();
        assert_eq!(wire["current"], 64.0);
        assert_eq!(controller.snapshot().latest(), latest);
    }
}
