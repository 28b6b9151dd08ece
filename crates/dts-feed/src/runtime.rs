//! ---
//! dts_section: "02-telemetry-feed"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Timer-driven runtime task that owns the feed controller."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::Utc;
use dts_metrics::FeedMetrics;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::alerts::{AlertId, AlertPayload};
use crate::controller::{FeedController, FeedSnapshot, MetricUpdate};

const CHANNEL_CAPACITY: usize = 256;

/// Event delivered by the real-time push channel.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Connected,
    SensorData(MetricUpdate),
    Alert(AlertPayload),
    Disconnected,
}

impl PushEvent {
    /// Wire name of the event, also used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            PushEvent::Connected => "connect",
            PushEvent::SensorData(_) => "sensorData",
            PushEvent::Alert(_) => "alert",
            PushEvent::Disconnected => "disconnect",
        }
    }
}

/// Errors surfaced by [`FeedControl`] and [`FeedHandle`].
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The runtime task has already stopped.
    #[error("feed runtime is no longer running")]
    Stopped,
    /// The runtime task panicked or was aborted.
    #[error("feed runtime task failed: {0}")]
    Join(String),
}

#[derive(Debug)]
enum Control {
    Pause,
    Resume,
    Shutdown,
}

/// Cloneable handle for steering a running feed.
#[derive(Debug, Clone)]
pub struct FeedControl {
    control: mpsc::Sender<Control>,
    push: mpsc::Sender<PushEvent>,
    snapshot: watch::Receiver<FeedSnapshot>,
}

impl FeedControl {
    /// Suspend synthetic ticks. Push events keep applying.
    pub async fn pause(&self) -> Result<(), FeedError> {
        self.control
            .send(Control::Pause)
            .await
            .map_err(|_| FeedError::Stopped)
    }

    pub async fn resume(&self) -> Result<(), FeedError> {
        self.control
            .send(Control::Resume)
            .await
            .map_err(|_| FeedError::Stopped)
    }

    /// Forward an event as if it had arrived over the push channel.
    pub async fn push(&self, event: PushEvent) -> Result<(), FeedError> {
        self.push.send(event).await.map_err(|_| FeedError::Stopped)
    }

    /// Sender handed to the push channel client.
    pub fn push_sender(&self) -> mpsc::Sender<PushEvent> {
        self.push.clone()
    }

    /// Receiver notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshot.clone()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.snapshot.borrow().clone()
    }
}

/// Owning handle for the runtime task. Call [`FeedHandle::shutdown`] on teardown.
#[derive(Debug)]
pub struct FeedHandle {
    control: FeedControl,
    task: JoinHandle<()>,
}

impl FeedHandle {
    pub fn control(&self) -> FeedControl {
        self.control.clone()
    }

    /// Stop every timer and wait for the runtime task to finish.
    pub async fn shutdown(self) -> Result<(), FeedError> {
        let _ = self.control.control.send(Control::Shutdown).await;
        self.task
            .await
            .map_err(|err| FeedError::Join(err.to_string()))
    }
}

impl std::ops::Deref for FeedHandle {
    type Target = FeedControl;

    fn deref(&self) -> &Self::Target {
        &self.control
    }
}

/// Runs a [`FeedController`] on its own task.
///
/// The task multiplexes both tick intervals, push events, per-alert expiry
/// timers, and control messages; each is handled to completion before the
/// next is taken.
pub struct FeedRuntime {
    controller: FeedController,
    metrics: Option<FeedMetrics>,
}

impl FeedRuntime {
    pub fn new(controller: FeedController) -> Self {
        Self {
            controller,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: FeedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn spawn(self) -> FeedHandle {
        let (control_tx, control_rx) = mpsc::channel(16);
        let (push_tx, push_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(self.controller.snapshot());

        let tick_period = self.controller.config().tick_interval;
        let temperature_period = self.controller.config().temperature_interval;
        let alert_ttl = self.controller.config().alert_ttl;

        let task = tokio::spawn(
            RuntimeLoop {
                controller: self.controller,
                metrics: self.metrics,
                alert_ttl,
                snapshot: snapshot_tx,
            }
            .run(tick_period, temperature_period, control_rx, push_rx),
        );

        FeedHandle {
            control: FeedControl {
                control: control_tx,
                push: push_tx,
                snapshot: snapshot_rx,
            },
            task,
        }
    }
}

struct RuntimeLoop {
    controller: FeedController,
    metrics: Option<FeedMetrics>,
    alert_ttl: Duration,
    snapshot: watch::Sender<FeedSnapshot>,
}

impl RuntimeLoop {
    async fn run(
        mut self,
        tick_period: Duration,
        temperature_period: Duration,
        mut control: mpsc::Receiver<Control>,
        mut push: mpsc::Receiver<PushEvent>,
    ) {
        let mut metric_timer = periodic(tick_period);
        let mut temperature_timer = periodic(temperature_period);
        let (expiry_tx, mut expiry_rx) = mpsc::unbounded_channel::<AlertId>();

        info!(
            tick_ms = tick_period.as_millis() as u64,
            temperature_ms = temperature_period.as_millis() as u64,
            "feed runtime started"
        );

        loop {
            tokio::select! {
                command = control.recv() => {
                    match command {
                        Some(Control::Pause) => self.set_paused(true),
                        Some(Control::Resume) => self.set_paused(false),
                        Some(Control::Shutdown) | None => break,
                    }
                }
                _ = metric_timer.tick() => {
                    if self.controller.is_paused() {
                        continue;
                    }
                    self.controller.tick(Utc::now());
                    self.record_tick("metric");
                }
                _ = temperature_timer.tick() => {
                    if self.controller.is_paused() {
                        continue;
                    }
                    self.controller.temperature_tick();
                    self.record_tick("temperature");
                }
                Some(event) = push.recv() => {
                    self.handle_push(event, &expiry_tx);
                }
                Some(id) = expiry_rx.recv() => {
                    if self.controller.expire_alert(id) {
                        debug!(alert_id = %id, "alert expired");
                    }
                }
            }

            if let Some(metrics) = &self.metrics {
                metrics.set_alerts_active(self.controller.alerts().len());
            }
            self.snapshot.send_replace(self.controller.snapshot());
        }

        info!("feed runtime stopped");
    }

    fn handle_push(&mut self, event: PushEvent, expiry: &mpsc::UnboundedSender<AlertId>) {
        if let Some(metrics) = &self.metrics {
            metrics.record_push_event(event.kind());
        }
        match event {
            PushEvent::Connected => {
                info!("connected to push channel");
                self.controller.set_push_connected(true);
            }
            PushEvent::Disconnected => {
                info!("disconnected from push channel");
                self.controller.set_push_connected(false);
            }
            PushEvent::SensorData(update) => {
                if update.is_empty() {
                    debug!("empty sensorData event ignored");
                    return;
                }
                self.controller.on_push(&update, Utc::now());
                self.record_tick("push");
            }
            PushEvent::Alert(payload) => {
                let id = self.controller.on_alert(payload, Instant::now());
                // Fire-and-forget expiry; a late message for a removed alert is a no-op.
                let expiry = expiry.clone();
                let ttl = self.alert_ttl;
                tokio::spawn(async move {
                    tokio::time::sleep(ttl).await;
                    if expiry.send(id).is_err() {
                        warn!(alert_id = %id, "feed runtime gone before alert expiry");
                    }
                });
            }
        }
    }

    fn set_paused(&mut self, paused: bool) {
        if self.controller.is_paused() == paused {
            return;
        }
        self.controller.set_paused(paused);
        if let Some(metrics) = &self.metrics {
            metrics.set_paused(paused);
        }
        if paused {
            info!("feed paused");
        } else {
            info!("feed resumed");
        }
    }

    fn record_tick(&self, source: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_tick(source);
        }
    }
}

fn periodic(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::FixedRandom;
    use crate::sink::RecordingSink;
    use dts_common::config::FeedConfig;
    use std::sync::Arc;

    fn spawn_feed(rng: FixedRandom) -> (FeedHandle, RecordingSink) {
        let sink = RecordingSink::new();
        let controller =
            FeedController::seeded(FeedConfig::default(), Box::new(rng), Arc::new(sink.clone()));
        (FeedRuntime::new(controller).spawn(), sink)
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timers_drive_independent_cadences() {
        let (handle, _sink) = spawn_feed(FixedRandom::Upper);
        let mut updates = handle.subscribe();

        tokio::time::sleep(Duration::from_millis(2_050)).await;
        settle().await;
        let snapshot = updates.borrow_and_update().clone();
        assert_eq!(snapshot.voltage.last().unwrap().value, 240.0);
        assert_eq!(snapshot.temperature, 65.0);

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        settle().await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.temperature, 70.0);
        assert_eq!(snapshot.voltage.len(), 20);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn pause_skips_synthetic_ticks() {
        let (handle, _sink) = spawn_feed(FixedRandom::Upper);
        handle.pause().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10_100)).await;
        settle().await;
        let snapshot = handle.snapshot();
        assert!(snapshot.paused);
        assert_eq!(snapshot.temperature, 65.0);

        handle.resume().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5_000)).await;
        settle().await;
        assert!(!handle.snapshot().paused);
        assert!(handle.snapshot().temperature > 65.0);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn pushed_alert_expires_after_ten_seconds() {
        let (handle, _sink) = spawn_feed(FixedRandom::Lower);
        handle
            .push(PushEvent::Alert(AlertPayload {
                kind: "warning".into(),
                icon: "⚠".into(),
                message: "Transformer load high".into(),
            }))
            .await
            .unwrap();
        settle().await;
        assert_eq!(handle.snapshot().alerts.len(), 1);

        tokio::time::sleep(Duration::from_millis(9_999)).await;
        settle().await;
        assert_eq!(handle.snapshot().alerts.len(), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        settle().await;
        assert!(handle.snapshot().alerts.is_empty());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn push_events_apply_while_paused() {
        let (handle, _sink) = spawn_feed(FixedRandom::Lower);
        handle.pause().await.unwrap();
        handle.push(PushEvent::Connected).await.unwrap();
        handle
            .push(PushEvent::SensorData(MetricUpdate {
                voltage: Some(225.0),
                ..Default::default()
            }))
            .await
            .unwrap();
        settle().await;
        let snapshot = handle.snapshot();
        assert!(snapshot.push_connected);
        assert_eq!(snapshot.voltage.last().unwrap().value, 225.0);

        handle.push(PushEvent::Disconnected).await.unwrap();
        settle().await;
        assert!(!handle.snapshot().push_connected);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn control_fails_after_shutdown() {
        let (handle, _sink) = spawn_feed(FixedRandom::Lower);
        let control = handle.control();
        handle.shutdown().await.unwrap();
        assert!(matches!(control.pause().await, Err(FeedError::Stopped)));
    }
}
