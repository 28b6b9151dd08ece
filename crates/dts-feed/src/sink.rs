//! ---
//! dts_section: "02-telemetry-feed"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Render sink abstraction decoupling the feed from presentation."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::alerts::{Alert, AlertId};
use crate::buffers::SeriesPoint;

/// Presentation surface fed after every state change.
///
/// Implementations must not block; a surface with nothing attached treats
/// every call as a no-op.
pub trait RenderSink: Send + Sync {
    fn render_series(&self, name: &str, points: &[SeriesPoint]);

    fn render_gauge(&self, name: &str, value: f64);

    fn render_alert(&self, alert: &Alert);

    /// Called when an alert leaves the display list.
    fn retire_alert(&self, _id: AlertId) {}
}

/// Sink that only emits debug-level tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl RenderSink for TracingSink {
    fn render_series(&self, name: &str, points: &[SeriesPoint]) {
        debug!(series = name, points = points.len(), latest = ?points.last().map(|p| p.value), "render series");
    }

    fn render_gauge(&self, name: &str, value: f64) {
        debug!(gauge = name, value, "render gauge");
    }

    fn render_alert(&self, alert: &Alert) {
        debug!(alert_id = %alert.id, kind = %alert.kind, message = %alert.message, "render alert");
    }

    fn retire_alert(&self, id: AlertId) {
        debug!(alert_id = %id, "retire alert");
    }
}

/// Call recorded by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Series { name: String, points: Vec<SeriesPoint> },
    Gauge { name: String, value: f64 },
    Alert(Alert),
    Retired(AlertId),
}

/// Sink capturing every call; clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<RenderEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RenderEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<RenderEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Most recent points rendered for `name`.
    pub fn last_series(&self, name: &str) -> Option<Vec<SeriesPoint>> {
        self.events.lock().iter().rev().find_map(|event| match event {
            RenderEvent::Series { name: n, points } if n == name => Some(points.clone()),
            _ => None,
        })
    }

    /// Most recent value rendered for gauge `name`.
    pub fn last_gauge(&self, name: &str) -> Option<f64> {
        self.events.lock().iter().rev().find_map(|event| match event {
            RenderEvent::Gauge { name: n, value } if n == name => Some(*value),
            _ => None,
        })
    }
}

impl RenderSink for RecordingSink {
    fn render_series(&self, name: &str, points: &[SeriesPoint]) {
        self.events.lock().push(RenderEvent::Series {
            name: name.to_owned(),
            points: points.to_vec(),
        });
    }

    fn render_gauge(&self, name: &str, value: f64) {
        self.events.lock().push(RenderEvent::Gauge {
            name: name.to_owned(),
            value,
        });
    }

    fn render_alert(&self, alert: &Alert) {
        self.events.lock().push(RenderEvent::Alert(alert.clone()));
    }

    fn retire_alert(&self, id: AlertId) {
        self.events.lock().push(RenderEvent::Retired(id));
    }
}
