//! ---
//! dts_section: "02-telemetry-feed"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Telemetry feed module exports and shared types."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
//! Telemetry feed controller for the substation dashboard.
//!
//! The controller keeps a rolling voltage series, a fixed set of current
//! bars, a bounded temperature gauge, and short-lived alerts. Updates come
//! from synthetic timers or from the push channel; every change is forwarded
//! to a [`RenderSink`].

pub mod alerts;
pub mod buffers;
pub mod controller;
pub mod gauge;
pub mod random;
pub mod runtime;
pub mod sink;

pub use alerts::{Alert, AlertBoard, AlertId, AlertPayload};
pub use buffers::{Sample, SeriesPoint, SlotBuffer, TimeSeriesBuffer};
pub use controller::{
    FeedController, FeedSnapshot, MetricUpdate, CURRENT, TEMPERATURE, VOLTAGE,
};
pub use gauge::{ScalarGauge, TemperatureBand};
pub use random::{FixedRandom, RandomSource, SeededRandom};
pub use runtime::{FeedControl, FeedError, FeedHandle, FeedRuntime, PushEvent};
pub use sink::{RecordingSink, RenderEvent, RenderSink, TracingSink};
