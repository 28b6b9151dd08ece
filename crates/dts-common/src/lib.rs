//! ---
//! dts_section: "01-core-functionality"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Shared primitives for the telemetry feed runtime."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
//! Shared primitives for the Digital Twin Substation workspace.
//! This crate exposes configuration loading and tracing initialisation
//! consumed by the feed, network, and session crates.

pub mod config;
pub mod logging;

pub use config::{
    ApiConfig, AppConfig, CurrentConfig, FeedConfig, LoadedAppConfig, LoggingConfig, PushConfig,
    ServerConfig, SessionConfig, TemperatureConfig, VoltageConfig,
};
pub use logging::{init_tracing, LogFormat};
