//! ---
//! dts_section: "05-networking-external-interfaces"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Push channel, HTTP API, and render surface adapters."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---

pub mod client;
pub mod push;
pub mod rest;
pub mod websocket;

pub use client::{ApiClient, ApiError};
pub use push::{PushChannel, PushEnvelope, PushError, PushSubscription};
pub use rest::{
    ApiServerBuilder, ApiServerHandle, CommandError, CommandHandler, CommandRequest,
    CommandResponse, FeedCommandHandler,
};
pub use websocket::{
    BroadcastSink, ChannelFilter, ClientCommand, TelemetryBroadcaster, TelemetryFrame,
};
