//! ---
//! dts_section: "05-networking-external-interfaces"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "WebSocket render surface streaming feed updates to browsers."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use dts_feed::{Alert, AlertId, RenderSink, SeriesPoint, TemperatureBand};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Frame distributed to subscribed WebSocket clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryFrame {
    /// Render channel: `voltage`, `current`, `temperature`, or `alerts`.
    pub channel: String,
    pub payload: serde_json::Value,
}

impl TelemetryFrame {
    /// Frame for `channel`; the payload shape depends on the channel.
    pub fn new(channel: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            channel: channel.into(),
            payload,
        }
    }
}

/// Fan-out of frames to every connected client.
#[derive(Clone, Debug)]
pub struct TelemetryBroadcaster {
    tx: broadcast::Sender<TelemetryFrame>,
}

impl TelemetryBroadcaster {
    /// `capacity` frames are buffered per client before it starts lagging.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Send a frame; returns how many clients were reached (zero when none are attached).
    pub fn send(&self, frame: TelemetryFrame) -> usize {
        match self.tx.send(frame) {
            Ok(reached) => reached,
            Err(broadcast::error::SendError(frame)) => {
                trace!(channel = %frame.channel, "no render clients attached");
                0
            }
        }
    }

    /// Receive every frame sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryFrame> {
        self.tx.subscribe()
    }
}

/// [`RenderSink`] that publishes every update through a [`TelemetryBroadcaster`].
#[derive(Clone, Debug)]
pub struct BroadcastSink {
    broadcaster: TelemetryBroadcaster,
}

impl BroadcastSink {
    /// Sink publishing into `broadcaster`.
    pub fn new(broadcaster: TelemetryBroadcaster) -> Self {
        Self { broadcaster }
    }
}

impl RenderSink for BroadcastSink {
    fn render_series(&self, name: &str, points: &[SeriesPoint]) {
        self.broadcaster
            .send(TelemetryFrame::new(name, json!({ "points": points })));
    }

    fn render_gauge(&self, name: &str, value: f64) {
        let band = TemperatureBand::classify(value);
        self.broadcaster.send(TelemetryFrame::new(
            name,
            json!({
                "value": value,
                "display": value.round() as i64,
                "band": band,
                "colour": band.colour(),
            }),
        ));
    }

    fn render_alert(&self, alert: &Alert) {
        self.broadcaster.send(TelemetryFrame::new(
            "alerts",
            json!({ "action": "raise", "alert": alert }),
        ));
    }

    fn retire_alert(&self, id: AlertId) {
        self.broadcaster.send(TelemetryFrame::new(
            "alerts",
            json!({ "action": "retire", "id": id }),
        ));
    }
}

/// Router exposing `/ws`; merged into the API server.
pub fn router(broadcaster: TelemetryBroadcaster) -> Router {
    Router::new()
        .route("/ws", get(upgrade_handler))
        .with_state(Arc::new(broadcaster))
}

/// Text command a render client sends to narrow its frames,
/// e.g. `{"action": "subscribe", "channels": ["alerts"]}`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Receive the named channels (in addition to any already subscribed).
    Subscribe {
        #[serde(default)]
        channels: HashSet<String>,
    },
    /// Stop receiving the named channels.
    Unsubscribe {
        #[serde(default)]
        channels: HashSet<String>,
    },
    /// Back to receiving every channel.
    UnsubscribeAll,
}

/// Channels a render client receives. Starts unfiltered.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ChannelFilter {
    /// Every channel.
    #[default]
    All,
    /// Only the listed channels; may be empty.
    Only(HashSet<String>),
}

impl ChannelFilter {
    /// The first `subscribe` narrows an unfiltered client to the named channels;
    /// later ones add to the set. `unsubscribe` on an unfiltered client is ignored.
    pub fn apply(&mut self, command: ClientCommand) {
        match command {
            ClientCommand::Subscribe { channels } => match self {
                ChannelFilter::All => *self = ChannelFilter::Only(channels),
                ChannelFilter::Only(set) => set.extend(channels),
            },
            ClientCommand::Unsubscribe { channels } => {
                if let ChannelFilter::Only(set) = self {
                    set.retain(|channel| !channels.contains(channel));
                }
            }
            ClientCommand::UnsubscribeAll => *self = ChannelFilter::All,
        }
    }

    /// Whether frames on `channel` reach this client.
    pub fn allows(&self, channel: &str) -> bool {
        match self {
            ChannelFilter::All => true,
            ChannelFilter::Only(set) => set.contains(channel),
        }
    }
}

async fn upgrade_handler(
    ws: WebSocketUpgrade,
    State(broadcaster): State<Arc<TelemetryBroadcaster>>,
) -> axum::response::Response {
    let frames = broadcaster.subscribe();
    ws.on_upgrade(|socket| RenderClient::new(socket, frames).run())
}

/// One connected browser: forwards allowed frames and applies its commands.
struct RenderClient {
    socket: WebSocket,
    frames: broadcast::Receiver<TelemetryFrame>,
    filter: ChannelFilter,
}

impl RenderClient {
    fn new(socket: WebSocket, frames: broadcast::Receiver<TelemetryFrame>) -> Self {
        Self {
            socket,
            frames,
            filter: ChannelFilter::default(),
        }
    }

    async fn run(mut self) {
        debug!("render client attached");
        loop {
            let keep_going = tokio::select! {
                frame = self.frames.recv() => self.forward(frame).await,
                message = self.socket.recv() => match message {
                    Some(Ok(message)) => self.on_message(message).await,
                    Some(Err(err)) => {
                        debug!(error = %err, "render client read failed");
                        false
                    }
                    None => false,
                },
            };
            if !keep_going {
                break;
            }
        }
        debug!("render client detached");
    }

    async fn forward(
        &mut self,
        frame: Result<TelemetryFrame, broadcast::error::RecvError>,
    ) -> bool {
        let frame = match frame {
            Ok(frame) => frame,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "render client fell behind; frames dropped");
                return true;
            }
            Err(broadcast::error::RecvError::Closed) => return false,
        };
        if !self.filter.allows(&frame.channel) {
            return true;
        }
        match serde_json::to_string(&frame) {
            Ok(text) => self.socket.send(Message::Text(text)).await.is_ok(),
            Err(err) => {
                warn!(error = %err, channel = %frame.channel, "telemetry frame not serialisable");
                true
            }
        }
    }

    async fn on_message(&mut self, message: Message) -> bool {
        let reply = match message {
            Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                Ok(command) => {
                    trace!(?command, "render client command");
                    self.filter.apply(command);
                    return true;
                }
                Err(err) => {
                    warn!(error = %err, "rejecting render client command");
                    Message::Text(json!({ "error": "invalid command" }).to_string())
                }
            },
            Message::Binary(_) => Message::Text(json!({ "error": "binary unsupported" }).to_string()),
            Message::Ping(payload) => Message::Pong(payload),
            Message::Pong(_) => return true,
            Message::Close(_) => return false,
        };
        self.socket.send(reply).await.is_ok()
    }
}
