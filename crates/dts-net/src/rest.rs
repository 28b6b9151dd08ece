//! ---
//! dts_section: "05-networking-external-interfaces"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "HTTP API serving sensor readings, alerts, and feed commands."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use dts_feed::{Alert, AlertPayload, FeedControl, FeedSnapshot, MetricUpdate, PushEvent};
use dts_metrics::SharedRegistry;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::websocket::{self, TelemetryBroadcaster};

/// Payload accepted by `POST /api/commands`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// Response emitted after a command has been accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandResponse {
    pub accepted: bool,
    pub message: String,
}

/// Errors that can be returned by a [`CommandHandler`].
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("invalid command payload: {0}")]
    InvalidPayload(String),
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),
}

/// Executes commands posted to the API.
#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    async fn handle_command(&self, request: CommandRequest)
        -> Result<CommandResponse, CommandError>;
}

/// Maps `pause`, `resume`, and `raise-alert` onto a running feed.
#[derive(Debug, Clone)]
pub struct FeedCommandHandler {
    feed: FeedControl,
}

impl FeedCommandHandler {
    pub fn new(feed: FeedControl) -> Self {
        Self { feed }
    }
}

#[async_trait]
impl CommandHandler for FeedCommandHandler {
    async fn handle_command(
        &self,
        request: CommandRequest,
    ) -> Result<CommandResponse, CommandError> {
        let stopped = |err: dts_feed::FeedError| CommandError::ExecutionFailed(err.to_string());
        let message = match request.command.as_str() {
            "pause" => {
                self.feed.pause().await.map_err(stopped)?;
                "feed paused".to_owned()
            }
            "resume" => {
                self.feed.resume().await.map_err(stopped)?;
                "feed resumed".to_owned()
            }
            "raise-alert" => {
                let payload: AlertPayload = serde_json::from_value(request.parameters)
                    .map_err(|err| CommandError::InvalidPayload(err.to_string()))?;
                let message = format!("alert raised: {}", payload.message);
                self.feed
                    .push(PushEvent::Alert(payload))
                    .await
                    .map_err(stopped)?;
                message
            }
            other => return Err(CommandError::Unknown(other.to_owned())),
        };
        debug!(command = %request.command, "command executed");
        Ok(CommandResponse {
            accepted: true,
            message,
        })
    }
}

struct ApiState {
    feed: FeedControl,
    handler: Arc<dyn CommandHandler>,
    metrics: Option<SharedRegistry>,
}

/// Builder used to configure and spawn the dashboard API server.
#[derive(Clone)]
pub struct ApiServerBuilder {
    listen: SocketAddr,
    feed: FeedControl,
    handler: Arc<dyn CommandHandler>,
    metrics: Option<SharedRegistry>,
    broadcaster: Option<TelemetryBroadcaster>,
}

impl ApiServerBuilder {
    pub fn new(listen: SocketAddr, feed: FeedControl) -> Self {
        let handler = Arc::new(FeedCommandHandler::new(feed.clone()));
        Self {
            listen,
            feed,
            handler,
            metrics: None,
            broadcaster: None,
        }
    }

    /// Attach a Prometheus registry exposed at `/metrics`.
    pub fn with_metrics_registry(mut self, registry: SharedRegistry) -> Self {
        self.metrics = Some(registry);
        self
    }

    /// Serve render frames on `/ws`.
    pub fn with_broadcaster(mut self, broadcaster: TelemetryBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub async fn spawn(self) -> anyhow::Result<ApiServerHandle> {
        let listener = TcpListener::bind(self.listen).await?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "dashboard api listening");

        let state = ApiState {
            feed: self.feed,
            handler: self.handler,
            metrics: self.metrics,
        };
        let mut router = Router::new()
            .route("/api/sensors/latest", get(get_latest))
            .route("/api/alerts", get(get_alerts))
            .route("/api/snapshot", get(get_snapshot))
            .route("/api/commands", post(post_command))
            .route("/metrics", get(get_metrics))
            .with_state(Arc::new(state));
        if let Some(broadcaster) = self.broadcaster {
            router = router.merge(websocket::router(broadcaster));
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let server = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        });
        let task = tokio::spawn(async move {
            if let Err(err) = server.await {
                warn!(error = %err, "dashboard api exited with error");
            }
        });

        Ok(ApiServerHandle {
            address: local_addr,
            task,
            shutdown: shutdown_tx,
        })
    }
}

/// Handle returned from [`ApiServerBuilder::spawn`].
pub struct ApiServerHandle {
    address: SocketAddr,
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl ApiServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// Request graceful shutdown and wait for the server task to finish.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(()) => Ok(()),
            Err(join) => Err(anyhow::anyhow!(join)),
        }
    }
}

/// Same shape as a `sensorData` push payload.
async fn get_latest(State(state): State<Arc<ApiState>>) -> Json<MetricUpdate> {
    Json(state.feed.snapshot().latest())
}

async fn get_alerts(State(state): State<Arc<ApiState>>) -> Json<Vec<Alert>> {
    Json(state.feed.snapshot().alerts)
}

async fn get_snapshot(State(state): State<Arc<ApiState>>) -> Json<FeedSnapshot> {
    Json(state.feed.snapshot())
}

async fn get_metrics(State(state): State<Arc<ApiState>>) -> Response {
    let Some(registry) = &state.metrics else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics registry unavailable",
        )
            .into_response();
    };

    match dts_metrics::encode_text(registry) {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(err) => {
            warn!(error = %err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn post_command(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<CommandRequest>,
) -> Response {
    match state.handler.handle_command(request).await {
        Ok(response) => (StatusCode::ACCEPTED, Json(response)).into_response(),
        Err(err @ (CommandError::Unknown(_) | CommandError::InvalidPayload(_))) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(CommandError::ExecutionFailed(msg)) => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({ "error": msg })),
        )
            .into_response(),
    }
}
