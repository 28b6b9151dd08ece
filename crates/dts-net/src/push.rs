//! ---
//! dts_section: "05-networking-external-interfaces"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Real-time push channel client feeding sensor events into the feed."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use std::time::Duration;

use dts_feed::{AlertPayload, MetricUpdate, PushEvent};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

/// Wire envelope: `{"event": "<name>", "data": <payload>}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum PushEnvelope {
    #[serde(rename = "connect")]
    Connect,
    #[serde(rename = "sensorData")]
    SensorData(MetricUpdate),
    #[serde(rename = "alert")]
    Alert(AlertPayload),
    #[serde(rename = "disconnect")]
    Disconnect,
}

impl From<PushEnvelope> for PushEvent {
    fn from(envelope: PushEnvelope) -> Self {
        match envelope {
            PushEnvelope::Connect => PushEvent::Connected,
            PushEnvelope::SensorData(update) => PushEvent::SensorData(update),
            PushEnvelope::Alert(payload) => PushEvent::Alert(payload),
            PushEnvelope::Disconnect => PushEvent::Disconnected,
        }
    }
}

impl PushEnvelope {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("invalid push url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("push channel connect timed out after {0:?}")]
    Timeout(Duration),
    #[error("push channel connect failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Connects to the push endpoint and forwards its events.
#[derive(Debug, Clone)]
pub struct PushChannel {
    url: Url,
    connect_timeout: Duration,
}

impl PushChannel {
    pub fn new(url: &str, connect_timeout: Duration) -> Result<Self, PushError> {
        let parsed = Url::parse(url).map_err(|err| PushError::InvalidUrl {
            url: url.to_owned(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(PushError::InvalidUrl {
                url: url.to_owned(),
                reason: "scheme must be ws or wss".into(),
            });
        }
        Ok(Self {
            url: parsed,
            connect_timeout,
        })
    }

    pub fn from_config(config: &dts_common::PushConfig) -> Result<Self, PushError> {
        Self::new(&config.url, config.connect_timeout)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Open the socket and start forwarding into `events`.
    ///
    /// `Connected` is sent once the handshake completes; `Disconnected` is sent
    /// exactly once when the stream ends for any reason other than [`PushSubscription::close`].
    pub async fn connect(
        &self,
        events: mpsc::Sender<PushEvent>,
    ) -> Result<PushSubscription, PushError> {
        let (stream, _) = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(self.url.as_str()),
        )
        .await
        .map_err(|_| PushError::Timeout(self.connect_timeout))??;
        info!(url = %self.url, "push channel connected");

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let (_sink, mut stream) = stream.split();
            if events.send(PushEvent::Connected).await.is_err() {
                return;
            }
            loop {
                let message = tokio::select! {
                    _ = shutdown_rx.changed() => return,
                    message = stream.next() => message,
                };
                let text = match message {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        warn!(error = %err, "push channel read failed");
                        break;
                    }
                };
                let envelope = match PushEnvelope::decode(&text) {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        warn!(error = %err, "discarding malformed push frame");
                        continue;
                    }
                };
                let closing = envelope == PushEnvelope::Disconnect;
                if events.send(envelope.into()).await.is_err() {
                    debug!("feed gone; closing push channel");
                    return;
                }
                if closing {
                    return;
                }
            }
            let _ = events.send(PushEvent::Disconnected).await;
        });

        Ok(PushSubscription {
            task,
            shutdown: shutdown_tx,
        })
    }
}

/// Live push connection; dropping it stops the reader.
#[derive(Debug)]
pub struct PushSubscription {
    task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl PushSubscription {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop reading and wait for the reader task.
    pub async fn close(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "push reader task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_each_event_kind() {
        assert_eq!(
            PushEnvelope::decode(r#"{"event":"connect"}"#).unwrap(),
            PushEnvelope::Connect
        );
        let update =
            PushEnvelope::decode(r#"{"event":"sensorData","data":{"voltage":231.5,"temperature":71}}"#)
                .unwrap();
        assert_eq!(
            PushEvent::from(update),
            PushEvent::SensorData(MetricUpdate {
                voltage: Some(231.5),
                current: None,
                temperature: Some(71.0),
            })
        );
        let alert = PushEnvelope::decode(
            r#"{"event":"alert","data":{"type":"danger","icon":"!","message":"Breaker open"}}"#,
        )
        .unwrap();
        assert!(matches!(alert, PushEnvelope::Alert(ref p) if p.kind == "danger"));
        assert!(PushEnvelope::decode(r#"{"event":"reboot","data":{}}"#).is_err());
    }

    #[test]
    fn rejects_non_websocket_urls() {
        let err = PushChannel::new("http://localhost:3000", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, PushError::InvalidUrl { .. }));
        assert!(PushChannel::new("ws://localhost:3000/socket", Duration::from_secs(1)).is_ok());
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_to_connect() {
        let channel = PushChannel::new("ws://127.0.0.1:9/socket", Duration::from_secs(2)).unwrap();
        let (tx, _rx) = mpsc::channel(4);
        assert!(channel.connect(tx).await.is_err());
    }
}
