//! ---
//! dts_section: "05-networking-external-interfaces"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "HTTP client for the dashboard backend API."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use std::time::Duration;

use dts_feed::{AlertPayload, MetricUpdate};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::error;
use url::Url;

use crate::rest::CommandRequest;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid api base url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Thin client over the backend endpoints.
///
/// Public calls never fail: transport and decode errors are logged and
/// resolve to an empty sentinel.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base = Url::parse(base_url).map_err(|source| ApiError::InvalidUrl {
            url: base_url.to_owned(),
            source,
        })?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base })
    }

    pub fn from_config(config: &dts_common::ApiConfig) -> Result<Self, ApiError> {
        Self::new(&config.base_url, config.request_timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `GET /api/sensors/latest`, decoded like a `sensorData` payload; `None` on failure.
    pub async fn fetch_sensor_data(&self) -> Option<MetricUpdate> {
        match self.get_json("/api/sensors/latest").await {
            Ok(reading) => Some(reading),
            Err(err) => {
                error!(error = %err, "error fetching sensor data");
                None
            }
        }
    }

    /// `GET /api/alerts` as `{type, icon, message}` records; extra fields are ignored. Empty on failure.
    pub async fn fetch_alerts(&self) -> Vec<AlertPayload> {
        match self.get_json("/api/alerts").await {
            Ok(alerts) => alerts,
            Err(err) => {
                error!(error = %err, "error fetching alerts");
                Vec::new()
            }
        }
    }

    /// `POST /api/commands`; `None` on failure, including non-2xx replies.
    pub async fn send_command(
        &self,
        command: &str,
        parameters: serde_json::Value,
    ) -> Option<serde_json::Value> {
        let request = CommandRequest {
            command: command.to_owned(),
            parameters,
        };
        match self.try_send_command(&request).await {
            Ok(body) => Some(body),
            Err(err) => {
                error!(error = %err, command, "error sending command");
                None
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        let body = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body)
    }

    async fn try_send_command(
        &self,
        request: &CommandRequest,
    ) -> Result<serde_json::Value, ApiError> {
        let url = self.endpoint("/api/commands")?;
        let body = self
            .http
            .post(url)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base.join(path).map_err(|source| ApiError::InvalidUrl {
            url: format!("{}{path}", self.base),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn spawn_backend(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn decodes_minimal_backend_shapes() {
        let app = Router::new()
            .route(
                "/api/sensors/latest",
                get(|| async { Json(json!({ "voltage": 231.5, "current": 64, "temperature": 70 })) }),
            )
            .route(
                "/api/alerts",
                get(|| async {
                    Json(json!([{ "type": "warning", "icon": "!", "message": "Load high" }]))
                }),
            );
        let base = spawn_backend(app).await;
        let client = ApiClient::new(&base, Duration::from_secs(2)).unwrap();

        let latest = client.fetch_sensor_data().await;
        assert_eq!(
            latest,
            Some(MetricUpdate {
                voltage: Some(231.5),
                current: Some(64.0),
                temperature: Some(70.0),
            })
        );

        let alerts = client.fetch_alerts().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, "warning");
        assert_eq!(alerts[0].message, "Load high");
    }

    #[tokio::test]
    async fn partial_reading_and_server_error() {
        let app = Router::new()
            .route(
                "/api/sensors/latest",
                get(|| async { Json(json!({ "temperature": 68.5 })) }),
            )
            .route(
                "/api/alerts",
                get(|| async { axum::http::StatusCode::INTERNAL_SERVER_ERROR }),
            );
        let base = spawn_backend(app).await;
        let client = ApiClient::new(&base, Duration::from_secs(2)).unwrap();

        let latest = client.fetch_sensor_data().await.unwrap();
        assert_eq!(latest.temperature, Some(68.5));
        assert!(latest.voltage.is_none());
        assert!(client.fetch_alerts().await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_backend_yields_sentinels() {
        let client = ApiClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(client.fetch_sensor_data().await.is_none());
        assert!(client.fetch_alerts().await.is_empty());
        assert!(client
            .send_command("pause", serde_json::Value::Null)
            .await
            .is_none());
    }

    #[test]
    fn rejects_malformed_base_url() {
        assert!(matches!(
            ApiClient::new("not a url", Duration::from_secs(1)),
            Err(ApiError::InvalidUrl { .. })
        ));
    }
}
