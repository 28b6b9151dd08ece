//! ---
//! dts_section: "15-testing-qa-runbook"
//! dts_subsection: "integration-tests"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Feed runtime, dashboard API, and render surface exercised end to end."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use dts_common::FeedConfig;
use dts_feed::{FeedController, FeedRuntime, FixedRandom};
use dts_metrics::{new_registry, FeedMetrics};
use dts_net::{ApiClient, ApiServerBuilder, BroadcastSink, TelemetryBroadcaster, TelemetryFrame};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn client_server_round_trip_drives_feed() {
    let registry = new_registry();
    let broadcaster = TelemetryBroadcaster::new(64);
    let controller = FeedController::seeded(
        FeedConfig::default(),
        Box::new(FixedRandom::Value(0.0)),
        Arc::new(BroadcastSink::new(broadcaster.clone())),
    );
    let feed = FeedRuntime::new(controller)
        .with_metrics(FeedMetrics::new(registry.clone()).unwrap())
        .spawn();
    let server = ApiServerBuilder::new("127.0.0.1:0".parse().unwrap(), feed.control())
        .with_metrics_registry(registry.clone())
        .with_broadcaster(broadcaster)
        .spawn()
        .await
        .unwrap();
    let base = format!("http://{}", server.local_addr());
    let client = ApiClient::new(&base, Duration::from_secs(2)).unwrap();

    // Latest reading reflects the seeded state.
    let latest = client.fetch_sensor_data().await.unwrap();
    assert_eq!(latest.temperature, Some(65.0));
    assert!(latest.voltage.is_some());

    // Render surface: subscribe to alerts only.
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.local_addr()))
        .await
        .unwrap();
    socket
        .send(Message::Text(
            json!({ "action": "subscribe", "channels": ["alerts"] }).to_string(),
        ))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let reply = client
        .send_command(
            "raise-alert",
            json!({ "type": "danger", "icon": "⚡", "message": "Feeder 3 tripped" }),
        )
        .await
        .unwrap();
    assert_eq!(reply["accepted"], true);

    let frame = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let Some(Ok(Message::Text(text))) = socket.next().await else {
                panic!("render socket closed");
            };
            let frame: TelemetryFrame = serde_json::from_str(&text).unwrap();
            if frame.channel == "alerts" {
                return frame;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(frame.payload["action"], "raise");
    assert_eq!(frame.payload["alert"]["message"], "Feeder 3 tripped");

    let alerts = client.fetch_alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, "danger");

    // Visibility control through the command endpoint.
    assert!(client.send_command("pause", serde_json::Value::Null).await.is_some());
    let mut updates = feed.subscribe();
    updates.wait_for(|snapshot| snapshot.paused).await.unwrap();

    // Unknown commands are rejected and resolve to the sentinel.
    assert!(client.send_command("reboot", serde_json::Value::Null).await.is_none());

    let metrics = dts_metrics::encode_text(&registry).unwrap();
    assert!(metrics.contains("dts_push_events_total"));
    assert!(metrics.contains("dts_feed_paused 1"));

    server.shutdown().await.unwrap();
    feed.shutdown().await.unwrap();
}

#[tokio::test]
async fn client_returns_sentinels_when_backend_is_down() {
    let client = ApiClient::new("http://127.0.0.1:9", Duration::from_millis(300)).unwrap();
    assert!(client.fetch_sensor_data().await.is_none());
    assert!(client.fetch_alerts().await.is_empty());
    assert!(client
        .send_command("pause", json!({}))
        .await
        .is_none());
}
