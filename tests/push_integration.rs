//! ---
//! dts_section: "15-testing-qa-runbook"
//! dts_subsection: "integration-tests"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Push channel client against an in-process WebSocket server."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::routing::get;
use axum::Router;
use dts_common::FeedConfig;
use dts_feed::{FeedController, FeedRuntime, FixedRandom, MetricUpdate, PushEvent, TracingSink};
use dts_net::PushChannel;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

async fn spawn_push_server(frames: Vec<String>) -> SocketAddr {
    let app = Router::new().route(
        "/socket",
        get(move |ws: WebSocketUpgrade| {
            let frames = frames.clone();
            async move {
                ws.on_upgrade(move |mut socket| async move {
                    for frame in frames {
                        if socket.send(Message::Text(frame)).await.is_err() {
                            return;
                        }
                    }
                    let _ = socket.send(Message::Close(None)).await;
                })
            }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn frames() -> Vec<String> {
    vec![
        json!({ "event": "sensorData", "data": { "voltage": 231.5, "current": 64 } }).to_string(),
        "not json at all".to_owned(),
        json!({ "event": "alert", "data": { "type": "warning", "icon": "⚠", "message": "Oil temperature rising" } })
            .to_string(),
    ]
}

#[tokio::test]
async fn forwards_events_and_reports_disconnect_once() {
    let addr = spawn_push_server(frames()).await;
    let channel = PushChannel::new(&format!("ws://{addr}/socket"), Duration::from_secs(2)).unwrap();
    let (tx, mut rx) = mpsc::channel(16);
    let subscription = channel.connect(tx).await.unwrap();

    let mut events = Vec::new();
    while let Some(event) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
    {
        events.push(event);
        if events.last() == Some(&PushEvent::Disconnected) {
            break;
        }
    }

    assert_eq!(events.len(), 4);
    assert_eq!(events[0], PushEvent::Connected);
    assert_eq!(
        events[1],
        PushEvent::SensorData(MetricUpdate {
            voltage: Some(231.5),
            current: Some(64.0),
            temperature: None,
        })
    );
    assert!(matches!(&events[2], PushEvent::Alert(payload) if payload.kind == "warning"));
    assert_eq!(events[3], PushEvent::Disconnected);

    subscription.close().await;
}

#[tokio::test]
async fn pushed_updates_reach_the_feed() {
    let addr = spawn_push_server(frames()).await;
    let controller = FeedController::seeded(
        FeedConfig::default(),
        Box::new(FixedRandom::Lower),
        Arc::new(TracingSink),
    );
    let feed = FeedRuntime::new(controller).spawn();
    let channel = PushChannel::new(&format!("ws://{addr}/socket"), Duration::from_secs(2)).unwrap();
    let subscription = channel.connect(feed.push_sender()).await.unwrap();

    let mut updates = feed.subscribe();
    let snapshot = tokio::time::timeout(
        Duration::from_secs(2),
        updates.wait_for(|snapshot| snapshot.alerts.len() == 1 && !snapshot.push_connected),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();

    assert_eq!(snapshot.voltage.last().map(|s| s.value), Some(231.5));
    assert!(snapshot.current.contains(&64.0));
    assert_eq!(snapshot.alerts[0].message, "Oil temperature rising");

    subscription.close().await;
    feed.shutdown().await.unwrap();
}
