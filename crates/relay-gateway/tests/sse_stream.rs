//! End-to-end: ingest → local broker → consumer → hub → SSE viewer, over a
//! real TCP listener.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use relay_broker::{Binding, Consumer, LocalBroker};
use relay_core::RelayConfig;
use relay_gateway::{build_router, AppState};
use relay_hub::Hub;
use serde_json::{json, Value};
use tokio::sync::watch;

const TOKEN: &str = "test-token";

struct Harness {
    base: String,
    hub: Hub,
    _shutdown: watch::Sender<bool>,
}

async fn start(ingest_enabled: bool) -> Harness {
    let mut config = RelayConfig::default();
    config.ingest.enabled = ingest_enabled;
    config.ingest.token = Some(TOKEN.to_string());
    config.stream.keepalive_secs = 0;
    start_with(config).await
}

async fn start_with(config: RelayConfig) -> Harness {
    let hub = Hub::default();
    let (broker, source) = LocalBroker::new(16);
    let consumer = Consumer::new(source, hub.clone(), Binding::catalog_default());
    let status = consumer.status();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(consumer.run(shutdown_rx));

    let state = Arc::new(AppState::new(config, hub.clone(), broker, status));
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    Harness {
        base: format!("http://{addr}"),
        hub,
        _shutdown: shutdown_tx,
    }
}

async fn publish(h: &Harness, routing_key: &str, body: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/publish/{routing_key}", h.base))
        .bearer_auth(TOKEN)
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .unwrap()
}

/// Read SSE events until `count` data events have arrived.
/// Returns `(id, parsed data)` pairs.
async fn read_events(resp: reqwest::Response, count: usize) -> Vec<(String, Value)> {
    let mut stream = resp.bytes_stream();
    let mut buf = String::new();
    let mut events = Vec::new();

    while events.len() < count {
        let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for SSE data")
            .expect("stream ended early")
            .unwrap();
        buf.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(end) = buf.find("\n\n") {
            let block: String = buf.drain(..end + 2).collect();
            let mut id = String::new();
            let mut data = None;
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("id:") {
                    id = v.trim().to_string();
                } else if let Some(v) = line.strip_prefix("data:") {
                    data = Some(serde_json::from_str::<Value>(v.trim()).unwrap());
                }
            }
            if let Some(data) = data {
                events.push((id, data));
            }
        }
    }
    events
}

#[tokio::test]
async fn published_event_reaches_viewer() {
    let h = start(true).await;

    let resp = reqwest::get(format!("{}/sse/events", h.base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/event-stream"));
    assert_eq!(h.hub.subscriber_count(), 1);

    let ack = publish(
        &h,
        "product.created",
        r#"{"pattern":"product.created","data":{"id":7,"name":"Pan"}}"#,
    )
    .await;
    assert_eq!(ack.status(), 200);
    let ack: Value = ack.json().await.unwrap();
    assert_eq!(ack["ok"], true);
    assert!(ack["receipt_id"].is_string());

    let events = read_events(resp, 1).await;
    assert_eq!(events[0].0, "1");
    assert_eq!(
        events[0].1,
        json!({"type": "product.created", "data": {"id": 7, "name": "Pan"}})
    );
}

#[tokio::test]
async fn events_arrive_in_publish_order() {
    let h = start(true).await;
    let resp = reqwest::get(format!("{}/sse/events", h.base)).await.unwrap();

    for (key, id) in [("order.started", 1), ("order.sale.confirmed", 2), ("sale.created", 3)] {
        let body = json!({ "id": id }).to_string();
        assert_eq!(publish(&h, key, &body).await.status(), 200);
    }

    let events = read_events(resp, 3).await;
    let types: Vec<&str> = events.iter().map(|(_, d)| d["type"].as_str().unwrap()).collect();
    assert_eq!(types, ["order.started", "order.sale.confirmed", "sale.created"]);
    let ids: Vec<&str> = events.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, ["1", "2", "3"]);
}

#[tokio::test]
async fn malformed_message_is_skipped() {
    let h = start(true).await;
    let resp = reqwest::get(format!("{}/sse/events", h.base)).await.unwrap();

    // valid JSON but not a catalog event: accepted by ingest, dropped by the consumer
    assert_eq!(publish(&h, "invoice.created", r#"{"id":1}"#).await.status(), 200);
    assert_eq!(publish(&h, "user.deleted", r#"{"id":2}"#).await.status(), 200);

    let events = read_events(resp, 1).await;
    assert_eq!(events[0].1, json!({"type": "user.deleted", "data": {"id": 2}}));
}

#[tokio::test]
async fn ingest_rejections() {
    let h = start(true).await;
    let client = reqwest::Client::new();

    let unauth = client
        .post(format!("{}/publish/product.created", h.base))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(unauth.status(), 401);

    let bad_json = publish(&h, "product.created", "{not json").await;
    assert_eq!(bad_json.status(), 400);

    let disabled = start(false).await;
    assert_eq!(
        publish(&disabled, "product.created", "{}").await.status(),
        404
    );
}

#[tokio::test]
async fn health_reports_counters() {
    let h = start(true).await;
    let body: Value = reqwest::get(format!("{}/health", h.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["subscribers"], 0);
    assert_eq!(body["published_total"], 0);
    assert!(body["broker"].is_string() || body["broker"].is_object());
}

#[tokio::test]
async fn shutdown_ends_streams_and_rejects_viewers() {
    let h = start(true).await;
    let resp = reqwest::get(format!("{}/sse/events", h.base)).await.unwrap();
    assert_eq!(h.hub.subscriber_count(), 1);

    h.hub.shutdown();

    let mut stream = resp.bytes_stream();
    let end = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(chunk) = stream.next().await {
            if chunk.is_err() {
                break;
            }
        }
    })
    .await;
    assert!(end.is_ok(), "stream did not end after shutdown");

    let rejected = reqwest::get(format!("{}/sse/events", h.base)).await.unwrap();
    assert_eq!(rejected.status(), 503);
}

#[tokio::test]
async fn client_disconnect_unsubscribes() {
    let h = start(true).await;
    let resp = reqwest::get(format!("{}/sse/events", h.base)).await.unwrap();
    assert_eq!(h.hub.subscriber_count(), 1);

    drop(resp);

    let gone = tokio::time::timeout(Duration::from_secs(5), async {
        while h.hub.subscriber_count() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(gone.is_ok(), "subscriber still registered after client left");

    // later events go nowhere and are not counted as slow disconnects
    assert_eq!(publish(&h, "product.deleted", r#"{"id":1}"#).await.status(), 200);
    assert_eq!(h.hub.stats().slow_disconnects, 0);
}

#[tokio::test]
async fn keepalive_comments_when_enabled() {
    let mut config = RelayConfig::default();
    config.stream.keepalive_secs = 1;
    let h = start_with(config).await;

    let resp = reqwest::get(format!("{}/sse/events", h.base)).await.unwrap();
    assert_eq!(resp.status(), 200);

    let mut stream = resp.bytes_stream();
    let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("no keep-alive within timeout")
        .expect("stream ended")
        .unwrap();
    assert!(String::from_utf8_lossy(&chunk).starts_with(':'));
}
