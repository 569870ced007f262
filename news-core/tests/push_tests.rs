use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use news_core::{spawn_push, PushConfig, PushMessage};
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;

fn item_json(hash: &str, ts: i64) -> serde_json::Value {
    json!({ "hash": hash, "index": 1, "title": format!("item {hash}"), "created_at": ts })
}

#[test]
fn all_four_wire_shapes_normalize_to_batches() {
    let batch: PushMessage =
        serde_json::from_value(json!({ "LatestNews": [item_json("a", 1), item_json("b", 2)] }))
            .unwrap();
    assert_eq!(batch.normalize().len(), 2);

    let by_hash: PushMessage =
        serde_json::from_value(json!({ "NewsByHash": item_json("a", 1) })).unwrap();
    assert_eq!(by_hash.normalize().len(), 1);

    let by_index: PushMessage =
        serde_json::from_value(json!({ "NewsByIndex": item_json("a", 1) })).unwrap();
    assert_eq!(by_index.normalize().len(), 1);

    let by_time: PushMessage =
        serde_json::from_value(json!({ "NewsByTime": [item_json("a", 1)] })).unwrap();
    let items = by_time.normalize();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].hash, "a");
}

#[tokio::test]
async fn push_task_subscribes_and_forwards_batches() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        // First frame must be the subscription.
        let subscribe = ws.next().await.unwrap().unwrap();
        let text = subscribe.into_text().unwrap();
        let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(frame["topic"], "get_latest_news");

        let push = json!({
            "topic": "get_latest_news",
            "timestamp": 0,
            "result": { "LatestNews": [item_json("a", 1), item_json("b", 2)] }
        });
        ws.send(WsMessage::Text(push.to_string())).await.unwrap();

        // Hold the connection open until the client closes it.
        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                break;
            }
        }
    });

    let (update_tx, mut update_rx) = mpsc::channel(8);
    let (live_tx, live_rx) = watch::channel(false);
    let handle = spawn_push(
        PushConfig {
            gateway_url: format!("ws://{addr}"),
            topic: "get_latest_news".to_owned(),
        },
        update_tx,
        live_tx,
    );

    let batch = tokio::time::timeout(Duration::from_secs(2), update_rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed");
    assert_eq!(
        batch.iter().map(|i| i.hash.as_str()).collect::<Vec<_>>(),
        ["a", "b"]
    );
    assert!(*live_rx.borrow(), "liveness reported after subscribe");

    handle.stop().await.expect("stop push");
    assert!(!*live_rx.borrow(), "liveness cleared on teardown");
    server.await.unwrap();
}

#[tokio::test]
async fn connect_failure_reports_dead_channel() {
    // Nothing listens here; the task must give up without panicking.
    let (update_tx, _update_rx) = mpsc::channel(1);
    let (live_tx, mut live_rx) = watch::channel(true);
    let handle = spawn_push(
        PushConfig {
            gateway_url: "ws://127.0.0.1:9".to_owned(),
            topic: "get_latest_news".to_owned(),
        },
        update_tx,
        live_tx,
    );

    tokio::time::timeout(Duration::from_secs(2), live_rx.changed())
        .await
        .expect("timed out")
        .expect("watch closed");
    assert!(!*live_rx.borrow());
    handle.stop().await.expect("stop push");
}
