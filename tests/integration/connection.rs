//! Connection lifecycle: buffering, reconnect, replay, teardown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use depth_mirror::stream::{Callback, ConnectionState, Request, StreamEvent};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::support::{depth_frame, eventually, manager, next_connection, MemoryConnector};

const QUIET: Duration = Duration::from_millis(50);
const NO_RESEND: Duration = Duration::from_secs(3600);

fn counting_callback() -> (Callback, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let callback: Callback = Arc::new(move |_: &StreamEvent| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (callback, hits)
}

#[tokio::test]
async fn requests_before_ready_flush_in_order() {
    let manager = manager(NO_RESEND);
    let (connector, mut links) = MemoryConnector::new();

    assert_eq!(manager.send_message(Request::subscribe("depth@SOL_USDC")), 1);
    assert_eq!(manager.send_message(Request::subscribe("ticker@SOL_USDC")), 2);
    assert_eq!(manager.pending_len(), 2);

    manager.start(connector);
    let mut server = next_connection(&mut links).await;

    assert_eq!(
        server.next_request().await,
        json!({"method": "SUBSCRIBE", "params": ["depth@SOL_USDC"], "id": 1})
    );
    assert_eq!(
        server.next_request().await,
        json!({"method": "SUBSCRIBE", "params": ["ticker@SOL_USDC"], "id": 2})
    );
    // Flushed streams are not replayed a second time.
    server.assert_quiet(QUIET).await;

    assert_eq!(manager.pending_len(), 0);
    assert_eq!(manager.state(), ConnectionState::Open);

    manager.shutdown().await;
}

#[tokio::test]
async fn open_transport_writes_immediately() {
    let manager = manager(NO_RESEND);
    let (connector, mut links) = MemoryConnector::new();
    manager.start(connector);
    let mut server = next_connection(&mut links).await;
    assert!(eventually(|| manager.is_open()).await);

    manager.send_message(Request::subscribe("trade@SOL_USDC"));
    assert_eq!(
        server.next_request().await,
        json!({"method": "SUBSCRIBE", "params": ["trade@SOL_USDC"], "id": 1})
    );
    assert_eq!(manager.pending_len(), 0);

    manager.shutdown().await;
}

#[tokio::test]
async fn reconnect_replays_active_streams_and_keeps_callbacks() {
    let manager = manager(NO_RESEND);
    let (connector, mut links) = MemoryConnector::new();
    let (callback, hits) = counting_callback();

    let _subscription = manager.subscribe("depth@SOL_USDC", "DEPTH-SOL_USDC", callback);
    manager.start(connector);

    let mut first = next_connection(&mut links).await;
    assert_eq!(first.next_request().await["id"], json!(1));

    first.close();
    let mut second = next_connection(&mut links).await;
    assert_eq!(
        second.next_request().await,
        json!({"method": "SUBSCRIBE", "params": ["depth@SOL_USDC"], "id": 2})
    );
    second.assert_quiet(QUIET).await;
    assert_eq!(manager.connection_count(), 2);

    second.push(&depth_frame("SOL_USDC", r#"[["100","1"]]"#, "[]"));
    assert!(eventually(|| hits.load(Ordering::SeqCst) == 1).await);

    manager.shutdown().await;
}

#[tokio::test]
async fn requests_while_closed_are_buffered_for_next_transport() {
    let manager = manager(NO_RESEND);
    let (connector, mut links) = MemoryConnector::new();
    manager.start(connector.clone());

    let first = next_connection(&mut links).await;
    assert!(eventually(|| manager.is_open()).await);

    // Keep the next attempts failing so the request lands while closed.
    connector.fail_next(3);
    first.close();
    assert!(eventually(|| !manager.is_open()).await);

    let id = manager.send_message(Request::subscribe("ticker@SOL_USDC"));
    assert_eq!(manager.pending_len(), 1);

    let mut second = next_connection(&mut links).await;
    assert_eq!(
        second.next_request().await,
        json!({"method": "SUBSCRIBE", "params": ["ticker@SOL_USDC"], "id": id})
    );
    second.assert_quiet(QUIET).await;

    manager.shutdown().await;
}

#[tokio::test]
async fn failed_connects_are_retried() {
    let manager = manager(NO_RESEND);
    let (connector, mut links) = MemoryConnector::new();
    connector.fail_next(2);

    manager.send_message(Request::subscribe("depth@SOL_USDC"));
    manager.start(connector);

    let mut server = next_connection(&mut links).await;
    assert_eq!(server.next_request().await["params"], json!(["depth@SOL_USDC"]));
    assert_eq!(manager.connection_count(), 1);

    manager.shutdown().await;
}

#[tokio::test]
async fn dropping_subscription_unsubscribes_and_stops_delivery() {
    let manager = manager(NO_RESEND);
    let (connector, mut links) = MemoryConnector::new();
    let (callback, hits) = counting_callback();

    manager.start(connector);
    let mut server = next_connection(&mut links).await;
    assert!(eventually(|| manager.is_open()).await);

    let subscription = manager.subscribe("depth@SOL_USDC", "DEPTH-SOL_USDC", callback);
    assert_eq!(server.next_request().await["method"], json!("SUBSCRIBE"));

    server.push(&depth_frame("SOL_USDC", r#"[["100","1"]]"#, "[]"));
    assert!(eventually(|| hits.load(Ordering::SeqCst) == 1).await);

    drop(subscription);
    assert_eq!(
        server.next_request().await,
        json!({"method": "UNSUBSCRIBE", "params": ["depth@SOL_USDC"], "id": 2})
    );
    assert!(manager.registry().is_empty());
    assert!(manager.active_streams().is_empty());

    server.push(&depth_frame("SOL_USDC", r#"[["101","1"]]"#, "[]"));
    tokio::time::sleep(QUIET).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Nothing to replay after a reconnect.
    server.close();
    let mut next = next_connection(&mut links).await;
    next.assert_quiet(QUIET).await;

    manager.shutdown().await;
}

#[tokio::test]
async fn shared_stream_survives_one_listener_leaving() {
    let manager = manager(NO_RESEND);
    let (connector, mut links) = MemoryConnector::new();
    let (first_cb, first_hits) = counting_callback();
    let (second_cb, second_hits) = counting_callback();

    manager.start(connector);
    let mut server = next_connection(&mut links).await;
    assert!(eventually(|| manager.is_open()).await);

    let first = manager.subscribe("depth@SOL_USDC", "DEPTH-SOL_USDC-1", first_cb);
    let second = manager.subscribe("depth@SOL_USDC", "DEPTH-SOL_USDC-2", second_cb);
    assert_eq!(first.stream(), second.stream());
    assert_ne!(first.identity(), second.identity());
    assert_eq!(server.next_request().await["id"], json!(1));
    assert_eq!(server.next_request().await["id"], json!(2));

    drop(first);
    // The stream is still wanted, so the server is not told to drop it.
    server.assert_quiet(QUIET).await;
    assert_eq!(manager.active_streams(), vec!["depth@SOL_USDC".to_string()]);

    server.close();
    let mut next = next_connection(&mut links).await;
    assert_eq!(
        next.next_request().await,
        json!({"method": "SUBSCRIBE", "params": ["depth@SOL_USDC"], "id": 3})
    );

    next.push(&depth_frame("SOL_USDC", r#"[["100","1"]]"#, "[]"));
    assert!(eventually(|| second_hits.load(Ordering::SeqCst) == 1).await);
    assert_eq!(first_hits.load(Ordering::SeqCst), 0);

    drop(second);
    assert_eq!(
        next.next_request().await,
        json!({"method": "UNSUBSCRIBE", "params": ["depth@SOL_USDC"], "id": 4})
    );

    manager.shutdown().await;
}

#[tokio::test]
async fn bad_frames_do_not_stop_the_read_loop() {
    let manager = manager(NO_RESEND);
    let (connector, mut links) = MemoryConnector::new();
    let (callback, hits) = counting_callback();

    let _subscription = manager.subscribe("depth@SOL_USDC", "DEPTH-SOL_USDC", callback);
    manager.start(connector);
    let server = next_connection(&mut links).await;

    server.push("not json");
    server.push(r#"{"stream":"depth@SOL_USDC","data":{"e":"depth","b":[["abc","1"]],"a":[]}}"#);
    server.push(r#"{"stream":"depth@OTHER","data":{"e":"depth","b":[],"a":[]}}"#);
    server.push(r#"{"stream":"depth@SOL_USDC","data":{"e":"kline"}}"#);
    server.push(&depth_frame("SOL_USDC", r#"[["100","1"]]"#, "[]"));

    assert!(eventually(|| hits.load(Ordering::SeqCst) == 1).await);
    assert_eq!(manager.connection_count(), 1);

    manager.shutdown().await;
}

#[tokio::test]
async fn periodic_resubscribe_only_while_open() {
    let manager = manager(Duration::from_millis(40));
    let (connector, mut links) = MemoryConnector::new();
    let (callback, _hits) = counting_callback();

    let _subscription = manager.subscribe("ticker@SOL_USDC", "TICKER-SOL_USDC", callback);
    // Transport never started: the safety net must not pile up requests.
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(manager.pending_len(), 1);

    manager.start(connector);
    let mut server = next_connection(&mut links).await;
    assert_eq!(server.next_request().await["id"], json!(1));
    let resent = server.next_request().await;
    assert_eq!(resent["method"], json!("SUBSCRIBE"));
    assert_eq!(resent["params"], json!(["ticker@SOL_USDC"]));

    manager.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_reconnecting() {
    let manager = manager(NO_RESEND);
    let (connector, mut links) = MemoryConnector::new();
    manager.start(connector);
    let _server = next_connection(&mut links).await;

    manager.shutdown().await;
    assert_eq!(manager.state(), ConnectionState::Closed);

    tokio::time::sleep(QUIET).await;
    assert!(links.try_recv().is_err());

    // Requests after shutdown wait in the queue.
    manager.send_message(Request::subscribe("depth@SOL_USDC"));
    assert_eq!(manager.pending_len(), 1);
}
