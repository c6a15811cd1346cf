//! In-memory transport for driving the connection manager in tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use depth_mirror::error::TransportError;
use depth_mirror::stream::{
    ConnectionConfig, ConnectionManager, Connector, TransportEvent, TransportLink,
};
use serde_json::Value;
use tokio::sync::mpsc;

pub const WAIT: Duration = Duration::from_secs(2);

/// Server side of one in-memory connection.
pub struct ServerEnd {
    pub from_client: mpsc::UnboundedReceiver<String>,
    pub to_client: mpsc::UnboundedSender<TransportEvent>,
}

impl ServerEnd {
    /// Next request written by the client, parsed.
    pub async fn next_request(&mut self) -> Value {
        let text = tokio::time::timeout(WAIT, self.from_client.recv())
            .await
            .expect("timed out waiting for request")
            .expect("client side closed");
        serde_json::from_str(&text).expect("request is JSON")
    }

    /// Assert nothing else arrives within `window`.
    pub async fn assert_quiet(&mut self, window: Duration) {
        if let Ok(Some(text)) = tokio::time::timeout(window, self.from_client.recv()).await {
            panic!("unexpected request: {text}");
        }
    }

    pub fn push(&self, frame: &str) {
        self.to_client
            .send(TransportEvent::Frame(frame.to_string()))
            .expect("client reader gone");
    }

    pub fn close(&self) {
        let _ = self.to_client.send(TransportEvent::Closed {
            code: Some(1006),
            reason: "test close".to_string(),
        });
    }
}

/// Connector handing each new connection's server end to the test.
#[derive(Clone)]
pub struct MemoryConnector {
    links: mpsc::UnboundedSender<ServerEnd>,
    failures: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEnd>) {
        let (links, rx) = mpsc::unbounded_channel();
        (
            Self {
                links,
                failures: Arc::new(AtomicUsize::new(0)),
            },
            rx,
        )
    }

    /// Fail the next `n` connection attempts.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<TransportLink, TransportError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::ConnectionFailed("refused".to_string()));
        }

        let (outbound, from_client) = mpsc::unbounded_channel();
        let (to_client, inbound) = mpsc::unbounded_channel();
        self.links
            .send(ServerEnd {
                from_client,
                to_client,
            })
            .map_err(|_| TransportError::ConnectionFailed("test ended".to_string()))?;
        Ok(TransportLink { outbound, inbound })
    }
}

pub async fn next_connection(links: &mut mpsc::UnboundedReceiver<ServerEnd>) -> ServerEnd {
    tokio::time::timeout(WAIT, links.recv())
        .await
        .expect("timed out waiting for connection")
        .expect("connector dropped")
}

pub fn manager(resubscribe_interval: Duration) -> Arc<ConnectionManager> {
    Arc::new(ConnectionManager::with_config(ConnectionConfig {
        reconnect_delay: Duration::from_millis(10),
        resubscribe_interval,
    }))
}

/// Poll `condition` until it holds or the wait elapses.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

pub fn depth_frame(market: &str, bids: &str, asks: &str) -> String {
    format!(r#"{{"stream":"depth@{market}","data":{{"e":"depth","b":{bids},"a":{asks}}}}}"#)
}
