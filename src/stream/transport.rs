//! Transport seam between the connection manager and the socket.
//!
//! A [`Connector`] produces one [`TransportLink`] per connection attempt:
//! an outbound text sender and an inbound event receiver. The link ends with
//! exactly one [`TransportEvent::Closed`] (or the receiver closing).

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::error::TransportError;

/// Event delivered by a live transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Text frame.
    Frame(String),
    /// The transport is gone.
    Closed {
        /// Close code, if the peer sent one.
        code: Option<u16>,
        /// Close reason or error text.
        reason: String,
    },
}

/// Channels of one established transport.
#[derive(Debug)]
pub struct TransportLink {
    /// Serialized requests to write.
    pub outbound: mpsc::UnboundedSender<String>,
    /// Frames and the final close notification.
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Builds a fresh transport for every connection attempt.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new transport. Resolves once it is ready to accept writes.
    async fn connect(&self) -> Result<TransportLink, TransportError>;
}

/// WebSocket connector over tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// Create a connector for the given `ws://` or `wss://` URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<TransportLink, TransportError> {
        info!(url = %self.url, "Connecting to WebSocket");

        let (ws_stream, _) = connect_async(&self.url).await?;

        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = write.send(Message::Text(text)).await {
                    warn!(error = %e, "WebSocket write failed");
                    break;
                }
            }
            // Outbound sender dropped: the manager is done with this transport.
            let _ = write.close().await;
        });

        tokio::spawn(async move {
            let closed = loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx.send(TransportEvent::Frame(text)).is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        warn!(frame = ?frame, "WebSocket closed");
                        break TransportEvent::Closed {
                            code: frame.as_ref().map(|f| u16::from(f.code)),
                            reason: frame.map(|f| f.reason.to_string()).unwrap_or_default(),
                        };
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // Note: tungstenite auto-responds to pings
                        debug!("Received ping");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        break TransportEvent::Closed {
                            code: None,
                            reason: e.to_string(),
                        };
                    }
                    None => {
                        break TransportEvent::Closed {
                            code: None,
                            reason: "stream ended".to_string(),
                        };
                    }
                }
            };
            let _ = inbound_tx.send(closed);
        });

        Ok(TransportLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
