//! Unified error types for the depth mirror.

use thiserror::Error;

/// Unified error type for the depth mirror.
#[derive(Error, Debug)]
pub enum MirrorError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Transport (WebSocket) error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Inbound frame could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Inbound message for a stream nobody listens to.
    #[error("unknown stream: {0}")]
    UnknownStream(#[from] UnknownStreamError),

    /// Seed snapshot fetch failed.
    #[error("seed fetch error: {0}")]
    SeedFetch(#[from] SeedFetchError),
}

/// Connection-level failures. Never surfaced to stream callbacks; the
/// connection manager recovers from them by reconnecting.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed.
    #[error("websocket connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed.
    #[error("websocket connection closed: code={code:?}, reason={reason}")]
    ConnectionClosed {
        /// Close code.
        code: Option<u16>,
        /// Close reason.
        reason: String,
    },

    /// Send failed.
    #[error("failed to send websocket message: {0}")]
    SendFailed(String),

    /// Tungstenite error.
    #[error("tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
}

/// A malformed inbound frame.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Frame is not valid JSON or does not match the envelope.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Stream name is not of the form `<channel>@<market>`.
    #[error("invalid stream name: {0:?}")]
    InvalidStreamName(String),
}

/// An inbound message arrived for a stream with no registered callback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no callbacks registered for stream {stream}")]
pub struct UnknownStreamError {
    /// Stream the message was addressed to.
    pub stream: String,
}

/// Bootstrap HTTP failures.
#[derive(Error, Debug)]
pub enum SeedFetchError {
    /// Endpoint answered with a non-success status.
    #[error("GET {endpoint} returned HTTP {status}")]
    Status {
        /// Endpoint path.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// Failed to parse the response body.
    #[error("failed to parse {endpoint} response: {reason}")]
    Parse {
        /// Endpoint path.
        endpoint: String,
        /// Reason for failure.
        reason: String,
    },

    /// Endpoint URL could not be built.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// HTTP request failed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, MirrorError>;
