//! Streaming connection module.
//!
//! This module handles:
//! - The wire envelope (requests out, typed stream events in)
//! - Stream name to callback registration
//! - The transport lifecycle: buffering, reconnect and subscription replay
//! - Scoped subscriptions with guaranteed teardown

pub mod codec;
pub mod connection;
pub mod registry;
pub mod subscription;
pub mod transport;

pub use codec::{DepthUpdate, Inbound, Method, Request, StreamEvent, StreamName};
pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState};
pub use registry::{Callback, SubscriptionRegistry};
pub use subscription::StreamSubscription;
pub use transport::{Connector, TransportEvent, TransportLink, WsConnector};
