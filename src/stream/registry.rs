//! Stream name to callback mapping.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use smallvec::SmallVec;
use tracing::debug;

use super::codec::StreamEvent;
use crate::error::UnknownStreamError;

/// Callback invoked for every event on a stream.
pub type Callback = Arc<dyn Fn(&StreamEvent) + Send + Sync>;

/// One registered listener.
#[derive(Clone)]
struct Subscriber {
    identity: String,
    callback: Callback,
}

/// Most streams have one or two listeners.
type Subscribers = SmallVec<[Subscriber; 2]>;

/// Ordered listeners per stream, at most one per identity.
#[derive(Default)]
pub struct SubscriptionRegistry {
    streams: DashMap<String, Subscribers>,
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for entry in self.streams.iter() {
            let ids: Vec<&str> = entry.value().iter().map(|s| s.identity.as_str()).collect();
            map.entry(entry.key(), &ids);
        }
        map.finish()
    }
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `stream` under `identity`.
    ///
    /// An existing entry with the same identity is replaced in place, keeping
    /// its position. Returns `true` if an entry was replaced.
    pub fn register(&self, stream: &str, identity: &str, callback: Callback) -> bool {
        let mut subscribers = self.streams.entry(stream.to_string()).or_default();

        if let Some(existing) = subscribers.iter_mut().find(|s| s.identity == identity) {
            existing.callback = callback;
            debug!(stream, identity, "Replaced callback");
            return true;
        }

        subscribers.push(Subscriber {
            identity: identity.to_string(),
            callback,
        });
        debug!(stream, identity, "Registered callback");
        false
    }

    /// Remove the entry for `identity` on `stream`. Returns `true` if one was
    /// removed; absent entries are a no-op.
    pub fn deregister(&self, stream: &str, identity: &str) -> bool {
        let removed = match self.streams.get_mut(stream) {
            Some(mut subscribers) => {
                let before = subscribers.len();
                subscribers.retain(|s| s.identity != identity);
                subscribers.len() != before
            }
            None => false,
        };

        self.streams.remove_if(stream, |_, subscribers| subscribers.is_empty());

        if removed {
            debug!(stream, identity, "Deregistered callback");
        }
        removed
    }

    /// Invoke every callback registered for `stream`, in registration order.
    ///
    /// Callbacks run after the registry lock is released, so they may
    /// register or deregister themselves. Returns how many were invoked.
    pub fn dispatch(&self, stream: &str, event: &StreamEvent) -> Result<usize, UnknownStreamError> {
        let callbacks: SmallVec<[Callback; 2]> = match self.streams.get(stream) {
            Some(subscribers) => subscribers.iter().map(|s| s.callback.clone()).collect(),
            None => SmallVec::new(),
        };

        if callbacks.is_empty() {
            return Err(UnknownStreamError {
                stream: stream.to_string(),
            });
        }

        for callback in &callbacks {
            callback(event);
        }

        Ok(callbacks.len())
    }

    /// Number of listeners on a stream.
    pub fn listener_count(&self, stream: &str) -> usize {
        self.streams.get(stream).map(|s| s.len()).unwrap_or(0)
    }

    /// Whether no stream has listeners.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
