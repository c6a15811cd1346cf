//! Scoped stream subscription.

use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::codec::Request;
use super::connection::ConnectionManager;
use super::registry::Callback;

/// A live subscription to one stream.
///
/// While held, the callback receives every event on the stream and a
/// low-frequency timer re-sends SUBSCRIBE whenever the transport is open.
/// Releasing it (explicitly or by drop) removes the callback, stops the timer
/// and sends UNSUBSCRIBE once no other listener remains on the stream. Each
/// step runs regardless of the others, and release happens at most once.
#[derive(Debug)]
pub struct StreamSubscription {
    manager: Arc<ConnectionManager>,
    stream: String,
    identity: String,
    resubscribe: Option<JoinHandle<()>>,
    released: bool,
}

impl StreamSubscription {
    pub(crate) fn open(
        manager: &Arc<ConnectionManager>,
        stream: String,
        identity: String,
        callback: Callback,
    ) -> Self {
        manager.register_callback(&stream, &identity, callback);
        manager.send_message(Request::subscribe(stream.clone()));

        let resubscribe = match Handle::try_current() {
            Ok(handle) => Some(handle.spawn(resubscribe_loop(
                Arc::downgrade(manager),
                stream.clone(),
            ))),
            Err(_) => {
                warn!(stream = %stream, "No async runtime, periodic re-subscribe disabled");
                None
            }
        };

        debug!(stream = %stream, identity = %identity, "Subscription opened");

        Self {
            manager: Arc::clone(manager),
            stream,
            identity,
            resubscribe,
            released: false,
        }
    }

    /// Stream name.
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Callback identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Release the subscription now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        // None of these steps can fail: deregistering an absent entry is a
        // no-op and send_message buffers when the transport is down.
        self.manager
            .deregister_callback(&self.stream, &self.identity);
        if let Some(task) = self.resubscribe.take() {
            task.abort();
        }

        // The server tracks streams per connection, not per listener.
        let remaining = self.manager.registry().listener_count(&self.stream);
        if remaining == 0 {
            self.manager
                .send_message(Request::unsubscribe(self.stream.clone()));
        }

        debug!(
            stream = %self.stream,
            identity = %self.identity,
            remaining,
            "Subscription released"
        );
    }
}

impl Drop for StreamSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

async fn resubscribe_loop(manager: Weak<ConnectionManager>, stream: String) {
    let period = match manager.upgrade() {
        Some(m) => m.config().resubscribe_interval,
        None => return,
    };

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(manager) = manager.upgrade() else {
            return;
        };
        // While the transport is down the reconnect replay covers this stream.
        if manager.is_open() {
            manager.send_message(Request::subscribe(stream.clone()));
        }
    }
}
