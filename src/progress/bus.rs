//! Subscriber registry and progress fan-out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::event::ProgressEvent;

/// Returned by a subscriber whose peer is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("subscriber closed")]
pub struct SubscriberClosed;

/// A live connection that receives progress frames.
pub trait Subscriber: Send + Sync {
    /// Send one text frame.
    fn send_text(&self, text: &str) -> Result<(), SubscriberClosed>;

    /// Close the connection.
    fn close(&self);

    /// Check whether the peer has gone away.
    fn is_closed(&self) -> bool;
}

/// Registry handle for one subscriber.
pub type SubscriberId = u64;

/// Process-wide set of progress subscribers.
///
/// Delivery is fire-and-forget. A subscriber whose send fails is dropped
/// from the set immediately.
#[derive(Default)]
pub struct ProgressBus {
    subscribers: Mutex<HashMap<SubscriberId, Box<dyn Subscriber>>>,
    next_id: AtomicU64,
}

impl ProgressBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, Box<dyn Subscriber>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a subscriber and return its handle.
    pub fn subscribe(&self, subscriber: Box<dyn Subscriber>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock().insert(id, subscriber);
        debug!(subscriber = id, "Subscriber joined");
        id
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            debug!(subscriber = id, "Subscriber left");
        }
        removed
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Send one event to every subscriber. Returns the number of deliveries.
    pub fn broadcast(&self, event: &ProgressEvent) -> usize {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to serialize progress event: {}", e);
                return 0;
            }
        };

        let mut subscribers = self.lock();
        let mut failed = Vec::new();
        for (id, subscriber) in subscribers.iter() {
            if subscriber.is_closed() || subscriber.send_text(&text).is_err() {
                failed.push(*id);
            }
        }

        for id in &failed {
            warn!(subscriber = id, "Dropping subscriber after failed send");
            subscribers.remove(id);
        }

        subscribers.len()
    }
}

impl std::fmt::Debug for ProgressBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
