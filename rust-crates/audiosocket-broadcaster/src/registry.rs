use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Encoded frame shared by every subscriber it is queued for
pub type Frame = Arc<str>;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique handle of one consumer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outbound side of one consumer connection.
///
/// Frames are queued here and written to the socket by that connection's
/// writer task, in queue order.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    peer: String,
    tx: mpsc::UnboundedSender<Frame>,
}

impl Subscriber {
    /// Create a subscriber and the receiving end of its frame queue
    pub fn channel(peer: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscriber = Self {
            id: SubscriberId(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed)),
            peer: peer.into(),
            tx,
        };
        (subscriber, rx)
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// False once the writer task has gone away
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, frame: &Frame) -> bool {
        self.tx.send(Arc::clone(frame)).is_ok()
    }
}

/// Thread-safe set of connected consumers.
///
/// The lock only guards membership; `broadcast` queues frames on a snapshot
/// and never waits on a socket.
#[derive(Debug, Clone, Default)]
pub struct SubscriberRegistry {
    subscribers: Arc<Mutex<HashMap<SubscriberId, Subscriber>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Adding the same handle twice keeps one entry.
    pub fn add(&self, subscriber: Subscriber) {
        let mut subscribers = self.subscribers.lock();
        subscribers.insert(subscriber.id, subscriber);
        tracing::debug!("Subscriber added. Total: {}", subscribers.len());
    }

    /// Deregister a subscriber; returns whether it was still registered.
    ///
    /// Dropping the registry's handle lets the writer task finish the queued
    /// frames and close the connection.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let removed = subscribers.remove(&id).is_some();
        if removed {
            tracing::debug!("Subscriber {} removed. Remaining: {}", id, subscribers.len());
        }
        removed
    }

    /// Queue `frame` for every registered subscriber.
    ///
    /// Subscribers whose connection is gone are pruned instead of failing
    /// the call. Returns how many subscribers the frame was queued for.
    pub fn broadcast(&self, frame: &Frame) -> usize {
        let snapshot: Vec<Subscriber> = self.subscribers.lock().values().cloned().collect();

        let mut delivered = 0;
        for subscriber in &snapshot {
            if subscriber.send(frame) {
                delivered += 1;
            } else {
                tracing::warn!(
                    "Dropping subscriber {} ({}): connection closed",
                    subscriber.id,
                    subscriber.peer
                );
                self.remove(subscriber.id);
            }
        }

        delivered
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().contains_key(&id)
    }

    /// Remove every subscriber, closing their connections once drained
    pub fn clear(&self) {
        let mut subscribers = self.subscribers.lock();
        let count = subscribers.len();
        subscribers.clear();
        tracing::info!("Closed {} subscriber(s)", count);
    }
}
