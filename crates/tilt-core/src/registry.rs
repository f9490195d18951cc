//! Connected consumers.
//!
//! Each consumer session owns its socket and drains a [`ConsumerFeed`]
//! holding the newest encoded aggregate. The registry holds the sending
//! half. Every aggregate is a full snapshot, so a newer payload replaces one
//! the session has not written yet. Dropping a handle from the registry
//! closes the feed, which tells the session to close its socket.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tilt_protocol::Payload;
use tokio::sync::watch;

static NEXT_CONSUMER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique consumer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsumerId(u64);

impl ConsumerId {
    /// Allocate a fresh consumer ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(NEXT_CONSUMER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer_{}", self.0)
    }
}

/// Failure to hand a payload to a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// The consumer session has ended.
    #[error("consumer session closed")]
    Closed,
}

impl SendError {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SendError::Closed => "closed",
        }
    }
}

/// Sending side of one consumer's feed.
#[derive(Debug, Clone)]
pub struct ConsumerHandle {
    id: ConsumerId,
    tx: Arc<watch::Sender<Option<Payload>>>,
}

impl ConsumerHandle {
    /// Create a handle and the feed its session drains.
    #[must_use]
    pub fn channel() -> (Self, ConsumerFeed) {
        let (tx, rx) = watch::channel(None);
        let handle = Self {
            id: ConsumerId::generate(),
            tx: Arc::new(tx),
        };
        (handle, ConsumerFeed { rx })
    }

    /// Get the consumer ID.
    #[must_use]
    pub fn id(&self) -> ConsumerId {
        self.id
    }

    /// Publish a payload, replacing any the session has not taken yet.
    ///
    /// Never waits.
    ///
    /// # Errors
    ///
    /// Fails if the session has dropped its feed.
    pub fn send(&self, payload: Payload) -> Result<(), SendError> {
        self.tx.send(Some(payload)).map_err(|_| SendError::Closed)
    }

    /// Check if the session has dropped its feed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving side of one consumer's feed.
#[derive(Debug)]
pub struct ConsumerFeed {
    rx: watch::Receiver<Option<Payload>>,
}

impl ConsumerFeed {
    /// Wait for a payload newer than the last one taken.
    ///
    /// Returns `None` once the handle is gone and nothing new is pending.
    /// Cancel safe.
    pub async fn recv(&mut self) -> Option<Payload> {
        loop {
            self.rx.changed().await.ok()?;
            let latest = (*self.rx.borrow_and_update()).clone();
            if let Some(payload) = latest {
                return Some(payload);
            }
        }
    }

    /// Take the newest payload if one arrived since the last take.
    pub fn try_recv(&mut self) -> Option<Payload> {
        let latest = self.rx.borrow_and_update();
        if latest.has_changed() {
            (*latest).clone()
        } else {
            None
        }
    }

    /// Check if the handle has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.rx.has_changed().is_err()
    }
}

/// Concurrent set of connected consumers.
#[derive(Debug, Default)]
pub struct ConsumerRegistry {
    consumers: DashMap<ConsumerId, ConsumerHandle>,
}

impl ConsumerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer.
    ///
    /// Returns `false` and leaves the registry unchanged if the consumer is
    /// already registered.
    pub fn add(&self, handle: ConsumerHandle) -> bool {
        match self.consumers.entry(handle.id()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(handle);
                true
            }
        }
    }

    /// Deregister a consumer.
    ///
    /// Returns `true` only for the call that actually removed it.
    pub fn remove(&self, id: ConsumerId) -> bool {
        self.consumers.remove(&id).is_some()
    }

    /// Check if a consumer is registered.
    #[must_use]
    pub fn contains(&self, id: ConsumerId) -> bool {
        self.consumers.contains_key(&id)
    }

    /// Number of registered consumers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    /// Check if no consumers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }

    /// Copy out the currently registered handles.
    #[must_use]
    pub fn handles(&self) -> Vec<ConsumerHandle> {
        self.consumers.iter().map(|e| e.value().clone()).collect()
    }

    /// Visit every registered consumer once.
    ///
    /// Visits a copy taken up front, so `visit` may add or remove consumers
    /// without deadlocking. Consumers added meanwhile are not visited.
    pub fn for_each(&self, mut visit: impl FnMut(&ConsumerHandle)) {
        for handle in self.handles() {
            visit(&handle);
        }
    }
}
