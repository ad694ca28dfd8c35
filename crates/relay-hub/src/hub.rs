//! Broadcast hub: subscribe / unsubscribe / publish.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};
use relay_protocol::Envelope;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{HubError, Result};
use crate::registry::Registry;
use crate::subscriber::{Delivery, Offer, SubscriberEntry, SubscriberId};

/// Default number of envelopes a subscriber may have queued.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    queue_capacity: usize,
}

impl HubConfig {
    /// Fails unless `queue_capacity >= 1`.
    pub fn new(queue_capacity: usize) -> Result<Self> {
        if queue_capacity == 0 {
            return Err(HubError::InvalidCapacity(queue_capacity));
        }
        Ok(Self { queue_capacity })
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Outcome of one `publish` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Sequence number assigned to the envelope.
    pub seq: u64,
    /// Subscribers that accepted the envelope.
    pub delivered: usize,
    /// Subscribers disconnected because their queue was full.
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    pub active_subscribers: usize,
    pub published_total: u64,
    pub slow_disconnects: u64,
}

/// Fan-out hub. Cheap to clone; all clones share one registry.
///
/// Constructed once at startup; [`Hub::shutdown`] closes every open
/// subscription and rejects new ones.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    config: HubConfig,
    registry: Registry,
    next_id: AtomicU64,
    /// Last assigned sequence number. Held for the whole fan-out so that
    /// sequence order and per-subscriber delivery order are the same.
    seq: Mutex<u64>,
    closed: AtomicBool,
    published_total: AtomicU64,
    slow_disconnects: AtomicU64,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            inner: Arc::new(HubInner {
                config,
                registry: Registry::new(),
                next_id: AtomicU64::new(1),
                seq: Mutex::new(0),
                closed: AtomicBool::new(false),
                published_total: AtomicU64::new(0),
                slow_disconnects: AtomicU64::new(0),
            }),
        }
    }

    /// Shorthand for `Hub::new(HubConfig::new(capacity)?)`.
    pub fn with_capacity(queue_capacity: usize) -> Result<Self> {
        Ok(Self::new(HubConfig::new(queue_capacity)?))
    }

    pub fn config(&self) -> HubConfig {
        self.inner.config
    }

    /// Register a new subscriber with an empty queue.
    ///
    /// Nothing published before this returns is visible to the subscriber.
    pub fn subscribe(&self) -> Result<Subscription> {
        let inner = &self.inner;
        if inner.closed.load(Ordering::SeqCst) {
            return Err(HubError::Closed);
        }

        let id = SubscriberId(inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(inner.config.queue_capacity);
        let entry = Arc::new(SubscriberEntry::new(id, tx));
        let connected_since = entry.connected_since;
        inner.registry.insert(Arc::clone(&entry));

        // shutdown may have drained the registry between the check and the insert
        if inner.closed.load(Ordering::SeqCst) {
            inner.registry.remove(id);
            entry.close();
            return Err(HubError::Closed);
        }

        info!(subscriber = %id, subscribers = inner.registry.len(), "subscriber added");
        Ok(Subscription {
            id,
            connected_since,
            rx,
            hub: Arc::downgrade(inner),
        })
    }

    /// Remove a subscriber. Idempotent; returns true only for the call that
    /// actually removed it. No enqueue for `id` happens after this returns.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.unsubscribe(id)
    }

    /// Offer `envelope` to every active subscriber without waiting on any.
    ///
    /// A subscriber whose queue is full is disconnected; the others are
    /// unaffected. With no subscribers the envelope is discarded.
    pub fn publish(&self, envelope: Envelope) -> PublishReport {
        let inner = &self.inner;
        let envelope = Arc::new(envelope);
        let mut overflowed = Vec::new();
        let mut gone = Vec::new();
        let mut delivered = 0usize;

        let seq = {
            let mut last = inner.seq.lock().expect("publish sequence lock poisoned");
            *last += 1;
            let seq = *last;

            for entry in inner.registry.snapshot() {
                let delivery = Delivery {
                    seq,
                    envelope: Arc::clone(&envelope),
                };
                match entry.offer(delivery) {
                    Offer::Accepted => delivered += 1,
                    Offer::Full => {
                        // close now so no later envelope slips in behind the gap
                        entry.begin_drain();
                        entry.close();
                        overflowed.push(entry);
                    }
                    Offer::Gone => gone.push(entry.id),
                }
            }
            seq
        };

        for entry in &overflowed {
            inner.registry.remove(entry.id);
            inner.slow_disconnects.fetch_add(1, Ordering::Relaxed);
            warn!(
                subscriber = %entry.id,
                seq,
                capacity = inner.config.queue_capacity,
                connected_since = %entry.connected_since,
                "disconnecting slow subscriber (queue full)"
            );
        }
        for id in gone {
            if inner.registry.remove(id).is_some() {
                debug!(subscriber = %id, "removed subscriber with dropped receiver");
            }
        }

        inner.published_total.fetch_add(1, Ordering::Relaxed);
        debug!(
            seq,
            event_type = %envelope.event_type,
            delivered,
            dropped = overflowed.len(),
            "published"
        );

        PublishReport {
            seq,
            delivered,
            dropped: overflowed.len(),
        }
    }

    /// Close every open subscription and refuse new ones. Idempotent.
    pub fn shutdown(&self) {
        let inner = &self.inner;
        if inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let entries = inner.registry.drain();
        for entry in &entries {
            entry.close();
        }
        info!(closed = entries.len(), "hub shut down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            active_subscribers: self.inner.registry.len(),
            published_total: self.inner.published_total.load(Ordering::Relaxed),
            slow_disconnects: self.inner.slow_disconnects.load(Ordering::Relaxed),
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl HubInner {
    fn unsubscribe(&self, id: SubscriberId) -> bool {
        match self.registry.remove(id) {
            Some(entry) => {
                entry.close();
                info!(subscriber = %id, subscribers = self.registry.len(), "subscriber removed");
                true
            }
            None => false,
        }
    }
}

/// Receiving side of one subscriber.
///
/// Dropping it unsubscribes, so every exit path of a viewer loop releases
/// its registration.
pub struct Subscription {
    id: SubscriberId,
    connected_since: DateTime<Utc>,
    rx: mpsc::Receiver<Delivery>,
    hub: Weak<HubInner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn connected_since(&self) -> DateTime<Utc> {
        self.connected_since
    }

    /// Wait for the next envelope. `None` once the subscriber has been
    /// closed (unsubscribe, overflow, shutdown) and its queue is empty.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv); `None` when nothing is queued.
    pub fn try_recv(&mut self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("connected_since", &self.connected_since)
            .finish()
    }
}
