//! Per-subscriber record: identity, lifecycle state, and the producer side
//! of its delivery queue.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use relay_protocol::Envelope;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Identifier handed out by [`Hub::subscribe`](crate::Hub::subscribe).
/// Allocated from a monotonic counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub(crate) u64);

impl SubscriberId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Lifecycle of a subscriber: linear progression, no backwards transitions.
///
/// `Active → Closed` on a normal unsubscribe, `Active → Draining → Closed`
/// when its queue overflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SubscriberState {
    Active = 0,
    Draining = 1,
    Closed = 2,
}

impl SubscriberState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SubscriberState::Active,
            1 => SubscriberState::Draining,
            _ => SubscriberState::Closed,
        }
    }
}

/// One envelope as seen by one subscriber.
///
/// `seq` is the hub-wide publish sequence number; it is strictly increasing
/// within a subscriber's stream. The envelope is shared, not copied.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub seq: u64,
    pub envelope: Arc<Envelope>,
}

/// Result of a non-blocking enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Offer {
    Accepted,
    /// Queue full: the subscriber is not keeping up.
    Full,
    /// Already closed, or the receiving side was dropped.
    Gone,
}

pub(crate) struct SubscriberEntry {
    pub(crate) id: SubscriberId,
    pub(crate) connected_since: DateTime<Utc>,
    state: AtomicU8,
    /// `None` once closed. Taken under this lock so that no enqueue can
    /// land after `close` returns.
    tx: Mutex<Option<mpsc::Sender<Delivery>>>,
}

impl SubscriberEntry {
    pub(crate) fn new(id: SubscriberId, tx: mpsc::Sender<Delivery>) -> Self {
        Self {
            id,
            connected_since: Utc::now(),
            state: AtomicU8::new(SubscriberState::Active as u8),
            tx: Mutex::new(Some(tx)),
        }
    }

    pub(crate) fn state(&self) -> SubscriberState {
        SubscriberState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Offer a delivery without waiting.
    pub(crate) fn offer(&self, delivery: Delivery) -> Offer {
        let guard = self.tx.lock().expect("subscriber queue lock poisoned");
        let Some(tx) = guard.as_ref() else {
            return Offer::Gone;
        };
        match tx.try_send(delivery) {
            Ok(()) => Offer::Accepted,
            Err(TrySendError::Full(_)) => Offer::Full,
            Err(TrySendError::Closed(_)) => Offer::Gone,
        }
    }

    /// Mark the overflow decision. Only an `Active` subscriber can start draining.
    pub(crate) fn begin_drain(&self) -> bool {
        self.state
            .compare_exchange(
                SubscriberState::Active as u8,
                SubscriberState::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Drop the sending half. Envelopes already queued stay readable; the
    /// receiver sees end-of-stream after them. Returns false if already closed.
    pub(crate) fn close(&self) -> bool {
        let sender = self
            .tx
            .lock()
            .expect("subscriber queue lock poisoned")
            .take();
        self.state
            .store(SubscriberState::Closed as u8, Ordering::Release);
        sender.is_some()
    }
}
