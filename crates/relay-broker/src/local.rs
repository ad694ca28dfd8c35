//! In-process broker: an mpsc-backed topic exchange with explicit acks.
//!
//! Producers inside the process (the HTTP ingest route, tests) hold a
//! [`LocalBroker`]; the consumer owns the matching [`LocalSource`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    error::BrokerError,
    source::MessageSource,
    types::{BrokerMessage, SourceStatus},
};

#[derive(Default)]
struct Counters {
    next_tag: AtomicU64,
    unacked: AtomicU64,
}

/// Publishing handle. Cloneable; the source ends once every clone is dropped.
#[derive(Clone)]
pub struct LocalBroker {
    tx: mpsc::Sender<BrokerMessage>,
    counters: Arc<Counters>,
}

impl LocalBroker {
    /// Create a broker with room for `capacity` in-flight messages and its source.
    pub fn new(capacity: usize) -> (Self, LocalSource) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(Counters::default());
        let broker = Self {
            tx,
            counters: Arc::clone(&counters),
        };
        let source = LocalSource {
            rx,
            counters,
            pending: HashSet::new(),
            status: SourceStatus::Disconnected,
            ended: false,
        };
        (broker, source)
    }

    /// Publish a message under `routing_key`. Waits while the queue is full.
    /// Returns the delivery tag.
    pub async fn publish(
        &self,
        routing_key: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) -> Result<u64, BrokerError> {
        let delivery_tag = self.counters.next_tag.fetch_add(1, Ordering::Relaxed) + 1;
        let msg = BrokerMessage {
            routing_key: routing_key.into(),
            body: body.into(),
            delivery_tag,
        };
        self.counters.unacked.fetch_add(1, Ordering::Relaxed);
        if self.tx.send(msg).await.is_err() {
            self.counters.unacked.fetch_sub(1, Ordering::Relaxed);
            return Err(BrokerError::Closed);
        }
        Ok(delivery_tag)
    }

    /// Messages published but not yet acknowledged.
    pub fn unacked(&self) -> u64 {
        self.counters.unacked.load(Ordering::Relaxed)
    }
}

/// Consuming side of a [`LocalBroker`].
pub struct LocalSource {
    rx: mpsc::Receiver<BrokerMessage>,
    counters: Arc<Counters>,
    pending: HashSet<u64>,
    status: SourceStatus,
    ended: bool,
}

#[async_trait]
impl MessageSource for LocalSource {
    fn name(&self) -> &str {
        "local"
    }

    async fn connect(&mut self) -> Result<(), BrokerError> {
        if self.ended {
            self.status = SourceStatus::Error("all publishers dropped".to_string());
            return Err(BrokerError::ConnectionFailed(
                "all publishers dropped".to_string(),
            ));
        }
        self.status = SourceStatus::Connected;
        Ok(())
    }

    async fn next(&mut self) -> Result<Option<BrokerMessage>, BrokerError> {
        match self.rx.recv().await {
            Some(msg) => {
                self.pending.insert(msg.delivery_tag);
                Ok(Some(msg))
            }
            None => {
                self.ended = true;
                self.status = SourceStatus::Disconnected;
                Ok(None)
            }
        }
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), BrokerError> {
        if !self.pending.remove(&delivery_tag) {
            return Err(BrokerError::Ack {
                tag: delivery_tag,
                reason: "unknown or already acknowledged".to_string(),
            });
        }
        self.counters.unacked.fetch_sub(1, Ordering::Relaxed);
        debug!(delivery_tag, "acked");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), BrokerError> {
        self.status = SourceStatus::Disconnected;
        Ok(())
    }

    fn status(&self) -> SourceStatus {
        self.status.clone()
    }
}
