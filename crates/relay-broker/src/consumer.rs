//! Broker consumer: turns broker messages into hub publishes.
//!
//! For every message: check the binding, decode the body into an
//! [`Envelope`], publish it on the [`Hub`], then ack. The ack is sent only
//! after `publish` returns, and undecodable messages are acked too; there
//! is no redelivery loop for poison messages.

use std::time::Duration;

use relay_hub::{Hub, PublishReport};
use relay_protocol::{DecodeError, Envelope};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::{
    error::BrokerError,
    source::MessageSource,
    topic::Binding,
    types::{BrokerMessage, SourceStatus},
};

/// Maximum delay between reconnect attempts.
const BACKOFF_MAX: Duration = Duration::from_secs(300); // 5 minutes
/// Maximum number of connect attempts before giving up.
const MAX_ATTEMPTS: u32 = 10;
/// Jitter fraction applied to each delay (+0..10 %).
const JITTER_FRACTION: f64 = 0.10;

/// Exponential reconnect schedule: `base` → `2*base` → … → `max`, up to
/// `max_attempts` tries.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

impl Backoff {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            max: BACKOFF_MAX,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

/// What happened to one broker message.
#[derive(Debug)]
pub enum HandleOutcome {
    Published(PublishReport),
    /// Routing key outside the binding; acked and ignored.
    Unbound,
    /// Body could not be decoded; logged, acked, dropped.
    Rejected(DecodeError),
}

pub struct Consumer<S: MessageSource> {
    source: S,
    hub: Hub,
    binding: Binding,
    backoff: Backoff,
    status_tx: watch::Sender<SourceStatus>,
}

impl<S: MessageSource> Consumer<S> {
    pub fn new(source: S, hub: Hub, binding: Binding) -> Self {
        let (status_tx, _) = watch::channel(SourceStatus::Disconnected);
        Self {
            source,
            hub,
            binding,
            backoff: Backoff::default(),
            status_tx,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Watch the source's connection status (used by `/health`).
    pub fn status(&self) -> watch::Receiver<SourceStatus> {
        self.status_tx.subscribe()
    }

    /// Consume until `shutdown` flips to true.
    ///
    /// Reconnects with backoff whenever the source errors or ends. Returns
    /// the last connect error once the attempts are exhausted.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), BrokerError> {
        let name = self.source.name().to_string();
        info!(source = %name, patterns = self.binding.patterns().len(), "consumer started");

        loop {
            let connected = tokio::select! {
                r = connect_with_backoff(&name, &mut self.source, &self.backoff, &self.status_tx) => r,
                _ = wait_for_shutdown(&mut shutdown) => {
                    self.stop(&name).await;
                    return Ok(());
                }
            };
            if let Err(e) = connected {
                error!(source = %name, error = %e, "giving up on broker connection");
                self.status_tx.send_replace(SourceStatus::Error(e.to_string()));
                return Err(e);
            }

            loop {
                let next = tokio::select! {
                    biased;
                    _ = wait_for_shutdown(&mut shutdown) => {
                        self.stop(&name).await;
                        return Ok(());
                    }
                    next = self.source.next() => next,
                };

                match next {
                    Ok(Some(msg)) => {
                        if let Err(e) = self.handle(msg).await {
                            warn!(source = %name, error = %e, "ack failed, reconnecting");
                            break;
                        }
                    }
                    Ok(None) => {
                        warn!(source = %name, "message stream ended, reconnecting");
                        break;
                    }
                    Err(e) => {
                        warn!(source = %name, error = %e, "receive failed, reconnecting");
                        break;
                    }
                }
            }

            // a source that connects and then ends at once must not spin
            self.status_tx.send_replace(SourceStatus::Connecting);
            tokio::select! {
                _ = sleep(self.backoff.base + jitter(self.backoff.base)) => {}
                _ = wait_for_shutdown(&mut shutdown) => {
                    self.stop(&name).await;
                    return Ok(());
                }
            }
        }
    }

    /// Process one message: binding check, decode, publish, ack.
    pub async fn handle(&mut self, msg: BrokerMessage) -> Result<HandleOutcome, BrokerError> {
        let outcome = if !self.binding.matches(&msg.routing_key) {
            debug!(routing_key = %msg.routing_key, "routing key outside binding");
            HandleOutcome::Unbound
        } else {
            match Envelope::decode(&msg.routing_key, &msg.body) {
                Ok(envelope) => HandleOutcome::Published(self.hub.publish(envelope)),
                Err(e) => {
                    warn!(
                        routing_key = %msg.routing_key,
                        delivery_tag = msg.delivery_tag,
                        bytes = msg.body.len(),
                        error = %e,
                        "dropping undecodable message"
                    );
                    HandleOutcome::Rejected(e)
                }
            }
        };

        self.source.ack(msg.delivery_tag).await?;
        Ok(outcome)
    }

    async fn stop(&mut self, name: &str) {
        info!(source = %name, "consumer shutting down");
        if let Err(e) = self.source.disconnect().await {
            warn!(source = %name, error = %e, "error while disconnecting source");
        }
        self.status_tx.send_replace(SourceStatus::Disconnected);
    }
}

/// Resolves once shutdown is requested or the sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Connect with exponential backoff and jitter.
async fn connect_with_backoff<S: MessageSource>(
    name: &str,
    source: &mut S,
    backoff: &Backoff,
    status_tx: &watch::Sender<SourceStatus>,
) -> Result<(), BrokerError> {
    let mut delay = backoff.base;

    for attempt in 1..=backoff.max_attempts {
        status_tx.send_replace(SourceStatus::Connecting);
        match source.connect().await {
            Ok(()) => {
                info!(source = %name, attempt, "broker source connected");
                status_tx.send_replace(SourceStatus::Connected);
                return Ok(());
            }
            Err(e) if attempt == backoff.max_attempts => {
                return Err(e);
            }
            Err(e) => {
                let total = delay + jitter(delay);
                warn!(
                    source = %name,
                    attempt,
                    max = backoff.max_attempts,
                    error = %e,
                    retry_after_ms = total.as_millis() as u64,
                    "broker connect failed, retrying with backoff"
                );
                status_tx.send_replace(SourceStatus::Error(e.to_string()));
                sleep(total).await;
                delay = (delay * 2).min(backoff.max);
            }
        }
    }

    Err(BrokerError::ConnectionFailed(format!(
        "no connect attempts allowed for {name}"
    )))
}

/// Return a jitter offset in `0 .. JITTER_FRACTION * base`.
///
/// Derived from the clock's sub-second nanos; good enough to spread
/// reconnects without pulling in a random number generator.
fn jitter(base: Duration) -> Duration {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    let max_jitter_ms = (base.as_millis() as f64 * JITTER_FRACTION) as u64;
    if max_jitter_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(u64::from(nanos) % max_jitter_ms)
}
