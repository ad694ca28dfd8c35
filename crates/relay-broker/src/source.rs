use async_trait::async_trait;

use crate::{
    error::BrokerError,
    types::{BrokerMessage, SourceStatus},
};

/// Common interface for broker transports feeding the consumer.
///
/// A source delivers messages already filtered by its own broker-side
/// binding; the consumer re-checks routing keys against its [`Binding`](crate::Binding).
#[async_trait]
pub trait MessageSource: Send {
    /// Stable lowercase identifier used in logs (e.g. `"local"`, `"amqp"`).
    fn name(&self) -> &str;

    /// Establish (or re-establish) the connection and start consuming.
    async fn connect(&mut self) -> Result<(), BrokerError>;

    /// Wait for the next message. `Ok(None)` means the stream ended and the
    /// consumer should reconnect.
    async fn next(&mut self) -> Result<Option<BrokerMessage>, BrokerError>;

    /// Acknowledge a delivery by tag.
    async fn ack(&mut self, delivery_tag: u64) -> Result<(), BrokerError>;

    /// Gracefully stop consuming.
    async fn disconnect(&mut self) -> Result<(), BrokerError>;

    /// Current runtime status without blocking.
    fn status(&self) -> SourceStatus;
}
