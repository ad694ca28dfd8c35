use thiserror::Error;

/// Errors raised by a message source or the consumer driving it.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The underlying transport could not be established.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The connection broke while waiting for the next message.
    #[error("Receive failed: {0}")]
    Receive(String),

    /// The broker refused an acknowledgement.
    #[error("Ack failed for delivery {tag}: {reason}")]
    Ack { tag: u64, reason: String },

    /// Publishing into a source that no longer has a consumer.
    #[error("Source closed")]
    Closed,

    /// A binding pattern is not a valid topic pattern.
    #[error("Invalid topic pattern: {0}")]
    InvalidPattern(String),
}
