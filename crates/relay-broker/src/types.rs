use serde::{Deserialize, Serialize};

/// A message as delivered by the broker, before decoding.
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    /// Topic routing key, e.g. `"product.created"`.
    pub routing_key: String,

    /// Raw body bytes (JSON expected).
    pub body: Vec<u8>,

    /// Broker-assigned tag passed back on ack.
    pub delivery_tag: u64,
}

/// Runtime connection state of a message source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// Connected and consuming.
    Connected,

    /// Attempting to establish or re-establish the connection.
    Connecting,

    /// Cleanly disconnected (not an error condition).
    Disconnected,

    /// Gave up after retries, or the last attempt failed.
    Error(String),
}
