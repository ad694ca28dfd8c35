pub mod amqp;
pub mod consumer;
pub mod error;
pub mod local;
pub mod source;
pub mod topic;
pub mod types;

pub use amqp::{AmqpSettings, AmqpSource};
pub use consumer::{Backoff, Consumer, HandleOutcome};
pub use error::BrokerError;
pub use local::{LocalBroker, LocalSource};
pub use source::MessageSource;
pub use topic::{Binding, TopicPattern};
pub use types::{BrokerMessage, SourceStatus};
