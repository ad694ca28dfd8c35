use thiserror::Error;

/// Errors surfaced by hub operations.
///
/// Overflow and disconnects are not errors; they are resolved inside the
/// hub and only show up in logs and [`HubStats`](crate::HubStats).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    /// `shutdown` has run; no new subscribers are accepted.
    #[error("hub is shut down")]
    Closed,

    /// Per-subscriber queues need room for at least one envelope.
    #[error("queue capacity must be at least 1, got {0}")]
    InvalidCapacity(usize),
}

pub type Result<T> = std::result::Result<T, HubError>;
