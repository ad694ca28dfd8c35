//! Shared configuration and error types for the realtime relay.

pub mod config;
pub mod error;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
