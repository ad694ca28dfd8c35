//! HTTP edge of the relay: the SSE stream, the ingest route and health.
//!
//! `main.rs` wires config, hub and consumer together; everything that
//! touches axum lives here so integration tests can mount the same router.

pub mod app;
pub mod http;

pub use app::{build_router, AppState};
