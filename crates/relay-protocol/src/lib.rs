//! Wire-level types shared by the broker side and the viewer side:
//! the closed event catalog, the `Envelope`, and SSE frame bodies.

pub mod envelope;
pub mod events;
pub mod frames;

pub use envelope::{DecodeError, Envelope};
pub use events::{EventType, NAMESPACES};
pub use frames::StreamFrame;
