//! In-process broadcast hub.
//!
//! Every envelope handed to [`Hub::publish`] is offered, in publish order,
//! to every subscriber registered at that moment. Each subscriber owns a
//! bounded queue; a subscriber whose queue is full is disconnected instead
//! of slowing the publisher down.
//!
//! ```text
//!   broker consumer ──► Hub::publish ──► snapshot(registry)
//!                                             │
//!                         ┌───────────────────┼───────────────────┐
//!                         ▼                   ▼                   ▼
//!                    try_send(q1)        try_send(q2)        try_send(q3)
//!                         │                   │                   │
//!                   Subscription        Subscription        Subscription
//!                     .recv()             .recv()             .recv()
//! ```

pub mod error;
pub mod hub;
mod registry;
pub mod subscriber;

pub use error::HubError;
pub use hub::{Hub, HubConfig, HubStats, PublishReport, Subscription};
pub use subscriber::{Delivery, SubscriberId, SubscriberState};
