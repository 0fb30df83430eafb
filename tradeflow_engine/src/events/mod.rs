//! Engine events.
//!
//! Downstream services (fulfillment, notifications) subscribe to these through [`EventHooks`]. Publishing is
//! fire-and-forget from the point of view of the operation that raised the event.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
