//! Domain events and their in-process distribution.
//!
//! Aggregates decide events; the application layer wraps them in envelopes
//! and publishes them on an [`EventBus`] for listeners (order-summary views,
//! analytics sinks, tests).

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
