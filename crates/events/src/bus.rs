//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus is for distribution, not storage:
//!
//! - **Transport-agnostic**: in-memory channels today, anything else tomorrow
//! - **Best-effort**: publication failure never rolls back a decided change
//! - **Broadcast**: each subscriber gets a copy of every message

use std::sync::Arc;
use std::sync::mpsc::Receiver;

/// A subscription to an event stream.
///
/// ```ignore
/// let subscription = bus.subscribe();
/// while let Ok(envelope) = subscription.try_recv() {
///     render_summary(envelope.payload());
/// }
/// ```
///
/// Subscriptions are designed for single-threaded consumption.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Drain everything currently queued without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
