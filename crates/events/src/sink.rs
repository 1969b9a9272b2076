//! Event sink abstraction (mechanics only).
//!
//! The coordinator reports every milestone to a sink and never looks at what
//! the sink does with it. Publishing is infallible from the caller's point of
//! view: a broken debug log must not change purchase behavior.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

use crate::event::StoreEvent;

/// A subscription to a sink's event stream.
///
/// Each subscription gets a copy of every event published after it was
/// created. Subscriptions are meant for a single consumer thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Drain everything that is currently queued.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Receiver of purchase milestones (the debug log).
///
/// Implementations must be cheap and non-blocking; they are called inline on
/// the purchase and listener paths.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: StoreEvent);
}

impl<S> EventSink for Arc<S>
where
    S: EventSink + ?Sized,
{
    fn publish(&self, event: StoreEvent) {
        (**self).publish(event)
    }
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn publish(&self, _event: StoreEvent) {}
}

/// Publishes every event to two sinks, in order.
#[derive(Debug, Default, Clone)]
pub struct TeeSink<A, B>(pub A, pub B);

impl<A, B> EventSink for TeeSink<A, B>
where
    A: EventSink,
    B: EventSink,
{
    fn publish(&self, event: StoreEvent) {
        self.0.publish(event.clone());
        self.1.publish(event);
    }
}
