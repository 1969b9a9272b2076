//! `iapkit-events` — purchase milestones and the debug log sink.
//!
//! Every verification and transaction milestone is published as a
//! [`StoreEvent`] to an injected [`EventSink`]. Sinks are collaborators of the
//! coordinator, not part of it: the in-memory sink backs tests and the demo
//! debug log, the tracing sink forwards to the process logger.

pub mod envelope;
pub mod event;
pub mod in_memory_sink;
pub mod sink;
pub mod tracing_sink;

pub use envelope::EventEnvelope;
pub use event::{StoreEvent, TransactionSource};
pub use in_memory_sink::InMemoryEventSink;
pub use sink::{EventSink, NoopEventSink, Subscription, TeeSink};
pub use tracing_sink::TracingEventSink;
