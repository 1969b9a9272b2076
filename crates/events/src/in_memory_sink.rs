//! In-memory event sink for tests/dev and the demo debug log.

use std::sync::{Mutex, mpsc};

use chrono::Utc;

use crate::envelope::EventEnvelope;
use crate::event::StoreEvent;
use crate::sink::{EventSink, Subscription};

#[derive(Debug, Default)]
struct Inner {
    next_sequence: u64,
    history: Vec<EventEnvelope<StoreEvent>>,
    subscribers: Vec<mpsc::Sender<EventEnvelope<StoreEvent>>>,
}

/// Records every published event and fans it out to subscribers.
///
/// - No IO / no async
/// - Best-effort fan-out (dead subscribers are dropped)
/// - A poisoned lock drops the event instead of panicking the publisher
#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    inner: Mutex<Inner>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> Subscription<EventEnvelope<StoreEvent>> {
        let (tx, rx) = mpsc::channel();

        // If the lock is poisoned we still return a subscription;
        // it just never receives anything.
        if let Ok(mut inner) = self.inner.lock() {
            inner.subscribers.push(tx);
        }

        Subscription::new(rx)
    }

    /// Every event published so far, in publication order.
    pub fn history(&self) -> Vec<EventEnvelope<StoreEvent>> {
        self.inner
            .lock()
            .map(|inner| inner.history.clone())
            .unwrap_or_default()
    }

    /// Payloads only, in publication order.
    pub fn events(&self) -> Vec<StoreEvent> {
        self.history()
            .into_iter()
            .map(EventEnvelope::into_payload)
            .collect()
    }

    /// Rendered debug log lines.
    pub fn lines(&self) -> Vec<String> {
        self.history()
            .iter()
            .map(|env| format!("[{:>4}] {}", env.sequence_number(), env.payload()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.history.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.history.clear();
        }
    }
}

impl EventSink for InMemoryEventSink {
    fn publish(&self, event: StoreEvent) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };

        inner.next_sequence += 1;
        let envelope = EventEnvelope::new(inner.next_sequence, Utc::now(), event);

        inner
            .subscribers
            .retain(|tx| tx.send(envelope.clone()).is_ok());
        inner.history.push(envelope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iapkit_core::ProductId;

    fn started(id: &str) -> StoreEvent {
        StoreEvent::PurchaseStarted {
            product_id: ProductId::new(id).unwrap(),
        }
    }

    #[test]
    fn history_preserves_publication_order_and_sequence() {
        let sink = InMemoryEventSink::new();
        sink.publish(started("A"));
        sink.publish(started("B"));

        let history = sink.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].sequence_number(), 1);
        assert_eq!(history[1].sequence_number(), 2);
        assert_eq!(sink.lines()[1], "[   2] Purchasing B");
    }

    #[test]
    fn subscribers_only_see_later_events() {
        let sink = InMemoryEventSink::new();
        sink.publish(started("early"));

        let sub = sink.subscribe();
        sink.publish(started("late"));

        let received = sub.drain();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].payload(), &started("late"));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let sink = InMemoryEventSink::new();
        drop(sink.subscribe());
        sink.publish(started("A"));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn clear_empties_history() {
        let sink = InMemoryEventSink::new();
        sink.publish(started("A"));
        sink.clear();
        assert!(sink.is_empty());
    }
}
