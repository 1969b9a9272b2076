use tracing::{info, warn};

use crate::event::StoreEvent;
use crate::sink::EventSink;

/// Forwards milestones to `tracing` (failures at `warn`, the rest at `info`).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: StoreEvent) {
        if event.is_failure() {
            warn!(event_type = event.event_type(), "{event}");
        } else {
            info!(event_type = event.event_type(), "{event}");
        }
    }
}
