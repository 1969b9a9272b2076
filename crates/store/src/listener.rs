//! Background consumer of the platform's update stream.
//!
//! The platform delivers transactions that were not started by a purchase
//! call in this process (renewals, restores, family sharing, other devices).
//! [`UpdateListener`] drains that stream on a tokio task and feeds every item
//! through the [`TransactionPipeline`].
//!
//! ```text
//! Idle ──start()──► Listening ──cancel()──► Cancelled (terminal)
//!   └──────────────cancel()──────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use iapkit_events::{EventSink, StoreEvent, TransactionSource};

use crate::pipeline::TransactionPipeline;
use crate::platform::PurchasePlatform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Listening,
    Cancelled,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ListenerError {
    #[error("listener is already running")]
    AlreadyListening,

    #[error("listener was cancelled and cannot be restarted")]
    Cancelled,

    #[error("no tokio runtime available to run the listener")]
    NoRuntime,
}

/// Cooperative cancellation flag.
///
/// `notify_one` stores a permit when nobody is waiting, so a cancel that
/// lands between two polls is still observed.
#[derive(Debug, Default)]
struct CancelSignal {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

pub struct UpdateListener {
    platform: Arc<dyn PurchasePlatform>,
    pipeline: Arc<TransactionPipeline>,
    sink: Arc<dyn EventSink>,
    state: Mutex<ListenerState>,
    signal: Arc<CancelSignal>,
    processed: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl UpdateListener {
    pub fn new(
        platform: Arc<dyn PurchasePlatform>,
        pipeline: Arc<TransactionPipeline>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            platform,
            pipeline,
            sink,
            state: Mutex::new(ListenerState::Idle),
            signal: Arc::new(CancelSignal::default()),
            processed: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ListenerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ListenerState {
        *self.lock_state()
    }

    /// Items taken off the update stream and run through the pipeline
    /// (verified or not).
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    /// Start consuming the update stream on a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), ListenerError> {
        let mut state = self.lock_state();
        match *state {
            ListenerState::Listening => return Err(ListenerError::AlreadyListening),
            ListenerState::Cancelled => return Err(ListenerError::Cancelled),
            ListenerState::Idle => {}
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ListenerError::NoRuntime)?;

        *state = ListenerState::Listening;
        info!("update listener started");
        self.sink.publish(StoreEvent::ListenerStarted);

        let handle = runtime.spawn(listen_loop(
            self.platform.clone(),
            self.pipeline.clone(),
            self.sink.clone(),
            self.signal.clone(),
            self.processed.clone(),
        ));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    /// Request cancellation and return immediately.
    ///
    /// No further items are taken off the stream; an item already being
    /// processed may finish. Idempotent.
    pub fn cancel(&self) {
        let mut state = self.lock_state();
        if *state == ListenerState::Cancelled {
            return;
        }
        *state = ListenerState::Cancelled;
        self.signal.cancel();
        debug!("update listener cancellation requested");
    }

    /// Wait for the background task to exit.
    ///
    /// Returns immediately if the listener never started or was already
    /// joined.
    pub async fn join(&self) {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "update listener task ended abnormally");
            }
        }
    }
}

impl Drop for UpdateListener {
    fn drop(&mut self) {
        self.signal.cancel();
    }
}

async fn listen_loop(
    platform: Arc<dyn PurchasePlatform>,
    pipeline: Arc<TransactionPipeline>,
    sink: Arc<dyn EventSink>,
    signal: Arc<CancelSignal>,
    processed: Arc<AtomicU64>,
) {
    let mut updates = platform.updates().await;

    loop {
        if signal.is_cancelled() {
            break;
        }

        let next = tokio::select! {
            biased;
            _ = signal.notify.notified() => break,
            item = updates.next() => item,
        };

        let Some(item) = next else {
            info!("update stream ended");
            break;
        };

        // Cancelled while waiting: drop the item unprocessed.
        if signal.is_cancelled() {
            break;
        }

        if let Err(err) = pipeline.process(item, TransactionSource::Update).await {
            warn!(reason = %err.reason, "rejected transaction update");
        }
        processed.fetch_add(1, Ordering::SeqCst);
    }

    let processed = processed.load(Ordering::SeqCst);
    info!(processed, "update listener stopped");
    sink.publish(StoreEvent::ListenerStopped { processed });
}
