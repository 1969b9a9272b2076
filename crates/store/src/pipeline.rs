use std::sync::Arc;

use tracing::{info, warn};

use iapkit_core::{Transaction, VerificationError, VerificationResult};
use iapkit_events::{EventSink, StoreEvent, TransactionSource};

use crate::entitlements::EntitlementTracker;
use crate::platform::PurchasePlatform;
use crate::verification::VerificationGate;

/// Shared handling of a signed transaction: verify, finish, refresh.
///
/// Used by both the purchase path and the update listener so the two can
/// never diverge on what "accepting a transaction" means.
pub struct TransactionPipeline {
    platform: Arc<dyn PurchasePlatform>,
    gate: VerificationGate,
    tracker: Arc<EntitlementTracker>,
    sink: Arc<dyn EventSink>,
}

impl TransactionPipeline {
    pub fn new(
        platform: Arc<dyn PurchasePlatform>,
        gate: VerificationGate,
        tracker: Arc<EntitlementTracker>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            platform,
            gate,
            tracker,
            sink,
        }
    }

    pub fn tracker(&self) -> &Arc<EntitlementTracker> {
        &self.tracker
    }

    /// Accept a transaction.
    ///
    /// Unverified transactions are rejected before anything is acknowledged
    /// or refreshed. A failed acknowledgement is reported but does not undo
    /// acceptance; the platform keeps unfinished transactions queued and
    /// re-delivers them on the update stream.
    pub async fn process(
        &self,
        result: VerificationResult<Transaction>,
        source: TransactionSource,
    ) -> Result<Transaction, VerificationError> {
        let tx = self.gate.verify(result, source)?;

        match self.platform.finish_transaction(&tx).await {
            Ok(()) => {
                info!(
                    source = source.as_str(),
                    product_id = %tx.product_id,
                    transaction_id = %tx.id,
                    "transaction finished"
                );
                self.sink.publish(StoreEvent::TransactionFinished {
                    product_id: tx.product_id.clone(),
                    transaction_id: tx.id,
                });
            }
            Err(err) => {
                warn!(transaction_id = %tx.id, error = %err, "failed to finish transaction");
                self.sink.publish(StoreEvent::TransactionFinishFailed {
                    transaction_id: tx.id,
                    reason: err.to_string(),
                });
            }
        }

        self.tracker.refresh().await;
        Ok(tx)
    }
}
