//! Single chokepoint for signature checks.
//!
//! Every transaction, whether it comes from a direct purchase, the update
//! stream or the entitlement record, goes through [`VerificationGate::verify`]
//! before anything treats it as valid.

use std::sync::Arc;

use tracing::{debug, warn};

use iapkit_core::{ProductId, Transaction, TransactionId, VerificationError, VerificationResult};
use iapkit_events::{EventSink, StoreEvent, TransactionSource};

/// A value the platform signs, identified well enough to be logged.
pub trait VerificationSubject {
    fn product_id(&self) -> &ProductId;
    fn transaction_id(&self) -> TransactionId;
}

impl VerificationSubject for Transaction {
    fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    fn transaction_id(&self) -> TransactionId {
        self.id
    }
}

#[derive(Clone)]
pub struct VerificationGate {
    sink: Arc<dyn EventSink>,
}

impl core::fmt::Debug for VerificationGate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VerificationGate").finish_non_exhaustive()
    }
}

impl VerificationGate {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// Unwrap a verified value.
    ///
    /// Unverified results always fail and their payload is dropped here, so
    /// a caller can never act on it by accident.
    pub fn verify<T>(
        &self,
        result: VerificationResult<T>,
        source: TransactionSource,
    ) -> Result<T, VerificationError>
    where
        T: VerificationSubject,
    {
        match result {
            VerificationResult::Verified(value) => {
                debug!(
                    source = source.as_str(),
                    product_id = %value.product_id(),
                    transaction_id = %value.transaction_id(),
                    "transaction verified"
                );
                self.sink.publish(StoreEvent::Verified {
                    source,
                    product_id: value.product_id().clone(),
                    transaction_id: value.transaction_id(),
                });
                Ok(value)
            }
            VerificationResult::Unverified(value, reason) => {
                warn!(
                    source = source.as_str(),
                    product_id = %value.product_id(),
                    transaction_id = %value.transaction_id(),
                    reason = %reason,
                    "transaction failed verification"
                );
                self.sink.publish(StoreEvent::VerificationFailed {
                    source,
                    product_id: value.product_id().clone(),
                    transaction_id: value.transaction_id(),
                    reason: reason.clone(),
                });
                Err(VerificationError::new(reason))
            }
        }
    }
}
