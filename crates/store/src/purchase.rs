use std::sync::Arc;

use tracing::{info, warn};

use iapkit_core::{Product, Transaction};
use iapkit_events::{EventSink, StoreEvent, TransactionSource};

use crate::pipeline::TransactionPipeline;
use crate::platform::{PurchasePlatform, PurchaseResult};

/// Closed set of purchase results a caller (UI) has to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    Completed(Transaction),
    Cancelled,
    Pending,
    Failed(String),
}

impl PurchaseOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PurchaseOutcome::Completed(_))
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            PurchaseOutcome::Completed(tx) => Some(tx),
            _ => None,
        }
    }
}

/// Submits purchases and turns every platform answer into a
/// [`PurchaseOutcome`]. Nothing thrown by the platform escapes.
pub struct PurchaseExecutor {
    platform: Arc<dyn PurchasePlatform>,
    pipeline: Arc<TransactionPipeline>,
    sink: Arc<dyn EventSink>,
}

impl PurchaseExecutor {
    pub fn new(
        platform: Arc<dyn PurchasePlatform>,
        pipeline: Arc<TransactionPipeline>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            platform,
            pipeline,
            sink,
        }
    }

    pub async fn purchase(&self, product: &Product) -> PurchaseOutcome {
        let product_id = product.id.clone();
        info!(product_id = %product_id, kind = %product.kind, "purchase started");
        self.sink.publish(StoreEvent::PurchaseStarted {
            product_id: product_id.clone(),
        });

        let result = match self.platform.purchase(product).await {
            Ok(result) => result,
            Err(err) => {
                warn!(product_id = %product_id, error = %err, "purchase failed");
                return self.failed(product, err.to_string());
            }
        };

        match result {
            PurchaseResult::Success(signed) => {
                match self.pipeline.process(signed, TransactionSource::Purchase).await {
                    Ok(tx) => {
                        info!(product_id = %product_id, transaction_id = %tx.id, "purchase completed");
                        self.sink.publish(StoreEvent::PurchaseCompleted {
                            product_id,
                            transaction_id: tx.id,
                        });
                        PurchaseOutcome::Completed(tx)
                    }
                    Err(err) => self.failed(product, err.to_string()),
                }
            }
            PurchaseResult::UserCancelled => {
                info!(product_id = %product_id, "purchase cancelled by user");
                self.sink.publish(StoreEvent::PurchaseCancelled { product_id });
                PurchaseOutcome::Cancelled
            }
            PurchaseResult::Pending => {
                info!(product_id = %product_id, "purchase pending");
                self.sink.publish(StoreEvent::PurchasePending { product_id });
                PurchaseOutcome::Pending
            }
        }
    }

    fn failed(&self, product: &Product, reason: String) -> PurchaseOutcome {
        self.sink.publish(StoreEvent::PurchaseFailed {
            product_id: product.id.clone(),
            reason: reason.clone(),
        });
        PurchaseOutcome::Failed(reason)
    }
}
