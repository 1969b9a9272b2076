use core::fmt;

use serde::{Deserialize, Serialize};

use iapkit_core::{ProductId, TransactionId};

/// Where a transaction entered the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSource {
    /// Returned by a direct purchase call.
    Purchase,
    /// Delivered out of band by the platform update stream.
    Update,
    /// Read while rebuilding current entitlements.
    Entitlements,
}

impl TransactionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionSource::Purchase => "purchase",
            TransactionSource::Update => "update",
            TransactionSource::Entitlements => "entitlements",
        }
    }
}

/// A human-readable purchase milestone.
///
/// Events are facts: they are emitted after the step they describe happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    CatalogFetched {
        requested: usize,
        returned: usize,
    },
    CatalogFetchFailed {
        reason: String,
    },
    PurchaseStarted {
        product_id: ProductId,
    },
    PurchaseCompleted {
        product_id: ProductId,
        transaction_id: TransactionId,
    },
    PurchaseCancelled {
        product_id: ProductId,
    },
    PurchasePending {
        product_id: ProductId,
    },
    PurchaseFailed {
        product_id: ProductId,
        reason: String,
    },
    Verified {
        source: TransactionSource,
        product_id: ProductId,
        transaction_id: TransactionId,
    },
    VerificationFailed {
        source: TransactionSource,
        product_id: ProductId,
        transaction_id: TransactionId,
        reason: String,
    },
    TransactionFinished {
        product_id: ProductId,
        transaction_id: TransactionId,
    },
    TransactionFinishFailed {
        transaction_id: TransactionId,
        reason: String,
    },
    EntitlementsRefreshed {
        generation: u64,
        owned: usize,
    },
    ListenerStarted,
    ListenerStopped {
        processed: u64,
    },
}

impl StoreEvent {
    /// Stable event name (e.g. "purchase.completed").
    pub fn event_type(&self) -> &'static str {
        match self {
            StoreEvent::CatalogFetched { .. } => "catalog.fetched",
            StoreEvent::CatalogFetchFailed { .. } => "catalog.fetch_failed",
            StoreEvent::PurchaseStarted { .. } => "purchase.started",
            StoreEvent::PurchaseCompleted { .. } => "purchase.completed",
            StoreEvent::PurchaseCancelled { .. } => "purchase.cancelled",
            StoreEvent::PurchasePending { .. } => "purchase.pending",
            StoreEvent::PurchaseFailed { .. } => "purchase.failed",
            StoreEvent::Verified { .. } => "transaction.verified",
            StoreEvent::VerificationFailed { .. } => "transaction.verification_failed",
            StoreEvent::TransactionFinished { .. } => "transaction.finished",
            StoreEvent::TransactionFinishFailed { .. } => "transaction.finish_failed",
            StoreEvent::EntitlementsRefreshed { .. } => "entitlements.refreshed",
            StoreEvent::ListenerStarted => "listener.started",
            StoreEvent::ListenerStopped { .. } => "listener.stopped",
        }
    }

    /// Whether this event reports a failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            StoreEvent::CatalogFetchFailed { .. }
                | StoreEvent::PurchaseFailed { .. }
                | StoreEvent::VerificationFailed { .. }
                | StoreEvent::TransactionFinishFailed { .. }
        )
    }
}

impl fmt::Display for StoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreEvent::CatalogFetched { requested, returned } => {
                write!(f, "Fetched {returned} of {requested} requested products")
            }
            StoreEvent::CatalogFetchFailed { reason } => {
                write!(f, "Failed to fetch products: {reason}")
            }
            StoreEvent::PurchaseStarted { product_id } => {
                write!(f, "Purchasing {product_id}")
            }
            StoreEvent::PurchaseCompleted {
                product_id,
                transaction_id,
            } => write!(f, "Purchase of {product_id} completed ({transaction_id})"),
            StoreEvent::PurchaseCancelled { product_id } => {
                write!(f, "Purchase of {product_id} cancelled by user")
            }
            StoreEvent::PurchasePending { product_id } => {
                write!(f, "Purchase of {product_id} is pending approval")
            }
            StoreEvent::PurchaseFailed { product_id, reason } => {
                write!(f, "Purchase of {product_id} failed: {reason}")
            }
            StoreEvent::Verified {
                source,
                product_id,
                transaction_id,
            } => write!(
                f,
                "Verified {} transaction {transaction_id} for {product_id}",
                source.as_str()
            ),
            StoreEvent::VerificationFailed {
                source,
                product_id,
                transaction_id,
                reason,
            } => write!(
                f,
                "Unverified {} transaction {transaction_id} for {product_id}: {reason}",
                source.as_str()
            ),
            StoreEvent::TransactionFinished {
                product_id,
                transaction_id,
            } => write!(f, "Finished transaction {transaction_id} for {product_id}"),
            StoreEvent::TransactionFinishFailed {
                transaction_id,
                reason,
            } => write!(f, "Could not finish transaction {transaction_id}: {reason}"),
            StoreEvent::EntitlementsRefreshed { generation, owned } => {
                write!(f, "Entitlements refreshed (generation {generation}): {owned} owned")
            }
            StoreEvent::ListenerStarted => f.write_str("Listening for transaction updates"),
            StoreEvent::ListenerStopped { processed } => {
                write!(f, "Stopped listening after {processed} update(s)")
            }
        }
    }
}
