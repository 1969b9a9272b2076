//! Boundary to the purchase platform.
//!
//! Everything behind [`PurchasePlatform`] is external: catalog lookup, the
//! payment sheet, receipt signing and the platform's transaction queue. The
//! coordinator consumes it and never owns its lifecycle.

use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;

use iapkit_core::{PlatformError, Product, ProductId, PurchaseError, Transaction, VerificationResult};

pub mod in_memory;

pub use in_memory::{InMemoryPlatform, ScriptedPurchase};

/// Lazy sequence of signed transactions delivered by the platform.
pub type TransactionStream = Pin<Box<dyn Stream<Item = VerificationResult<Transaction>> + Send>>;

/// What the platform reports for a purchase request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseResult {
    /// The payment went through; the transaction still has to be verified.
    Success(VerificationResult<Transaction>),
    /// The user dismissed the payment sheet.
    UserCancelled,
    /// The purchase awaits approval (e.g. parental consent).
    Pending,
}

/// In-app purchase platform.
///
/// ## Streams
///
/// - `updates()` is infinite and **not restartable**: the platform hands out
///   a single queue of out-of-band transactions (renewals, restores,
///   purchases made on other devices). Call it once.
/// - `current_entitlements()` is finite and yields one pass over the
///   platform's authoritative entitlement record per call.
///
/// ## Thread Safety
///
/// Implementations are shared between the purchase path and the update
/// listener task, hence `Send + Sync`.
#[async_trait]
pub trait PurchasePlatform: Send + Sync {
    async fn fetch_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, PlatformError>;

    async fn purchase(&self, product: &Product) -> Result<PurchaseResult, PurchaseError>;

    async fn updates(&self) -> TransactionStream;

    async fn current_entitlements(&self) -> TransactionStream;

    /// Acknowledge that a transaction was processed.
    ///
    /// Assumed idempotent, but nothing here relies on it.
    async fn finish_transaction(&self, transaction: &Transaction) -> Result<(), PlatformError>;
}
