//! In-memory purchase platform for tests/dev and the demo binary.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

use iapkit_core::{
    PlatformError, Product, ProductId, PurchaseError, Transaction, TransactionId,
    VerificationResult,
};

use super::{PurchasePlatform, PurchaseResult, TransactionStream};

/// Scripted platform response for the next purchase of a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedPurchase {
    /// Issue a signed transaction.
    Succeed,
    /// Issue a transaction whose signature does not check out.
    Unverified(String),
    Cancel,
    Pending,
    Fail(PurchaseError),
}

#[derive(Debug, Default)]
struct State {
    catalog: BTreeMap<ProductId, Product>,
    scripts: HashMap<ProductId, VecDeque<ScriptedPurchase>>,
    /// Every transaction the platform issued, in issue order.
    ledger: Vec<Transaction>,
    /// Transactions whose entitlement record fails verification.
    tampered: HashSet<TransactionId>,
    finished: Vec<TransactionId>,
    fetch_error: Option<PlatformError>,
    finish_error: Option<PlatformError>,
    fetch_calls: usize,
    purchase_calls: usize,
}

/// Simulated platform.
///
/// - Current entitlements are the latest issued transaction per product
///   (consumables included, so a fresh purchase is observable).
/// - The update queue is an unbounded channel; `grant`, `revoke` and
///   `push_update` feed it the way a renewal or another device would.
/// - `updates()` hands the queue out once; later calls get an empty stream.
#[derive(Debug)]
pub struct InMemoryPlatform {
    state: Mutex<State>,
    updates_tx: mpsc::UnboundedSender<VerificationResult<Transaction>>,
    updates_rx: Mutex<Option<mpsc::UnboundedReceiver<VerificationResult<Transaction>>>>,
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(State::default()),
            updates_tx,
            updates_rx: Mutex::new(Some(updates_rx)),
        }
    }

    /// Seed the catalog.
    pub fn with_products(self, products: impl IntoIterator<Item = Product>) -> Self {
        {
            let mut state = self.state();
            for p in products {
                state.catalog.insert(p.id.clone(), p);
            }
        }
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a response for the next purchase of `product_id`.
    ///
    /// Unscripted purchases succeed.
    pub fn script_purchase(&self, product_id: &ProductId, response: ScriptedPurchase) {
        self.state()
            .scripts
            .entry(product_id.clone())
            .or_default()
            .push_back(response);
    }

    /// Make subsequent catalog fetches fail (`None` restores normal behavior).
    pub fn fail_fetch(&self, error: Option<PlatformError>) {
        self.state().fetch_error = error;
    }

    /// Make subsequent `finish_transaction` calls fail.
    pub fn fail_finish(&self, error: Option<PlatformError>) {
        self.state().finish_error = error;
    }

    /// Deliver an arbitrary item on the update queue.
    ///
    /// Returns `false` once the queue's consumer is gone.
    pub fn push_update(&self, result: VerificationResult<Transaction>) -> bool {
        self.updates_tx.send(result).is_ok()
    }

    /// Simulate a purchase made outside this process (another device, family
    /// sharing, a renewal): record it and deliver it on the update queue.
    pub fn grant(&self, product_id: &ProductId) -> Transaction {
        let tx = Transaction::new(product_id.clone(), Utc::now());
        self.state().ledger.push(tx.clone());
        self.push_update(VerificationResult::verified(tx.clone()));
        tx
    }

    /// Revoke the latest transaction for a product (refund) and deliver the
    /// revoked transaction on the update queue.
    pub fn revoke(&self, product_id: &ProductId, at: DateTime<Utc>) -> Option<Transaction> {
        let revoked = {
            let mut state = self.state();
            let tx = state
                .ledger
                .iter_mut()
                .rev()
                .find(|t| &t.product_id == product_id)?;
            tx.revocation_date = Some(at);
            tx.clone()
        };
        self.push_update(VerificationResult::verified(revoked.clone()));
        Some(revoked)
    }

    /// Make the entitlement record of the latest transaction for a product
    /// fail verification.
    pub fn tamper(&self, product_id: &ProductId) -> Option<TransactionId> {
        let mut state = self.state();
        let id = state
            .ledger
            .iter()
            .rev()
            .find(|t| &t.product_id == product_id)?
            .id;
        state.tampered.insert(id);
        Some(id)
    }

    /// Transactions acknowledged through `finish_transaction`, in call order.
    pub fn finished(&self) -> Vec<TransactionId> {
        self.state().finished.clone()
    }

    pub fn issued(&self) -> Vec<Transaction> {
        self.state().ledger.clone()
    }

    pub fn fetch_calls(&self) -> usize {
        self.state().fetch_calls
    }

    pub fn purchase_calls(&self) -> usize {
        self.state().purchase_calls
    }
}

#[async_trait]
impl PurchasePlatform for InMemoryPlatform {
    async fn fetch_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, PlatformError> {
        let mut state = self.state();
        state.fetch_calls += 1;
        if let Some(err) = &state.fetch_error {
            return Err(err.clone());
        }
        Ok(ids
            .iter()
            .filter_map(|id| state.catalog.get(id).cloned())
            .collect())
    }

    async fn purchase(&self, product: &Product) -> Result<PurchaseResult, PurchaseError> {
        let mut state = self.state();
        state.purchase_calls += 1;

        if !state.catalog.contains_key(&product.id) {
            return Err(PurchaseError::ProductUnavailable(product.id.clone()));
        }

        let script = state
            .scripts
            .get_mut(&product.id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(ScriptedPurchase::Succeed);
        debug!(product_id = %product.id, ?script, "simulated purchase");

        match script {
            ScriptedPurchase::Succeed => {
                let tx = Transaction::new(product.id.clone(), Utc::now());
                state.ledger.push(tx.clone());
                Ok(PurchaseResult::Success(VerificationResult::verified(tx)))
            }
            ScriptedPurchase::Unverified(reason) => {
                let tx = Transaction::new(product.id.clone(), Utc::now());
                Ok(PurchaseResult::Success(VerificationResult::unverified(tx, reason)))
            }
            ScriptedPurchase::Cancel => Ok(PurchaseResult::UserCancelled),
            ScriptedPurchase::Pending => Ok(PurchaseResult::Pending),
            ScriptedPurchase::Fail(err) => Err(err),
        }
    }

    async fn updates(&self) -> TransactionStream {
        let rx = self
            .updates_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match rx {
            Some(rx) => Box::pin(UnboundedReceiverStream::new(rx)),
            None => {
                warn!("update queue already handed out; returning an empty stream");
                Box::pin(tokio_stream::empty::<VerificationResult<Transaction>>())
            }
        }
    }

    async fn current_entitlements(&self) -> TransactionStream {
        let state = self.state();
        let mut latest: BTreeMap<ProductId, Transaction> = BTreeMap::new();
        for tx in &state.ledger {
            latest.insert(tx.product_id.clone(), tx.clone());
        }
        let items: Vec<_> = latest
            .into_values()
            .map(|tx| {
                if state.tampered.contains(&tx.id) {
                    VerificationResult::unverified(tx, "signature mismatch")
                } else {
                    VerificationResult::verified(tx)
                }
            })
            .collect();
        Box::pin(tokio_stream::iter(items))
    }

    async fn finish_transaction(&self, transaction: &Transaction) -> Result<(), PlatformError> {
        let mut state = self.state();
        if let Some(err) = &state.finish_error {
            return Err(err.clone());
        }
        state.finished.push(transaction.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iapkit_core::ProductKind;
    use tokio_stream::StreamExt;

    fn pid(s: &str) -> ProductId {
        ProductId::new(s).unwrap()
    }

    fn platform() -> InMemoryPlatform {
        InMemoryPlatform::new().with_products([
            Product::new(pid("A"), ProductKind::Consumable, "$0.99"),
            Product::new(pid("B"), ProductKind::NonConsumable, "$4.99"),
        ])
    }

    #[tokio::test]
    async fn fetch_skips_unknown_ids() {
        let p = platform();
        let products = p.fetch_products(&[pid("A"), pid("Z")]).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, pid("A"));
        assert_eq!(p.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn scripted_responses_are_consumed_in_order() {
        let p = platform();
        let b = p.fetch_products(&[pid("B")]).await.unwrap().remove(0);
        p.script_purchase(&b.id, ScriptedPurchase::Cancel);

        assert_eq!(p.purchase(&b).await.unwrap(), PurchaseResult::UserCancelled);
        assert!(matches!(p.purchase(&b).await.unwrap(), PurchaseResult::Success(_)));
        assert_eq!(p.issued().len(), 1);
    }

    #[tokio::test]
    async fn entitlements_report_latest_transaction_per_product() {
        let p = platform();
        p.grant(&pid("B"));
        let second = p.grant(&pid("B"));

        let items: Vec<_> = p.current_entitlements().await.collect().await;
        assert_eq!(items, vec![VerificationResult::verified(second)]);
    }

    #[tokio::test]
    async fn update_queue_is_handed_out_once() {
        let p = platform();
        let mut first = p.updates().await;
        let mut second = p.updates().await;

        let tx = p.grant(&pid("A"));
        assert_eq!(first.next().await, Some(VerificationResult::verified(tx)));
        assert_eq!(second.next().await, None);
    }
}
