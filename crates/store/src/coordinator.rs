//! Outward facade: what a UI layer calls.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::warn;

use iapkit_core::{CatalogError, Product, ProductId};
use iapkit_events::{EventSink, StoreEvent};

use crate::catalog::CatalogFetcher;
use crate::entitlements::{EntitlementSet, EntitlementTracker};
use crate::listener::{ListenerError, ListenerState, UpdateListener};
use crate::pipeline::TransactionPipeline;
use crate::platform::PurchasePlatform;
use crate::purchase::{PurchaseExecutor, PurchaseOutcome};
use crate::verification::VerificationGate;

/// Purchase-entitlement coordinator.
///
/// Owns one of each component and wires them to a single platform and event
/// sink. Products must come from [`fetch_catalog`](Self::fetch_catalog)
/// before they can be purchased by ID.
pub struct StoreCoordinator {
    product_ids: Vec<ProductId>,
    catalog: CatalogFetcher,
    products: RwLock<HashMap<ProductId, Product>>,
    executor: PurchaseExecutor,
    tracker: Arc<EntitlementTracker>,
    listener: UpdateListener,
    sink: Arc<dyn EventSink>,
}

impl StoreCoordinator {
    pub fn new(
        platform: Arc<dyn PurchasePlatform>,
        sink: Arc<dyn EventSink>,
        product_ids: impl IntoIterator<Item = ProductId>,
    ) -> Self {
        let gate = VerificationGate::new(sink.clone());
        let tracker = Arc::new(EntitlementTracker::new(
            platform.clone(),
            gate.clone(),
            sink.clone(),
        ));
        let pipeline = Arc::new(TransactionPipeline::new(
            platform.clone(),
            gate,
            tracker.clone(),
            sink.clone(),
        ));

        Self {
            product_ids: product_ids.into_iter().collect(),
            catalog: CatalogFetcher::new(platform.clone(), sink.clone()),
            products: RwLock::new(HashMap::new()),
            executor: PurchaseExecutor::new(platform.clone(), pipeline.clone(), sink.clone()),
            tracker,
            listener: UpdateListener::new(platform, pipeline, sink.clone()),
            sink,
        }
    }

    pub fn product_ids(&self) -> &[ProductId] {
        &self.product_ids
    }

    /// Fetch the configured catalog and remember it for `purchase`.
    ///
    /// A failed fetch leaves the previously fetched catalog in place.
    pub async fn fetch_catalog(&self) -> Result<Vec<Product>, CatalogError> {
        let products = self.catalog.fetch(self.product_ids.iter().cloned()).await?;

        let mut cache = self.products.write().unwrap_or_else(PoisonError::into_inner);
        cache.clear();
        cache.extend(products.iter().map(|p| (p.id.clone(), p.clone())));
        Ok(products)
    }

    /// Products from the last successful catalog fetch, sorted by ID.
    pub fn catalog(&self) -> Vec<Product> {
        let mut products: Vec<Product> = self
            .products
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        products.sort_by(|a, b| a.id.cmp(&b.id));
        products
    }

    pub fn product(&self, product_id: &ProductId) -> Option<Product> {
        self.products
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(product_id)
            .cloned()
    }

    /// Purchase a product from the fetched catalog.
    pub async fn purchase(&self, product_id: &ProductId) -> PurchaseOutcome {
        let Some(product) = self.product(product_id) else {
            let reason = format!("product {product_id} is not in the fetched catalog");
            warn!(product_id = %product_id, "purchase of unknown product");
            self.sink.publish(StoreEvent::PurchaseFailed {
                product_id: product_id.clone(),
                reason: reason.clone(),
            });
            return PurchaseOutcome::Failed(reason);
        };
        self.executor.purchase(&product).await
    }

    pub fn is_owned(&self, product_id: &ProductId) -> bool {
        self.tracker.is_owned(product_id)
    }

    pub fn owned_products(&self) -> Vec<ProductId> {
        self.tracker.owned_products()
    }

    pub fn entitlements(&self) -> Arc<EntitlementSet> {
        self.tracker.snapshot()
    }

    /// Re-synchronize entitlements from the platform's authoritative record.
    ///
    /// Nothing refreshes on a schedule; callers decide when to restore.
    pub async fn restore(&self) -> Arc<EntitlementSet> {
        self.tracker.refresh().await
    }

    pub fn start_listening(&self) -> Result<(), ListenerError> {
        self.listener.start()
    }

    /// Request the update listener to stop; does not wait for it.
    pub fn stop_listening(&self) {
        self.listener.cancel();
    }

    /// Wait for a stopped listener's task to exit.
    pub async fn wait_stopped(&self) {
        self.listener.join().await;
    }

    pub fn listener_state(&self) -> ListenerState {
        self.listener.state()
    }
}
