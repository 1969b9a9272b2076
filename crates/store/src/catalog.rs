use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{info, warn};

use iapkit_core::{CatalogError, Product, ProductId};
use iapkit_events::{EventSink, StoreEvent};

use crate::platform::PurchasePlatform;

/// Resolves product identifiers to product descriptors.
#[derive(Clone)]
pub struct CatalogFetcher {
    platform: Arc<dyn PurchasePlatform>,
    sink: Arc<dyn EventSink>,
}

impl CatalogFetcher {
    pub fn new(platform: Arc<dyn PurchasePlatform>, sink: Arc<dyn EventSink>) -> Self {
        Self { platform, sink }
    }

    /// Fetch descriptors for `ids`.
    ///
    /// Duplicate IDs collapse to one entry; output order is whatever the
    /// platform returns. IDs the platform does not know are logged and left
    /// out. An empty request never reaches the platform.
    pub async fn fetch(
        &self,
        ids: impl IntoIterator<Item = ProductId>,
    ) -> Result<Vec<Product>, CatalogError> {
        let requested: BTreeSet<ProductId> = ids.into_iter().collect();
        if requested.is_empty() {
            return Ok(Vec::new());
        }

        let request: Vec<ProductId> = requested.iter().cloned().collect();
        let fetched = match self.platform.fetch_products(&request).await {
            Ok(products) => products,
            Err(err) => {
                warn!(error = %err, requested = request.len(), "catalog fetch failed");
                self.sink.publish(StoreEvent::CatalogFetchFailed {
                    reason: err.to_string(),
                });
                return Err(CatalogError::from(err));
            }
        };

        let mut seen = HashSet::new();
        let products: Vec<Product> = fetched
            .into_iter()
            .filter(|p| requested.contains(&p.id) && seen.insert(p.id.clone()))
            .collect();

        let missing: Vec<&ProductId> = requested.iter().filter(|id| !seen.contains(*id)).collect();
        if !missing.is_empty() {
            warn!(?missing, "platform did not return some requested products");
        }

        info!(requested = requested.len(), returned = products.len(), "catalog fetched");
        self.sink.publish(StoreEvent::CatalogFetched {
            requested: requested.len(),
            returned: products.len(),
        });
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iapkit_core::{PlatformError, ProductKind};
    use iapkit_events::InMemoryEventSink;

    use crate::platform::InMemoryPlatform;

    fn pid(s: &str) -> ProductId {
        ProductId::new(s).unwrap()
    }

    fn setup() -> (CatalogFetcher, Arc<InMemoryPlatform>, Arc<InMemoryEventSink>) {
        let platform = Arc::new(InMemoryPlatform::new().with_products([
            Product::new(pid("A"), ProductKind::Consumable, "$0.99"),
            Product::new(pid("B"), ProductKind::AutoRenewableSubscription, "$2.99"),
        ]));
        let sink = Arc::new(InMemoryEventSink::new());
        (CatalogFetcher::new(platform.clone(), sink.clone()), platform, sink)
    }

    #[tokio::test]
    async fn duplicate_ids_collapse_to_one_entry() {
        let (fetcher, _, _) = setup();
        let products = fetcher.fetch([pid("A"), pid("A"), pid("B")]).await.unwrap();
        assert_eq!(products.len(), 2);
    }

    #[tokio::test]
    async fn unknown_ids_are_omitted() {
        let (fetcher, _, sink) = setup();
        let products = fetcher.fetch([pid("A"), pid("nope")]).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(
            sink.events(),
            vec![StoreEvent::CatalogFetched {
                requested: 2,
                returned: 1
            }]
        );
    }

    #[tokio::test]
    async fn empty_request_skips_the_platform() {
        let (fetcher, platform, _) = setup();
        let products = fetcher.fetch(Vec::new()).await.unwrap();
        assert!(products.is_empty());
        assert_eq!(platform.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn platform_failure_maps_to_catalog_error() {
        let (fetcher, platform, sink) = setup();
        platform.fail_fetch(Some(PlatformError::Unavailable));

        let err = fetcher.fetch([pid("A")]).await.unwrap_err();
        assert_eq!(err, CatalogError::Platform(PlatformError::Unavailable));
        assert!(sink.events()[0].is_failure());
    }
}
