//! Integration tests for the full purchase pipeline.
//!
//! Tests: Config → InMemoryPlatform → StoreCoordinator → EventSink
//!
//! Verifies:
//! - Catalog fetch, purchase and verification grant ownership
//! - Revocations delivered later remove ownership
//! - The update listener survives unverified items and stops on request

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use iapkit_core::{Product, ProductId, ProductKind, Transaction, VerificationResult};
    use iapkit_events::{InMemoryEventSink, StoreEvent};
    use iapkit_store::{
        InMemoryPlatform, ListenerState, PurchaseOutcome, ScriptedPurchase, StoreCoordinator,
    };

    use crate::config::{CatalogFile, StoreConfig};

    fn pid(s: &str) -> ProductId {
        ProductId::new(s).unwrap()
    }

    fn setup(products: Vec<Product>) -> (StoreCoordinator, Arc<InMemoryPlatform>, Arc<InMemoryEventSink>) {
        let ids: Vec<ProductId> = products.iter().map(|p| p.id.clone()).collect();
        let platform = Arc::new(InMemoryPlatform::new().with_products(products));
        let sink = Arc::new(InMemoryEventSink::new());
        let store = StoreCoordinator::new(platform.clone(), sink.clone(), ids);
        (store, platform, sink)
    }

    /// Helper: poll until the listener task has caught up.
    async fn wait_for(cond: impl Fn() -> bool) -> bool {
        for _ in 0..100 {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cond()
    }

    #[tokio::test]
    async fn consumable_purchase_is_verified_and_owned() {
        let (store, platform, sink) =
            setup(vec![Product::new(pid("A"), ProductKind::Consumable, "$0.99")]);

        let catalog = store.fetch_catalog().await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].display_price, "$0.99");

        let outcome = store.purchase(&pid("A")).await;

        assert!(outcome.is_completed());
        assert!(store.is_owned(&pid("A")));
        assert_eq!(platform.finished().len(), 1);

        let types: Vec<&str> = sink.events().iter().map(StoreEvent::event_type).collect();
        assert_eq!(
            types,
            vec![
                "catalog.fetched",
                "purchase.started",
                "transaction.verified",
                "transaction.finished",
                "transaction.verified",
                "entitlements.refreshed",
                "purchase.completed",
            ]
        );
    }

    #[tokio::test]
    async fn revocation_observed_by_a_later_refresh_removes_ownership() {
        let (store, platform, _) =
            setup(vec![Product::new(pid("B"), ProductKind::NonConsumable, "$4.99")]);
        platform.grant(&pid("B"));

        assert!(store.restore().await.contains(&pid("B")));

        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        platform.revoke(&pid("B"), at).unwrap();
        store.restore().await;

        assert!(!store.is_owned(&pid("B")));
    }

    #[tokio::test]
    async fn cancelled_purchase_does_not_touch_entitlements() {
        let (store, platform, _) =
            setup(vec![Product::new(pid("A"), ProductKind::NonConsumable, "$1.99")]);
        store.fetch_catalog().await.unwrap();
        platform.script_purchase(&pid("A"), ScriptedPurchase::Cancel);

        let before = store.entitlements();
        let outcome = store.purchase(&pid("A")).await;

        assert_eq!(outcome, PurchaseOutcome::Cancelled);
        assert_eq!(store.entitlements(), before);
    }

    #[tokio::test]
    async fn listener_handles_renewals_refunds_and_forgeries() {
        let (store, platform, sink) = setup(vec![
            Product::new(pid("A"), ProductKind::NonConsumable, "$0.99"),
            Product::new(pid("pro"), ProductKind::AutoRenewableSubscription, "$4.99"),
        ]);
        store.start_listening().unwrap();

        // Renewal from another device.
        platform.grant(&pid("pro"));
        assert!(wait_for(|| store.is_owned(&pid("pro"))).await);

        // Forged update: logged, listener keeps going.
        platform.push_update(VerificationResult::unverified(
            Transaction::new(pid("A"), Utc::now()),
            "bad signature",
        ));
        platform.grant(&pid("A"));
        assert!(wait_for(|| store.is_owned(&pid("A"))).await);

        // Refund.
        platform.revoke(&pid("pro"), Utc::now()).unwrap();
        assert!(wait_for(|| !store.is_owned(&pid("pro"))).await);

        store.stop_listening();
        store.wait_stopped().await;
        assert_eq!(store.listener_state(), ListenerState::Cancelled);

        let failures = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, StoreEvent::VerificationFailed { .. }))
            .count();
        assert_eq!(failures, 1);
    }

    #[tokio::test]
    async fn builtin_config_drives_a_full_session() {
        let config = StoreConfig::default();
        let (platform, ids) = config.build_platform().unwrap();
        assert_eq!(ids.len(), CatalogFile::builtin().products.len());

        let sink = Arc::new(InMemoryEventSink::new());
        let store = StoreCoordinator::new(Arc::new(platform), sink, ids.clone());

        store.fetch_catalog().await.unwrap();
        for id in &ids {
            assert!(store.purchase(id).await.is_completed());
        }
        assert_eq!(store.owned_products().len(), ids.len());
    }
}
