//! Owned-product tracking.
//!
//! The entitlement set is a **snapshot**: each refresh reads the platform's
//! full entitlement record, folds it into a fresh set and publishes the
//! result in one swap. Queries never see a half-built set, and refreshes are
//! serialized so two of them never interleave.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use tokio_stream::StreamExt;
use tracing::{debug, info};

use iapkit_core::{ProductId, Transaction};
use iapkit_events::{EventSink, StoreEvent, TransactionSource};

use crate::platform::PurchasePlatform;
use crate::verification::VerificationGate;

/// Products currently owned, as of one refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitlementSet {
    generation: u64,
    owned: BTreeSet<ProductId>,
}

impl EntitlementSet {
    /// Refresh counter; `0` means no refresh has completed yet.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.owned.contains(product_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProductId> {
        self.owned.iter()
    }

    pub fn len(&self) -> usize {
        self.owned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owned.is_empty()
    }

    pub fn to_vec(&self) -> Vec<ProductId> {
        self.owned.iter().cloned().collect()
    }
}

/// Apply one verified transaction to a set under construction.
///
/// Later transactions for the same product win.
pub(crate) fn apply_transaction(owned: &mut BTreeSet<ProductId>, tx: &Transaction) {
    if tx.is_revoked() {
        owned.remove(&tx.product_id);
    } else {
        owned.insert(tx.product_id.clone());
    }
}

pub struct EntitlementTracker {
    platform: Arc<dyn PurchasePlatform>,
    gate: VerificationGate,
    sink: Arc<dyn EventSink>,
    /// Held for the whole refresh; guards the generation counter.
    refresh_lock: Mutex<u64>,
    snapshot: RwLock<Arc<EntitlementSet>>,
}

impl EntitlementTracker {
    pub fn new(
        platform: Arc<dyn PurchasePlatform>,
        gate: VerificationGate,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            platform,
            gate,
            sink,
            refresh_lock: Mutex::new(0),
            snapshot: RwLock::new(Arc::new(EntitlementSet::default())),
        }
    }

    /// Rebuild the entitlement set from the platform's current record.
    ///
    /// - verified, not revoked: owned
    /// - verified, revoked: not owned
    /// - unverified: logged and skipped
    ///
    /// Safe to call concurrently; callers queue behind the refresh in flight.
    pub async fn refresh(&self) -> Arc<EntitlementSet> {
        let mut generation = self.refresh_lock.lock().await;

        let mut owned = BTreeSet::new();
        let mut skipped = 0usize;
        let mut entitlements = self.platform.current_entitlements().await;
        while let Some(item) = entitlements.next().await {
            match self.gate.verify(item, TransactionSource::Entitlements) {
                Ok(tx) => apply_transaction(&mut owned, &tx),
                Err(_) => skipped += 1,
            }
        }

        *generation += 1;
        let next = Arc::new(EntitlementSet {
            generation: *generation,
            owned,
        });
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = next.clone();

        if skipped > 0 {
            debug!(skipped, "unverified entitlements ignored");
        }
        info!(generation = next.generation, owned = next.len(), "entitlements refreshed");
        self.sink.publish(StoreEvent::EntitlementsRefreshed {
            generation: next.generation,
            owned: next.len(),
        });
        next
    }

    /// The last published snapshot.
    pub fn snapshot(&self) -> Arc<EntitlementSet> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_owned(&self, product_id: &ProductId) -> bool {
        self.snapshot().contains(product_id)
    }

    pub fn owned_products(&self) -> Vec<ProductId> {
        self.snapshot().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use iapkit_core::{Product, ProductKind};
    use iapkit_events::InMemoryEventSink;

    use crate::platform::InMemoryPlatform;

    fn pid(s: &str) -> ProductId {
        ProductId::new(s).unwrap()
    }

    fn setup() -> (Arc<EntitlementTracker>, Arc<InMemoryPlatform>, Arc<InMemoryEventSink>) {
        let platform = Arc::new(InMemoryPlatform::new().with_products([
            Product::new(pid("A"), ProductKind::NonConsumable, "$0.99"),
            Product::new(pid("B"), ProductKind::AutoRenewableSubscription, "$2.99"),
        ]));
        let sink = Arc::new(InMemoryEventSink::new());
        let tracker = EntitlementTracker::new(
            platform.clone(),
            VerificationGate::new(sink.clone()),
            sink.clone(),
        );
        (Arc::new(tracker), platform, sink)
    }

    #[tokio::test]
    async fn starts_empty_at_generation_zero() {
        let (tracker, _, _) = setup();
        let snap = tracker.snapshot();
        assert_eq!(snap.generation(), 0);
        assert!(snap.is_empty());
    }

    #[tokio::test]
    async fn verified_unrevoked_transactions_are_owned() {
        let (tracker, platform, _) = setup();
        platform.grant(&pid("A"));

        let snap = tracker.refresh().await;
        assert!(snap.contains(&pid("A")));
        assert!(tracker.is_owned(&pid("A")));
        assert!(!tracker.is_owned(&pid("B")));
    }

    #[tokio::test]
    async fn revocation_removes_ownership_on_next_refresh() {
        let (tracker, platform, _) = setup();
        platform.grant(&pid("B"));
        tracker.refresh().await;
        assert!(tracker.is_owned(&pid("B")));

        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        platform.revoke(&pid("B"), at).unwrap();
        let snap = tracker.refresh().await;

        assert!(!tracker.is_owned(&pid("B")));
        assert_eq!(snap.generation(), 2);
    }

    #[tokio::test]
    async fn unverified_entitlements_are_skipped() {
        let (tracker, platform, sink) = setup();
        platform.grant(&pid("A"));
        platform.tamper(&pid("A")).unwrap();

        tracker.refresh().await;

        assert!(!tracker.is_owned(&pid("A")));
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, StoreEvent::VerificationFailed { .. })));
    }

    #[test]
    fn upgraded_subscription_stays_owned_until_revoked() {
        let mut owned = BTreeSet::new();
        let tx = Transaction::new(pid("B"), Utc::now()).upgraded();
        assert!(tx.is_upgraded);

        apply_transaction(&mut owned, &tx);
        assert!(owned.contains(&pid("B")));

        apply_transaction(&mut owned, &tx.clone().revoked_at(Utc::now()));
        assert!(!owned.contains(&pid("B")));
    }

    #[tokio::test]
    async fn concurrent_refreshes_each_get_their_own_generation() {
        let (tracker, platform, _) = setup();
        platform.grant(&pid("A"));

        let (a, b) = tokio::join!(tracker.refresh(), tracker.refresh());

        let mut generations = [a.generation(), b.generation()];
        generations.sort_unstable();
        assert_eq!(generations, [1, 2]);
        assert_eq!(tracker.snapshot().generation(), 2);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: membership reflects the last transaction seen per product.
            #[test]
            fn last_transaction_per_product_decides(
                ops in prop::collection::vec((0usize..4, any::<bool>()), 0..40)
            ) {
                let products = ["A", "B", "C", "D"];
                let mut owned = BTreeSet::new();
                let mut last: [Option<bool>; 4] = [None; 4];

                for (idx, revoked) in &ops {
                    let mut tx = Transaction::new(pid(products[*idx]), Utc::now());
                    if *revoked {
                        tx = tx.revoked_at(Utc::now());
                    }
                    apply_transaction(&mut owned, &tx);
                    last[*idx] = Some(*revoked);
                }

                for (idx, name) in products.iter().enumerate() {
                    let expected = last[idx] == Some(false);
                    prop_assert_eq!(owned.contains(&pid(name)), expected);
                }
            }
        }
    }
}
