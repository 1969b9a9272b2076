//! Walks through a purchase session against the simulated platform and
//! prints the debug log, the way a storefront screen would render it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;

use iapkit_events::{InMemoryEventSink, TeeSink, TracingEventSink};
use iapkit_infra::StoreConfig;
use iapkit_store::{PurchaseOutcome, StoreCoordinator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    iapkit_observability::init();

    let config = StoreConfig::from_env().context("failed to load configuration")?;
    let (platform, product_ids) = config
        .build_platform()
        .context("failed to build simulated platform")?;
    let platform = Arc::new(platform);
    let debug_log = Arc::new(InMemoryEventSink::new());

    let sink = Arc::new(TeeSink(debug_log.clone(), TracingEventSink));

    let store = StoreCoordinator::new(platform.clone(), sink, product_ids);

    let catalog = store.fetch_catalog().await.context("failed to fetch catalog")?;
    println!("{:<24} {:<28} {:>8}", "PRODUCT", "KIND", "PRICE");
    for product in &catalog {
        println!(
            "{:<24} {:<28} {:>8}",
            product.display_name, product.kind, product.display_price
        );
    }

    if config.listen_updates {
        store.start_listening().context("failed to start update listener")?;
    }

    for product in &catalog {
        let outcome = store.purchase(&product.id).await;
        let label = match &outcome {
            PurchaseOutcome::Completed(tx) => format!("completed ({})", tx.id),
            PurchaseOutcome::Cancelled => "cancelled".to_string(),
            PurchaseOutcome::Pending => "pending".to_string(),
            PurchaseOutcome::Failed(reason) => format!("failed: {reason}"),
        };
        println!("purchase {} -> {label}", product.id);
    }

    // Simulate a refund arriving out of band.
    if let Some(first) = catalog.first() {
        if platform.revoke(&first.id, Utc::now()).is_some() && config.listen_updates {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    let restored = store.restore().await;
    println!(
        "owned after restore (generation {}): {:?}",
        restored.generation(),
        restored.iter().map(|id| id.as_str()).collect::<Vec<_>>()
    );

    store.stop_listening();
    store.wait_stopped().await;

    println!("\n--- debug log ---");
    for line in debug_log.lines() {
        println!("{line}");
    }
    tracing::info!(events = debug_log.len(), "demo finished");
    Ok(())
}
