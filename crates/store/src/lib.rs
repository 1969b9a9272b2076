//! `iapkit-store` — purchase-entitlement coordinator.
//!
//! **Responsibility:** the decision logic between a UI and an in-app purchase
//! platform. The platform (catalog, payment sheet, receipt signing,
//! transaction queue) is injected through [`PurchasePlatform`]; this crate
//! only decides what to do with what it returns.
//!
//! ```text
//! fetch_catalog ─► CatalogFetcher ─────────────────────► platform.fetch_products
//! purchase ──────► PurchaseExecutor ─┐
//!                                    ├─► TransactionPipeline: verify ► finish ► refresh
//! platform.updates ► UpdateListener ─┘                                         │
//! is_owned ◄──────────────────────────────────── EntitlementTracker snapshot ◄─┘
//! ```

pub mod catalog;
pub mod coordinator;
pub mod entitlements;
pub mod listener;
pub mod pipeline;
pub mod platform;
pub mod purchase;
pub mod verification;

pub use catalog::CatalogFetcher;
pub use coordinator::StoreCoordinator;
pub use entitlements::{EntitlementSet, EntitlementTracker};
pub use listener::{ListenerError, ListenerState, UpdateListener};
pub use pipeline::TransactionPipeline;
pub use platform::{InMemoryPlatform, PurchasePlatform, PurchaseResult, ScriptedPurchase, TransactionStream};
pub use purchase::{PurchaseExecutor, PurchaseOutcome};
pub use verification::{VerificationGate, VerificationSubject};
