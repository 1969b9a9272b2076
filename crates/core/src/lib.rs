//! `iapkit-core` — purchase domain primitives.
//!
//! This crate contains **pure domain** types (no IO, no async): product
//! descriptors, platform transactions, the verified/unverified sum type and
//! the error taxonomy shared by the coordinator and its adapters.

pub mod error;
pub mod id;
pub mod product;
pub mod transaction;

pub use error::{
    CatalogError, CoreError, CoreResult, PlatformError, PurchaseError, VerificationError,
};
pub use id::{ProductId, TransactionId};
pub use product::{Product, ProductKind};
pub use transaction::{Transaction, VerificationResult};
