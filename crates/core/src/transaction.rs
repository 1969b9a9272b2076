//! Platform transactions and the verified/unverified wrapper.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{ProductId, TransactionId};

/// A purchase record issued by the platform.
///
/// Owned by the platform; this crate only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub product_id: ProductId,
    pub purchase_date: DateTime<Utc>,
    /// Set when the platform retracted the entitlement (refund, family
    /// sharing change, ...).
    pub revocation_date: Option<DateTime<Utc>>,
    /// The user moved to a higher tier of the same subscription group.
    pub is_upgraded: bool,
}

impl Transaction {
    pub fn new(product_id: ProductId, purchase_date: DateTime<Utc>) -> Self {
        Self {
            id: TransactionId::new(),
            product_id,
            purchase_date,
            revocation_date: None,
            is_upgraded: false,
        }
    }

    pub fn revoked_at(mut self, at: DateTime<Utc>) -> Self {
        self.revocation_date = Some(at);
        self
    }

    pub fn upgraded(mut self) -> Self {
        self.is_upgraded = true;
        self
    }

    pub fn is_revoked(&self) -> bool {
        self.revocation_date.is_some()
    }
}

/// Outcome of the platform's signature check on a value.
///
/// Both arms carry the value so callers can log what was rejected, but only
/// the verification gate may unwrap it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult<T> {
    Verified(T),
    Unverified(T, String),
}

impl<T> VerificationResult<T> {
    pub fn verified(value: T) -> Self {
        Self::Verified(value)
    }

    pub fn unverified(value: T, reason: impl Into<String>) -> Self {
        Self::Unverified(value, reason.into())
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified(_))
    }

    /// Borrow the wrapped value regardless of verification (for logging only).
    pub fn payload(&self) -> &T {
        match self {
            Self::Verified(v) | Self::Unverified(v, _) => v,
        }
    }
}
