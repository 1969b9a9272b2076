//! Error taxonomy.
//!
//! Each boundary gets its own enum so call sites have to say which failure
//! they are handling. `PlatformError` is the transport-level failure the
//! others wrap.

use thiserror::Error;

use crate::id::ProductId;

/// Result type for identifier/value validation.
pub type CoreResult<T> = Result<T, CoreError>;

/// Value-level validation error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An identifier was invalid (e.g. empty or parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Generic communication failure with the purchase platform.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// Network / transport level failure.
    #[error("platform communication failed: {0}")]
    Communication(String),

    /// The platform service is not reachable right now.
    #[error("platform unavailable")]
    Unavailable,
}

impl PlatformError {
    pub fn communication(msg: impl Into<String>) -> Self {
        Self::Communication(msg.into())
    }
}

/// Failure while resolving product identifiers to descriptors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog fetch failed: {0}")]
    Platform(#[from] PlatformError),
}

/// A transaction's signature / receipt check failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("transaction failed verification: {reason}")]
pub struct VerificationError {
    pub reason: String,
}

impl VerificationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Platform-level purchase failure.
///
/// User cancellation and deferred (pending) purchases are *not* errors; the
/// platform reports those as regular results.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PurchaseError {
    /// The product cannot be purchased (removed from sale, unknown, ...).
    #[error("product unavailable: {0}")]
    ProductUnavailable(ProductId),

    /// Purchases are disabled for this account/device.
    #[error("purchases are not allowed")]
    NotAllowed,

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_error_wraps_platform_error() {
        let err: CatalogError = PlatformError::communication("timeout").into();
        assert_eq!(
            err.to_string(),
            "catalog fetch failed: platform communication failed: timeout"
        );
    }

    #[test]
    fn purchase_error_is_transparent_over_platform_error() {
        let err: PurchaseError = PlatformError::Unavailable.into();
        assert_eq!(err.to_string(), "platform unavailable");
    }

    #[test]
    fn verification_error_displays_reason() {
        let err = VerificationError::new("bad signature");
        assert_eq!(err.to_string(), "transaction failed verification: bad signature");
    }
}
