//! Error taxonomy for the flash-sale engine
//!
//! Every failure a caller can see carries a stable [`ErrorCode`] so the UI
//! can message the customer precisely (sold out vs. limit exceeded vs.
//! below minimum), plus whatever fields that message needs.
//!
//! Only [`SaleError::RetryExhausted`] represents a transient condition that
//! is safe to retry from the caller; all other errors require corrected
//! input or a different order state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error codes for client-side dispatch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    CampaignNotFound,
    CampaignNotActive,
    OutOfStock,
    MinQuantity,
    LimitExceeded,
    OrderNotFound,
    OrderNotPending,
    PaymentDeadlinePassed,
    RetryExhausted,
    AccessDenied,
    Conflict,
    ValidationFailed,
    StorageError,
}

impl ErrorCode {
    /// Wire representation, matches the serde rename
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::CampaignNotFound => "CAMPAIGN_NOT_FOUND",
            ErrorCode::CampaignNotActive => "CAMPAIGN_NOT_ACTIVE",
            ErrorCode::OutOfStock => "OUT_OF_STOCK",
            ErrorCode::MinQuantity => "MIN_QUANTITY",
            ErrorCode::LimitExceeded => "LIMIT_EXCEEDED",
            ErrorCode::OrderNotFound => "ORDER_NOT_FOUND",
            ErrorCode::OrderNotPending => "ORDER_NOT_PENDING",
            ErrorCode::PaymentDeadlinePassed => "PAYMENT_DEADLINE_PASSED",
            ErrorCode::RetryExhausted => "RETRY_EXHAUSTED",
            ErrorCode::AccessDenied => "ACCESS_DENIED",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::StorageError => "STORAGE_ERROR",
        }
    }

    /// Whether a caller may safely retry the same request unchanged
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorCode::RetryExhausted)
    }
}

/// Engine error type
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SaleError {
    #[error("Campaign not found: {0}")]
    CampaignNotFound(i64),

    #[error("Campaign is not active: {0}")]
    CampaignNotActive(String),

    /// Reservation could not be satisfied; `available` is what is left
    #[error("Insufficient stock: {available} available")]
    InsufficientStock { available: Decimal },

    #[error("Minimum purchase is {min}")]
    BelowMinimumPurchase { min: Decimal },

    #[error("Purchase limit exceeded: {remaining} of {max} remaining")]
    UserLimitExceeded { remaining: Decimal, max: Decimal },

    #[error("Order not found: {0}")]
    OrderNotFound(i64),

    #[error("Order is not pending: {0}")]
    OrderNotPending(i64),

    #[error("Payment deadline has passed")]
    PaymentDeadlinePassed,

    /// Contention retry budget exhausted; transient, safe to retry
    #[error("Could not acquire reservation, retry budget exhausted")]
    RetryExhausted,

    #[error("Access denied")]
    AccessDenied,

    /// Lost a compare-and-swap race (stale status observed)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SaleError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SaleError::CampaignNotFound(_) => ErrorCode::CampaignNotFound,
            SaleError::CampaignNotActive(_) => ErrorCode::CampaignNotActive,
            SaleError::InsufficientStock { .. } => ErrorCode::OutOfStock,
            SaleError::BelowMinimumPurchase { .. } => ErrorCode::MinQuantity,
            SaleError::UserLimitExceeded { .. } => ErrorCode::LimitExceeded,
            SaleError::OrderNotFound(_) => ErrorCode::OrderNotFound,
            SaleError::OrderNotPending(_) => ErrorCode::OrderNotPending,
            SaleError::PaymentDeadlinePassed => ErrorCode::PaymentDeadlinePassed,
            SaleError::RetryExhausted => ErrorCode::RetryExhausted,
            SaleError::AccessDenied => ErrorCode::AccessDenied,
            SaleError::Conflict(_) => ErrorCode::Conflict,
            SaleError::Validation(_) => ErrorCode::ValidationFailed,
            SaleError::Storage(_) => ErrorCode::StorageError,
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        SaleError::Validation(msg.into())
    }
}

pub type SaleResult<T> = Result<T, SaleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            SaleError::InsufficientStock {
                available: Decimal::ZERO
            }
            .code()
            .as_str(),
            "OUT_OF_STOCK"
        );
        assert_eq!(
            SaleError::UserLimitExceeded {
                remaining: Decimal::ONE,
                max: Decimal::TWO,
            }
            .code()
            .as_str(),
            "LIMIT_EXCEEDED"
        );
    }

    #[test]
    fn test_only_retry_exhausted_is_transient() {
        assert!(SaleError::RetryExhausted.code().is_transient());
        assert!(!SaleError::PaymentDeadlinePassed.code().is_transient());
        assert!(!SaleError::AccessDenied.code().is_transient());
    }
}
