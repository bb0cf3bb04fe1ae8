//! Sale Order Model
//!
//! One customer's purchase intent against a campaign. Status transitions
//! are monotonic:
//!
//! ```text
//! Pending ──▶ Paid ──▶ Refunded
//!    │
//!    ├──▶ Cancelled   (customer action)
//!    └──▶ Expired     (sweeper, deadline lapsed)
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type OrderId = i64;

/// Order lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Awaiting payment; holds a stock reservation
    #[default]
    Pending,
    /// Payment confirmed; reservation converted to sold stock
    Paid,
    /// Customer cancelled while pending; reservation released
    Cancelled,
    /// Payment deadline lapsed; reservation released
    Expired,
    /// Refunded after payment; sold stock is NOT automatically restored
    Refunded,
}

impl OrderStatus {
    /// Only Pending orders accept cancel / confirm / expire
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending | OrderStatus::Paid)
    }
}

/// Sale order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleOrder {
    pub id: OrderId,
    /// Display-only code, e.g. `FS-1722945600000-A1B2C3`
    pub order_code: String,

    pub campaign_id: i64,
    pub user_id: i64,
    /// Reservation backing this order while pending
    pub reservation_id: i64,

    pub quantity: Decimal,
    /// Flash price snapshot taken at reservation time
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    /// `(original_price - flash_price) * quantity`, for display
    pub discount_amount: Decimal,

    pub status: OrderStatus,

    /// Unix millis after which the order is eligible for expiry
    pub payment_deadline: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<i64>,

    // === Shipping snapshot ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_note: Option<String>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl SaleOrder {
    pub fn is_past_deadline(&self, now: i64) -> bool {
        now > self.payment_deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Paid.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
    }

    #[test]
    fn test_status_serde_screaming_snake() {
        let json = serde_json::to_string(&OrderStatus::Paid).unwrap();
        assert_eq!(json, "\"PAID\"");
        let back: OrderStatus = serde_json::from_str("\"EXPIRED\"").unwrap();
        assert_eq!(back, OrderStatus::Expired);
    }
}
