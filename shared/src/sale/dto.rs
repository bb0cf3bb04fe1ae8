//! Purchase request/receipt types

use crate::models::OrderStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Purchase input - everything the customer supplies besides identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// Meters of fabric, at most 2 decimal places
    pub quantity: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_note: Option<String>,
}

impl PurchaseRequest {
    pub fn of(quantity: Decimal) -> Self {
        Self {
            quantity,
            shipping_name: None,
            shipping_phone: None,
            shipping_address: None,
            customer_note: None,
        }
    }
}

/// Successful purchase summary returned to the customer
///
/// Carries everything the confirmation screen shows: the countdown, the
/// savings, and the caller's updated allowance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub order_id: i64,
    pub order_code: String,
    pub campaign_id: i64,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub saved_amount: Decimal,
    pub status: OrderStatus,
    pub payment_deadline: i64,
    pub payment_remaining_seconds: i64,
    /// Stock left for other buyers after this reservation
    pub remaining_stock: Decimal,
    pub sold_percentage: i32,
    pub user_total_purchased: Decimal,
    pub user_remaining_limit: Decimal,
}
