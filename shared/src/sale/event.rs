//! Sale event stream
//!
//! Every successful state transition is broadcast so listeners
//! (notifications, projections, dashboards) can react without polling.

use crate::util::now_millis;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Event kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleEventKind {
    OrderCreated,
    OrderPaid,
    OrderCancelled,
    OrderExpired,
    OrderRefunded,
    CampaignActivated,
    CampaignEnded,
    CampaignSoldOut,
}

/// A broadcast domain event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleEvent {
    pub kind: SaleEventKind,
    pub campaign_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    /// Unix millis
    pub timestamp: i64,
}

impl SaleEvent {
    /// Order-scoped event
    pub fn order(
        kind: SaleEventKind,
        campaign_id: i64,
        order_id: i64,
        user_id: i64,
        quantity: Decimal,
    ) -> Self {
        Self {
            kind,
            campaign_id,
            order_id: Some(order_id),
            user_id: Some(user_id),
            quantity: Some(quantity),
            timestamp: now_millis(),
        }
    }

    /// Campaign-scoped event (activation, end, sold out)
    pub fn campaign(kind: SaleEventKind, campaign_id: i64) -> Self {
        Self {
            kind,
            campaign_id,
            order_id: None,
            user_id: None,
            quantity: None,
            timestamp: now_millis(),
        }
    }
}
