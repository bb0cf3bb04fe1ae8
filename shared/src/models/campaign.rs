//! Campaign Model
//!
//! A campaign sells one fabric lot at a flash price inside a fixed time
//! window. The three quantity counters are the heart of the engine:
//!
//! ```text
//! available = total_quantity - sold_quantity - reserved_quantity
//! ```
//!
//! Invariant: `sold_quantity + reserved_quantity <= total_quantity`, all
//! counters >= 0. The counters are mutated only by the reservation engine.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

pub type CampaignId = i64;

/// Campaign lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    /// Created by an operator, waiting for `start_time`
    #[default]
    Scheduled,
    /// Selling
    Active,
    /// `end_time` passed
    Ended,
    /// Operator cancelled (pre-sale, or with no sold stock)
    Cancelled,
    /// `available` hit zero while selling
    SoldOut,
}

impl CampaignStatus {
    /// Terminal statuses accept no further admin edits
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            CampaignStatus::Ended | CampaignStatus::Cancelled | CampaignStatus::SoldOut
        )
    }
}

/// Campaign model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,

    // === Fabric reference (display snapshot, catalog service owns the rest) ===
    pub fabric_id: i64,
    pub fabric_name: String,

    // === Sale info ===
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    // === Pricing ===
    pub original_price: Decimal,
    pub flash_price: Decimal,

    // === Quantity counters (meters of fabric, 2 decimal places) ===
    pub total_quantity: Decimal,
    pub sold_quantity: Decimal,
    pub reserved_quantity: Decimal,

    // === Per-user limits ===
    pub max_per_user: Decimal,
    pub min_purchase: Decimal,

    // === Timing (Unix millis) ===
    pub start_time: i64,
    pub end_time: i64,

    pub status: CampaignStatus,

    // === Display ===
    pub priority: i32,
    pub is_featured: bool,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Campaign {
    /// Stock not yet sold or reserved; the only quantity purchasable now
    pub fn available(&self) -> Decimal {
        self.total_quantity - self.sold_quantity - self.reserved_quantity
    }

    /// Sold percentage (0-100)
    pub fn sold_percentage(&self) -> i32 {
        if self.total_quantity.is_zero() {
            return 0;
        }
        ((self.sold_quantity / self.total_quantity) * Decimal::ONE_HUNDRED)
            .round()
            .to_i32()
            .unwrap_or(0)
    }

    /// Discount percentage relative to the original price (0-100)
    pub fn discount_percent(&self) -> i32 {
        if self.original_price.is_zero() {
            return 0;
        }
        (((self.original_price - self.flash_price) / self.original_price) * Decimal::ONE_HUNDRED)
            .round()
            .to_i32()
            .unwrap_or(0)
    }

    pub fn is_within_window(&self, now: i64) -> bool {
        now >= self.start_time && now <= self.end_time
    }

    /// Active status, inside the window, with stock left
    pub fn is_selling(&self, now: i64) -> bool {
        self.status == CampaignStatus::Active
            && self.is_within_window(now)
            && self.available() > Decimal::ZERO
    }
}

/// Input for creating a campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignCreate {
    pub fabric_id: i64,
    pub fabric_name: String,
    pub name: String,
    pub description: Option<String>,
    pub original_price: Decimal,
    pub flash_price: Decimal,
    pub total_quantity: Decimal,
    /// Defaults to 5.00 meters
    pub max_per_user: Option<Decimal>,
    /// Defaults to 0.50 meters
    pub min_purchase: Option<Decimal>,
    pub start_time: i64,
    pub end_time: i64,
    pub priority: Option<i32>,
    pub is_featured: Option<bool>,
}

/// Partial update for a campaign; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub flash_price: Option<Decimal>,
    pub total_quantity: Option<Decimal>,
    pub max_per_user: Option<Decimal>,
    pub min_purchase: Option<Decimal>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub priority: Option<i32>,
    pub is_featured: Option<bool>,
}

/// Listing view of a campaign, optionally annotated with the caller's
/// own purchase stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub id: CampaignId,
    pub fabric_id: i64,
    pub fabric_name: String,
    pub name: String,
    pub original_price: Decimal,
    pub flash_price: Decimal,
    pub discount_percent: i32,
    pub available_quantity: Decimal,
    pub sold_percentage: i32,
    pub max_per_user: Decimal,
    pub min_purchase: Decimal,
    pub start_time: i64,
    pub end_time: i64,
    /// Seconds until start (Scheduled) or until end (Active)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<i64>,
    pub status: CampaignStatus,
    pub priority: i32,
    pub is_featured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_purchased: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_remaining: Option<Decimal>,
}
