//! User Stats Model
//!
//! Per (campaign, user) ledger. `pending_quantity` tracks allowance held by
//! live PENDING orders so a user cannot bypass `max_per_user` by opening
//! parallel unpaid reservations; `total_purchased` counts PAID orders only.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per (campaign, user) purchase ledger. Created lazily on first
/// reservation attempt; never deleted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStats {
    pub campaign_id: i64,
    pub user_id: i64,
    /// Quantity from orders that reached PAID
    pub total_purchased: Decimal,
    /// Quantity held by PENDING orders (returned on cancel/expiry)
    pub pending_quantity: Decimal,
    /// Number of PAID orders
    pub total_orders: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_purchase_at: Option<i64>,
}

impl UserStats {
    pub fn new(campaign_id: i64, user_id: i64) -> Self {
        Self {
            campaign_id,
            user_id,
            ..Default::default()
        }
    }

    /// Quantity counted against the per-user cap right now
    pub fn counted(&self) -> Decimal {
        self.total_purchased + self.pending_quantity
    }

    /// Remaining allowance under `max_per_user`, floored at zero
    pub fn remaining(&self, max_per_user: Decimal) -> Decimal {
        (max_per_user - self.counted()).max(Decimal::ZERO)
    }

    pub fn has_reached_limit(&self, max_per_user: Decimal) -> bool {
        self.counted() >= max_per_user
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_pending_counts_against_allowance() {
        let mut stats = UserStats::new(1, 2);
        stats.total_purchased = d("2.0");
        stats.pending_quantity = d("1.5");
        assert_eq!(stats.remaining(d("5.0")), d("1.5"));
        assert!(!stats.has_reached_limit(d("5.0")));
        stats.pending_quantity = d("3.0");
        assert!(stats.has_reached_limit(d("5.0")));
    }

    #[test]
    fn test_remaining_floors_at_zero() {
        let mut stats = UserStats::new(1, 2);
        stats.total_purchased = d("7.0");
        assert_eq!(stats.remaining(d("5.0")), Decimal::ZERO);
    }
}
