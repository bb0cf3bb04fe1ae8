//! User Limit Tracker
//!
//! Per (campaign, user) allowance ledger. The purchase path locks the
//! user's entry across its check-then-reserve sequence, so two concurrent
//! requests from the same user cannot both pass the allowance check before
//! either order is recorded. Entries are created lazily and never deleted.

use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use shared::models::{OrderStatus, UserStats};
use std::sync::Arc;

pub struct UserLimitTracker {
    stats: DashMap<(i64, i64), Arc<Mutex<UserStats>>>,
}

impl UserLimitTracker {
    pub fn new() -> Self {
        Self {
            stats: DashMap::new(),
        }
    }

    /// Lock cell for a (campaign, user) pair, created on first use.
    /// The caller holds the lock across allowance check + reserve.
    pub fn entry(&self, campaign_id: i64, user_id: i64) -> Arc<Mutex<UserStats>> {
        self.stats
            .entry((campaign_id, user_id))
            .or_insert_with(|| Arc::new(Mutex::new(UserStats::new(campaign_id, user_id))))
            .value()
            .clone()
    }

    /// Snapshot of a user's ledger, if one exists
    pub fn get(&self, campaign_id: i64, user_id: i64) -> Option<UserStats> {
        self.stats
            .get(&(campaign_id, user_id))
            .map(|cell| cell.value().lock().clone())
    }

    /// Record the outcome of an order's lifecycle transition.
    ///
    /// Paid settles the held quantity into `total_purchased`;
    /// Cancelled/Expired return it to the allowance. Other statuses do not
    /// touch the ledger.
    pub fn record_outcome(
        &self,
        campaign_id: i64,
        user_id: i64,
        quantity: Decimal,
        outcome: OrderStatus,
        now: i64,
    ) {
        let cell = self.entry(campaign_id, user_id);
        let mut stats = cell.lock();
        match outcome {
            OrderStatus::Paid => {
                stats.pending_quantity = (stats.pending_quantity - quantity).max(Decimal::ZERO);
                stats.total_purchased += quantity;
                stats.total_orders += 1;
                stats.last_purchase_at = Some(now);
            }
            OrderStatus::Cancelled | OrderStatus::Expired => {
                stats.pending_quantity = (stats.pending_quantity - quantity).max(Decimal::ZERO);
            }
            other => {
                tracing::warn!(campaign_id, user_id, outcome = ?other, "Ignoring ledger outcome");
            }
        }
    }
}

impl Default for UserLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_entry_is_lazy_and_stable() {
        let tracker = UserLimitTracker::new();
        assert!(tracker.get(1, 2).is_none());
        let cell = tracker.entry(1, 2);
        cell.lock().pending_quantity = d("1.00");
        assert_eq!(tracker.get(1, 2).unwrap().pending_quantity, d("1.00"));
    }

    #[test]
    fn test_paid_outcome_settles_pending() {
        let tracker = UserLimitTracker::new();
        tracker.entry(1, 2).lock().pending_quantity = d("2.00");

        tracker.record_outcome(1, 2, d("2.00"), OrderStatus::Paid, 1_000);
        let stats = tracker.get(1, 2).unwrap();
        assert_eq!(stats.pending_quantity, Decimal::ZERO);
        assert_eq!(stats.total_purchased, d("2.00"));
        assert_eq!(stats.total_orders, 1);
        assert_eq!(stats.last_purchase_at, Some(1_000));
    }

    #[test]
    fn test_expired_outcome_returns_allowance() {
        let tracker = UserLimitTracker::new();
        tracker.entry(1, 2).lock().pending_quantity = d("3.00");

        tracker.record_outcome(1, 2, d("3.00"), OrderStatus::Expired, 1_000);
        let stats = tracker.get(1, 2).unwrap();
        assert_eq!(stats.pending_quantity, Decimal::ZERO);
        assert_eq!(stats.total_purchased, Decimal::ZERO);
        assert_eq!(stats.total_orders, 0);
    }
}
