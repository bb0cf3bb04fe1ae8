//! Expiry Sweeper
//!
//! Periodically expires PENDING orders whose payment deadline has lapsed,
//! releasing their reservations back to the available pool, and rolls
//! campaign window statuses. Registered as `TaskKind::Periodic` and shut
//! down via the engine's `CancellationToken`.
//!
//! `sweep_once(now)` is public and synchronous so tests can step time and
//! trigger a single pass deterministically instead of racing the timer.
//!
//! The sweep is not transactional across orders: each expiry is an
//! independent atomic transition, and an order that a customer cancelled
//! or paid in the meantime is simply skipped (a stale read, not an error).

use crate::orders::SaleManager;
use shared::SaleError;
use shared::util::now_millis;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result of one sweep pass
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepStats {
    /// Orders transitioned to Expired
    pub expired: usize,
    /// Orders that lost the race to cancel/confirm (stale reads)
    pub skipped: usize,
    /// Orders whose expiry failed for another reason
    pub failed: usize,
}

/// Background expiry sweeper
pub struct ExpirySweeper {
    manager: Arc<SaleManager>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl ExpirySweeper {
    pub fn new(manager: Arc<SaleManager>, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            manager,
            interval,
            shutdown,
        }
    }

    /// 主循环：周期触发，直到收到 shutdown 信号
    pub async fn run(self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Expiry sweeper started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Expiry sweeper received shutdown signal");
                    break;
                }
            }

            let stats = self.sweep_once(now_millis());
            if stats.expired > 0 || stats.failed > 0 {
                tracing::info!(
                    expired = stats.expired,
                    skipped = stats.skipped,
                    failed = stats.failed,
                    "Expiry sweep finished"
                );
            }
        }

        tracing::info!("Expiry sweeper stopped");
    }

    /// One sweep pass at the given instant
    pub fn sweep_once(&self, now: i64) -> SweepStats {
        // 1. Campaign windows first, so freshly ended campaigns stop selling
        self.manager.roll_campaigns(now);

        // 2. Expire lapsed pending orders
        let due = match self.manager.storage().pending_due(now) {
            Ok(due) => due,
            Err(e) => {
                tracing::error!(error = %e, "Failed to scan pending orders");
                return SweepStats::default();
            }
        };

        let mut stats = SweepStats::default();
        for order_id in due {
            match self.manager.expire_order(order_id, now) {
                Ok(_) => stats.expired += 1,
                Err(SaleError::OrderNotPending(_)) => {
                    // Customer cancelled or paid between the scan and here
                    tracing::debug!(order_id, "Skipping order, no longer pending");
                    stats.skipped += 1;
                }
                Err(e) => {
                    // Log and keep going; one bad order must not halt the batch
                    tracing::error!(order_id, error = %e, "Failed to expire order");
                    stats.failed += 1;
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use rust_decimal::Decimal;
    use shared::models::{CampaignCreate, CampaignStatus, OrderStatus};
    use shared::sale::PurchaseRequest;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn manager_with_ttl(ttl_secs: u64) -> Arc<SaleManager> {
        let mut config = Config::from_env();
        config.payment_ttl_secs = ttl_secs;
        Arc::new(SaleManager::in_memory(&config).unwrap())
    }

    fn open_campaign(manager: &SaleManager, total: &str) -> i64 {
        let now = now_millis();
        manager
            .campaigns()
            .create(CampaignCreate {
                fabric_id: 1,
                fabric_name: "Denim 12oz".to_string(),
                name: "Denim flash".to_string(),
                description: None,
                original_price: d("15.00"),
                flash_price: d("9.00"),
                total_quantity: d(total),
                max_per_user: Some(d("5.00")),
                min_purchase: Some(d("0.50")),
                start_time: now - 1_000,
                end_time: now + 3_600_000,
                priority: None,
                is_featured: None,
            })
            .unwrap()
            .id
    }

    fn sweeper_for(manager: &Arc<SaleManager>) -> ExpirySweeper {
        ExpirySweeper::new(
            manager.clone(),
            Duration::from_secs(30),
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_sweep_expires_lapsed_order_and_releases_stock() {
        let manager = manager_with_ttl(0);
        let campaign_id = open_campaign(&manager, "3.00");
        let receipt = manager
            .purchase(campaign_id, 100, PurchaseRequest::of(d("3.00")))
            .unwrap();
        assert_eq!(manager.campaigns().get(campaign_id).unwrap().available(), Decimal::ZERO);

        let sweeper = sweeper_for(&manager);
        let stats = sweeper.sweep_once(now_millis() + 10);

        assert_eq!(stats.expired, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(
            manager.get_order(receipt.order_id, 100).unwrap().status,
            OrderStatus::Expired
        );
        // Stock came back and the campaign reopened
        let campaign = manager.campaigns().get(campaign_id).unwrap();
        assert_eq!(campaign.available(), d("3.00"));
        assert_eq!(campaign.status, CampaignStatus::Active);
    }

    #[test]
    fn test_sweep_leaves_unexpired_orders_alone() {
        let manager = manager_with_ttl(600);
        let campaign_id = open_campaign(&manager, "3.00");
        let receipt = manager
            .purchase(campaign_id, 100, PurchaseRequest::of(d("1.00")))
            .unwrap();

        let sweeper = sweeper_for(&manager);
        let stats = sweeper.sweep_once(now_millis());
        assert_eq!(stats.expired, 0);
        assert_eq!(
            manager.get_order(receipt.order_id, 100).unwrap().status,
            OrderStatus::Pending
        );
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let manager = manager_with_ttl(0);
        let campaign_id = open_campaign(&manager, "3.00");
        manager
            .purchase(campaign_id, 100, PurchaseRequest::of(d("2.00")))
            .unwrap();

        let sweeper = sweeper_for(&manager);
        let later = now_millis() + 10;
        assert_eq!(sweeper.sweep_once(later).expired, 1);
        // Second pass finds nothing pending
        let stats = sweeper.sweep_once(later);
        assert_eq!(stats.expired, 0);
        assert_eq!(stats.skipped, 0);
        assert_eq!(
            manager.campaigns().get(campaign_id).unwrap().available(),
            d("3.00")
        );
    }

    #[test]
    fn test_sweep_skips_order_paid_in_the_meantime() {
        let manager = manager_with_ttl(600);
        let campaign_id = open_campaign(&manager, "3.00");
        let receipt = manager
            .purchase(campaign_id, 100, PurchaseRequest::of(d("1.00")))
            .unwrap();
        manager
            .confirm_payment(receipt.order_id, 100, "CARD")
            .unwrap();

        // Even far in the future, a paid order is not expired
        let sweeper = sweeper_for(&manager);
        let stats = sweeper.sweep_once(now_millis() + 10_000_000);
        assert_eq!(stats.expired, 0);
        assert_eq!(
            manager.get_order(receipt.order_id, 100).unwrap().status,
            OrderStatus::Paid
        );
    }

    #[test]
    fn test_sweep_rolls_campaign_windows() {
        let manager = manager_with_ttl(600);
        let now = now_millis();
        let id = manager
            .campaigns()
            .create(CampaignCreate {
                fabric_id: 1,
                fabric_name: "Denim 12oz".to_string(),
                name: "Short window".to_string(),
                description: None,
                original_price: d("15.00"),
                flash_price: d("9.00"),
                total_quantity: d("3.00"),
                max_per_user: None,
                min_purchase: None,
                start_time: now - 2_000,
                end_time: now + 1_000,
                priority: None,
                is_featured: None,
            })
            .unwrap()
            .id;

        let sweeper = sweeper_for(&manager);
        sweeper.sweep_once(now);
        assert_eq!(
            manager.campaigns().get(id).unwrap().status,
            CampaignStatus::Active
        );

        sweeper.sweep_once(now + 2_000);
        assert_eq!(
            manager.campaigns().get(id).unwrap().status,
            CampaignStatus::Ended
        );
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let manager = manager_with_ttl(600);
        let token = CancellationToken::new();
        let sweeper = ExpirySweeper::new(manager, Duration::from_secs(3600), token.clone());

        let handle = tokio::spawn(sweeper.run());
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop promptly")
            .unwrap();
    }
}
