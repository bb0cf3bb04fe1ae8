//! SaleManager - order lifecycle state machine and engine facade
//!
//! # Purchase Flow
//!
//! ```text
//! purchase(campaign, user, req)
//!     ├─ 1. Eager window check (Scheduled past start → Active, past end → Ended)
//!     ├─ 2. Validate quantity ≥ min_purchase
//!     ├─ 3. Lock the user's ledger entry
//!     ├─ 4. Allowance check (paid + pending vs max_per_user)
//!     ├─ 5. ReservationEngine::reserve  ← the only side effect so far
//!     ├─ 6. Hold quantity in the ledger, unlock
//!     ├─ 7. Persist Pending order with payment deadline (redb)
//!     └─ 8. Broadcast OrderCreated, return receipt
//! ```
//!
//! Steps 1-4 are pure checks; a failure before step 5 mutates nothing, and
//! a storage failure after it compensates by releasing the reservation, so
//! the operation is atomic from the caller's perspective.
//!
//! # Transitions
//!
//! confirm / cancel / expire each run inside a single redb write
//! transaction and start with a status precondition read, so of racing
//! transitions on one order exactly one wins; the losers see a non-pending
//! order and report `OrderNotPending`.

use crate::campaigns::{CampaignStore, ReservationEngine, UserLimitTracker};
use crate::core::Config;
use crate::orders::money;
use crate::orders::storage::{OrderStorage, StorageError};
use crate::utils::validation::{
    self, MAX_ADDRESS_LEN, MAX_NAME_LEN, MAX_NOTE_LEN, MAX_SHORT_TEXT_LEN,
};
use chrono::Local;
use rust_decimal::Decimal;
use shared::models::{CampaignStatus, CampaignSummary, OrderStatus, SaleOrder, UserStats};
use shared::sale::{PurchaseReceipt, PurchaseRequest, SaleEvent, SaleEventKind};
use shared::util::{now_millis, remaining_seconds, snowflake_id};
use shared::{SaleError, SaleResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Event broadcast channel capacity (burst campaigns produce event spikes)
const EVENT_CHANNEL_CAPACITY: usize = 8192;

/// Order lifecycle manager
///
/// The `epoch` field is a unique identifier generated on each startup.
/// Embedders use it to detect engine restarts and refresh their caches.
pub struct SaleManager {
    storage: OrderStorage,
    campaigns: Arc<CampaignStore>,
    engine: ReservationEngine,
    limits: UserLimitTracker,
    event_tx: broadcast::Sender<SaleEvent>,
    /// Engine instance epoch - unique ID generated on startup
    epoch: String,
    payment_ttl_millis: i64,
}

impl std::fmt::Debug for SaleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaleManager")
            .field("epoch", &self.epoch)
            .field("payment_ttl_millis", &self.payment_ttl_millis)
            .finish()
    }
}

impl SaleManager {
    /// Create a manager with file-backed order storage under the work dir
    pub fn new(config: &Config, campaigns: Arc<CampaignStore>) -> SaleResult<Self> {
        std::fs::create_dir_all(&config.work_dir)
            .map_err(|e| SaleError::Storage(format!("cannot create work dir: {e}")))?;
        let path = std::path::Path::new(&config.work_dir).join("orders.redb");
        let storage = OrderStorage::open(path)?;
        Ok(Self::with_storage(storage, campaigns, config))
    }

    /// Create a manager over existing storage
    pub fn with_storage(
        storage: OrderStorage,
        campaigns: Arc<CampaignStore>,
        config: &Config,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let epoch = uuid::Uuid::new_v4().to_string();
        let engine = ReservationEngine::new(
            campaigns.clone(),
            Duration::from_millis(config.reserve_lock_timeout_ms),
        );
        tracing::info!(epoch = %epoch, "SaleManager started with new epoch");
        Self {
            storage,
            campaigns,
            engine,
            limits: UserLimitTracker::new(),
            event_tx,
            epoch,
            payment_ttl_millis: config.payment_ttl_millis(),
        }
    }

    /// In-memory manager with its own campaign store (tests, ephemeral use)
    pub fn in_memory(config: &Config) -> SaleResult<Self> {
        let storage = OrderStorage::open_in_memory()?;
        Ok(Self::with_storage(
            storage,
            Arc::new(CampaignStore::new()),
            config,
        ))
    }

    /// Get the engine epoch (unique instance ID)
    pub fn epoch(&self) -> &str {
        &self.epoch
    }

    /// Subscribe to event broadcasts
    pub fn subscribe(&self) -> broadcast::Receiver<SaleEvent> {
        self.event_tx.subscribe()
    }

    /// Campaign store (admin operations go through here)
    pub fn campaigns(&self) -> &Arc<CampaignStore> {
        &self.campaigns
    }

    /// Underlying order storage
    pub fn storage(&self) -> &OrderStorage {
        &self.storage
    }

    /// Ledger snapshot for a (campaign, user) pair
    pub fn user_stats(&self, campaign_id: i64, user_id: i64) -> Option<UserStats> {
        self.limits.get(campaign_id, user_id)
    }

    /// Generate next order code (crash-safe via redb counter)
    fn next_order_code(&self) -> String {
        let count = self.storage.next_order_count().unwrap_or(1);
        let date_str = Local::now().format("%Y%m%d").to_string();
        format!("FS{}{}", date_str, 10000 + count)
    }

    fn broadcast(&self, event: SaleEvent) {
        let _ = self.event_tx.send(event);
    }

    // ========================================================================
    // Purchase
    // ========================================================================

    /// Reserve stock and create a Pending order
    pub fn purchase(
        &self,
        campaign_id: i64,
        user_id: i64,
        request: PurchaseRequest,
    ) -> SaleResult<PurchaseReceipt> {
        let now = now_millis();
        let quantity = request.quantity;
        tracing::info!(campaign_id, user_id, quantity = %quantity, "Purchase attempt");

        // 1. Eager window check: never sell on a stale status
        let campaign = self.campaigns.refresh_window(campaign_id, now)?;
        match campaign.status {
            CampaignStatus::Active => {}
            CampaignStatus::SoldOut => {
                return Err(SaleError::InsufficientStock {
                    available: campaign.available(),
                });
            }
            CampaignStatus::Scheduled => {
                return Err(SaleError::CampaignNotActive(format!(
                    "campaign starts in {} seconds",
                    remaining_seconds(now, campaign.start_time)
                )));
            }
            CampaignStatus::Ended => {
                return Err(SaleError::CampaignNotActive("campaign has ended".into()));
            }
            CampaignStatus::Cancelled => {
                return Err(SaleError::CampaignNotActive(
                    "campaign was cancelled".into(),
                ));
            }
        }

        // 2. Input validation
        money::validate_quantity(quantity)?;
        if quantity < campaign.min_purchase {
            return Err(SaleError::BelowMinimumPurchase {
                min: campaign.min_purchase,
            });
        }
        validation::validate_optional_text(&request.shipping_name, "shipping_name", MAX_NAME_LEN)?;
        validation::validate_optional_text(
            &request.shipping_phone,
            "shipping_phone",
            MAX_SHORT_TEXT_LEN,
        )?;
        validation::validate_optional_text(
            &request.shipping_address,
            "shipping_address",
            MAX_ADDRESS_LEN,
        )?;
        validation::validate_optional_text(&request.customer_note, "customer_note", MAX_NOTE_LEN)?;

        // 3.-6. Allowance check and reserve under the user's ledger lock.
        // Pending orders count against the cap, so parallel unpaid orders
        // cannot bypass it.
        let deadline = now + self.payment_ttl_millis;
        let stats_cell = self.limits.entry(campaign_id, user_id);
        let mut stats = stats_cell.lock();

        let remaining = stats.remaining(campaign.max_per_user);
        if remaining < quantity {
            return Err(SaleError::UserLimitExceeded {
                remaining,
                max: campaign.max_per_user,
            });
        }

        let (reservation, change) = self.engine.reserve(campaign_id, quantity, deadline)?;
        stats.pending_quantity += quantity;
        let user_counted = stats.counted();
        let user_remaining = stats.remaining(campaign.max_per_user);
        drop(stats);

        // 7. Persist the Pending order; compensate on failure
        let order = SaleOrder {
            id: snowflake_id(),
            order_code: self.next_order_code(),
            campaign_id,
            user_id,
            reservation_id: reservation.id,
            quantity,
            unit_price: campaign.flash_price,
            total_amount: money::line_total(campaign.flash_price, quantity),
            discount_amount: money::discount_amount(
                campaign.original_price,
                campaign.flash_price,
                quantity,
            ),
            status: OrderStatus::Pending,
            payment_deadline: deadline,
            payment_method: None,
            paid_at: None,
            shipping_name: request.shipping_name,
            shipping_phone: request.shipping_phone,
            shipping_address: request.shipping_address,
            customer_note: request.customer_note,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.storage.insert_order(&order) {
            tracing::error!(order_id = order.id, error = %e, "Failed to persist order, releasing reservation");
            if let Err(re) = self.engine.release(reservation.id, now) {
                tracing::error!(reservation_id = reservation.id, error = %re, "Compensating release failed");
            }
            let mut stats = stats_cell.lock();
            stats.pending_quantity = (stats.pending_quantity - quantity).max(Decimal::ZERO);
            return Err(e.into());
        }

        if change.became_sold_out {
            self.broadcast(SaleEvent::campaign(SaleEventKind::CampaignSoldOut, campaign_id));
        }
        self.broadcast(SaleEvent::order(
            SaleEventKind::OrderCreated,
            campaign_id,
            order.id,
            user_id,
            quantity,
        ));

        tracing::info!(
            order_id = order.id,
            order_code = %order.order_code,
            quantity = %quantity,
            available = %change.available,
            "Purchase successful"
        );

        let sold_percentage = self
            .campaigns
            .get(campaign_id)
            .map(|c| c.sold_percentage())
            .unwrap_or(0);
        Ok(PurchaseReceipt {
            order_id: order.id,
            order_code: order.order_code,
            campaign_id,
            quantity,
            unit_price: order.unit_price,
            total_amount: order.total_amount,
            saved_amount: order.discount_amount,
            status: order.status,
            payment_deadline: deadline,
            payment_remaining_seconds: remaining_seconds(now, deadline),
            remaining_stock: change.available,
            sold_percentage,
            user_total_purchased: user_counted,
            user_remaining_limit: user_remaining,
        })
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Confirm payment: Pending → Paid, reservation → sold stock.
    ///
    /// A confirm that arrives past the deadline expires the order first
    /// and reports `PaymentDeadlinePassed`; a duplicate confirm observes
    /// Paid and reports `OrderNotPending` with no counter movement.
    pub fn confirm_payment(
        &self,
        order_id: i64,
        user_id: i64,
        payment_method: &str,
    ) -> SaleResult<SaleOrder> {
        let now = now_millis();
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or(SaleError::OrderNotFound(order_id))?;

        if order.user_id != user_id {
            return Err(SaleError::AccessDenied);
        }
        if order.status != OrderStatus::Pending {
            return Err(SaleError::OrderNotPending(order_id));
        }

        if order.is_past_deadline(now) {
            // Opportunistic expiry: release the hold now rather than
            // waiting for the sweeper, then report the deadline
            self.engine.release(order.reservation_id, now)?;
            order.status = OrderStatus::Expired;
            order.updated_at = now;
            self.storage.update_order(&txn, &order)?;
            txn.commit().map_err(StorageError::from)?;

            self.limits.record_outcome(
                order.campaign_id,
                order.user_id,
                order.quantity,
                OrderStatus::Expired,
                now,
            );
            self.broadcast(SaleEvent::order(
                SaleEventKind::OrderExpired,
                order.campaign_id,
                order.id,
                order.user_id,
                order.quantity,
            ));
            tracing::warn!(order_id, "Confirm arrived past deadline, order expired");
            return Err(SaleError::PaymentDeadlinePassed);
        }

        let change = self.engine.commit(order.reservation_id)?;
        order.status = OrderStatus::Paid;
        order.payment_method = Some(payment_method.to_string());
        order.paid_at = Some(now);
        order.updated_at = now;
        self.storage.update_order(&txn, &order)?;
        txn.commit().map_err(StorageError::from)?;

        self.limits.record_outcome(
            order.campaign_id,
            order.user_id,
            order.quantity,
            OrderStatus::Paid,
            now,
        );
        if change.became_sold_out {
            self.broadcast(SaleEvent::campaign(
                SaleEventKind::CampaignSoldOut,
                order.campaign_id,
            ));
        }
        self.broadcast(SaleEvent::order(
            SaleEventKind::OrderPaid,
            order.campaign_id,
            order.id,
            order.user_id,
            order.quantity,
        ));

        tracing::info!(order_id, method = payment_method, "Payment confirmed");
        Ok(order)
    }

    /// Customer cancellation: Pending → Cancelled, stock back to the pool
    pub fn cancel_order(&self, order_id: i64, user_id: i64) -> SaleResult<SaleOrder> {
        let now = now_millis();
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or(SaleError::OrderNotFound(order_id))?;

        if order.user_id != user_id {
            return Err(SaleError::AccessDenied);
        }
        if order.status != OrderStatus::Pending {
            return Err(SaleError::OrderNotPending(order_id));
        }

        self.engine.release(order.reservation_id, now)?;
        order.status = OrderStatus::Cancelled;
        order.updated_at = now;
        self.storage.update_order(&txn, &order)?;
        txn.commit().map_err(StorageError::from)?;

        self.limits.record_outcome(
            order.campaign_id,
            order.user_id,
            order.quantity,
            OrderStatus::Cancelled,
            now,
        );
        self.broadcast(SaleEvent::order(
            SaleEventKind::OrderCancelled,
            order.campaign_id,
            order.id,
            order.user_id,
            order.quantity,
        ));

        tracing::info!(order_id, "Order cancelled");
        Ok(order)
    }

    /// Sweeper transition: Pending past deadline → Expired.
    ///
    /// A concurrent cancel or confirm that won the race leaves the order
    /// non-pending; the resulting `OrderNotPending` is a stale read, not a
    /// failure.
    pub fn expire_order(&self, order_id: i64, now: i64) -> SaleResult<SaleOrder> {
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or(SaleError::OrderNotFound(order_id))?;

        if order.status != OrderStatus::Pending {
            return Err(SaleError::OrderNotPending(order_id));
        }
        if !order.is_past_deadline(now) {
            return Err(SaleError::validation(format!(
                "order {order_id} payment deadline has not lapsed"
            )));
        }

        self.engine.release(order.reservation_id, now)?;
        order.status = OrderStatus::Expired;
        order.updated_at = now;
        self.storage.update_order(&txn, &order)?;
        txn.commit().map_err(StorageError::from)?;

        self.limits.record_outcome(
            order.campaign_id,
            order.user_id,
            order.quantity,
            OrderStatus::Expired,
            now,
        );
        self.broadcast(SaleEvent::order(
            SaleEventKind::OrderExpired,
            order.campaign_id,
            order.id,
            order.user_id,
            order.quantity,
        ));

        tracing::info!(order_id, quantity = %order.quantity, "Order expired, reservation released");
        Ok(order)
    }

    /// External refund event: Paid → Refunded.
    ///
    /// Sold stock is NOT returned to the pool; restocking a refunded sale
    /// is an explicit operator decision outside this engine.
    pub fn refund_order(&self, order_id: i64) -> SaleResult<SaleOrder> {
        let now = now_millis();
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or(SaleError::OrderNotFound(order_id))?;

        if order.status != OrderStatus::Paid {
            return Err(SaleError::OrderNotPending(order_id));
        }

        order.status = OrderStatus::Refunded;
        order.updated_at = now;
        self.storage.update_order(&txn, &order)?;
        txn.commit().map_err(StorageError::from)?;

        self.broadcast(SaleEvent::order(
            SaleEventKind::OrderRefunded,
            order.campaign_id,
            order.id,
            order.user_id,
            order.quantity,
        ));
        tracing::info!(order_id, "Order refunded");
        Ok(order)
    }

    // ========================================================================
    // Campaign Window Roll (sweeper + eager access)
    // ========================================================================

    /// Apply window transitions across campaigns and broadcast them
    pub fn roll_campaigns(&self, now: i64) {
        let (activated, ended) = self.campaigns.roll_statuses(now);
        for campaign_id in activated {
            self.broadcast(SaleEvent::campaign(SaleEventKind::CampaignActivated, campaign_id));
        }
        for campaign_id in ended {
            self.broadcast(SaleEvent::campaign(SaleEventKind::CampaignEnded, campaign_id));
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Load an order; the caller must be its owner
    pub fn get_order(&self, order_id: i64, user_id: i64) -> SaleResult<SaleOrder> {
        let order = self
            .storage
            .get_order(order_id)?
            .ok_or(SaleError::OrderNotFound(order_id))?;
        if order.user_id != user_id {
            return Err(SaleError::AccessDenied);
        }
        Ok(order)
    }

    /// All orders of a user, optionally narrowed to one campaign
    pub fn list_my_orders(
        &self,
        user_id: i64,
        campaign_id: Option<i64>,
    ) -> SaleResult<Vec<SaleOrder>> {
        Ok(self.storage.orders_for_user(user_id, campaign_id)?)
    }

    /// Currently selling campaigns, annotated with the caller's allowance
    pub fn list_active_campaigns(&self, user_id: Option<i64>) -> Vec<CampaignSummary> {
        let now = now_millis();
        self.roll_campaigns(now);
        self.campaigns
            .list_active(now)
            .into_iter()
            .map(|c| {
                let user = user_id.and_then(|uid| self.limits.get(c.id, uid));
                let remaining = match c.status {
                    CampaignStatus::Scheduled => Some(remaining_seconds(now, c.start_time)),
                    CampaignStatus::Active => Some(remaining_seconds(now, c.end_time)),
                    _ => None,
                };
                CampaignSummary {
                    id: c.id,
                    fabric_id: c.fabric_id,
                    fabric_name: c.fabric_name.clone(),
                    name: c.name.clone(),
                    original_price: c.original_price,
                    flash_price: c.flash_price,
                    discount_percent: c.discount_percent(),
                    available_quantity: c.available(),
                    sold_percentage: c.sold_percentage(),
                    max_per_user: c.max_per_user,
                    min_purchase: c.min_purchase,
                    start_time: c.start_time,
                    end_time: c.end_time,
                    remaining_seconds: remaining,
                    status: c.status,
                    priority: c.priority,
                    is_featured: c.is_featured,
                    user_purchased: user_id
                        .map(|_| user.as_ref().map(|s| s.total_purchased).unwrap_or_default()),
                    user_remaining: user_id.map(|_| {
                        user.as_ref()
                            .map(|s| s.remaining(c.max_per_user))
                            .unwrap_or(c.max_per_user)
                    }),
                }
            })
            .collect()
    }
}
