//! Campaign Store
//!
//! Keyed in-process store for campaign records. Each campaign lives behind
//! its own mutex; that mutex is the single serialization point for the
//! quantity counters (see `reservation.rs`) and for status transitions.
//! Campaigns are independent of each other - there is no cross-campaign
//! lock.

use crate::orders::money;
use crate::utils::validation::{MAX_NAME_LEN, validate_optional_text, validate_required_text};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use shared::models::{Campaign, CampaignCreate, CampaignStatus, CampaignUpdate};
use shared::util::{now_millis, snowflake_id};
use shared::{SaleError, SaleResult};
use std::sync::Arc;

/// Default per-user cap: 5.00 meters
fn default_max_per_user() -> Decimal {
    Decimal::new(500, 2)
}

/// Default minimum purchase: 0.50 meters
fn default_min_purchase() -> Decimal {
    Decimal::new(50, 2)
}

/// In-process campaign store
pub struct CampaignStore {
    campaigns: DashMap<i64, Arc<Mutex<Campaign>>>,
}

impl CampaignStore {
    pub fn new() -> Self {
        Self {
            campaigns: DashMap::new(),
        }
    }

    /// Lock cell for a campaign (reservation engine entry point)
    pub(crate) fn cell(&self, id: i64) -> Option<Arc<Mutex<Campaign>>> {
        self.campaigns.get(&id).map(|entry| entry.value().clone())
    }

    /// Snapshot of a campaign
    pub fn get(&self, id: i64) -> Option<Campaign> {
        self.cell(id).map(|cell| cell.lock().clone())
    }

    pub fn len(&self) -> usize {
        self.campaigns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty()
    }

    // ========================================================================
    // Admin Operations
    // ========================================================================

    /// Create a campaign (starts Scheduled)
    pub fn create(&self, input: CampaignCreate) -> SaleResult<Campaign> {
        validate_required_text(&input.name, "name", MAX_NAME_LEN)?;
        validate_required_text(&input.fabric_name, "fabric_name", MAX_NAME_LEN)?;
        validate_optional_text(&input.description, "description", 500)?;

        if input.original_price <= Decimal::ZERO || input.flash_price <= Decimal::ZERO {
            return Err(SaleError::validation("prices must be positive"));
        }
        if input.flash_price >= input.original_price {
            return Err(SaleError::validation(
                "flash price must be below the original price",
            ));
        }
        money::validate_quantity(input.total_quantity)?;
        if input.start_time >= input.end_time {
            return Err(SaleError::validation("end time must be after start time"));
        }

        let max_per_user = input.max_per_user.unwrap_or_else(default_max_per_user);
        let min_purchase = input.min_purchase.unwrap_or_else(default_min_purchase);
        if max_per_user <= Decimal::ZERO || min_purchase <= Decimal::ZERO {
            return Err(SaleError::validation("limits must be positive"));
        }
        if min_purchase > max_per_user {
            return Err(SaleError::validation(
                "minimum purchase cannot exceed the per-user cap",
            ));
        }

        let now = now_millis();
        let campaign = Campaign {
            id: snowflake_id(),
            fabric_id: input.fabric_id,
            fabric_name: input.fabric_name,
            name: input.name,
            description: input.description,
            original_price: input.original_price,
            flash_price: input.flash_price,
            total_quantity: input.total_quantity,
            sold_quantity: Decimal::ZERO,
            reserved_quantity: Decimal::ZERO,
            max_per_user,
            min_purchase,
            start_time: input.start_time,
            end_time: input.end_time,
            status: CampaignStatus::Scheduled,
            priority: input.priority.unwrap_or(0),
            is_featured: input.is_featured.unwrap_or(false),
            created_at: now,
            updated_at: now,
        };

        tracing::info!(campaign_id = campaign.id, name = %campaign.name, "Created campaign");
        self.campaigns
            .insert(campaign.id, Arc::new(Mutex::new(campaign.clone())));
        Ok(campaign)
    }

    /// Update campaign metadata; rejected once the campaign is closed.
    /// Quantity counters themselves are never touched here.
    pub fn update(&self, id: i64, update: CampaignUpdate) -> SaleResult<Campaign> {
        let cell = self.cell(id).ok_or(SaleError::CampaignNotFound(id))?;
        let mut campaign = cell.lock();

        if campaign.status.is_closed() {
            return Err(SaleError::validation(
                "cannot update a campaign that has ended",
            ));
        }

        if let Some(name) = update.name {
            validate_required_text(&name, "name", MAX_NAME_LEN)?;
            campaign.name = name;
        }
        if let Some(description) = update.description {
            campaign.description = Some(description);
        }
        if let Some(flash_price) = update.flash_price {
            if flash_price <= Decimal::ZERO || flash_price >= campaign.original_price {
                return Err(SaleError::validation(
                    "flash price must be positive and below the original price",
                ));
            }
            campaign.flash_price = flash_price;
        }
        if let Some(total) = update.total_quantity {
            money::validate_quantity(total)?;
            // Never shrink below stock already committed or held
            if total < campaign.sold_quantity + campaign.reserved_quantity {
                return Err(SaleError::validation(
                    "total quantity cannot drop below sold plus reserved stock",
                ));
            }
            campaign.total_quantity = total;
        }
        if let Some(max_per_user) = update.max_per_user {
            if max_per_user <= Decimal::ZERO {
                return Err(SaleError::validation("per-user cap must be positive"));
            }
            campaign.max_per_user = max_per_user;
        }
        if let Some(min_purchase) = update.min_purchase {
            if min_purchase <= Decimal::ZERO || min_purchase > campaign.max_per_user {
                return Err(SaleError::validation(
                    "minimum purchase must be positive and within the per-user cap",
                ));
            }
            campaign.min_purchase = min_purchase;
        }
        if let Some(start_time) = update.start_time {
            // Start is frozen once the sale has begun
            if campaign.status == CampaignStatus::Scheduled {
                campaign.start_time = start_time;
            }
        }
        if let Some(end_time) = update.end_time {
            if end_time <= campaign.start_time {
                return Err(SaleError::validation("end time must be after start time"));
            }
            campaign.end_time = end_time;
        }
        if let Some(priority) = update.priority {
            campaign.priority = priority;
        }
        if let Some(is_featured) = update.is_featured {
            campaign.is_featured = is_featured;
        }

        campaign.updated_at = now_millis();
        tracing::info!(campaign_id = id, "Updated campaign");
        Ok(campaign.clone())
    }

    /// Operator cancellation. Only reachable before the sale starts, or
    /// while nothing has been sold yet.
    pub fn cancel(&self, id: i64) -> SaleResult<Campaign> {
        let cell = self.cell(id).ok_or(SaleError::CampaignNotFound(id))?;
        let mut campaign = cell.lock();

        match campaign.status {
            CampaignStatus::Ended | CampaignStatus::Cancelled => {
                return Err(SaleError::Conflict(
                    "campaign already ended or cancelled".to_string(),
                ));
            }
            CampaignStatus::Scheduled => {}
            _ => {
                if campaign.sold_quantity > Decimal::ZERO {
                    return Err(SaleError::validation(
                        "cannot cancel a campaign with sold stock",
                    ));
                }
            }
        }

        campaign.status = CampaignStatus::Cancelled;
        campaign.updated_at = now_millis();
        tracing::info!(campaign_id = id, "Cancelled campaign");
        Ok(campaign.clone())
    }

    // ========================================================================
    // Status Transitions
    // ========================================================================

    /// Guarded compare-and-swap on the status field. Fails with Conflict
    /// when the observed status is stale (e.g. two sweepers racing).
    pub fn transition_status(
        &self,
        id: i64,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> SaleResult<()> {
        let cell = self.cell(id).ok_or(SaleError::CampaignNotFound(id))?;
        let mut campaign = cell.lock();
        if campaign.status != from {
            return Err(SaleError::Conflict(format!(
                "campaign {} status is {:?}, expected {:?}",
                id, campaign.status, from
            )));
        }
        campaign.status = to;
        campaign.updated_at = now_millis();
        tracing::info!(campaign_id = id, from = ?from, to = ?to, "Campaign status transition");
        Ok(())
    }

    /// Apply window transitions for a single campaign and return the fresh
    /// snapshot. Called eagerly on access so a request never observes a
    /// stale Scheduled/Active status between scheduler runs.
    pub fn refresh_window(&self, id: i64, now: i64) -> SaleResult<Campaign> {
        let cell = self.cell(id).ok_or(SaleError::CampaignNotFound(id))?;
        let mut campaign = cell.lock();
        Self::apply_window(&mut campaign, now);
        Ok(campaign.clone())
    }

    /// Walk every campaign and apply window transitions. Returns the ids
    /// that became Active and the ids that Ended, for event broadcast.
    pub fn roll_statuses(&self, now: i64) -> (Vec<i64>, Vec<i64>) {
        let mut activated = Vec::new();
        let mut ended = Vec::new();
        for entry in self.campaigns.iter() {
            let mut campaign = entry.value().lock();
            match Self::apply_window(&mut campaign, now) {
                Some(CampaignStatus::Active) => activated.push(campaign.id),
                Some(CampaignStatus::Ended) => ended.push(campaign.id),
                _ => {}
            }
        }
        (activated, ended)
    }

    /// Window transition rules; returns the new status if one was applied
    fn apply_window(campaign: &mut Campaign, now: i64) -> Option<CampaignStatus> {
        let next = match campaign.status {
            CampaignStatus::Scheduled if now > campaign.end_time => CampaignStatus::Ended,
            CampaignStatus::Scheduled if now >= campaign.start_time => CampaignStatus::Active,
            CampaignStatus::Active | CampaignStatus::SoldOut if now > campaign.end_time => {
                CampaignStatus::Ended
            }
            _ => return None,
        };
        tracing::info!(campaign_id = campaign.id, from = ?campaign.status, to = ?next, "Campaign window transition");
        campaign.status = next;
        campaign.updated_at = now;
        Some(next)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Campaigns currently selling: Active, inside the window, stock left.
    /// Sorted featured-first by priority, then by start time.
    pub fn list_active(&self, now: i64) -> Vec<Campaign> {
        let mut result: Vec<Campaign> = self
            .campaigns
            .iter()
            .map(|entry| entry.value().lock().clone())
            .filter(|c| c.is_selling(now))
            .collect();
        result.sort_by(|a, b| {
            b.is_featured
                .cmp(&a.is_featured)
                .then(b.priority.cmp(&a.priority))
                .then(a.start_time.cmp(&b.start_time))
        });
        result
    }

    /// All campaigns regardless of status (admin listing)
    pub fn list_all(&self) -> Vec<Campaign> {
        self.campaigns
            .iter()
            .map(|entry| entry.value().lock().clone())
            .collect()
    }
}

impl Default for CampaignStore {
    fn default() -> Self {
        Self::new()
    }
}
