//! Reservation Engine
//!
//! The only component permitted to mutate `sold_quantity` and
//! `reserved_quantity`. Every counter move happens under the owning
//! campaign's mutex, so for a single campaign all mutations are
//! linearizable; a read-then-write against the snapshot API can never
//! leak into the counters.
//!
//! ```text
//! reserve  : available >= q  →  reserved += q          (Held)
//! commit   : reserved -= q, sold += q                  (Held → Committed)
//! release  : reserved -= q                             (Held → Released)
//! ```
//!
//! `commit`/`release` are idempotent per reservation: settling an
//! already-settled reservation the same way is a no-op, so retried payment
//! callbacks cannot double-move stock. Settling it the *other* way is a
//! conflict - exactly one of commit/release wins.
//!
//! Lock acquisition is bounded (`try_lock_for`); a caller that cannot get
//! the campaign lock inside the budget receives `RetryExhausted` instead
//! of blocking behind other buyers indefinitely.

use super::store::CampaignStore;
use dashmap::DashMap;
use parking_lot::MutexGuard;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{Campaign, CampaignStatus};
use shared::util::{now_millis, snowflake_id};
use shared::{SaleError, SaleResult};
use std::sync::Arc;
use std::time::Duration;

/// Settlement state of one reservation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationState {
    /// Stock is held in `reserved_quantity`
    Held,
    /// Converted to sold stock
    Committed,
    /// Returned to the available pool
    Released,
}

/// A temporary hold on campaign stock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i64,
    pub campaign_id: i64,
    pub quantity: Decimal,
    pub state: ReservationState,
    /// Unix millis; informational - expiry is driven by the order deadline
    pub expires_at: i64,
    pub created_at: i64,
}

/// What a counter move did to the campaign, for event fan-out
#[derive(Debug, Clone, Copy)]
pub struct CounterChange {
    /// Available stock after the operation
    pub available: Decimal,
    /// This operation drove `available` to zero on an Active campaign
    pub became_sold_out: bool,
}

/// Reservation engine, one per process
pub struct ReservationEngine {
    store: Arc<CampaignStore>,
    reservations: DashMap<i64, Reservation>,
    lock_timeout: Duration,
}

impl ReservationEngine {
    pub fn new(store: Arc<CampaignStore>, lock_timeout: Duration) -> Self {
        Self {
            store,
            reservations: DashMap::new(),
            lock_timeout,
        }
    }

    /// Reserve `quantity` against a campaign.
    ///
    /// Succeeds only while the campaign is Active with `available >=
    /// quantity`; the check and the increment are one critical section, so
    /// two buyers who both observed enough stock cannot both win the last
    /// meters.
    pub fn reserve(
        &self,
        campaign_id: i64,
        quantity: Decimal,
        expires_at: i64,
    ) -> SaleResult<(Reservation, CounterChange)> {
        let cell = self
            .store
            .cell(campaign_id)
            .ok_or(SaleError::CampaignNotFound(campaign_id))?;
        let mut campaign = cell
            .try_lock_for(self.lock_timeout)
            .ok_or(SaleError::RetryExhausted)?;

        match campaign.status {
            CampaignStatus::Active => {}
            // Sold out IS the insufficient-stock case; report it as such so
            // the buyer sees "sold out", not a generic inactive campaign
            CampaignStatus::SoldOut => {
                return Err(SaleError::InsufficientStock {
                    available: campaign.available(),
                });
            }
            status => {
                return Err(SaleError::CampaignNotActive(format!(
                    "campaign {campaign_id} is {status:?}"
                )));
            }
        }

        let available = campaign.available();
        if available < quantity {
            return Err(SaleError::InsufficientStock { available });
        }

        campaign.reserved_quantity += quantity;
        campaign.updated_at = now_millis();
        let change = Self::after_decrease(&mut campaign);
        drop(campaign);

        let reservation = Reservation {
            id: snowflake_id(),
            campaign_id,
            quantity,
            state: ReservationState::Held,
            expires_at,
            created_at: now_millis(),
        };
        // Inserted after the campaign lock is dropped; the id has not been
        // handed out yet, so nobody can observe the gap
        self.reservations.insert(reservation.id, reservation.clone());

        tracing::debug!(
            campaign_id,
            reservation_id = reservation.id,
            quantity = %quantity,
            available = %change.available,
            "Reserved stock"
        );
        Ok((reservation, change))
    }

    /// Convert a held reservation to sold stock (reserved → sold).
    ///
    /// No-op when already committed; conflict when already released.
    pub fn commit(&self, reservation_id: i64) -> SaleResult<CounterChange> {
        let mut entry = self
            .reservations
            .get_mut(&reservation_id)
            .ok_or_else(|| SaleError::Conflict(format!("unknown reservation {reservation_id}")))?;

        match entry.state {
            ReservationState::Committed => {
                // Retried payment callback; nothing to move
                let available = self
                    .store
                    .get(entry.campaign_id)
                    .map(|c| c.available())
                    .unwrap_or(Decimal::ZERO);
                return Ok(CounterChange {
                    available,
                    became_sold_out: false,
                });
            }
            ReservationState::Released => {
                return Err(SaleError::Conflict(format!(
                    "reservation {reservation_id} was already released"
                )));
            }
            ReservationState::Held => {}
        }

        let cell = self
            .store
            .cell(entry.campaign_id)
            .ok_or(SaleError::CampaignNotFound(entry.campaign_id))?;
        let mut campaign = cell.lock();
        campaign.reserved_quantity -= entry.quantity;
        campaign.sold_quantity += entry.quantity;
        campaign.updated_at = now_millis();
        let change = Self::after_decrease(&mut campaign);
        drop(campaign);

        entry.state = ReservationState::Committed;
        tracing::debug!(
            campaign_id = entry.campaign_id,
            reservation_id,
            quantity = %entry.quantity,
            "Committed reservation"
        );
        Ok(change)
    }

    /// Return a held reservation to the available pool (reserved →
    /// available).
    ///
    /// No-op when already released; conflict when already committed.
    /// A release that brings stock back to a SoldOut campaign still inside
    /// its window reopens it for sale.
    pub fn release(&self, reservation_id: i64, now: i64) -> SaleResult<CounterChange> {
        let mut entry = self
            .reservations
            .get_mut(&reservation_id)
            .ok_or_else(|| SaleError::Conflict(format!("unknown reservation {reservation_id}")))?;

        match entry.state {
            ReservationState::Released => {
                let available = self
                    .store
                    .get(entry.campaign_id)
                    .map(|c| c.available())
                    .unwrap_or(Decimal::ZERO);
                return Ok(CounterChange {
                    available,
                    became_sold_out: false,
                });
            }
            ReservationState::Committed => {
                return Err(SaleError::Conflict(format!(
                    "reservation {reservation_id} was already committed"
                )));
            }
            ReservationState::Held => {}
        }

        let cell = self
            .store
            .cell(entry.campaign_id)
            .ok_or(SaleError::CampaignNotFound(entry.campaign_id))?;
        let mut campaign = cell.lock();
        campaign.reserved_quantity -= entry.quantity;
        campaign.updated_at = now_millis();

        // Released stock makes a SoldOut campaign sellable again
        if campaign.status == CampaignStatus::SoldOut
            && campaign.available() > Decimal::ZERO
            && now <= campaign.end_time
        {
            tracing::info!(campaign_id = campaign.id, "Campaign reopened after release");
            campaign.status = CampaignStatus::Active;
        }
        let available = campaign.available();
        drop(campaign);

        entry.state = ReservationState::Released;
        tracing::debug!(
            campaign_id = entry.campaign_id,
            reservation_id,
            quantity = %entry.quantity,
            available = %available,
            "Released reservation"
        );
        Ok(CounterChange {
            available,
            became_sold_out: false,
        })
    }

    /// Snapshot of a reservation record
    pub fn get(&self, reservation_id: i64) -> Option<Reservation> {
        self.reservations
            .get(&reservation_id)
            .map(|entry| entry.value().clone())
    }

    /// SoldOut signal: any operation that drives `available` to zero on an
    /// Active campaign flips the status. Caller holds the campaign lock.
    fn after_decrease(campaign: &mut MutexGuard<'_, Campaign>) -> CounterChange {
        let available = campaign.available();
        let became_sold_out =
            available <= Decimal::ZERO && campaign.status == CampaignStatus::Active;
        if became_sold_out {
            tracing::info!(campaign_id = campaign.id, "Campaign sold out");
            campaign.status = CampaignStatus::SoldOut;
        }
        CounterChange {
            available,
            became_sold_out,
        }
    }
}
