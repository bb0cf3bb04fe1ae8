//! Campaign subsystem
//!
//! - **store**: keyed campaign records with compare-and-swap status
//!   transitions; the per-campaign mutex is the serialization point for
//!   every counter mutation
//! - **reservation**: the only component permitted to mutate
//!   `sold_quantity` / `reserved_quantity`
//! - **limits**: per (campaign, user) allowance ledger

pub mod limits;
pub mod reservation;
pub mod store;

pub use limits::UserLimitTracker;
pub use reservation::{CounterChange, Reservation, ReservationEngine, ReservationState};
pub use store::CampaignStore;
