//! Order Lifecycle Module
//!
//! - **manager**: `SaleManager`, the order state machine and engine facade
//! - **storage**: redb-based persistence for orders and sweep indices
//! - **money**: Decimal helpers for quantities and amounts
//! - **sweeper**: periodic expiry of lapsed pending orders
//!
//! # Data Flow
//!
//! ```text
//! purchase ──▶ SaleManager ──▶ reserve ──▶ Pending order (redb)
//! payment  ──▶ confirm_payment ──▶ commit ──▶ Paid
//! sweeper  ──▶ expire ──▶ release ──▶ Expired
//! ```
//!
//! Every order transition runs inside one redb write transaction; redb's
//! single-writer property makes the status precondition checks
//! linearizable, so of a racing cancel / confirm / expire exactly one
//! wins and the losers observe a non-pending order.

pub mod manager;
pub mod money;
pub mod storage;
pub mod sweeper;

pub use manager::SaleManager;
pub use storage::{OrderStorage, StorageError};
pub use sweeper::{ExpirySweeper, SweepStats};
