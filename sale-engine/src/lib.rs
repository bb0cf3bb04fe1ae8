//! Bolt Sale Engine - flash-sale reservation and order lifecycle core
//!
//! # 架构概述
//!
//! The engine runs time-boxed, quantity-limited flash sales on fabric lots.
//! Many concurrent buyers compete for scarce stock; each order holds a
//! reservation until payment or until the deadline lapses.
//!
//! # Module structure
//!
//! ```text
//! sale-engine/src/
//! ├── core/          # Config, engine state, background task supervision
//! ├── campaigns/     # Campaign store, reservation engine, user limits
//! ├── orders/        # Order lifecycle manager, storage, expiry sweeper
//! └── utils/         # Logger, validation helpers
//! ```
//!
//! # Data flow
//!
//! ```text
//! purchase ──▶ SaleManager ──▶ CampaignStore (window/status)
//!                  │                │
//!                  │           UserLimitTracker (per-user cap)
//!                  │                │
//!                  └──▶ ReservationEngine (atomic counter moves)
//!                           │
//!                     OrderStorage (redb) ──▶ broadcast SaleEvent
//! ```

pub mod campaigns;
pub mod core;
pub mod orders;
pub mod utils;

// Re-export 公共类型
pub use campaigns::{CampaignStore, ReservationEngine, UserLimitTracker};
pub use crate::core::{BackgroundTasks, Config, EngineState, TaskKind};
pub use orders::{ExpirySweeper, OrderStorage, SaleManager};

// Re-export shared domain types for convenience
pub use shared::{
    Campaign, CampaignStatus, ErrorCode, OrderStatus, PurchaseReceipt, PurchaseRequest, SaleError,
    SaleEvent, SaleEventKind, SaleOrder, SaleResult, UserStats,
};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};
