//! Shared types for the Bolt flash-sale engine
//!
//! Domain models, error types and utility functions used by the engine
//! crate and by any process embedding it.

pub mod error;
pub mod models;
pub mod sale;
pub mod util;

// Re-exports
pub use error::{ErrorCode, SaleError, SaleResult};
pub use models::{Campaign, CampaignStatus, OrderStatus, SaleOrder, UserStats};
pub use sale::{PurchaseReceipt, PurchaseRequest, SaleEvent, SaleEventKind};
pub use serde::{Deserialize, Serialize};
