//! Flash-sale protocol types
//!
//! The request/receipt surface of the engine and the event stream it
//! broadcasts. Wire framing (HTTP, queues) is the embedding process's
//! concern; these types are the logical contract.

pub mod dto;
pub mod event;

pub use dto::{PurchaseReceipt, PurchaseRequest};
pub use event::{SaleEvent, SaleEventKind};
