//! redb-based storage layer for sale orders
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `SaleOrder` (JSON) | Order records |
//! | `pending_orders` | `order_id` | `payment_deadline` | Sweep index |
//! | `user_orders` | `(user_id, order_id)` | `campaign_id` | Listing index |
//! | `counters` | `&str` | `u64` | Order-code counter |
//!
//! # Durability
//!
//! redb commits are persistent as soon as `commit()` returns (copy-on-write
//! with atomic pointer swap), so a crash between sweeps never loses or
//! corrupts order records. redb also admits a single live write
//! transaction; the manager leans on that to serialize all order
//! transitions.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use shared::models::{OrderStatus, SaleOrder};
use shared::SaleError;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Order records: key = order_id, value = JSON-serialized SaleOrder
const ORDERS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("orders");

/// Sweep index: key = order_id, value = payment_deadline (Unix millis)
const PENDING_TABLE: TableDefinition<i64, i64> = TableDefinition::new("pending_orders");

/// Listing index: key = (user_id, order_id), value = campaign_id
const USER_ORDERS_TABLE: TableDefinition<(i64, i64), i64> = TableDefinition::new("user_orders");

/// Counters: key = counter name, value = u64
const COUNTERS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");

const ORDER_COUNT_KEY: &str = "order_count";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for SaleError {
    fn from(err: StorageError) -> Self {
        tracing::error!(error = %err, "Order storage error");
        SaleError::Storage(err.to_string())
    }
}

/// Order storage backed by redb
#[derive(Clone)]
pub struct OrderStorage {
    db: Arc<Database>,
}

impl OrderStorage {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing and ephemeral deployments)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        // Create all tables so later read transactions never hit a missing
        // table
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(PENDING_TABLE)?;
            let _ = write_txn.open_table(USER_ORDERS_TABLE)?;
            let mut counters = write_txn.open_table(COUNTERS_TABLE)?;
            if counters.get(ORDER_COUNT_KEY)?.is_none() {
                counters.insert(ORDER_COUNT_KEY, 0u64)?;
            }
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction. redb admits one live writer; this call
    /// blocks until the previous transition finishes.
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Order Counter (for order codes) ==========

    /// Get and increment the order count atomically. Returns the NEW count.
    pub fn next_order_count(&self) -> StorageResult<u64> {
        let txn = self.db.begin_write()?;
        let mut table = txn.open_table(COUNTERS_TABLE)?;
        let current = table.get(ORDER_COUNT_KEY)?.map(|g| g.value()).unwrap_or(0);
        let next = current + 1;
        table.insert(ORDER_COUNT_KEY, next)?;
        drop(table);
        txn.commit()?;
        Ok(next)
    }

    // ========== Order Operations ==========

    /// Persist a freshly created (Pending) order and its indices
    pub fn insert_order(&self, order: &SaleOrder) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut orders = txn.open_table(ORDERS_TABLE)?;
            let value = serde_json::to_vec(order)?;
            orders.insert(order.id, value.as_slice())?;
        }
        {
            let mut pending = txn.open_table(PENDING_TABLE)?;
            pending.insert(order.id, order.payment_deadline)?;
        }
        {
            let mut user_orders = txn.open_table(USER_ORDERS_TABLE)?;
            user_orders.insert((order.user_id, order.id), order.campaign_id)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Load an order inside a write transaction (transition precondition
    /// reads go through here so they are serialized with the write)
    pub fn get_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: i64,
    ) -> StorageResult<Option<SaleOrder>> {
        let table = txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Write an order after a status transition and maintain the sweep
    /// index (every transition leaves Pending, so the index entry goes)
    pub fn update_order(&self, txn: &WriteTransaction, order: &SaleOrder) -> StorageResult<()> {
        {
            let mut orders = txn.open_table(ORDERS_TABLE)?;
            let value = serde_json::to_vec(order)?;
            orders.insert(order.id, value.as_slice())?;
        }
        if order.status != OrderStatus::Pending {
            let mut pending = txn.open_table(PENDING_TABLE)?;
            pending.remove(order.id)?;
        }
        Ok(())
    }

    /// Load an order (read-only)
    pub fn get_order(&self, order_id: i64) -> StorageResult<Option<SaleOrder>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    // ========== Sweep Index ==========

    /// Order ids whose payment deadline has lapsed
    pub fn pending_due(&self, now: i64) -> StorageResult<Vec<i64>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PENDING_TABLE)?;

        let mut due = Vec::new();
        for result in table.iter()? {
            let (key, value) = result?;
            if value.value() < now {
                due.push(key.value());
            }
        }
        Ok(due)
    }

    /// Number of orders currently pending payment
    pub fn pending_count(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PENDING_TABLE)?;
        Ok(table.len()?)
    }

    // ========== Listing ==========

    /// All orders for a user, optionally narrowed to one campaign,
    /// newest first
    pub fn orders_for_user(
        &self,
        user_id: i64,
        campaign_id: Option<i64>,
    ) -> StorageResult<Vec<SaleOrder>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(USER_ORDERS_TABLE)?;
        let orders_table = read_txn.open_table(ORDERS_TABLE)?;

        let mut orders = Vec::new();
        let range_start = (user_id, i64::MIN);
        let range_end = (user_id, i64::MAX);
        for result in index.range(range_start..=range_end)? {
            let (key, value) = result?;
            if let Some(filter) = campaign_id
                && value.value() != filter
            {
                continue;
            }
            let (_user, order_id) = key.value();
            if let Some(raw) = orders_table.get(order_id)? {
                let order: SaleOrder = serde_json::from_slice(raw.value())?;
                orders.push(order);
            }
        }

        orders.sort_by_key(|o| std::cmp::Reverse(o.created_at));
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn sample_order(id: i64, user_id: i64, deadline: i64) -> SaleOrder {
        SaleOrder {
            id,
            order_code: format!("FS2026080600{id}"),
            campaign_id: 7,
            user_id,
            reservation_id: id * 10,
            quantity: d("1.50"),
            unit_price: d("12.00"),
            total_amount: d("18.00"),
            discount_amount: d("6.00"),
            status: OrderStatus::Pending,
            payment_deadline: deadline,
            payment_method: None,
            paid_at: None,
            shipping_name: None,
            shipping_phone: None,
            shipping_address: None,
            customer_note: None,
            created_at: id,
            updated_at: id,
        }
    }

    #[test]
    fn test_insert_and_get_roundtrip() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let order = sample_order(1, 100, 5_000);
        storage.insert_order(&order).unwrap();

        let loaded = storage.get_order(1).unwrap().unwrap();
        assert_eq!(loaded.order_code, order.order_code);
        assert_eq!(loaded.quantity, d("1.50"));
        assert_eq!(loaded.status, OrderStatus::Pending);
        assert!(storage.get_order(2).unwrap().is_none());
    }

    #[test]
    fn test_pending_due_respects_deadline() {
        let storage = OrderStorage::open_in_memory().unwrap();
        storage.insert_order(&sample_order(1, 100, 1_000)).unwrap();
        storage.insert_order(&sample_order(2, 100, 9_000)).unwrap();

        let due = storage.pending_due(5_000).unwrap();
        assert_eq!(due, vec![1]);
        assert_eq!(storage.pending_count().unwrap(), 2);
    }

    #[test]
    fn test_update_order_clears_sweep_index() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let mut order = sample_order(1, 100, 1_000);
        storage.insert_order(&order).unwrap();

        order.status = OrderStatus::Paid;
        let txn = storage.begin_write().unwrap();
        storage.update_order(&txn, &order).unwrap();
        txn.commit().unwrap();

        assert!(storage.pending_due(5_000).unwrap().is_empty());
        assert_eq!(
            storage.get_order(1).unwrap().unwrap().status,
            OrderStatus::Paid
        );
    }

    #[test]
    fn test_orders_for_user_filters_and_sorts() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let mut other_campaign = sample_order(2, 100, 1_000);
        other_campaign.campaign_id = 8;
        storage.insert_order(&sample_order(1, 100, 1_000)).unwrap();
        storage.insert_order(&other_campaign).unwrap();
        storage.insert_order(&sample_order(3, 200, 1_000)).unwrap();

        let all = storage.orders_for_user(100, None).unwrap();
        assert_eq!(all.len(), 2);
        // Newest first
        assert_eq!(all[0].id, 2);

        let filtered = storage.orders_for_user(100, Some(7)).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, 1);
    }

    #[test]
    fn test_order_count_monotonic() {
        let storage = OrderStorage::open_in_memory().unwrap();
        assert_eq!(storage.next_order_count().unwrap(), 1);
        assert_eq!(storage.next_order_count().unwrap(), 2);
    }

    #[test]
    fn test_file_backed_reopen_preserves_orders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.redb");

        {
            let storage = OrderStorage::open(&path).unwrap();
            storage.insert_order(&sample_order(1, 100, 1_000)).unwrap();
        }

        let reopened = OrderStorage::open(&path).unwrap();
        assert!(reopened.get_order(1).unwrap().is_some());
        assert_eq!(reopened.pending_count().unwrap(), 1);
    }
}
