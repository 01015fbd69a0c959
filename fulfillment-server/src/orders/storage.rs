//! redb-based order store
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` | Current order record |
//! | `line_items` | `(order_id, position)` | `OrderLineItem` | Items snapshot (immutable) |
//! | `deferred_jobs` | `job_id` | `DeferredJob` | Every registered job, kept after execution |
//! | `pending_jobs` | `(order_id, kind)` | `job_id` | At most one pending job per order and kind |
//! | `sequence_counter` | `"job_seq"` | `u64` | Job id sequence |
//!
//! # Durability
//!
//! redb commits are durable once `commit()` returns, and a write transaction
//! is the unit of atomicity: a status change and the jobs it registers, or a
//! job effect and its executed marker, land together or not at all.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use shared::order::{DeferredJob, JobFilter, JobKind, Order, OrderLineItem};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Orders: key = order_id, value = JSON-serialized Order
const ORDERS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("orders");

/// Line items: key = (order_id, position), value = JSON-serialized OrderLineItem
const LINE_ITEMS_TABLE: TableDefinition<(i64, u32), &[u8]> = TableDefinition::new("line_items");

/// Deferred jobs: key = job_id, value = JSON-serialized DeferredJob
const JOBS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("deferred_jobs");

/// Pending job index: key = (order_id, kind), value = job_id
const PENDING_JOBS_TABLE: TableDefinition<(i64, &str), u64> = TableDefinition::new("pending_jobs");

/// Sequence counters
const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequence_counter");

const JOB_SEQUENCE_KEY: &str = "job_seq";

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

/// Order store backed by redb
#[derive(Clone)]
pub struct OrderStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for OrderStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStorage").finish_non_exhaustive()
    }
}

impl OrderStorage {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init_tables(&db)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init_tables(&db)?;
        Ok(Self { db: Arc::new(db) })
    }

    fn init_tables(db: &Database) -> StorageResult<()> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(LINE_ITEMS_TABLE)?;
            let _ = write_txn.open_table(JOBS_TABLE)?;
            let _ = write_txn.open_table(PENDING_JOBS_TABLE)?;

            let mut seq_table = write_txn.open_table(SEQUENCE_TABLE)?;
            if seq_table.get(JOB_SEQUENCE_KEY)?.is_none() {
                seq_table.insert(JOB_SEQUENCE_KEY, 0u64)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Begin a write transaction
    ///
    /// redb serializes write transactions; a second caller blocks until the
    /// first commits or aborts.
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Order Operations ==========

    /// Get an order by id
    pub fn get_order(&self, order_id: i64) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get an order by id (within transaction)
    pub fn get_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: i64,
    ) -> StorageResult<Option<Order>> {
        let table = txn.open_table(ORDERS_TABLE)?;

        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Store (insert or overwrite) an order
    pub fn store_order(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        let mut table = txn.open_table(ORDERS_TABLE)?;
        let value = serde_json::to_vec(order)?;
        table.insert(order.id, value.as_slice())?;
        Ok(())
    }

    /// Get all orders
    pub fn get_all_orders(&self) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        let mut orders = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let order: Order = serde_json::from_slice(value.value())?;
            orders.push(order);
        }
        Ok(orders)
    }

    /// Delete an order and its line items
    ///
    /// Returns whether the order existed.
    pub fn remove_order(&self, txn: &WriteTransaction, order_id: i64) -> StorageResult<bool> {
        let existed = {
            let mut table = txn.open_table(ORDERS_TABLE)?;
            table.remove(order_id)?.is_some()
        };

        let mut items_table = txn.open_table(LINE_ITEMS_TABLE)?;
        let mut keys_to_remove: Vec<(i64, u32)> = Vec::new();
        for result in items_table.range((order_id, 0u32)..=(order_id, u32::MAX))? {
            let (key, _value) = result?;
            keys_to_remove.push(key.value());
        }
        for key in keys_to_remove {
            items_table.remove(key)?;
        }

        Ok(existed)
    }

    // ========== Line Item Operations ==========

    /// Store the line items snapshot of a newly placed order
    pub fn store_line_items(
        &self,
        txn: &WriteTransaction,
        order_id: i64,
        items: &[OrderLineItem],
    ) -> StorageResult<()> {
        let mut table = txn.open_table(LINE_ITEMS_TABLE)?;
        for (position, item) in (0u32..).zip(items) {
            let value = serde_json::to_vec(item)?;
            table.insert((order_id, position), value.as_slice())?;
        }
        Ok(())
    }

    /// Get the line items of an order in placement order
    pub fn get_line_items(&self, order_id: i64) -> StorageResult<Vec<OrderLineItem>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LINE_ITEMS_TABLE)?;

        let mut items = Vec::new();
        for result in table.range((order_id, 0u32)..=(order_id, u32::MAX))? {
            let (_key, value) = result?;
            let item: OrderLineItem = serde_json::from_slice(value.value())?;
            items.push(item);
        }
        Ok(items)
    }

    // ========== Deferred Job Operations ==========

    /// Increment and return the job id sequence
    pub fn next_job_id(&self, txn: &WriteTransaction) -> StorageResult<u64> {
        let mut table = txn.open_table(SEQUENCE_TABLE)?;
        let current = table
            .get(JOB_SEQUENCE_KEY)?
            .map(|guard| guard.value())
            .unwrap_or(0);
        let next = current + 1;
        table.insert(JOB_SEQUENCE_KEY, next)?;
        Ok(next)
    }

    /// Get a job by id
    pub fn get_job(&self, job_id: u64) -> StorageResult<Option<DeferredJob>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOBS_TABLE)?;

        match table.get(job_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get a job by id (within transaction)
    pub fn get_job_txn(
        &self,
        txn: &WriteTransaction,
        job_id: u64,
    ) -> StorageResult<Option<DeferredJob>> {
        let table = txn.open_table(JOBS_TABLE)?;

        match table.get(job_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Store a job, keeping the pending index in step with its state
    pub fn store_job(&self, txn: &WriteTransaction, job: &DeferredJob) -> StorageResult<()> {
        {
            let mut table = txn.open_table(JOBS_TABLE)?;
            let value = serde_json::to_vec(job)?;
            table.insert(job.id, value.as_slice())?;
        }

        let mut index = txn.open_table(PENDING_JOBS_TABLE)?;
        let key = (job.order_id, job.kind.as_str());
        if job.is_pending() {
            index.insert(key, job.id)?;
        } else {
            let indexed = index.get(key)?.map(|guard| guard.value());
            if indexed == Some(job.id) {
                index.remove(key)?;
            }
        }
        Ok(())
    }

    /// Get the pending job of a kind for an order (within transaction)
    pub fn get_pending_job_txn(
        &self,
        txn: &WriteTransaction,
        order_id: i64,
        kind: JobKind,
    ) -> StorageResult<Option<DeferredJob>> {
        let job_id = {
            let index = txn.open_table(PENDING_JOBS_TABLE)?;
            index
                .get((order_id, kind.as_str()))?
                .map(|guard| guard.value())
        };
        match job_id {
            Some(id) => self.get_job_txn(txn, id),
            None => Ok(None),
        }
    }

    /// Register a pending job, or move the due time of the existing one
    ///
    /// Returns the job id. The same id is reused while a job of this kind is
    /// pending for the order.
    pub fn upsert_pending_job(
        &self,
        txn: &WriteTransaction,
        order_id: i64,
        kind: JobKind,
        due_at: i64,
        now: i64,
    ) -> StorageResult<u64> {
        let job = match self.get_pending_job_txn(txn, order_id, kind)? {
            Some(mut existing) => {
                existing.due_at = due_at;
                existing
            }
            None => {
                let id = self.next_job_id(txn)?;
                DeferredJob::new(id, order_id, kind, due_at, now)
            }
        };
        self.store_job(txn, &job)?;
        Ok(job.id)
    }

    /// Cancel the pending job of a kind for an order
    ///
    /// Returns the cancelled job id, or `None` if nothing was pending.
    pub fn cancel_pending_job(
        &self,
        txn: &WriteTransaction,
        order_id: i64,
        kind: JobKind,
    ) -> StorageResult<Option<u64>> {
        match self.get_pending_job_txn(txn, order_id, kind)? {
            Some(mut job) => {
                job.cancelled = true;
                self.store_job(txn, &job)?;
                Ok(Some(job.id))
            }
            None => Ok(None),
        }
    }

    /// Pending jobs whose due time has been reached, oldest due first
    ///
    /// Undecodable job records are logged and skipped.
    pub fn get_due_jobs(&self, now: i64) -> StorageResult<Vec<DeferredJob>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(PENDING_JOBS_TABLE)?;
        let jobs_table = read_txn.open_table(JOBS_TABLE)?;

        let mut jobs = Vec::new();
        for result in index.iter()? {
            let (_key, job_id) = result?;
            let job_id = job_id.value();
            let Some(value) = jobs_table.get(job_id)? else {
                continue;
            };
            match serde_json::from_slice::<DeferredJob>(value.value()) {
                Ok(job) if job.is_due(now) => jobs.push(job),
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(job_id, error = %e, "Skipping undecodable deferred job");
                }
            }
        }

        jobs.sort_by_key(|job| (job.due_at, job.id));
        Ok(jobs)
    }

    /// List jobs, pending only unless `filter.all` is set
    pub fn get_jobs(&self, filter: &JobFilter) -> StorageResult<Vec<DeferredJob>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOBS_TABLE)?;

        let mut jobs = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let job: DeferredJob = serde_json::from_slice(value.value())?;
            if !filter.all && !job.is_pending() {
                continue;
            }
            if let Some(order_id) = filter.order_id
                && job.order_id != order_id
            {
                continue;
            }
            jobs.push(job);
        }

        jobs.sort_by_key(|job| (job.due_at, job.id));
        Ok(jobs)
    }

    /// Record a failed execution attempt; the job stays pending
    pub fn mark_job_failed(&self, job_id: u64, error: &str) -> StorageResult<()> {
        let txn = self.begin_write()?;
        if let Some(mut job) = self.get_job_txn(&txn, job_id)? {
            job.attempts += 1;
            job.last_error = Some(error.to_string());
            self.store_job(&txn, &job)?;
        }
        txn.commit()?;
        Ok(())
    }

    // ========== Statistics ==========

    /// Get storage statistics
    pub fn get_stats(&self) -> StorageResult<StorageStats> {
        let read_txn = self.db.begin_read()?;

        let orders_table = read_txn.open_table(ORDERS_TABLE)?;
        let items_table = read_txn.open_table(LINE_ITEMS_TABLE)?;
        let jobs_table = read_txn.open_table(JOBS_TABLE)?;
        let pending_table = read_txn.open_table(PENDING_JOBS_TABLE)?;

        Ok(StorageStats {
            order_count: orders_table.len()?,
            line_item_count: items_table.len()?,
            job_count: jobs_table.len()?,
            pending_job_count: pending_table.len()?,
        })
    }

    /// Register a pending job with raw bytes (for failure injection in tests)
    #[cfg(test)]
    pub fn put_raw_pending_job(
        &self,
        order_id: i64,
        kind: JobKind,
        job_id: u64,
        bytes: &[u8],
    ) -> StorageResult<()> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(JOBS_TABLE)?;
            table.insert(job_id, bytes)?;
            let mut index = txn.open_table(PENDING_JOBS_TABLE)?;
            index.insert((order_id, kind.as_str()), job_id)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Overwrite an order record with raw bytes (for failure injection in tests)
    #[cfg(test)]
    pub fn put_raw_order(&self, order_id: i64, bytes: &[u8]) -> StorageResult<()> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(ORDERS_TABLE)?;
            table.insert(order_id, bytes)?;
        }
        txn.commit()?;
        Ok(())
    }
}

/// Storage statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct StorageStats {
    pub order_count: u64,
    pub line_item_count: u64,
    pub job_count: u64,
    pub pending_job_count: u64,
}

#[cfg(test)]
pub(crate) mod test_support {
    use rust_decimal::Decimal;
    use shared::order::{
        DeliveryAddress, NewOrder, Order, OrderLineItem, OrderStatus, PaymentMethod,
    };

    pub fn new_order(id: i64, payment_method: PaymentMethod) -> NewOrder {
        NewOrder {
            id,
            user_id: Some(1),
            full_name: "Maria Santos".to_string(),
            phone_number: "09181234567".to_string(),
            delivery: DeliveryAddress {
                address: "45 Rizal Ave".to_string(),
                city: "Makati".to_string(),
                state_province: "Metro Manila".to_string(),
                postal_code: "1200".to_string(),
                delivery_address: Some("Blue gate".to_string()),
            },
            payment_method,
            subtotal: Decimal::new(120000, 2),
            delivery_fee: Decimal::new(10000, 2),
            total: Decimal::new(130000, 2),
            order_date: None,
            tracking_number: None,
            items: vec![
                OrderLineItem {
                    product_id: Some(10),
                    name: "Electric Fan".to_string(),
                    quantity: 1,
                    price: Decimal::new(90000, 2),
                    image_url: Some("uploads/fan.png".to_string()),
                },
                OrderLineItem {
                    product_id: Some(11),
                    name: "Extension Cord".to_string(),
                    quantity: 2,
                    price: Decimal::new(15000, 2),
                    image_url: None,
                },
            ],
        }
    }

    pub fn order_in(id: i64, status: OrderStatus, payment_method: PaymentMethod) -> Order {
        let (mut order, _) = new_order(id, payment_method).into_order(1_700_000_000_000);
        order.status = status;
        order
    }
}
