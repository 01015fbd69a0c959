//! OrdersManager - status transition engine
//!
//! Every mutation is one read-modify-write inside a single redb write
//! transaction. Status changes additionally carry an optimistic revision
//! check: the caller's observed revision (or the one read before the write
//! began) must still be current when the write transaction runs, otherwise
//! the change fails with [`OrderError::Conflict`].
//!
//! Deferred jobs registered by a transition, and pending jobs withdrawn by
//! it, are written in the same transaction as the status itself.

use std::sync::Arc;

use shared::order::{
    JobKind, NewOrder, Order, OrderFilter, OrderLineItem, OrderStatus, ReturnRequest,
    StatusChange,
};

use super::error::{OrderError, OrderResult};
use super::storage::{OrderStorage, StorageError, StorageStats};
use super::visibility;

/// Source of "now" in Unix millis
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(shared::util::now_millis)
}

/// Order fulfillment engine
#[derive(Clone)]
pub struct OrdersManager {
    storage: OrderStorage,
    clock: Clock,
}

impl std::fmt::Debug for OrdersManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrdersManager")
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl OrdersManager {
    pub fn new(storage: OrderStorage) -> Self {
        Self::with_clock(storage, system_clock())
    }

    pub fn with_clock(storage: OrderStorage, clock: Clock) -> Self {
        Self { storage, clock }
    }

    pub fn storage(&self) -> &OrderStorage {
        &self.storage
    }

    pub fn clock(&self) -> Clock {
        self.clock.clone()
    }

    pub fn now(&self) -> i64 {
        (self.clock)()
    }

    // ========== Queries ==========

    pub fn get_order(&self, order_id: i64) -> OrderResult<Order> {
        self.storage
            .get_order(order_id)?
            .ok_or(OrderError::NotFound(order_id))
    }

    pub fn line_items(&self, order_id: i64) -> OrderResult<Vec<OrderLineItem>> {
        // 确认订单存在，区分 "无明细" 与 "无订单"
        self.get_order(order_id)?;
        Ok(self.storage.get_line_items(order_id)?)
    }

    /// Orders matching the filter, most recent `order_date` first
    pub fn list_orders(&self, filter: &OrderFilter) -> OrderResult<Vec<Order>> {
        Ok(visibility::list_orders(&self.storage, filter)?)
    }

    /// Return queue: `Returned` first, then most recent return request
    pub fn list_return_requests(&self) -> OrderResult<Vec<ReturnRequest>> {
        let mut orders: Vec<Order> = self
            .storage
            .get_all_orders()?
            .into_iter()
            .filter(|order| order.status.is_return_related())
            .collect();

        orders.sort_by(|a, b| {
            let a_open = a.status == OrderStatus::Returned;
            let b_open = b.status == OrderStatus::Returned;
            b_open
                .cmp(&a_open)
                .then(b.return_requested_at.cmp(&a.return_requested_at))
                .then(b.id.cmp(&a.id))
        });

        orders
            .into_iter()
            .map(|order| -> OrderResult<ReturnRequest> {
                let items = self.storage.get_line_items(order.id)?;
                Ok(ReturnRequest::new(order, &items))
            })
            .collect()
    }

    pub fn stats(&self) -> OrderResult<StorageStats> {
        Ok(self.storage.get_stats()?)
    }

    // ========== Commands ==========

    /// Accept a newly placed order in `Processing`
    pub fn ingest_order(&self, new_order: NewOrder) -> OrderResult<Order> {
        let now = self.now();
        let (order, items) = new_order.into_order(now);

        let txn = self.storage.begin_write()?;
        if self.storage.get_order_txn(&txn, order.id)?.is_some() {
            return Err(OrderError::AlreadyExists(order.id));
        }
        self.storage.store_order(&txn, &order)?;
        self.storage.store_line_items(&txn, order.id, &items)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            order_id = order.id,
            items = items.len(),
            payment_method = %order.payment_method,
            "Order ingested"
        );
        Ok(order)
    }

    /// Operator status change
    ///
    /// Return outcomes (`Refunded`, `Return Cancelled`) are only reachable
    /// through the return resolution workflow and are rejected here.
    pub fn change_status(
        &self,
        order_id: i64,
        target: OrderStatus,
        expected_revision: Option<u64>,
    ) -> OrderResult<StatusChange> {
        if target.is_return_outcome() {
            let current = self.get_order(order_id)?;
            return Err(OrderError::InvalidTransition {
                order_id,
                from: current.status,
                to: target,
            });
        }
        self.apply_transition(order_id, target, expected_revision)
    }

    /// Validate and commit a transition from the full table
    pub(crate) fn apply_transition(
        &self,
        order_id: i64,
        target: OrderStatus,
        expected_revision: Option<u64>,
    ) -> OrderResult<StatusChange> {
        // 1. 读阶段：校验状态机，记录观察到的版本
        let observed = self.get_order(order_id)?;
        if let Some(expected) = expected_revision
            && expected != observed.revision
        {
            return Err(OrderError::Conflict {
                order_id,
                expected,
                actual: observed.revision,
            });
        }
        if !observed.status.can_transition_to(target) {
            return Err(OrderError::InvalidTransition {
                order_id,
                from: observed.status,
                to: target,
            });
        }
        let expected = expected_revision.unwrap_or(observed.revision);

        // 2. 写阶段：条件更新
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or(OrderError::NotFound(order_id))?;
        // 读写之间被其他请求改动 (包括未带 revision 的请求)
        if order.revision != expected || order.status != observed.status {
            return Err(OrderError::Conflict {
                order_id,
                expected,
                actual: order.revision,
            });
        }

        let now = self.now();
        let from = order.status;
        order.status = target;
        order.status_changed_at = now;
        order.revision += 1;
        self.storage.store_order(&txn, &order)?;

        let withdrawn = self.withdraw_superseded_jobs(&txn, order_id, target)?;
        let scheduled = match target.scheduled_job() {
            Some(kind) => {
                let due_at = now + kind.delay_millis();
                let job_id = self
                    .storage
                    .upsert_pending_job(&txn, order_id, kind, due_at, now)?;
                vec![job_id]
            }
            None => Vec::new(),
        };
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            order_id,
            from = %from,
            to = %target,
            revision = order.revision,
            scheduled = ?scheduled,
            withdrawn = ?withdrawn,
            "Order status changed"
        );

        Ok(StatusChange {
            order,
            scheduled_jobs: scheduled,
        })
    }

    /// Externally supplied return: puts the order into `Returned`
    ///
    /// Not validated against the transition table. Recording a return for an
    /// order that is already `Returned` leaves it untouched, including the
    /// first reason given.
    pub fn record_return(
        &self,
        order_id: i64,
        reason: Option<String>,
    ) -> OrderResult<StatusChange> {
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or(OrderError::NotFound(order_id))?;

        if order.status == OrderStatus::Returned {
            return Ok(StatusChange {
                order,
                scheduled_jobs: Vec::new(),
            });
        }

        let now = self.now();
        let from = order.status;
        order.status = OrderStatus::Returned;
        order.status_changed_at = now;
        order.return_reason = reason;
        order.return_requested_at = Some(now);
        order.revision += 1;
        self.storage.store_order(&txn, &order)?;
        let withdrawn = self.withdraw_superseded_jobs(&txn, order_id, OrderStatus::Returned)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(order_id, from = %from, withdrawn = ?withdrawn, "Return recorded");
        Ok(StatusChange {
            order,
            scheduled_jobs: Vec::new(),
        })
    }

    /// Operator edit of `order_date`; status and timing fields are untouched
    pub fn edit_order_date(&self, order_id: i64, order_date: i64) -> OrderResult<Order> {
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or(OrderError::NotFound(order_id))?;

        if !order.status.allows_date_edit() {
            return Err(OrderError::InvalidState {
                order_id,
                status: order.status,
                operation: "editing the order date",
            });
        }

        order.order_date = order_date;
        order.revision += 1;
        self.storage.store_order(&txn, &order)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(order_id, order_date, "Order date updated");
        Ok(order)
    }

    /// Explicit operator "remove from report"
    pub fn remove_from_report(&self, order_id: i64) -> OrderResult<Order> {
        let txn = self.storage.begin_write()?;
        let order = visibility::hide_from_report(&self.storage, &txn, order_id)?
            .ok_or(OrderError::NotFound(order_id))?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(order_id, "Order removed from sales report");
        Ok(order)
    }

    /// Cancel pending jobs made obsolete by entering `next`
    fn withdraw_superseded_jobs(
        &self,
        txn: &redb::WriteTransaction,
        order_id: i64,
        next: OrderStatus,
    ) -> OrderResult<Vec<u64>> {
        let mut withdrawn = Vec::new();
        for kind in JobKind::ALL {
            if kind.superseded_by(next)
                && let Some(job_id) = self.storage.cancel_pending_job(txn, order_id, kind)?
            {
                withdrawn.push(job_id);
            }
        }
        Ok(withdrawn)
    }
}
