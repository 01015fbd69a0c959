//! 延迟任务调度器
//!
//! 启动时先补扫一次已到期的任务，之后按固定间隔轮询。
//!
//! Each job is claimed, applied and marked executed inside one write
//! transaction, so overlapping ticks (the periodic loop and a manual run)
//! cannot apply the same job twice. A failed job stays pending with its
//! attempt count and last error recorded, and is retried on the next tick.

use std::time::Duration;

use serde::Serialize;
use shared::order::{DeferredJob, JobFilter, JobKind, OrderStatus};
use tokio_util::sync::CancellationToken;

use super::error::{OrderError, OrderResult};
use super::manager::Clock;
use super::storage::{OrderStorage, StorageError};
use super::visibility;

/// Default polling interval
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Result of one pass over due jobs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Jobs found due at the start of the pass
    pub due: usize,
    pub executed: usize,
    /// Already handled by a concurrent pass
    pub skipped: usize,
    pub failed: usize,
}

/// What happened to a single job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Executed,
    Skipped,
}

/// Deferred action scheduler
///
/// 在 `start_background_tasks()` 中注册为后台任务。
#[derive(Clone)]
pub struct DeferredActionScheduler {
    storage: OrderStorage,
    clock: Clock,
    interval: Duration,
}

impl std::fmt::Debug for DeferredActionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredActionScheduler")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl DeferredActionScheduler {
    pub fn new(storage: OrderStorage, clock: Clock, interval: Duration) -> Self {
        Self {
            storage,
            clock,
            interval,
        }
    }

    /// 主循环：启动补扫 → 周期触发
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Deferred action scheduler started");

        // 1. 启动补扫
        match self.tick() {
            Ok(report) if report.due > 0 => {
                tracing::info!(
                    due = report.due,
                    executed = report.executed,
                    failed = report.failed,
                    "Recovered overdue deferred jobs"
                );
            }
            Ok(_) => tracing::debug!("No overdue deferred jobs at startup"),
            Err(e) => tracing::error!(error = %e, "Deferred job recovery scan failed"),
        }

        // 2. 周期循环
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // 第一次 tick 立即返回，已由补扫覆盖
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Deferred action scheduler received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick() {
                        tracing::error!(error = %e, "Deferred job scan failed");
                    }
                }
            }
        }

        tracing::info!("Deferred action scheduler stopped");
    }

    /// Run every job due at the clock's current time
    pub fn tick(&self) -> OrderResult<TickReport> {
        self.run_due_jobs((self.clock)())
    }

    /// Run every job whose `due_at` is at or before `now`
    pub fn run_due_jobs(&self, now: i64) -> OrderResult<TickReport> {
        let due = self.storage.get_due_jobs(now)?;
        let mut report = TickReport {
            due: due.len(),
            ..Default::default()
        };

        for job in due {
            match self.execute_job(job.id, now) {
                Ok(JobOutcome::Executed) => report.executed += 1,
                Ok(JobOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    let failure = OrderError::Execution {
                        job_id: job.id,
                        message: e.to_string(),
                    };
                    tracing::warn!(
                        order_id = job.order_id,
                        kind = %job.kind,
                        attempts = job.attempts + 1,
                        error = %failure,
                        "Deferred job failed, will retry"
                    );
                    if let Err(mark_err) = self.storage.mark_job_failed(job.id, &failure.to_string()) {
                        tracing::error!(job_id = job.id, error = %mark_err, "Failed to record job failure");
                    }
                }
            }
        }

        if report.executed > 0 || report.failed > 0 {
            tracing::info!(
                due = report.due,
                executed = report.executed,
                skipped = report.skipped,
                failed = report.failed,
                "Deferred job tick finished"
            );
        }
        Ok(report)
    }

    /// Claim, apply and mark one job in a single transaction
    pub fn execute_job(&self, job_id: u64, now: i64) -> OrderResult<JobOutcome> {
        let txn = self.storage.begin_write()?;
        let Some(mut job) = self.storage.get_job_txn(&txn, job_id)? else {
            return Ok(JobOutcome::Skipped);
        };
        if !job.is_due(now) {
            return Ok(JobOutcome::Skipped);
        }

        match job.kind {
            JobKind::Purge => {
                if let Some(order) = self.storage.get_order_txn(&txn, job.order_id)?
                    && order.status != OrderStatus::Cancelled
                {
                    // 正常情况下离开 Cancelled 时已撤销，这里兜底
                    tracing::warn!(
                        job_id,
                        order_id = job.order_id,
                        status = %order.status,
                        "Purge target left Cancelled, withdrawing job"
                    );
                    job.cancelled = true;
                    self.storage.store_job(&txn, &job)?;
                    txn.commit().map_err(StorageError::from)?;
                    return Ok(JobOutcome::Skipped);
                }
                self.storage.remove_order(&txn, job.order_id)?;
                for kind in JobKind::ALL {
                    if kind != JobKind::Purge {
                        self.storage.cancel_pending_job(&txn, job.order_id, kind)?;
                    }
                }
            }
            JobKind::HideFromReport => {
                if visibility::hide_from_report(&self.storage, &txn, job.order_id)?.is_none() {
                    tracing::warn!(job_id, order_id = job.order_id, "Hide target no longer exists");
                }
            }
        }

        job.executed = true;
        job.executed_at = Some(now);
        self.storage.store_job(&txn, &job)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            job_id,
            order_id = job.order_id,
            kind = %job.kind,
            due_at = %shared::util::format_millis(job.due_at),
            lateness_ms = now - job.due_at,
            "Deferred job executed"
        );
        Ok(JobOutcome::Executed)
    }

    /// Withdraw the pending job of a kind for an order
    pub fn cancel_jobs_for(&self, order_id: i64, kind: JobKind) -> OrderResult<u64> {
        let txn = self.storage.begin_write()?;
        let job_id = self
            .storage
            .cancel_pending_job(&txn, order_id, kind)?
            .ok_or(OrderError::JobNotFound { order_id, kind })?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(job_id, order_id, kind = %kind, "Deferred job cancelled");
        Ok(job_id)
    }

    pub fn list_jobs(&self, filter: &JobFilter) -> OrderResult<Vec<DeferredJob>> {
        Ok(self.storage.get_jobs(filter)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::manager::OrdersManager;
    use crate::orders::storage::test_support::new_order;
    use shared::order::{OrderFilter, PaymentMethod};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};

    const T: i64 = 1_700_000_000_000;
    const MINUTE: i64 = 60_000;
    const HOUR: i64 = 60 * MINUTE;

    fn setup() -> (OrdersManager, DeferredActionScheduler, Arc<AtomicI64>) {
        let now = Arc::new(AtomicI64::new(T));
        let clock_now = now.clone();
        let clock: Clock = Arc::new(move || clock_now.load(Ordering::SeqCst));
        let storage = OrderStorage::open_in_memory().unwrap();
        let manager = OrdersManager::with_clock(storage.clone(), clock.clone());
        let scheduler = DeferredActionScheduler::new(storage, clock, DEFAULT_TICK_INTERVAL);
        (manager, scheduler, now)
    }

    fn in_report(manager: &OrdersManager, id: i64) -> bool {
        manager
            .list_orders(&OrderFilter::default())
            .unwrap()
            .iter()
            .any(|order| order.id == id)
    }

    #[test]
    fn test_delivered_order_hidden_after_five_hours() {
        let (manager, scheduler, _) = setup();
        manager
            .ingest_order(new_order(42, PaymentMethod::GCash))
            .unwrap();
        manager
            .change_status(42, OrderStatus::Delivered, None)
            .unwrap();

        let report = scheduler.run_due_jobs(T + 4 * HOUR + 59 * MINUTE).unwrap();
        assert_eq!(report, TickReport::default());
        assert!(in_report(&manager, 42));

        let report = scheduler.run_due_jobs(T + 5 * HOUR).unwrap();
        assert_eq!(report.executed, 1);
        assert!(!in_report(&manager, 42));
        let hidden = manager.get_order(42).unwrap();
        assert_eq!(hidden.status, OrderStatus::Delivered);

        let report = scheduler.run_due_jobs(T + 6 * HOUR).unwrap();
        assert_eq!(report, TickReport::default());
        assert_eq!(manager.get_order(42).unwrap(), hidden);
    }

    #[test]
    fn test_cancelled_order_purged_after_eight_hours() {
        let (manager, scheduler, _) = setup();
        manager
            .ingest_order(new_order(3, PaymentMethod::CashOnDelivery))
            .unwrap();
        let change = manager
            .change_status(3, OrderStatus::Cancelled, None)
            .unwrap();

        scheduler.run_due_jobs(T + 8 * HOUR - 1).unwrap();
        assert!(manager.get_order(3).is_ok());
        assert_eq!(manager.line_items(3).unwrap().len(), 2);

        let report = scheduler.run_due_jobs(T + 8 * HOUR).unwrap();
        assert_eq!(report.executed, 1);
        assert!(matches!(manager.get_order(3), Err(OrderError::NotFound(3))));
        assert!(manager.storage().get_line_items(3).unwrap().is_empty());

        let job = manager
            .storage()
            .get_job(change.scheduled_jobs[0])
            .unwrap()
            .unwrap();
        assert!(job.executed);
        assert_eq!(job.executed_at, Some(T + 8 * HOUR));
    }

    #[test]
    fn test_overdue_job_fires_once() {
        let (manager, scheduler, now) = setup();
        manager
            .ingest_order(new_order(5, PaymentMethod::CashOnDelivery))
            .unwrap();
        manager
            .change_status(5, OrderStatus::Delivered, None)
            .unwrap();

        // three days of downtime
        now.store(T + 72 * HOUR, Ordering::SeqCst);
        assert_eq!(scheduler.tick().unwrap().executed, 1);
        assert_eq!(scheduler.tick().unwrap().executed, 0);
    }

    #[test]
    fn test_purge_withdraws_remaining_jobs() {
        let (manager, scheduler, now) = setup();
        manager
            .ingest_order(new_order(6, PaymentMethod::CashOnDelivery))
            .unwrap();
        let delivered = manager
            .change_status(6, OrderStatus::Delivered, None)
            .unwrap();
        manager
            .change_status(6, OrderStatus::Cancelled, None)
            .unwrap();

        // hide runs first (5h), purge later (8h)
        now.store(T + 9 * HOUR, Ordering::SeqCst);
        let report = scheduler.tick().unwrap();
        assert_eq!(report.due, 2);
        assert_eq!(report.executed, 2);
        assert!(manager.get_order(6).is_err());

        let hide = manager
            .storage()
            .get_job(delivered.scheduled_jobs[0])
            .unwrap()
            .unwrap();
        assert!(hide.executed);
        assert!(
            scheduler
                .list_jobs(&JobFilter::default())
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_hide_for_missing_order_is_noop() {
        let (manager, scheduler, _) = setup();
        let txn = manager.storage().begin_write().unwrap();
        let id = manager
            .storage()
            .upsert_pending_job(&txn, 77, JobKind::HideFromReport, T, T)
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(scheduler.execute_job(id, T).unwrap(), JobOutcome::Executed);
        assert!(manager.storage().get_job(id).unwrap().unwrap().executed);
    }

    #[test]
    fn test_execute_job_is_idempotent() {
        let (manager, scheduler, _) = setup();
        manager
            .ingest_order(new_order(8, PaymentMethod::CashOnDelivery))
            .unwrap();
        let change = manager
            .change_status(8, OrderStatus::Delivered, None)
            .unwrap();
        let job_id = change.scheduled_jobs[0];

        assert_eq!(
            scheduler.execute_job(job_id, T + 4 * HOUR).unwrap(),
            JobOutcome::Skipped
        );
        assert_eq!(
            scheduler.execute_job(job_id, T + 5 * HOUR).unwrap(),
            JobOutcome::Executed
        );
        assert_eq!(
            scheduler.execute_job(job_id, T + 5 * HOUR).unwrap(),
            JobOutcome::Skipped
        );
        assert_eq!(manager.get_order(8).unwrap().revision, 2);
    }

    #[test]
    fn test_overlapping_ticks_execute_each_job_once() {
        let (manager, scheduler, now) = setup();
        for id in 1..=50 {
            manager
                .ingest_order(new_order(id, PaymentMethod::CashOnDelivery))
                .unwrap();
            let target = if id % 2 == 0 {
                OrderStatus::Delivered
            } else {
                OrderStatus::Cancelled
            };
            manager.change_status(id, target, None).unwrap();
        }
        now.store(T + 9 * HOUR, Ordering::SeqCst);

        let barrier = Arc::new(std::sync::Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let scheduler = scheduler.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    scheduler.tick().unwrap()
                })
            })
            .collect();
        let reports: Vec<TickReport> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let executed: usize = reports.iter().map(|r| r.executed).sum();
        let failed: usize = reports.iter().map(|r| r.failed).sum();
        assert_eq!(executed, 50);
        assert_eq!(failed, 0);
        for report in &reports {
            assert_eq!(report.due, report.executed + report.skipped);
        }

        let history = scheduler
            .list_jobs(&JobFilter {
                all: true,
                order_id: None,
            })
            .unwrap();
        assert_eq!(history.len(), 50);
        assert!(history.iter().all(|job| job.executed && !job.cancelled));

        for id in 1..=50 {
            match manager.get_order(id) {
                Ok(order) => {
                    assert_eq!(order.status, OrderStatus::Delivered);
                    assert!(!order.in_sales_report);
                    // delivered once, hidden once
                    assert_eq!(order.revision, 2);
                }
                Err(OrderError::NotFound(_)) => assert!(id % 2 == 1),
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(scheduler.tick().unwrap(), TickReport::default());
    }

    #[test]
    fn test_failed_job_is_retried_not_dropped() {
        let (manager, scheduler, _) = setup();
        manager
            .ingest_order(new_order(9, PaymentMethod::CashOnDelivery))
            .unwrap();
        let change = manager
            .change_status(9, OrderStatus::Delivered, None)
            .unwrap();
        let job_id = change.scheduled_jobs[0];
        let good = manager.get_order(9).unwrap();

        manager.storage().put_raw_order(9, b"not json").unwrap();

        let report = scheduler.run_due_jobs(T + 5 * HOUR).unwrap();
        assert_eq!(report.failed, 1);
        let report = scheduler.run_due_jobs(T + 6 * HOUR).unwrap();
        assert_eq!(report.failed, 1);

        let job = manager.storage().get_job(job_id).unwrap().unwrap();
        assert!(job.is_pending());
        assert_eq!(job.attempts, 2);
        assert!(job.last_error.is_some());

        // repair the record; the next tick succeeds
        let txn = manager.storage().begin_write().unwrap();
        manager.storage().store_order(&txn, &good).unwrap();
        txn.commit().unwrap();

        let report = scheduler.run_due_jobs(T + 7 * HOUR).unwrap();
        assert_eq!(report.executed, 1);
        assert!(!manager.get_order(9).unwrap().in_sales_report);
    }

    #[test]
    fn test_cancel_jobs_for() {
        let (manager, scheduler, _) = setup();
        manager
            .ingest_order(new_order(10, PaymentMethod::CashOnDelivery))
            .unwrap();
        manager
            .change_status(10, OrderStatus::Cancelled, None)
            .unwrap();

        scheduler.cancel_jobs_for(10, JobKind::Purge).unwrap();
        assert!(matches!(
            scheduler.cancel_jobs_for(10, JobKind::Purge),
            Err(OrderError::JobNotFound { order_id: 10, .. })
        ));

        scheduler.run_due_jobs(T + 24 * HOUR).unwrap();
        assert!(manager.get_order(10).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_recovers_then_stops_on_shutdown() {
        let (manager, scheduler, now) = setup();
        manager
            .ingest_order(new_order(11, PaymentMethod::CashOnDelivery))
            .unwrap();
        manager
            .change_status(11, OrderStatus::Delivered, None)
            .unwrap();
        now.store(T + 5 * HOUR, Ordering::SeqCst);

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!manager.get_order(11).unwrap().in_sales_report);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
