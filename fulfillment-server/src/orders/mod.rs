//! Orders Module - 订单履约核心
//!
//! # 组件
//!
//! | 模块 | 说明 |
//! |------|------|
//! | [`storage`] | redb 持久化 (订单、明细、延迟任务) |
//! | [`manager`] | 状态流转引擎 |
//! | [`scheduler`] | 延迟任务调度器 (Purge / HideFromReport) |
//! | [`returns`] | 退货处理流程 |
//! | [`visibility`] | 销售报表可见性 |
//!
//! # 流程
//!
//! ```text
//! change_status ─→ OrdersManager ─→ redb (status + job, one txn)
//!                                         │
//!               DeferredActionScheduler ←─┘ (tick)
//!                       │
//!                       ├─ Purge          → remove order + line items
//!                       └─ HideFromReport → in_sales_report = false
//! ```

pub mod error;
pub mod manager;
pub mod returns;
pub mod scheduler;
pub mod storage;
pub mod visibility;

pub use error::{OrderError, OrderResult};
pub use manager::{Clock, OrdersManager, system_clock};
pub use returns::{RefundDecision, StatusTransition};
pub use scheduler::{DEFAULT_TICK_INTERVAL, DeferredActionScheduler, JobOutcome, TickReport};
pub use storage::{OrderStorage, StorageError, StorageResult, StorageStats};
