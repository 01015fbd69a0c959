use std::sync::Arc;

use crate::core::Config;
use crate::core::error::Result;
use crate::core::tasks::BackgroundTasks;
use crate::orders::{
    Clock, DeferredActionScheduler, OrderStorage, OrdersManager, system_clock,
};
use crate::utils::logger;

/// 服务器状态 - 持有所有服务的共享引用
///
/// 所有字段内部都是 Arc，Clone 只是浅拷贝。
///
/// # 服务组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | orders | OrdersManager | 状态流转引擎 (redb) |
/// | scheduler | DeferredActionScheduler | 延迟任务调度器 |
///
/// # 使用示例
///
/// ```ignore
/// let state = ServerState::initialize(&config)?;
/// let tasks = state.start_background_tasks();
/// let order = state.orders.get_order(42)?;
/// ```
#[derive(Clone, Debug)]
pub struct ServerState {
    /// 服务器配置
    pub config: Arc<Config>,
    /// 订单引擎
    pub orders: OrdersManager,
    /// 延迟任务调度器
    pub scheduler: DeferredActionScheduler,
}

impl ServerState {
    /// 基于已打开的存储构造状态
    pub fn new(config: Config, storage: OrderStorage, clock: Clock) -> Self {
        let scheduler =
            DeferredActionScheduler::new(storage.clone(), clock.clone(), config.scheduler_interval());
        let orders = OrdersManager::with_clock(storage, clock);
        Self {
            config: Arc::new(config),
            orders,
            scheduler,
        }
    }

    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录结构
    /// 2. 数据库 (work_dir/database/fulfillment.redb)
    /// 3. 订单引擎与调度器
    pub fn initialize(config: &Config) -> Result<Self> {
        config.ensure_work_dir_structure()?;

        let db_path = config.database_path();
        let storage = OrderStorage::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "Order store opened");

        Ok(Self::new(config.clone(), storage, system_clock()))
    }

    /// 启动后台任务
    ///
    /// 启动的任务：
    /// - 延迟任务调度器 (启动补扫 + 周期轮询)
    /// - 日志清理
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        let scheduler = self.scheduler.clone();
        let shutdown = tasks.shutdown_token();
        tasks.spawn("deferred_action_scheduler", async move {
            scheduler.run(shutdown).await;
        });

        let log_dir = self.config.log_dir();
        let shutdown = tasks.shutdown_token();
        tasks.spawn("log_cleanup", async move {
            logger::run_log_cleanup(log_dir, shutdown).await;
        });

        tasks.log_summary();
        tasks
    }
}
