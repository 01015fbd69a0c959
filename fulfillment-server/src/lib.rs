//! Fulfillment Server - 订单履约后台服务
//!
//! # 架构概述
//!
//! - **订单存储** (`orders::storage`): 嵌入式 redb 存储
//! - **状态流转** (`orders::manager`): 校验并提交状态变更，同一事务登记延迟任务
//! - **延迟任务** (`orders::scheduler`): 持久化、可恢复的 Purge / HideFromReport 调度
//! - **退货处理** (`orders::returns`): Returned 订单的退款/取消退货流程
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! fulfillment-server/src/
//! ├── core/          # 配置、状态、服务器、后台任务
//! ├── orders/        # 履约核心
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 错误、日志、校验
//! ```

pub mod api;
pub mod core;
pub mod orders;
pub mod utils;

// Re-export 公共类型
pub use crate::core::{Config, Server, ServerState};
pub use orders::{DeferredActionScheduler, OrderStorage, OrdersManager};
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{cleanup_old_logs, init_logger_with_file};

/// 设置运行环境
///
/// 1. 加载 `.env`
/// 2. 创建工作目录
/// 3. 初始化日志 (控制台 + work_dir/logs)
pub fn setup_environment() -> anyhow::Result<Config> {
    // .env 不存在时忽略
    let _ = dotenv::dotenv();

    let config = Config::from_env();
    config.ensure_work_dir_structure()?;

    let log_dir = config.log_dir().to_string_lossy().into_owned();
    init_logger_with_file(&config.log_level, config.log_json, Some(log_dir.as_str()))?;

    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
    ______      __________ ____
   / ____/_  __/ / __/ (_) / /___ ___  ___  ____  / /_
  / /_  / / / / / /_/ / / / / __ `__ \/ _ \/ __ \/ __/
 / __/ / /_/ / / __/ / / / / / / / / /  __/ / / / /_
/_/    \__,_/_/_/ /_/_/_/_/_/ /_/ /_/\___/_/ /_/\__/
    "#
    );
}
