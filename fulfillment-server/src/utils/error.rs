//! 统一错误处理
//!
//! 错误类型定义在 `shared::error`，这里只做重导出。
//!
//! # 错误码规范
//!
//! | 范围 | 分类 | 示例 |
//! |------|------|------|
//! | 0xxx | 通用错误 | 2 验证失败 |
//! | 4xxx | 订单错误 | 4002 非法状态流转 |
//! | 5xxx | 支付错误 | 5001 GCash 号码无效 |
//! | 6xxx | 延迟任务错误 | 6001 任务不存在 |
//! | 9xxx | 系统错误 | 9002 数据库错误 |
//!
//! # 使用示例
//!
//! ```ignore
//! Err(AppError::validation("full_name must not be empty"))
//! ```

pub use shared::error::{ApiResponse, AppError, ErrorCategory, ErrorCode};
