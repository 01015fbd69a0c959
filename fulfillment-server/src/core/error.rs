use thiserror::Error;

use crate::orders::StorageError;

/// 服务器启动/运行错误
///
/// 请求级错误走 [`AppError`](crate::utils::AppError)，这里只覆盖进程边界。
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("数据库打开失败: {0}")]
    Storage(#[from] StorageError),
}

/// 服务器 Result 类型别名
pub type Result<T> = std::result::Result<T, ServerError>;
