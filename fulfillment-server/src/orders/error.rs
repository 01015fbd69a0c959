use super::storage::StorageError;
use shared::error::{AppError, ErrorCode};
use shared::order::{JobKind, OrderStatus};
use thiserror::Error;

/// Order fulfillment errors
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Order not found: {0}")]
    NotFound(i64),

    #[error("Order {order_id}: cannot move from {from} to {to}")]
    InvalidTransition {
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Order {order_id}: {operation} not allowed while {status}")]
    InvalidState {
        order_id: i64,
        status: OrderStatus,
        operation: &'static str,
    },

    #[error("Order {order_id}: invalid GCash phone number")]
    InvalidPhoneNumber { order_id: i64 },

    #[error("Order {order_id} was modified concurrently (expected revision {expected}, found {actual})")]
    Conflict {
        order_id: i64,
        expected: u64,
        actual: u64,
    },

    #[error("Order already exists: {0}")]
    AlreadyExists(i64),

    #[error("No pending {kind} job for order {order_id}")]
    JobNotFound { order_id: i64, kind: JobKind },

    #[error("Job {job_id} failed: {message}")]
    Execution { job_id: u64, message: String },
}

pub type OrderResult<T> = Result<T, OrderError>;

/// 将存储错误转换为错误码
fn classify_storage_error(e: &StorageError) -> ErrorCode {
    if let StorageError::Serialization(_) = e {
        return ErrorCode::StorageCorrupted;
    }

    // redb 错误通过字符串匹配分类
    let err_str = e.to_string().to_lowercase();

    // 磁盘空间不足
    if err_str.contains("no space") || err_str.contains("disk full") || err_str.contains("enospc")
    {
        return ErrorCode::StorageFull;
    }

    // 数据损坏
    if err_str.contains("corrupt") || err_str.contains("invalid database") {
        return ErrorCode::StorageCorrupted;
    }

    // 默认：系统繁忙
    ErrorCode::SystemBusy
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Storage(e) => {
                let code = classify_storage_error(&e);
                tracing::error!(error = %e, error_code = ?code, "Storage error occurred");
                AppError::with_message(code, e.to_string())
            }
            OrderError::NotFound(id) => {
                AppError::with_message(ErrorCode::OrderNotFound, format!("Order {} not found", id))
                    .with_detail("order_id", id)
            }
            OrderError::InvalidTransition { order_id, from, to } => {
                AppError::with_message(ErrorCode::InvalidTransition, err.to_string())
                    .with_detail("order_id", order_id)
                    .with_detail("from", from.as_str())
                    .with_detail("to", to.as_str())
            }
            OrderError::InvalidState {
                order_id, status, ..
            } => AppError::with_message(ErrorCode::InvalidOrderState, err.to_string())
                .with_detail("order_id", order_id)
                .with_detail("status", status.as_str()),
            OrderError::InvalidPhoneNumber { order_id } => {
                AppError::new(ErrorCode::InvalidPhoneNumber).with_detail("order_id", order_id)
            }
            OrderError::Conflict {
                order_id,
                expected,
                actual,
            } => AppError::with_message(ErrorCode::OrderConflict, err.to_string())
                .with_detail("order_id", order_id)
                .with_detail("expected_revision", expected)
                .with_detail("actual_revision", actual),
            OrderError::AlreadyExists(id) => AppError::with_message(
                ErrorCode::OrderAlreadyExists,
                format!("Order {} already exists", id),
            )
            .with_detail("order_id", id),
            OrderError::JobNotFound { order_id, kind } => {
                AppError::with_message(ErrorCode::JobNotFound, err.to_string())
                    .with_detail("order_id", order_id)
                    .with_detail("kind", kind.as_str())
            }
            OrderError::Execution { job_id, .. } => {
                AppError::with_message(ErrorCode::SchedulerExecutionFailure, err.to_string())
                    .with_detail("job_id", job_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_error_mapping() {
        let err: AppError = OrderError::NotFound(42).into();
        assert_eq!(err.code, ErrorCode::OrderNotFound);
        assert_eq!(err.http_status(), StatusCode::NOT_FOUND);

        let err: AppError = OrderError::InvalidTransition {
            order_id: 1,
            from: OrderStatus::Shipped,
            to: OrderStatus::Processing,
        }
        .into();
        assert_eq!(err.code, ErrorCode::InvalidTransition);
        assert_eq!(err.message, "Order 1: cannot move from Shipped to Processing");

        let err: AppError = OrderError::Conflict {
            order_id: 1,
            expected: 0,
            actual: 1,
        }
        .into();
        assert_eq!(err.http_status(), StatusCode::CONFLICT);
        let details = err.details.unwrap();
        assert_eq!(details.get("actual_revision").unwrap(), 1);
    }

    #[test]
    fn test_storage_errors_are_classified() {
        let serde_err = serde_json::from_slice::<shared::order::Order>(b"{").unwrap_err();
        let err: AppError = OrderError::Storage(StorageError::Serialization(serde_err)).into();
        assert_eq!(err.code, ErrorCode::StorageCorrupted);
        assert_eq!(err.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
