//! Deferred Job API Module
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/jobs | GET | 延迟任务列表 (`?all=true` 包含已执行/已撤销) |
//! | /api/jobs/run | POST | 立即执行一轮到期任务 |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub(crate) use handler::cancel_for_order;

/// Job router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/jobs", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/run", post(handler::run_now))
}
