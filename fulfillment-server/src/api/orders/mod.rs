//! Order API Module
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/orders | GET | 订单列表 (默认排除已移出报表的订单) |
//! | /api/orders | POST | 接收新订单 |
//! | /api/orders/{id} | GET | 订单详情 |
//! | /api/orders/{id}/products | GET | 订单明细 |
//! | /api/orders/{id}/status | PUT | 修改状态 |
//! | /api/orders/{id}/cancel | PUT | 取消订单 (`?expected_revision=N`) |
//! | /api/orders/{id}/date | PUT | 修改下单日期 |
//! | /api/orders/{id}/return | POST | 登记退货 (`{"reason": ...}`) |
//! | /api/orders/{id}/resolve-return | POST | 处理退货 (退款/取消退货) |
//! | /api/orders/{id}/salesreport | DELETE | 移出销售报表 |
//! | /api/orders/{id}/jobs/{kind} | DELETE | 撤销待执行的延迟任务 |
//! | /api/return-requests | GET | 退货队列 |

mod handler;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::api::jobs;
use crate::core::ServerState;

/// Order router
pub fn router() -> Router<ServerState> {
    Router::new()
        .nest("/api/orders", routes())
        .route("/api/return-requests", get(handler::list_return_requests))
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/products", get(handler::line_items))
        .route("/{id}/status", put(handler::change_status))
        .route("/{id}/cancel", put(handler::cancel))
        .route("/{id}/date", put(handler::edit_order_date))
        .route("/{id}/return", post(handler::record_return))
        .route("/{id}/resolve-return", post(handler::resolve_return))
        .route("/{id}/salesreport", delete(handler::remove_from_report))
        .route("/{id}/jobs/{kind}", delete(jobs::cancel_for_order))
}
