//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use shared::order::{
    CancelOrderRequest, ChangeStatusRequest, EditOrderDateRequest, NewOrder, Order, OrderFilter,
    OrderLineItem, OrderStatus, RecordReturnRequest, ResolveReturnRequest, ReturnRequest,
    StatusChange,
};

use crate::core::ServerState;
use crate::utils::validation::{
    MAX_ADDRESS_LEN, MAX_NAME_LEN, MAX_SHORT_TEXT_LEN, MAX_URL_LEN, validate_optional_text,
    validate_required_text,
};
use crate::utils::{AppError, AppResult};

/// List orders, most recent order date first
pub async fn list(
    State(state): State<ServerState>,
    Query(filter): Query<OrderFilter>,
) -> AppResult<Json<Vec<Order>>> {
    Ok(Json(state.orders.list_orders(&filter)?))
}

/// Accept a new order from the storefront
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<NewOrder>,
) -> AppResult<(StatusCode, Json<Order>)> {
    validate_new_order(&payload)?;
    let order = state.orders.ingest_order(payload)?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Order>> {
    Ok(Json(state.orders.get_order(id)?))
}

pub async fn line_items(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<OrderLineItem>>> {
    Ok(Json(state.orders.line_items(id)?))
}

pub async fn change_status(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<ChangeStatusRequest>,
) -> AppResult<Json<StatusChange>> {
    let change = state
        .orders
        .change_status(id, payload.status, payload.expected_revision)?;
    Ok(Json(change))
}

/// Shortcut for a status change to `Cancelled`
pub async fn cancel(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Query(params): Query<CancelOrderRequest>,
) -> AppResult<Json<StatusChange>> {
    let change = state
        .orders
        .change_status(id, OrderStatus::Cancelled, params.expected_revision)?;
    Ok(Json(change))
}

pub async fn edit_order_date(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<EditOrderDateRequest>,
) -> AppResult<Json<Order>> {
    Ok(Json(state.orders.edit_order_date(id, payload.order_date)?))
}

/// Customer-side return request
pub async fn record_return(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<RecordReturnRequest>,
) -> AppResult<Json<StatusChange>> {
    validate_optional_text(&payload.reason, "reason", MAX_ADDRESS_LEN)?;
    Ok(Json(state.orders.record_return(id, payload.reason)?))
}

pub async fn resolve_return(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<ResolveReturnRequest>,
) -> AppResult<Json<StatusChange>> {
    Ok(Json(state.orders.resolve_return(id, payload)?))
}

pub async fn remove_from_report(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Order>> {
    Ok(Json(state.orders.remove_from_report(id)?))
}

/// Return queue: open returns first, newest request first
pub async fn list_return_requests(
    State(state): State<ServerState>,
) -> AppResult<Json<Vec<ReturnRequest>>> {
    Ok(Json(state.orders.list_return_requests()?))
}

fn validate_new_order(payload: &NewOrder) -> Result<(), AppError> {
    validate_required_text(&payload.full_name, "full_name", MAX_NAME_LEN)?;
    validate_required_text(&payload.delivery.address, "address", MAX_ADDRESS_LEN)?;
    validate_required_text(&payload.delivery.city, "city", MAX_NAME_LEN)?;
    validate_optional_text(&payload.delivery.delivery_address, "delivery_address", MAX_ADDRESS_LEN)?;
    validate_optional_text(&payload.tracking_number, "tracking_number", MAX_SHORT_TEXT_LEN)?;

    if payload.total.is_sign_negative() {
        return Err(AppError::validation("total must not be negative"));
    }
    if payload.items.is_empty() {
        return Err(AppError::validation("order must have at least one item"));
    }
    for item in &payload.items {
        validate_required_text(&item.name, "items.name", MAX_NAME_LEN)?;
        validate_optional_text(&item.image_url, "items.image_url", MAX_URL_LEN)?;
        if item.quantity <= 0 {
            return Err(AppError::validation(format!(
                "items.quantity must be positive, got {}",
                item.quantity
            )));
        }
    }
    Ok(())
}
