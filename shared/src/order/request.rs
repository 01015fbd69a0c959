//! Request and response payloads for fulfillment operations

use serde::{Deserialize, Serialize};

use std::fmt::Write;

use super::model::{Order, OrderLineItem};
use super::status::OrderStatus;

/// ChangeStatus input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: OrderStatus,
    /// Revision the caller last observed; the change is rejected with a
    /// conflict if the order moved on since
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_revision: Option<u64>,
}

/// CancelOrder input (`PUT /{id}/cancel?expected_revision=N`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub expected_revision: Option<u64>,
}

/// RecordReturn input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReturnRequest {
    /// Customer's stated reason for the return
    #[serde(default)]
    pub reason: Option<String>,
}

/// Entry of the return-request queue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnRequest {
    #[serde(flatten)]
    pub order: Order,
    /// One `• name (quantity)` line per ordered product
    pub ordered_products: String,
}

impl ReturnRequest {
    pub fn new(order: Order, items: &[OrderLineItem]) -> Self {
        let mut ordered_products = String::new();
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                ordered_products.push('\n');
            }
            let _ = write!(ordered_products, "• {} ({})", item.name, item.quantity);
        }
        Self {
            order,
            ordered_products,
        }
    }
}

/// Outcome of a committed status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub order: Order,
    /// Deferred jobs registered by this change
    pub scheduled_jobs: Vec<u64>,
}

/// EditOrderDate input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOrderDateRequest {
    /// New order date (Unix millis)
    pub order_date: i64,
}

/// Operator decision for a returned order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnOutcome {
    Refund,
    CancelReturn,
}

impl ReturnOutcome {
    /// Terminal status the outcome resolves to
    pub fn target_status(&self) -> OrderStatus {
        match self {
            ReturnOutcome::Refund => OrderStatus::Refunded,
            ReturnOutcome::CancelReturn => OrderStatus::ReturnCancelled,
        }
    }
}

/// ResolveReturn input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveReturnRequest {
    pub outcome: ReturnOutcome,
    /// GCash payout number, required only for GCash refunds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// ListOrders filter
///
/// Hidden orders are excluded unless `include_hidden` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilter {
    #[serde(default)]
    pub include_hidden: bool,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        if !self.include_hidden && !order.in_sales_report {
            return false;
        }
        self.status.is_none_or(|status| order.status == status)
    }
}

/// Deferred job listing filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilter {
    /// Include executed and cancelled jobs
    #[serde(default)]
    pub all: bool,
    #[serde(default)]
    pub order_id: Option<i64>,
}
