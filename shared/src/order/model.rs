//! Order record and line items

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::payment::PaymentMethod;
use super::status::OrderStatus;

/// Customer delivery address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub address: String,
    pub city: String,
    pub state_province: String,
    pub postal_code: String,
    /// Free-form delivery instructions / landmark
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
}

/// Order as held by the order store
///
/// The fulfillment core mutates only `status`, `status_changed_at`,
/// `order_date`, `in_sales_report` and the return request fields.
/// `revision` increments on every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    pub full_name: String,
    pub phone_number: String,
    #[serde(flatten)]
    pub delivery: DeliveryAddress,
    pub payment_method: PaymentMethod,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    /// Operator-editable order date (Unix millis)
    pub order_date: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    pub status: OrderStatus,
    pub in_sales_report: bool,
    #[serde(default)]
    pub is_rated: bool,
    /// Time of the last status change (Unix millis); drives deferred jobs
    pub status_changed_at: i64,
    /// Customer's reason, set when a return is recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_requested_at: Option<i64>,
    #[serde(default)]
    pub revision: u64,
}

/// Line item snapshot taken when the order was placed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<i64>,
    pub name: String,
    pub quantity: i32,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Order placed by the upstream storefront
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub full_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(flatten)]
    pub delivery: DeliveryAddress,
    pub payment_method: PaymentMethod,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    /// Defaults to the ingest time
    #[serde(default)]
    pub order_date: Option<i64>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderLineItem>,
}

impl NewOrder {
    /// Build the stored order; new orders always start in `Processing`
    pub fn into_order(self, now: i64) -> (Order, Vec<OrderLineItem>) {
        let order = Order {
            id: self.id,
            user_id: self.user_id,
            full_name: self.full_name,
            phone_number: self.phone_number,
            delivery: self.delivery,
            payment_method: self.payment_method,
            subtotal: self.subtotal,
            delivery_fee: self.delivery_fee,
            total: self.total,
            order_date: self.order_date.unwrap_or(now),
            tracking_number: self.tracking_number,
            status: OrderStatus::Processing,
            in_sales_report: true,
            is_rated: false,
            status_changed_at: now,
            return_reason: None,
            return_requested_at: None,
            revision: 0,
        };
        (order, self.items)
    }
}
