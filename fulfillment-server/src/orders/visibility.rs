//! Sales-report visibility
//!
//! `in_sales_report` only ever goes from `true` to `false`: through the
//! operator "remove from report" action or a `HideFromReport` job. Listing
//! and reporting reads exclude hidden orders unless asked otherwise.

use redb::WriteTransaction;
use shared::order::{Order, OrderFilter};

use super::storage::{OrderStorage, StorageResult};

/// Clear `in_sales_report` (within transaction)
///
/// Returns the order as stored afterwards, or `None` if it does not exist.
/// An already hidden order is returned without a write.
pub fn hide_from_report(
    storage: &OrderStorage,
    txn: &WriteTransaction,
    order_id: i64,
) -> StorageResult<Option<Order>> {
    let Some(mut order) = storage.get_order_txn(txn, order_id)? else {
        return Ok(None);
    };
    if order.in_sales_report {
        order.in_sales_report = false;
        order.revision += 1;
        storage.store_order(txn, &order)?;
    }
    Ok(Some(order))
}

/// Orders matching the filter, most recent `order_date` first
pub fn list_orders(storage: &OrderStorage, filter: &OrderFilter) -> StorageResult<Vec<Order>> {
    let mut orders: Vec<Order> = storage
        .get_all_orders()?
        .into_iter()
        .filter(|order| filter.matches(order))
        .collect();
    orders.sort_by(|a, b| b.order_date.cmp(&a.order_date).then(b.id.cmp(&a.id)));
    Ok(orders)
}
