#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use fulfillment_server::orders::Clock;
use shared::order::NewOrder;

pub const T: i64 = 1_700_000_000_000;
pub const HOUR: i64 = 60 * 60 * 1000;

/// Manually advanced clock
#[derive(Clone)]
pub struct TestClock(Arc<AtomicI64>);

impl TestClock {
    pub fn at(millis: i64) -> Self {
        Self(Arc::new(AtomicI64::new(millis)))
    }

    pub fn set(&self, millis: i64) {
        self.0.store(millis, Ordering::SeqCst);
    }

    pub fn clock(&self) -> Clock {
        let now = self.0.clone();
        Arc::new(move || now.load(Ordering::SeqCst))
    }
}

pub fn order_json(id: i64, payment_method: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "user_id": 3,
        "full_name": "Ana Reyes",
        "phone_number": "09281234567",
        "address": "88 Luna St",
        "city": "Cebu City",
        "state_province": "Cebu",
        "postal_code": "6000",
        "payment_method": payment_method,
        "subtotal": 1500.0,
        "delivery_fee": 100.0,
        "total": 1600.0,
        "items": [
            { "product_id": 5, "name": "Rice Cooker", "quantity": 1, "price": 1500.0 }
        ]
    })
}

pub fn new_order(id: i64, payment_method: &str) -> NewOrder {
    serde_json::from_value(order_json(id, payment_method)).unwrap()
}

pub fn db_path(dir: &Path) -> std::path::PathBuf {
    dir.join("fulfillment.redb")
}
