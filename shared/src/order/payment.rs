//! Payment method

use serde::{Deserialize, Serialize};
use std::fmt;

/// Payment method recorded on an order
///
/// Only `GCash` changes fulfillment behavior (refunds need a payout number);
/// every other value is carried through as-is. Matching is exact, so the
/// stored string always serializes back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentMethod {
    GCash,
    CashOnDelivery,
    Card,
    Other(String),
}

impl PaymentMethod {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentMethod::GCash => "GCash",
            PaymentMethod::CashOnDelivery => "Cash on Delivery",
            PaymentMethod::Card => "Card",
            PaymentMethod::Other(s) => s.as_str(),
        }
    }

    pub fn is_gcash(&self) -> bool {
        matches!(self, PaymentMethod::GCash)
    }
}

impl From<String> for PaymentMethod {
    fn from(value: String) -> Self {
        match value.as_str() {
            "GCash" => PaymentMethod::GCash,
            "Cash on Delivery" => PaymentMethod::CashOnDelivery,
            "Card" => PaymentMethod::Card,
            _ => PaymentMethod::Other(value),
        }
    }
}

impl From<&str> for PaymentMethod {
    fn from(value: &str) -> Self {
        PaymentMethod::from(value.to_string())
    }
}

impl From<PaymentMethod> for String {
    fn from(value: PaymentMethod) -> Self {
        match value {
            PaymentMethod::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
