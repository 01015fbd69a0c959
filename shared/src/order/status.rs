//! Order fulfillment status and the admin transition table

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::job::JobKind;

/// Fulfillment status of an order
///
/// Wire form is the display string (`"Return Cancelled"` keeps its space).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    /// Set by the customer-facing side, never by an admin transition
    Returned,
    Refunded,
    #[serde(rename = "Return Cancelled")]
    ReturnCancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
        OrderStatus::Refunded,
        OrderStatus::ReturnCancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Returned => "Returned",
            OrderStatus::Refunded => "Refunded",
            OrderStatus::ReturnCancelled => "Return Cancelled",
        }
    }

    /// Admin-triggered edges leaving this status
    ///
    /// `Delivered -> Cancelled` is kept as the legacy menu allowed it; product
    /// intent is unconfirmed.
    pub fn allowed_targets(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Processing => &[
                OrderStatus::Shipped,
                OrderStatus::Delivered,
                OrderStatus::Cancelled,
            ],
            OrderStatus::Shipped => &[OrderStatus::Delivered, OrderStatus::Cancelled],
            OrderStatus::Delivered => &[OrderStatus::Cancelled],
            OrderStatus::Returned => &[OrderStatus::Refunded, OrderStatus::ReturnCancelled],
            OrderStatus::Cancelled | OrderStatus::Refunded | OrderStatus::ReturnCancelled => &[],
        }
    }

    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// No admin-driven transition leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Targets that only the return resolution workflow may reach
    pub fn is_return_outcome(&self) -> bool {
        matches!(self, OrderStatus::Refunded | OrderStatus::ReturnCancelled)
    }

    /// Whether `order_date` may still be edited by an operator
    pub fn allows_date_edit(&self) -> bool {
        !matches!(self, OrderStatus::Cancelled)
    }

    /// Part of the return/refund queue
    pub fn is_return_related(&self) -> bool {
        matches!(
            self,
            OrderStatus::Returned | OrderStatus::Refunded | OrderStatus::ReturnCancelled
        )
    }

    /// Deferred effect registered when an order enters this status
    pub fn scheduled_job(&self) -> Option<JobKind> {
        match self {
            OrderStatus::Cancelled => Some(JobKind::Purge),
            OrderStatus::Delivered => Some(JobKind::HideFromReport),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown status string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid order status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}
