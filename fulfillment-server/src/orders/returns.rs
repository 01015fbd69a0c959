//! Return resolution workflow
//!
//! A returned order is resolved in two steps: the operator opens a
//! [`RefundDecision`] for a chosen outcome, then commits it. A GCash refund
//! needs a payout number before the transition is attempted; every other
//! case goes straight to the transition engine. A decision is consumed by
//! `commit`, so a failed commit means opening a new one.

use rust_decimal::Decimal;
use shared::order::{
    Order, OrderStatus, PaymentMethod, ResolveReturnRequest, ReturnOutcome, StatusChange,
};

use super::error::{OrderError, OrderResult};
use super::manager::OrdersManager;
use crate::utils::validation::is_valid_gcash_number;

/// Applies a validated status transition
pub trait StatusTransition {
    fn transition(&self, order_id: i64, target: OrderStatus) -> OrderResult<StatusChange>;
}

impl StatusTransition for OrdersManager {
    fn transition(&self, order_id: i64, target: OrderStatus) -> OrderResult<StatusChange> {
        self.apply_transition(order_id, target, None)
    }
}

/// In-flight operator decision for a returned order
#[derive(Debug, Clone, PartialEq)]
pub struct RefundDecision {
    pub order_id: i64,
    pub outcome: ReturnOutcome,
    pub payment_method: PaymentMethod,
    pub total: Decimal,
    pub phone_number: Option<String>,
}

impl RefundDecision {
    /// Open a decision; the order must be `Returned`
    pub fn open(order: &Order, outcome: ReturnOutcome) -> OrderResult<Self> {
        if order.status != OrderStatus::Returned {
            return Err(OrderError::InvalidState {
                order_id: order.id,
                status: order.status,
                operation: "resolving a return",
            });
        }
        Ok(Self {
            order_id: order.id,
            outcome,
            payment_method: order.payment_method.clone(),
            total: order.total,
            phone_number: None,
        })
    }

    pub fn with_phone_number(mut self, phone_number: Option<String>) -> Self {
        self.phone_number = phone_number;
        self
    }

    /// Whether this decision needs a GCash payout number
    pub fn requires_phone(&self) -> bool {
        self.outcome == ReturnOutcome::Refund && self.payment_method.is_gcash()
    }

    /// Validate and hand the outcome to the transition engine
    pub fn commit<E: StatusTransition + ?Sized>(self, engine: &E) -> OrderResult<StatusChange> {
        if self.requires_phone() {
            let phone = self
                .phone_number
                .as_deref()
                .filter(|phone| is_valid_gcash_number(phone))
                .ok_or(OrderError::InvalidPhoneNumber {
                    order_id: self.order_id,
                })?;

            // 退款号码只记录日志，不落库
            tracing::info!(
                target: "payout",
                order_id = self.order_id,
                phone_number = %phone,
                amount = %self.total,
                "GCash refund recipient"
            );
        }

        let change = engine.transition(self.order_id, self.outcome.target_status())?;
        tracing::info!(
            order_id = self.order_id,
            outcome = ?self.outcome,
            payment_method = %self.payment_method,
            "Return resolved"
        );
        Ok(change)
    }
}

impl OrdersManager {
    /// ResolveReturn: open and immediately commit a decision
    pub fn resolve_return(
        &self,
        order_id: i64,
        request: ResolveReturnRequest,
    ) -> OrderResult<StatusChange> {
        let order = self.get_order(order_id)?;
        RefundDecision::open(&order, request.outcome)?
            .with_phone_number(request.phone_number)
            .commit(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::storage::OrderStorage;
    use crate::orders::storage::test_support::{new_order, order_in};
    use std::cell::RefCell;

    /// Records transition calls without touching storage
    struct CountingEngine {
        calls: RefCell<Vec<(i64, OrderStatus)>>,
    }

    impl CountingEngine {
        fn new() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl StatusTransition for CountingEngine {
        fn transition(&self, order_id: i64, target: OrderStatus) -> OrderResult<StatusChange> {
            self.calls.borrow_mut().push((order_id, target));
            let mut order = order_in(order_id, target, PaymentMethod::GCash);
            order.revision = 1;
            Ok(StatusChange {
                order,
                scheduled_jobs: Vec::new(),
            })
        }
    }

    #[test]
    fn test_gcash_refund_with_bad_number_never_transitions() {
        let engine = CountingEngine::new();
        let order = order_in(1, OrderStatus::Returned, PaymentMethod::GCash);

        let err = RefundDecision::open(&order, ReturnOutcome::Refund)
            .unwrap()
            .with_phone_number(Some("12345".to_string()))
            .commit(&engine)
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidPhoneNumber { order_id: 1 }));

        let err = RefundDecision::open(&order, ReturnOutcome::Refund)
            .unwrap()
            .commit(&engine)
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidPhoneNumber { .. }));

        assert!(engine.calls.borrow().is_empty());
    }

    #[test]
    fn test_gcash_refund_with_valid_number_transitions_once() {
        let engine = CountingEngine::new();
        let order = order_in(1, OrderStatus::Returned, PaymentMethod::GCash);

        let change = RefundDecision::open(&order, ReturnOutcome::Refund)
            .unwrap()
            .with_phone_number(Some("09171234567".to_string()))
            .commit(&engine)
            .unwrap();
        assert_eq!(change.order.status, OrderStatus::Refunded);
        assert_eq!(*engine.calls.borrow(), vec![(1, OrderStatus::Refunded)]);
    }

    #[test]
    fn test_non_gcash_and_cancel_skip_phone() {
        let engine = CountingEngine::new();

        let cash = order_in(7, OrderStatus::Returned, PaymentMethod::from("Cash"));
        RefundDecision::open(&cash, ReturnOutcome::Refund)
            .unwrap()
            .commit(&engine)
            .unwrap();

        let gcash = order_in(8, OrderStatus::Returned, PaymentMethod::GCash);
        RefundDecision::open(&gcash, ReturnOutcome::CancelReturn)
            .unwrap()
            .commit(&engine)
            .unwrap();

        assert_eq!(
            *engine.calls.borrow(),
            vec![
                (7, OrderStatus::Refunded),
                (8, OrderStatus::ReturnCancelled)
            ]
        );
    }

    #[test]
    fn test_open_requires_returned() {
        for status in OrderStatus::ALL {
            let order = order_in(1, status, PaymentMethod::GCash);
            let opened = RefundDecision::open(&order, ReturnOutcome::CancelReturn);
            if status == OrderStatus::Returned {
                assert!(opened.is_ok());
            } else {
                assert!(matches!(opened, Err(OrderError::InvalidState { .. })));
            }
        }
    }

    #[test]
    fn test_resolve_return_end_to_end() {
        let manager = OrdersManager::new(OrderStorage::open_in_memory().unwrap());

        // order #7, cash, returned: refund without a phone number
        let mut cash = new_order(7, PaymentMethod::from("Cash"));
        cash.total = Decimal::new(50000, 2);
        manager.ingest_order(cash).unwrap();
        manager.record_return(7, None).unwrap();
        let change = manager
            .resolve_return(
                7,
                ResolveReturnRequest {
                    outcome: ReturnOutcome::Refund,
                    phone_number: None,
                },
            )
            .unwrap();
        assert_eq!(change.order.status, OrderStatus::Refunded);

        // already resolved: the decision cannot be reopened
        let err = manager
            .resolve_return(
                7,
                ResolveReturnRequest {
                    outcome: ReturnOutcome::CancelReturn,
                    phone_number: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidState { .. }));

        // GCash with a bad number stays Returned
        manager
            .ingest_order(new_order(8, PaymentMethod::GCash))
            .unwrap();
        manager.record_return(8, None).unwrap();
        let err = manager
            .resolve_return(
                8,
                ResolveReturnRequest {
                    outcome: ReturnOutcome::Refund,
                    phone_number: Some("12345".to_string()),
                },
            )
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidPhoneNumber { .. }));
        assert_eq!(manager.get_order(8).unwrap().status, OrderStatus::Returned);

        let change = manager
            .resolve_return(
                8,
                ResolveReturnRequest {
                    outcome: ReturnOutcome::Refund,
                    phone_number: Some("+639171234567".to_string()),
                },
            )
            .unwrap();
        assert_eq!(change.order.status, OrderStatus::Refunded);

        assert!(matches!(
            manager.resolve_return(
                99,
                ResolveReturnRequest {
                    outcome: ReturnOutcome::Refund,
                    phone_number: None,
                },
            ),
            Err(OrderError::NotFound(99))
        ));
    }
}
