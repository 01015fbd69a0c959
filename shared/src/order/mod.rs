//! Order fulfillment domain types
//!
//! - [`OrderStatus`]: lifecycle states and the admin transition table
//! - [`DeferredJob`]: durable follow-up effects (purge, hide from report)
//! - [`Order`] / [`OrderLineItem`]: stored records
//! - request payloads for the fulfillment operations

pub mod job;
pub mod model;
pub mod payment;
pub mod request;
pub mod status;

// Re-exports
pub use job::{
    DeferredJob, HIDE_FROM_REPORT_DELAY_MILLIS, JobKind, PURGE_DELAY_MILLIS, ParseJobKindError,
};
pub use model::{DeliveryAddress, NewOrder, Order, OrderLineItem};
pub use payment::PaymentMethod;
pub use request::{
    CancelOrderRequest, ChangeStatusRequest, EditOrderDateRequest, JobFilter, OrderFilter,
    RecordReturnRequest, ResolveReturnRequest, ReturnOutcome, ReturnRequest, StatusChange,
};
pub use status::{OrderStatus, ParseStatusError};
