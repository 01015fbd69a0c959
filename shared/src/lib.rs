//! Shared types for the fulfillment service
//!
//! Order domain types, the unified error system and small utilities used by
//! the server and its clients.

pub mod error;
pub mod order;
pub mod util;

// Re-exports
pub use axum::{Json, body};
pub use http;
pub use serde::{Deserialize, Serialize};
