//! Deferred job types
//!
//! A deferred job is a durable intent to apply a follow-up effect to an order
//! once its due time has passed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::status::OrderStatus;

const HOUR_MILLIS: i64 = 60 * 60 * 1000;

/// Delay between entering `Cancelled` and purging the order
pub const PURGE_DELAY_MILLIS: i64 = 8 * HOUR_MILLIS;

/// Delay between entering `Delivered` and hiding the order from the sales report
pub const HIDE_FROM_REPORT_DELAY_MILLIS: i64 = 5 * HOUR_MILLIS;

/// 延迟任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    /// Delete the order and its line items
    Purge,
    /// Clear `in_sales_report`
    HideFromReport,
}

impl JobKind {
    pub const ALL: [JobKind; 2] = [JobKind::Purge, JobKind::HideFromReport];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Purge => "PURGE",
            JobKind::HideFromReport => "HIDE_FROM_REPORT",
        }
    }

    /// Delay from `status_changed_at` to `due_at`
    pub fn delay_millis(&self) -> i64 {
        match self {
            JobKind::Purge => PURGE_DELAY_MILLIS,
            JobKind::HideFromReport => HIDE_FROM_REPORT_DELAY_MILLIS,
        }
    }

    /// Whether moving the order into `next` invalidates a pending job of this kind
    ///
    /// A purge only stands while the order stays cancelled. Hiding from the
    /// report follows a completed delivery and is never withdrawn.
    pub fn superseded_by(&self, next: OrderStatus) -> bool {
        match self {
            JobKind::Purge => next != OrderStatus::Cancelled,
            JobKind::HideFromReport => false,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown job kind string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid job kind: {0}")]
pub struct ParseJobKindError(pub String);

impl FromStr for JobKind {
    type Err = ParseJobKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PURGE" | "purge" => Ok(JobKind::Purge),
            "HIDE_FROM_REPORT" | "hide_from_report" => Ok(JobKind::HideFromReport),
            other => Err(ParseJobKindError(other.to_string())),
        }
    }
}

/// Persisted deferred job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredJob {
    pub id: u64,
    pub order_id: i64,
    pub kind: JobKind,
    /// Earliest time the job may fire (Unix millis)
    pub due_at: i64,
    pub created_at: i64,
    pub executed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<i64>,
    /// Withdrawn by a superseding transition or an explicit cancel
    #[serde(default)]
    pub cancelled: bool,
    /// Failed execution attempts
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl DeferredJob {
    pub fn new(id: u64, order_id: i64, kind: JobKind, due_at: i64, created_at: i64) -> Self {
        Self {
            id,
            order_id,
            kind,
            due_at,
            created_at,
            executed: false,
            executed_at: None,
            cancelled: false,
            attempts: 0,
            last_error: None,
        }
    }

    /// Neither executed nor cancelled
    pub fn is_pending(&self) -> bool {
        !self.executed && !self.cancelled
    }

    /// Pending and `due_at` has been reached
    pub fn is_due(&self, now: i64) -> bool {
        self.is_pending() && self.due_at <= now
    }
}
