//! Typed records for the three raw event tables and the merged master
//! table.
//!
//! RULE: Schema validation happens once, at the loader boundary.
//! Everything downstream consumes these records; no stringly typed rows
//! survive past the loader.

use crate::types::{EpochSeconds, UserId};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

/// One row of the registration table. Created once per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub uid: UserId,
    /// Raw epoch seconds. `None` when the source field failed numeric
    /// coercion. The record stays in the table, but drops out of every
    /// date-keyed aggregate.
    pub reg_ts: Option<EpochSeconds>,
    /// Calendar date derived from `reg_ts`.
    pub reg_date: Option<NaiveDate>,
}

impl RegistrationRecord {
    pub fn new(uid: UserId, reg_ts: Option<EpochSeconds>) -> Self {
        let reg_date = reg_ts.and_then(epoch_to_date);
        Self {
            uid,
            reg_ts,
            reg_date,
        }
    }
}

/// One authentication event. Append-only upstream; many per user.
/// `uid` references a registration row, but the reference is not
/// enforced; unmatched ids occur and are dropped only at cohort
/// attribution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthEvent {
    pub uid: UserId,
    pub auth_ts: Option<EpochSeconds>,
    pub auth_date: Option<NaiveDate>,
}

impl AuthEvent {
    pub fn new(uid: UserId, auth_ts: Option<EpochSeconds>) -> Self {
        let auth_date = auth_ts.and_then(epoch_to_date);
        Self {
            uid,
            auth_ts,
            auth_date,
        }
    }
}

/// Monetization / test-assignment row. At most one per user upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonetizationRecord {
    pub user_id: UserId,
    pub test_group: String,
    pub revenue: f64,
}

/// Left join of a registration row with its monetization row.
///
/// Invariant: one master row per registration row; `test_group` and
/// `revenue` are always populated (`"unknown"` / 0.0 when the user has
/// no monetization row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterRow {
    pub uid: UserId,
    pub reg_date: Option<NaiveDate>,
    pub test_group: String,
    pub revenue: f64,
}

/// Convert UTC epoch seconds to a calendar date.
///
/// Negative values are valid (pre-1970 dates); values outside chrono's
/// representable range yield `None` rather than panicking.
pub fn epoch_to_date(ts: EpochSeconds) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
}
