//! Shared primitive types used across the analytics core.

/// Opaque player identifier, exactly as it appears in the raw tables.
pub type UserId = String;

/// Raw event timestamp: UTC epoch seconds.
pub type EpochSeconds = i64;

/// Whole calendar days between a user's registration date and a later
/// activity date. Negative when the activity predates the registration
/// record (data anomaly, kept).
pub type DayOffset = i64;

/// Sentinel test-group label for registrants with no monetization row.
pub const UNKNOWN_GROUP: &str = "unknown";
