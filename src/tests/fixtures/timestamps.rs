// Deterministic timestamps for tests, expressed in whole hours after a fixed anchor.

use chrono::{DateTime, Utc};

/// 2024-01-01T00:00:00Z.
pub const ANCHOR_SECS: i64 = 1_704_067_200;

pub fn at(hours: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ANCHOR_SECS + hours * 3600, 0).unwrap()
}
