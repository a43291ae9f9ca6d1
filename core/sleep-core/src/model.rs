//! The sleep night record.

use serde::{Deserialize, Serialize};

/// Quality value of a night that has not been rated yet.
pub const UNRATED_QUALITY: i32 = -1;

/// Highest rating a night can receive.
pub const MAX_QUALITY: i32 = 5;

/// One tracked sleep interval.
///
/// Timestamps are milliseconds since the Unix epoch. A night whose end equals
/// its start is still in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepNight {
    /// Assigned by the store on insert; `0` until then.
    pub night_id: i64,
    pub start_time_milli: i64,
    pub end_time_milli: i64,
    /// `0..=5` once rated, [`UNRATED_QUALITY`] before.
    pub sleep_quality: i32,
}

impl SleepNight {
    /// A fresh, unsaved night that starts (and for now ends) at `now_milli`.
    pub fn starting_at(now_milli: i64) -> Self {
        Self {
            night_id: 0,
            start_time_milli: now_milli,
            end_time_milli: now_milli,
            sleep_quality: UNRATED_QUALITY,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.end_time_milli == self.start_time_milli
    }

    pub fn is_rated(&self) -> bool {
        is_valid_quality(self.sleep_quality)
    }

    pub fn duration_milli(&self) -> i64 {
        self.end_time_milli.saturating_sub(self.start_time_milli)
    }
}

pub fn is_valid_quality(quality: i32) -> bool {
    (0..=MAX_QUALITY).contains(&quality)
}
