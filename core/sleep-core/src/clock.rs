//! Wall-clock source for night timestamps.

use chrono::Utc;

/// Supplies the current time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_milli(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_milli(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}
