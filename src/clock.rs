use std::sync::Mutex;

use time::{Duration, OffsetDateTime};

/// Source of "now" for rooms, messages and the sweeper.
///
/// Timestamps are truncated to whole milliseconds, which is as much precision as a
/// browser cursor (`Date.toISOString()`) can carry back to us.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

pub(crate) fn truncate_millis(at: OffsetDateTime) -> OffsetDateTime {
    at.replace_millisecond(at.millisecond()).unwrap_or(at)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        truncate_millis(OffsetDateTime::now_utc())
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(truncate_millis(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = truncate_millis(*now + by);
    }

    pub fn set(&self, at: OffsetDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = truncate_millis(at);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn truncates_to_millis() {
        let at = datetime!(2024-05-01 12:00:00.123_456_789 UTC);
        assert_eq!(truncate_millis(at), datetime!(2024-05-01 12:00:00.123 UTC));
    }

    #[test]
    fn manual_clock_only_moves_when_advanced() {
        let clock = ManualClock::new(datetime!(2024-05-01 12:00 UTC));
        assert_eq!(clock.now(), clock.now());

        clock.advance(Duration::minutes(59));
        assert_eq!(clock.now(), datetime!(2024-05-01 12:59 UTC));
    }
}
