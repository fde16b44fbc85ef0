//! Wall-clock access
//!
//! Data cycles are defined in local time, so the tracker reads the clock
//! through a trait that tests can pin.

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// The system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Clock set to the given local wall time
    pub fn at_local(naive: NaiveDateTime) -> Self {
        Self::new(local_from_naive(naive))
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Interprets a wall time in the local zone, picking the earlier instant on
/// DST overlaps and treating skipped times as UTC
pub fn local_from_naive(naive: NaiveDateTime) -> DateTime<Local> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive).with_timezone(&Local))
}

pub fn local_to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    local_from_naive(naive).with_timezone(&Utc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_keeps_wall_time() {
        let naive =
            NaiveDateTime::parse_from_str("2024-01-15 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let clock = ManualClock::at_local(naive);
        assert_eq!(clock.now().naive_local(), naive);

        clock.advance(Duration::hours(2));
        assert_eq!(clock.now().naive_local(), naive + Duration::hours(2));
    }
}
