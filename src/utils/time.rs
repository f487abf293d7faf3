use chrono::{DateTime, Duration, FixedOffset, Local, Timelike, Utc};
use std::sync::{Arc, RwLock};

/// Source of "now" for every time-dependent rule (scoring window, unusual
/// hour, OTP expiry). Services hold an `Arc<dyn Clock>` so tests can pin time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and demos.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(RwLock::new(start)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut current) = self.current.write() {
            *current = at;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut current) = self.current.write() {
            *current += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.current
            .read()
            .map(|current| *current)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}

pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

/// Hour of day for `instant`, either in a fixed offset or in the host's
/// local timezone when no offset is configured.
pub fn local_hour(instant: DateTime<Utc>, offset: Option<FixedOffset>) -> u32 {
    match offset {
        Some(offset) => instant.with_timezone(&offset).hour(),
        None => instant.with_timezone(&Local).hour(),
    }
}

/// Build a fixed offset from minutes east of UTC.
pub fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(minutes * 60)
}

/// Convert DateTime<Utc> to Unix milliseconds
pub fn to_unix_millis(datetime: DateTime<Utc>) -> i64 {
    datetime.timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advance() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now(), start + Duration::seconds(90));
    }

    #[test]
    fn test_local_hour_with_offset() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 20, 30, 0).unwrap();
        assert_eq!(local_hour(instant, offset_from_minutes(0)), 20);
        assert_eq!(local_hour(instant, offset_from_minutes(330)), 2);
        assert_eq!(local_hour(instant, offset_from_minutes(-300)), 15);
    }
}
