//! Absolute query windows derived from a look-back length.

use chrono::{DateTime, Duration, SubsecRound, Utc};

use crate::filters::HoursBack;

/// Second-precision UTC encoding accepted by the FDSN event service.
const FEED_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A closed UTC interval `[start, end]` covering the last N hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build the window ending at `now`.
    ///
    /// `now` is truncated to whole seconds first, so the formatted bounds
    /// are exactly `hours` hours apart.
    #[must_use]
    pub fn ending_at(hours: HoursBack, now: DateTime<Utc>) -> Self {
        let end = now.trunc_subsecs(0);
        let start = end - Duration::hours(i64::from(hours.get()));
        Self { start, end }
    }

    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// `starttime` query value.
    #[must_use]
    pub fn start_param(&self) -> String {
        self.start.format(FEED_TIME_FORMAT).to_string()
    }

    /// `endtime` query value.
    #[must_use]
    pub fn end_param(&self) -> String {
        self.end.format(FEED_TIME_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDateTime, TimeZone};

    use super::*;
    use crate::filters::{MAX_HOURS_BACK, MIN_HOURS_BACK};

    fn parse_param(s: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(s, FEED_TIME_FORMAT)
            .expect("param should parse back")
            .and_utc()
    }

    #[test]
    fn test_every_window_length_is_exact() {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 13, 45, 7).unwrap()
            + Duration::milliseconds(873);

        for h in MIN_HOURS_BACK..=MAX_HOURS_BACK {
            let window = TimeWindow::ending_at(HoursBack::new(h).unwrap(), now);
            assert!(window.start() < window.end());
            assert_eq!(window.end() - window.start(), Duration::hours(i64::from(h)));

            let start = window.start_param();
            let end = window.end_param();
            assert!(start.ends_with('Z') && end.ends_with('Z'));
            assert!(!start.contains('.') && !end.contains('.'));
            assert_eq!(
                parse_param(&end) - parse_param(&start),
                Duration::hours(i64::from(h))
            );
        }
    }

    #[test]
    fn test_day_window_format() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let window = TimeWindow::ending_at(HoursBack::new(24).unwrap(), now);
        assert_eq!(window.start_param(), "2025-01-01T03:04:05Z");
        assert_eq!(window.end_param(), "2025-01-02T03:04:05Z");
    }

    #[test]
    fn test_subseconds_dropped() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap() + Duration::milliseconds(999);
        let window = TimeWindow::ending_at(HoursBack::new(1).unwrap(), now);
        assert_eq!(window.end_param(), "2025-06-01T00:00:00Z");
        assert_eq!(window.start_param(), "2025-05-31T23:00:00Z");
    }
}
