//! Clock and local-date seam
//!
//! The household lives in one timezone, configured as a fixed UTC offset.
//! Everything stored is Unix milliseconds; "local date" math goes through
//! this trait so tests can pin time.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};

/// Sentinel for "no real due time" (year 9999)
pub const FAR_FUTURE_MS: i64 = 253_370_764_800_000;

/// Time source for the core
pub trait Clock: Send + Sync {
    /// Current time as Unix milliseconds
    fn now_ms(&self) -> i64;

    /// Household UTC offset in seconds (east positive)
    fn utc_offset_secs(&self) -> i32;

    /// The household's current local date
    fn local_date(&self) -> NaiveDate {
        self.local_date_of(self.now_ms())
    }

    /// Local date of a given timestamp
    fn local_date_of(&self, ms: i64) -> NaiveDate {
        let dt = DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_else(Utc::now);
        dt.with_timezone(&self.offset()).date_naive()
    }

    /// Local midnight of a date, as Unix milliseconds
    fn day_start_ms(&self, date: NaiveDate) -> i64 {
        let ndt = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
        self.offset()
            .from_local_datetime(&ndt)
            .single()
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0)
    }

    /// End of a local date (23:59:59), as Unix milliseconds
    fn day_end_ms(&self, date: NaiveDate) -> i64 {
        let ndt = date.and_hms_opt(23, 59, 59).expect("valid time");
        self.offset()
            .from_local_datetime(&ndt)
            .single()
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0)
    }

    /// A time-of-day (minutes after local midnight) on a date, as millis
    fn time_on_date_ms(&self, date: NaiveDate, minutes: u32) -> i64 {
        self.day_start_ms(date) + (minutes as i64) * 60_000
    }

    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_secs()).unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset"))
    }
}

/// Wall-clock implementation
pub struct SystemClock {
    offset_secs: i32,
}

impl SystemClock {
    pub fn new(offset_secs: i32) -> Self {
        Self { offset_secs }
    }

    pub fn utc() -> Self {
        Self::new(0)
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn utc_offset_secs(&self) -> i32 {
        self.offset_secs
    }
}

/// Settable clock for tests and replay
pub struct ManualClock {
    now: AtomicI64,
    offset_secs: i32,
}

impl ManualClock {
    pub fn new(now_ms: i64, offset_secs: i32) -> Self {
        Self {
            now: AtomicI64::new(now_ms),
            offset_secs,
        }
    }

    /// Pin the clock to local midnight + `minutes` on the given date
    pub fn at_local(date: NaiveDate, minutes: u32, offset_secs: i32) -> Self {
        let clock = Self::new(0, offset_secs);
        let ms = clock.time_on_date_ms(date, minutes);
        clock.now.store(ms, Ordering::SeqCst);
        clock
    }

    pub fn set_ms(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta: i64) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn advance_days(&self, days: i64) {
        self.advance_ms(days * 24 * 60 * 60 * 1000);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }

    fn utc_offset_secs(&self) -> i32 {
        self.offset_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_manual_clock_local_date() {
        let clock = ManualClock::at_local(date(2026, 3, 10), 9 * 60, 0);
        assert_eq!(clock.local_date(), date(2026, 3, 10));
    }

    #[test]
    fn test_offset_shifts_local_date() {
        // 23:00 UTC on Mar 10 is Mar 11 at +02:00
        let clock = ManualClock::at_local(date(2026, 3, 10), 23 * 60, 0);
        let utc_ms = clock.now_ms();

        let shifted = ManualClock::new(utc_ms, 2 * 3600);
        assert_eq!(shifted.local_date(), date(2026, 3, 11));
    }

    #[test]
    fn test_day_bounds_ordering() {
        let clock = SystemClock::new(-5 * 3600);
        let d = date(2026, 6, 1);
        let start = clock.day_start_ms(d);
        let end = clock.day_end_ms(d);
        assert!(start < end);
        assert_eq!(end - start, (24 * 3600 - 1) * 1000);
        assert_eq!(clock.local_date_of(start), d);
        assert_eq!(clock.local_date_of(end), d);
    }

    #[test]
    fn test_time_on_date() {
        let clock = SystemClock::utc();
        let d = date(2026, 6, 1);
        let nine_thirty = clock.time_on_date_ms(d, 9 * 60 + 30);
        assert_eq!(nine_thirty - clock.day_start_ms(d), (9 * 3600 + 1800) * 1000);
    }

    #[test]
    fn test_far_future_is_far() {
        let clock = SystemClock::utc();
        assert!(FAR_FUTURE_MS > clock.now_ms() + 1000 * 365 * 24 * 3600 * 100);
    }
}
