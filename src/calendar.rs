//! Calendar helpers and the clock abstraction
use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc, Weekday};

/// Source of "now". Injected so issuance and expiry checks are testable.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stopped at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }
    /// Midnight UTC on the given day. `None` for impossible dates.
    pub fn on(year: i32, month: u32, day: u32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
            .single()
            .map(Self)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The date `n` business days (Mon-Fri) after `start`.
///
/// Counting starts with the day after `start`, so a Friday plus one business
/// day is the following Monday. `n == 0` returns `start`'s own date.
pub fn add_business_days(start: DateTime<Utc>, n: u32) -> NaiveDate {
    let mut date = start.date_naive();
    let mut counted = 0;

    while counted < n {
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
        if is_business_day(date) {
            counted += 1;
        }
    }

    date
}

/// The date `n` calendar days after `start`, saturating at the last
/// representable date.
pub fn add_calendar_days(start: DateTime<Utc>, n: u32) -> NaiveDate {
    let date = start.date_naive();
    date.checked_add_days(Days::new(n.into()))
        .unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }
    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn fifteen_business_days_from_monday() {
        // 2026-10-19 is a Monday
        assert_eq!(add_business_days(at(2026, 10, 19), 15), date(2026, 11, 9));
    }

    #[test]
    fn weekend_starts_roll_to_monday() {
        assert_eq!(add_business_days(at(2026, 10, 23), 1), date(2026, 10, 26));
        assert_eq!(add_business_days(at(2026, 10, 24), 1), date(2026, 10, 26));
        assert_eq!(add_business_days(at(2026, 10, 25), 1), date(2026, 10, 26));
        assert_eq!(add_business_days(at(2026, 10, 24), 15), date(2026, 11, 13));
    }

    #[test]
    fn zero_days_is_start_date() {
        assert_eq!(add_business_days(at(2026, 10, 24), 0), date(2026, 10, 24));
        assert_eq!(add_calendar_days(at(2026, 10, 24), 0), date(2026, 10, 24));
    }

    #[test]
    fn calendar_days_cross_month_and_year() {
        assert_eq!(add_calendar_days(at(2026, 10, 19), 15), date(2026, 11, 3));
        assert_eq!(add_calendar_days(at(2026, 12, 25), 15), date(2027, 1, 9));
    }

    #[test]
    fn fixed_clock_reports_its_instant() {
        let clock = FixedClock::on(2026, 10, 19).unwrap();
        assert_eq!(clock.today(), date(2026, 10, 19));
        assert!(FixedClock::on(2026, 2, 30).is_none());
    }
}
