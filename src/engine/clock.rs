use anyhow::{Result, anyhow};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

/// Source of "now" in local civil time.
///
/// The engine never reads the wall clock itself; the host passes an instant
/// into every query, and this trait is how the host gets one. Tests pin time
/// with a fixed impl.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Parse a wall-clock "HH:MM" string.
pub fn parse_clock_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| anyhow!("Bad time '{}': {}", s, e))
}

/// Compose a time-of-day with a calendar day into an absolute local instant.
pub fn at(date: NaiveDate, time: NaiveTime) -> NaiveDateTime {
    date.and_time(time)
}

/// The last instant of a civil day, used to cap the final window.
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(NaiveDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            self.0
        }
    }

    #[test]
    fn today_is_derived_from_now() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 24).unwrap();
        let clock = FixedClock(date.and_time(NaiveTime::from_hms_opt(5, 0, 0).unwrap()));
        assert_eq!(clock.today(), date);
    }

    #[test]
    fn parses_24h_times() {
        assert_eq!(
            parse_clock_time("04:30").unwrap(),
            NaiveTime::from_hms_opt(4, 30, 0).unwrap()
        );
        assert_eq!(
            parse_clock_time("23:59").unwrap(),
            NaiveTime::from_hms_opt(23, 59, 0).unwrap()
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_clock_time("25:00").is_err());
        assert!(parse_clock_time("four thirty").is_err());
        assert!(parse_clock_time("").is_err());
    }

    #[test]
    fn composes_date_and_time() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 24).unwrap();
        let time = NaiveTime::from_hms_opt(13, 0, 0).unwrap();
        let instant = at(date, time);
        assert_eq!(instant.date(), date);
        assert_eq!(instant.time(), time);
    }

    #[test]
    fn end_of_day_is_last_second() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 24).unwrap();
        assert_eq!(
            end_of_day(date),
            date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap())
        );
    }
}
