//! Lunch calendar helpers.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};

use crate::error::{LunchError, Result};
use crate::pairing::parse_date;

/// Midnight of the next `weekday`, or of today when today is that weekday.
#[must_use]
pub fn next_weekday(now: DateTime<Utc>, weekday: Weekday) -> DateTime<Utc> {
    let today = now.weekday().num_days_from_monday();
    let wanted = weekday.num_days_from_monday();
    let ahead = (7 + wanted - today) % 7;
    let day = now.date_naive() + Duration::days(i64::from(ahead));
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Date of the upcoming lunch.
#[must_use]
pub fn next_lunch_date(now: DateTime<Utc>, lunch_day: Weekday) -> DateTime<Utc> {
    next_weekday(now, lunch_day)
}

/// Sign-ups close at midnight after the lunch day.
#[must_use]
pub fn signup_deadline(now: DateTime<Utc>, lunch_day: Weekday) -> DateTime<Utc> {
    next_weekday(now, lunch_day.succ())
}

/// Sign-up deadline for a lunch already stored under `lunch_date`.
#[must_use]
pub fn deadline_after(lunch_date: DateTime<Utc>) -> DateTime<Utc> {
    next_weekday(lunch_date + Duration::days(1), lunch_date.weekday().succ())
}

/// `YYYY-MM-DD` key used to name a lunch.
#[must_use]
pub fn lunch_key(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a lunch day typed by a person.
///
/// Accepts `YYYY-MM-DD`, `dd.mm.yyyy` and full RFC 3339 timestamps. Plain
/// days resolve to midnight UTC.
///
/// # Errors
///
/// [`LunchError::InvalidDate`] when no format matches.
pub fn parse_lunch_date(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Some(date) = parse_date(trimmed) {
        return Ok(date);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d.%m.%Y"))
        .map(|day| day.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| LunchError::InvalidDate { raw: raw.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 30, 0).single().expect("valid date")
    }

    #[test]
    fn same_day_resolves_to_midnight() {
        // 2024-04-17 is a Wednesday
        let lunch = next_lunch_date(at(2024, 4, 17, 11), Weekday::Wed);
        assert_eq!(lunch, at(2024, 4, 17, 0) - Duration::minutes(30));
    }

    #[test]
    fn later_in_week_rolls_forward() {
        let lunch = next_lunch_date(at(2024, 4, 18, 9), Weekday::Wed);
        assert_eq!(lunch_key(lunch), "2024-04-24");
        let lunch = next_lunch_date(at(2024, 4, 15, 9), Weekday::Wed);
        assert_eq!(lunch_key(lunch), "2024-04-17");
    }

    #[test]
    fn deadline_is_the_day_after() {
        let deadline = signup_deadline(at(2024, 4, 16, 9), Weekday::Wed);
        assert_eq!(lunch_key(deadline), "2024-04-18");
        // on lunch day the deadline is still ahead
        let deadline = signup_deadline(at(2024, 4, 17, 23), Weekday::Wed);
        assert_eq!(lunch_key(deadline), "2024-04-18");
    }

    #[test]
    fn stored_lunch_deadline_is_next_midnight() {
        let lunch = next_lunch_date(at(2024, 4, 15, 9), Weekday::Wed);
        assert_eq!(deadline_after(lunch), lunch + Duration::days(1));
    }

    #[test]
    fn parses_typed_days() {
        let iso = parse_lunch_date("2024-04-17").expect("iso day");
        let dotted = parse_lunch_date("17.4.2024").expect("dotted day");
        assert_eq!(iso, dotted);
        assert_eq!(iso, at(2024, 4, 17, 0) - Duration::minutes(30));
        let stamp = parse_lunch_date("2024-04-17T12:00:00Z").expect("rfc3339");
        assert_eq!(stamp - iso, Duration::hours(12));
    }

    #[test]
    fn rejects_garbage_days() {
        let err = parse_lunch_date("next wednesday").unwrap_err();
        assert!(matches!(err, LunchError::InvalidDate { .. }));
        assert!(parse_lunch_date("31.02.2024").is_err());
    }
}
