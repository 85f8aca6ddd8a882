//! Lenient date parsing.
//!
//! Capture timestamps and caller-supplied dates arrive in several shapes.
//! Everything is normalized to a calendar date before any differencing.
//! Parsing never panics; unrecognized input yields `None`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;

/// Date-time layouts tried in order after RFC 3339.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    // EXIF DateTimeOriginal
    "%Y:%m:%d %H:%M:%S",
];

/// Month names and their usual abbreviations, captured as one group.
const MONTH_NAMES: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\b";

lazy_static! {
    /// Month name (full or abbreviated) followed by a day and optional year.
    static ref MONTH_DAY_PATTERN: Regex = Regex::new(&format!(
        r"(?i)\b{month}\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b(?:,?\s+(\d{{4}})\b)?",
        month = MONTH_NAMES
    )).unwrap();

    /// Day followed by a month name and optional year ("5 March", "5th of March 2024").
    static ref DAY_MONTH_PATTERN: Regex = Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?{month}\.?(?:,?\s+(\d{{4}})\b)?",
        month = MONTH_NAMES
    )).unwrap();

    /// ISO calendar date anywhere in the text.
    static ref ISO_DATE_PATTERN: Regex = Regex::new(
        r"\b(\d{4})-(\d{2})-(\d{2})\b"
    ).unwrap();
}

/// Parse a full date-time or a bare calendar date.
///
/// Bare dates resolve to midnight. Offsets in RFC 3339 input are dropped;
/// the local wall-clock time is kept.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim().trim_end_matches('\0');
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Parse either input shape and keep only the calendar date.
pub fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    parse_datetime(value).map(|dt| dt.date())
}

/// Absolute difference in whole days.
pub fn day_difference(a: NaiveDate, b: NaiveDate) -> u64 {
    (a - b).num_days().unsigned_abs()
}

/// Resolve a free-form incident date.
///
/// Month-and-day text ("March 5", "Mar 5th") takes `default_year`. Text that
/// carries its own year ("March 5, 2023", "2023-03-05") keeps it. Returns
/// `None` for anything else, including impossible dates such as "February 30".
pub fn resolve_incident_date(text: &str, default_year: i32) -> Option<NaiveDate> {
    if let Some(caps) = ISO_DATE_PATTERN.captures(text) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let (month, day, year) = if let Some(caps) = MONTH_DAY_PATTERN.captures(text) {
        (
            month_number(&caps[1])?,
            caps[2].parse::<u32>().ok()?,
            caps.get(3).and_then(|m| m.as_str().parse::<i32>().ok()),
        )
    } else if let Some(caps) = DAY_MONTH_PATTERN.captures(text) {
        (
            month_number(&caps[2])?,
            caps[1].parse::<u32>().ok()?,
            caps.get(3).and_then(|m| m.as_str().parse::<i32>().ok()),
        )
    } else {
        return None;
    };

    NaiveDate::from_ymd_opt(year.unwrap_or(default_year), month, day)
}

fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    let month = match name.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_bare_date() {
        let dt = parse_datetime("2024-04-01").unwrap();
        assert_eq!(dt.date(), date(2024, 4, 1));
        assert_eq!(dt.time(), NaiveTime::MIN);
    }

    #[test]
    fn test_parse_full_datetime_shapes() {
        assert_eq!(parse_calendar_date("2024-04-01T13:45:00"), Some(date(2024, 4, 1)));
        assert_eq!(parse_calendar_date("2024-04-01 13:45:00"), Some(date(2024, 4, 1)));
        assert_eq!(parse_calendar_date("2024-04-01T13:45:00.250"), Some(date(2024, 4, 1)));
        assert_eq!(parse_calendar_date("2024-04-01T23:10:00+05:30"), Some(date(2024, 4, 1)));
        assert_eq!(parse_calendar_date("2024:04:01 13:45:00"), Some(date(2024, 4, 1)));
    }

    #[test]
    fn test_parse_malformed_is_none() {
        assert_eq!(parse_datetime(""), None);
        assert_eq!(parse_datetime("not a date"), None);
        assert_eq!(parse_datetime("2024-13-45"), None);
        assert_eq!(parse_datetime("04/01/2024"), None);
    }

    #[test]
    fn test_day_difference_is_absolute() {
        assert_eq!(day_difference(date(2024, 5, 1), date(2024, 5, 4)), 3);
        assert_eq!(day_difference(date(2024, 5, 4), date(2024, 5, 1)), 3);
        assert_eq!(day_difference(date(2024, 5, 4), date(2024, 5, 4)), 0);
    }

    #[test]
    fn test_resolve_month_day_uses_default_year() {
        assert_eq!(resolve_incident_date("March 5", 2024), Some(date(2024, 3, 5)));
        assert_eq!(resolve_incident_date("Mar 5th", 2024), Some(date(2024, 3, 5)));
        assert_eq!(resolve_incident_date("on the 5th of March", 2022), Some(date(2022, 3, 5)));
    }

    #[test]
    fn test_resolve_keeps_explicit_year() {
        assert_eq!(resolve_incident_date("March 5, 2023", 2024), Some(date(2023, 3, 5)));
        assert_eq!(resolve_incident_date("2023-03-05", 2024), Some(date(2023, 3, 5)));
    }

    #[test]
    fn test_resolve_rejects_nonsense() {
        assert_eq!(resolve_incident_date("last Tuesday", 2024), None);
        assert_eq!(resolve_incident_date("February 30", 2024), None);
        assert_eq!(resolve_incident_date("", 2024), None);
    }

    #[test]
    fn test_resolve_requires_a_real_month_word() {
        assert_eq!(resolve_incident_date("decided 12 items were lost", 2024), None);
        assert_eq!(resolve_incident_date("Mark 3 said he saw it", 2024), None);
        assert_eq!(resolve_incident_date("the 3 marbles", 2024), None);
        assert_eq!(resolve_incident_date("Sept. 14", 2024), Some(date(2024, 9, 14)));
        assert_eq!(resolve_incident_date("December 12", 2024), Some(date(2024, 12, 12)));
        assert_eq!(resolve_incident_date("12 Dec 2023", 2024), Some(date(2023, 12, 12)));
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(s in ".*") {
            let _ = parse_datetime(&s);
            let _ = resolve_incident_date(&s, 2024);
        }

        #[test]
        fn prop_iso_dates_round_trip(y in 1970i32..2100, m in 1u32..=12, d in 1u32..=28) {
            let expected = date(y, m, d);
            let text = expected.format("%Y-%m-%d").to_string();
            prop_assert_eq!(parse_calendar_date(&text), Some(expected));
        }
    }
}
