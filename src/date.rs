use crate::error::CliError;
use crate::model::Weekday;

/// Local calendar date. Keys are the canonical `YYYY-MM-DD` rendering of this;
/// no UTC conversion happens anywhere past the CLI boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CivilDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

/// A concrete local moment: the inputs every scheduling computation takes
/// instead of reading the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalStamp {
    pub date: CivilDate,
    pub hour: u32,
    pub minute: u32,
}

/// The user-configurable end-of-day boundary. A habit "day" runs from
/// `hour:minute` to the same time the next day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct ResetTime {
    pub hour: u32,
    pub minute: u32,
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            let leap = (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0);
            if leap {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

fn is_valid_date(year: i32, month: u32, day: u32) -> bool {
    (1..=12).contains(&month) && day >= 1 && day <= days_in_month(year, month)
}

// Howard Hinnant's algorithm: days since 1970-01-01.
fn days_from_civil(date: CivilDate) -> i64 {
    let mut y = i64::from(date.year);
    let m = i64::from(date.month);
    let d = i64::from(date.day);
    y -= if m <= 2 { 1 } else { 0 };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = m + if m > 2 { -3 } else { 9 };
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

fn civil_from_days(z: i64) -> CivilDate {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let mut y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = mp + if mp < 10 { 3 } else { -9 };
    y += if m <= 2 { 1 } else { 0 };
    CivilDate {
        year: y as i32,
        month: m as u32,
        day: d as u32,
    }
}

fn weekday_from_days(days: i64) -> Weekday {
    let iso = ((days + 3).rem_euclid(7) + 1) as u8;
    // rem_euclid keeps iso in 1..=7
    Weekday::from_iso(iso).unwrap_or(Weekday::Monday)
}

pub fn date_key(date: CivilDate) -> String {
    format!("{:04}-{:02}-{:02}", date.year, date.month, date.day)
}

pub fn parse_date_key(key: &str) -> Result<CivilDate, CliError> {
    let s = key.trim();
    let bytes = s.as_bytes();
    if s.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return Err(CliError::usage(format!("Invalid date: {}", key)));
    }

    let year: i32 = s[0..4]
        .parse()
        .map_err(|_| CliError::usage(format!("Invalid date: {}", key)))?;
    let month: u32 = s[5..7]
        .parse()
        .map_err(|_| CliError::usage(format!("Invalid date: {}", key)))?;
    let day: u32 = s[8..10]
        .parse()
        .map_err(|_| CliError::usage(format!("Invalid date: {}", key)))?;

    if !is_valid_date(year, month, day) {
        return Err(CliError::usage(format!("Invalid date: {}", key)));
    }

    Ok(CivilDate { year, month, day })
}

pub fn add_days(key: &str, delta: i64) -> Result<String, CliError> {
    let date = parse_date_key(key)?;
    Ok(date_key(civil_from_days(days_from_civil(date) + delta)))
}

/// Whole days from `from` to `to` (positive when `to` is later).
pub fn diff_days(from: &str, to: &str) -> Result<i64, CliError> {
    let a = parse_date_key(from)?;
    let b = parse_date_key(to)?;
    Ok(days_from_civil(b) - days_from_civil(a))
}

pub fn day_of_month(key: &str) -> Result<u32, CliError> {
    Ok(parse_date_key(key)?.day)
}

pub fn weekday_of_key(key: &str) -> Result<Weekday, CliError> {
    let date = parse_date_key(key)?;
    Ok(weekday_from_days(days_from_civil(date)))
}

fn effective_days(stamp: &LocalStamp, reset: ResetTime) -> i64 {
    let mut days = days_from_civil(stamp.date);
    if (stamp.hour, stamp.minute) < (reset.hour, reset.minute) {
        days -= 1;
    }
    days
}

/// The habit day a moment belongs to: before the reset boundary the moment
/// still counts against the previous calendar day. Monotonic non-decreasing in
/// the stamp for a fixed reset.
pub fn effective_date_key(stamp: &LocalStamp, reset: ResetTime) -> String {
    date_key(civil_from_days(effective_days(stamp, reset)))
}

/// Weekday of the effective day, not of the raw calendar date.
pub fn effective_weekday(stamp: &LocalStamp, reset: ResetTime) -> Weekday {
    weekday_from_days(effective_days(stamp, reset))
}

/// Deterministic timestamp for cache metadata, derived from the caller's stamp
/// rather than the wall clock. Pre-epoch stamps saturate to 0.
pub fn epoch_millis(stamp: &LocalStamp) -> u64 {
    let millis = days_from_civil(stamp.date) * 86_400_000
        + i64::from(stamp.hour) * 3_600_000
        + i64::from(stamp.minute) * 60_000;
    millis.max(0) as u64
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM` and `YYYY-MM-DDTHH:MM:SS`. A bare
/// date is taken at 23:59 so it denotes that habit day under any reset
/// boundary.
pub fn parse_stamp(input: &str) -> Result<LocalStamp, CliError> {
    let s = input.trim();
    if s.len() == 10 {
        return Ok(LocalStamp {
            date: parse_date_key(s)?,
            hour: 23,
            minute: 59,
        });
    }

    use chrono::{Datelike, Timelike};
    let dt = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .map_err(|_| CliError::usage(format!("Invalid moment: {}", input)))?;

    Ok(LocalStamp {
        date: CivilDate {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
        },
        hour: dt.hour(),
        minute: dt.minute(),
    })
}

pub fn system_now() -> LocalStamp {
    use chrono::{Datelike, Timelike};
    let now = chrono::Local::now();
    LocalStamp {
        date: CivilDate {
            year: now.year(),
            month: now.month(),
            day: now.day(),
        },
        hour: now.hour(),
        minute: now.minute(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(key: &str, hour: u32, minute: u32) -> LocalStamp {
        LocalStamp {
            date: parse_date_key(key).unwrap(),
            hour,
            minute,
        }
    }

    #[test]
    fn date_key_roundtrip_and_validation() {
        let date = parse_date_key("2024-02-29").unwrap();
        assert_eq!(date_key(date), "2024-02-29");
        assert!(parse_date_key("2023-02-29").is_err());
        assert!(parse_date_key("2024-13-01").is_err());
        assert!(parse_date_key("2024-1-01").is_err());
    }

    #[test]
    fn add_days_crosses_month_and_leap_boundaries() {
        assert_eq!(add_days("2024-02-28", 1).unwrap(), "2024-02-29");
        assert_eq!(add_days("2023-02-28", 1).unwrap(), "2023-03-01");
        assert_eq!(add_days("2024-01-01", -1).unwrap(), "2023-12-31");
    }

    #[test]
    fn diff_days_is_signed() {
        assert_eq!(diff_days("2024-01-01", "2024-01-04").unwrap(), 3);
        assert_eq!(diff_days("2024-01-04", "2024-01-01").unwrap(), -3);
    }

    #[test]
    fn weekday_of_known_dates() {
        assert_eq!(weekday_of_key("2024-01-01").unwrap(), Weekday::Monday);
        assert_eq!(weekday_of_key("2024-01-04").unwrap(), Weekday::Thursday);
        assert_eq!(weekday_of_key("2024-01-07").unwrap(), Weekday::Sunday);
    }

    #[test]
    fn effective_key_rolls_back_before_reset() {
        let reset = ResetTime { hour: 4, minute: 0 };
        assert_eq!(
            effective_date_key(&stamp("2024-01-05", 3, 59), reset),
            "2024-01-04"
        );
        assert_eq!(
            effective_date_key(&stamp("2024-01-05", 4, 0), reset),
            "2024-01-05"
        );
        // Midnight reset never rolls back.
        assert_eq!(
            effective_date_key(&stamp("2024-01-05", 0, 0), ResetTime::default()),
            "2024-01-05"
        );
    }

    #[test]
    fn effective_key_is_monotonic() {
        let reset = ResetTime { hour: 4, minute: 30 };
        let moments = [
            stamp("2024-01-04", 23, 59),
            stamp("2024-01-05", 0, 0),
            stamp("2024-01-05", 4, 29),
            stamp("2024-01-05", 4, 30),
            stamp("2024-01-05", 12, 0),
            stamp("2024-01-06", 4, 29),
            stamp("2024-01-06", 4, 30),
        ];
        let keys: Vec<String> = moments
            .iter()
            .map(|m| effective_date_key(m, reset))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn effective_weekday_follows_effective_date() {
        let reset = ResetTime { hour: 4, minute: 0 };
        // 2024-01-05 is a Friday, but 03:59 belongs to Thursday.
        assert_eq!(
            effective_weekday(&stamp("2024-01-05", 3, 59), reset),
            Weekday::Thursday
        );
        assert_eq!(
            effective_weekday(&stamp("2024-01-05", 4, 0), reset),
            Weekday::Friday
        );
    }

    #[test]
    fn parse_stamp_accepts_date_and_datetime() {
        let bare = parse_stamp("2024-01-05").unwrap();
        assert_eq!((bare.hour, bare.minute), (23, 59));

        let timed = parse_stamp("2024-01-05T03:59").unwrap();
        assert_eq!((timed.hour, timed.minute), (3, 59));

        let seconds = parse_stamp("2024-01-05T03:59:30").unwrap();
        assert_eq!((seconds.hour, seconds.minute), (3, 59));

        assert!(parse_stamp("2024-01-05 03:59").is_err());
        assert!(parse_stamp("yesterday").is_err());
    }

    #[test]
    fn epoch_millis_matches_known_moment() {
        // 2024-01-01T00:00 local = 19723 days past the epoch.
        assert_eq!(
            epoch_millis(&stamp("2024-01-01", 0, 0)),
            19_723 * 86_400_000
        );
        assert_eq!(
            epoch_millis(&stamp("2024-01-01", 1, 30)),
            19_723 * 86_400_000 + 5_400_000
        );
    }
}
