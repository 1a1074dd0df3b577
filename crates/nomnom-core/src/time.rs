//! Lightweight UTC date/time utilities (no chrono dependency).
//!
//! Uses Howard Hinnant's civil_from_days / days_from_civil algorithms for
//! Unix-to-date conversion and back.

use std::time::{SystemTime, UNIX_EPOCH};

const SECS_PER_DAY: i64 = 86_400;

/// Current UTC time as Unix seconds.
pub fn now_unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Current UTC timestamp in ISO-8601 format.
pub fn now_iso8601() -> String {
    unix_to_iso8601(now_unix_secs())
}

/// Convert Unix seconds to ISO-8601 UTC string.
pub fn unix_to_iso8601(secs: i64) -> String {
    let days = secs.div_euclid(SECS_PER_DAY);
    let time_of_day = secs.rem_euclid(SECS_PER_DAY);
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (y, m, d) = civil_from_days(days);
    format!("{y:04}-{m:02}-{d:02}T{hours:02}:{minutes:02}:{seconds:02}Z")
}

/// Calendar date (`YYYY-MM-DD`) of a Unix timestamp shifted by a UTC offset.
pub fn unix_to_date(secs: i64, utc_offset_minutes: i32) -> String {
    let local = secs + i64::from(utc_offset_minutes) * 60;
    let (y, m, d) = civil_from_days(local.div_euclid(SECS_PER_DAY));
    format!("{y:04}-{m:02}-{d:02}")
}

/// Split a Unix timestamp into (days since epoch, fractional hour of day)
/// in the local frame given by `utc_offset_minutes`.
pub fn local_day_and_hour(secs: i64, utc_offset_minutes: i32) -> (i64, f64) {
    let local = secs + i64::from(utc_offset_minutes) * 60;
    let days = local.div_euclid(SECS_PER_DAY);
    let secs_of_day = local.rem_euclid(SECS_PER_DAY);
    (days, secs_of_day as f64 / 3600.0)
}

/// Parse a `YYYY-MM-DD` date into days since the Unix epoch.
pub fn parse_date(date: &str) -> Option<i64> {
    let mut parts = date.trim().splitn(3, '-');
    let y: i64 = parts.next()?.parse().ok()?;
    let m: u64 = parts.next()?.parse().ok()?;
    // Tolerate a trailing time component ("2024-03-01T12:00:00").
    let d_part = parts.next()?;
    let d: u64 = d_part.get(..2).unwrap_or(d_part).parse().ok()?;
    if !(1..=12).contains(&m) || !(1..=31).contains(&d) {
        return None;
    }
    Some(days_from_civil(y, m, d))
}

/// Parse `YYYY-MM-DD HH:MM[:SS]` (or with a `T` separator) as UTC Unix seconds.
pub fn parse_datetime(text: &str) -> Option<i64> {
    let text = text.trim();
    let (date, clock) = text.split_once([' ', 'T'])?;
    let days = parse_date(date)?;
    let mut parts = clock.trim_end_matches('Z').split(':');
    let h: i64 = parts.next()?.parse().ok()?;
    let m: i64 = parts.next()?.parse().ok()?;
    let s: i64 = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    if !(0..24).contains(&h) || !(0..60).contains(&m) || !(0..60).contains(&s) {
        return None;
    }
    Some(days * SECS_PER_DAY + h * 3600 + m * 60 + s)
}

/// Howard Hinnant's civil_from_days: Unix epoch days → (year, month, day).
fn civil_from_days(days: i64) -> (i64, u64, u64) {
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

/// Inverse of [`civil_from_days`]: (year, month, day) → Unix epoch days.
fn days_from_civil(y: i64, m: u64, d: u64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u64;
    let mp = if m > 2 { m - 3 } else { m + 9 };
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe as i64 - 719468
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_epoch() {
        assert_eq!(unix_to_iso8601(0), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_known_date() {
        // 2026-02-21T00:00:00Z = 1771632000
        assert_eq!(unix_to_iso8601(1771632000), "2026-02-21T00:00:00Z");
    }

    #[test]
    fn test_now_is_recent() {
        let ts = now_iso8601();
        assert!(ts.starts_with("20"), "timestamp should be this century: {ts}");
    }

    #[test]
    fn test_parse_date_roundtrips_with_civil() {
        let days = parse_date("2026-02-21").unwrap();
        assert_eq!(days * 86_400, 1771632000);
        assert_eq!(parse_date("1970-01-01"), Some(0));
        assert_eq!(parse_date("1969-12-31"), Some(-1));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("2024-13-01"), None);
        assert_eq!(parse_date("2024-02"), None);
    }

    #[test]
    fn test_parse_date_ignores_time_suffix() {
        assert_eq!(parse_date("1970-01-02T08:00:00"), Some(1));
    }

    #[test]
    fn test_parse_datetime() {
        assert_eq!(parse_datetime("2026-02-21 00:00:00"), Some(1771632000));
        assert_eq!(parse_datetime("2026-02-21T01:30"), Some(1771632000 + 5400));
        assert_eq!(parse_datetime("2026-02-21"), None);
        assert_eq!(parse_datetime("2026-02-21 25:00:00"), None);
    }

    #[test]
    fn test_offset_shifts_date() {
        // 2026-02-20T20:00:00Z is already the 21st in UTC+8.
        let secs = 1771632000 - 4 * 3600;
        assert_eq!(unix_to_date(secs, 0), "2026-02-20");
        assert_eq!(unix_to_date(secs, 480), "2026-02-21");
    }

    #[test]
    fn test_local_day_and_hour() {
        let (days, hour) = local_day_and_hour(1771632000 + 90 * 60, 0);
        assert_eq!(days, 1771632000 / 86_400);
        assert!((hour - 1.5).abs() < 1e-12);

        let (days_behind, hour_behind) = local_day_and_hour(1771632000, -60);
        assert_eq!(days_behind, 1771632000 / 86_400 - 1);
        assert!((hour_behind - 23.0).abs() < 1e-12);
    }
}
