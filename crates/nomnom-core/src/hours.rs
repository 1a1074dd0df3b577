//! Opening-hours parsing and availability checks.
//!
//! Hours are stored as free-form strings. Anything we cannot read is treated
//! as "always open" so a malformed row never hides a restaurant.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static CLOCK_COLON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{1,2}):(\d{2})(?::(\d{2}))?\s*([ap]\.?m\.?)?$").unwrap()
});
static CLOCK_COMPACT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{2})(\d{2})$").unwrap());
static CLOCK_HOUR_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d{1,2})\s*([ap]\.?m\.?)$").unwrap());

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Daily opening window in minutes since local midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpeningHours {
    AlwaysOpen,
    /// `[open, close)`; `close < open` spans midnight.
    Window { open: u32, close: u32 },
}

impl OpeningHours {
    /// Build from raw opening/closing strings.
    ///
    /// Missing, unparsable or equal times yield [`OpeningHours::AlwaysOpen`].
    pub fn parse(open: Option<&str>, close: Option<&str>) -> Self {
        let (Some(open), Some(close)) = (open.and_then(parse_clock), close.and_then(parse_clock))
        else {
            return OpeningHours::AlwaysOpen;
        };
        if open == close {
            OpeningHours::AlwaysOpen
        } else {
            OpeningHours::Window { open, close }
        }
    }

    /// Whether the window contains the fractional local hour.
    pub fn is_open_at(&self, hour: f64) -> bool {
        match *self {
            OpeningHours::AlwaysOpen => true,
            OpeningHours::Window { open, close } => {
                let minute = hour_to_minute(hour);
                if open < close {
                    minute >= open && minute < close
                } else {
                    minute >= open || minute < close
                }
            }
        }
    }
}

/// Parse a clock string into minutes since midnight.
///
/// Accepts `HH:MM`, `HH:MM:SS`, `H:MM AM/PM`, `H AM/PM` and `HHMM`.
/// `24:00` is read as midnight.
pub fn parse_clock(raw: &str) -> Option<u32> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let (hour, minute, meridiem) = if let Some(caps) = CLOCK_COLON.captures(s) {
        let h: u32 = caps[1].parse().ok()?;
        let m: u32 = caps[2].parse().ok()?;
        if let Some(sec) = caps.get(3) {
            let sec: u32 = sec.as_str().parse().ok()?;
            if sec > 59 {
                return None;
            }
        }
        (h, m, caps.get(4).map(|m| m.as_str().to_ascii_lowercase()))
    } else if let Some(caps) = CLOCK_HOUR_ONLY.captures(s) {
        let h: u32 = caps[1].parse().ok()?;
        (h, 0, Some(caps[2].to_ascii_lowercase()))
    } else if let Some(caps) = CLOCK_COMPACT.captures(s) {
        (caps[1].parse().ok()?, caps[2].parse().ok()?, None)
    } else {
        return None;
    };

    if minute > 59 {
        return None;
    }

    let hour = match meridiem.as_deref().map(|m| m.starts_with('p')) {
        Some(is_pm) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            match (hour, is_pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            }
        }
        None => hour,
    };

    match (hour, minute) {
        (24, 0) => Some(0),
        (h, m) if h < 24 => Some(h * 60 + m),
        _ => None,
    }
}

fn hour_to_minute(hour: f64) -> u32 {
    if !hour.is_finite() {
        return 0;
    }
    let minute = (hour.rem_euclid(24.0) * 60.0).floor() as u32;
    minute % MINUTES_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clock_formats() {
        assert_eq!(parse_clock("09:30"), Some(9 * 60 + 30));
        assert_eq!(parse_clock("9:30"), Some(9 * 60 + 30));
        assert_eq!(parse_clock("21:15:00"), Some(21 * 60 + 15));
        assert_eq!(parse_clock("9:30 PM"), Some(21 * 60 + 30));
        assert_eq!(parse_clock("12:00 am"), Some(0));
        assert_eq!(parse_clock("12:05pm"), Some(12 * 60 + 5));
        assert_eq!(parse_clock("7 a.m."), Some(7 * 60));
        assert_eq!(parse_clock("2230"), Some(22 * 60 + 30));
        assert_eq!(parse_clock("24:00"), Some(0));
    }

    #[test]
    fn test_parse_clock_rejects_garbage() {
        assert_eq!(parse_clock(""), None);
        assert_eq!(parse_clock("closed"), None);
        assert_eq!(parse_clock("25:00"), None);
        assert_eq!(parse_clock("10:75"), None);
        assert_eq!(parse_clock("13:00 PM"), None);
        assert_eq!(parse_clock("24:30"), None);
    }

    #[test]
    fn test_missing_or_equal_is_always_open() {
        assert_eq!(OpeningHours::parse(None, Some("22:00")), OpeningHours::AlwaysOpen);
        assert_eq!(OpeningHours::parse(Some("n/a"), Some("22:00")), OpeningHours::AlwaysOpen);
        assert_eq!(OpeningHours::parse(Some("00:00"), Some("24:00")), OpeningHours::AlwaysOpen);
        assert!(OpeningHours::AlwaysOpen.is_open_at(3.0));
    }

    #[test]
    fn test_daytime_window() {
        let h = OpeningHours::parse(Some("10:00"), Some("22:00"));
        assert!(!h.is_open_at(9.99));
        assert!(h.is_open_at(10.0));
        assert!(h.is_open_at(21.99));
        assert!(!h.is_open_at(22.0));
    }

    #[test]
    fn test_window_spanning_midnight() {
        let h = OpeningHours::parse(Some("18:00"), Some("02:00"));
        assert!(h.is_open_at(23.0));
        assert!(h.is_open_at(1.5));
        assert!(!h.is_open_at(2.0));
        assert!(!h.is_open_at(12.0));
        assert!(h.is_open_at(18.0));
    }
}
