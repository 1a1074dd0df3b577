//! Temporal context: day of week and meal-time bucket.
//!
//! A [`Context`] is a pure function of a timestamp (or of an explicit
//! override), so requests can be replayed deterministically against
//! historical meals.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::{local_day_and_hour, now_unix_secs, parse_date};

/// Named day segment used as a contextual feature.
///
/// Buckets are half-open, contiguous and wrap at midnight:
/// Midnight Snack covers `[23.5, 24) ∪ [0, 4)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MealTime {
    Suhoor,
    Breakfast,
    Brunch,
    Lunch,
    #[serde(rename = "Tea Time")]
    TeaTime,
    Linner,
    Dinner,
    #[serde(rename = "Late Dinner")]
    LateDinner,
    #[serde(rename = "Midnight Snack")]
    MidnightSnack,
}

impl MealTime {
    pub const ALL: [MealTime; 9] = [
        MealTime::Suhoor,
        MealTime::Breakfast,
        MealTime::Brunch,
        MealTime::Lunch,
        MealTime::TeaTime,
        MealTime::Linner,
        MealTime::Dinner,
        MealTime::LateDinner,
        MealTime::MidnightSnack,
    ];

    /// Bucket for a fractional hour. Out-of-range input is wrapped into `[0, 24)`.
    pub fn from_hour(hour: f64) -> Self {
        let h = normalize_hour(hour);
        if (4.0..7.0).contains(&h) {
            MealTime::Suhoor
        } else if (7.0..10.0).contains(&h) {
            MealTime::Breakfast
        } else if (10.0..12.0).contains(&h) {
            MealTime::Brunch
        } else if (12.0..16.0).contains(&h) {
            MealTime::Lunch
        } else if (16.0..17.5).contains(&h) {
            MealTime::TeaTime
        } else if (17.5..19.5).contains(&h) {
            MealTime::Linner
        } else if (19.5..22.0).contains(&h) {
            MealTime::Dinner
        } else if (22.0..23.5).contains(&h) {
            MealTime::LateDinner
        } else {
            MealTime::MidnightSnack
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MealTime::Suhoor => "Suhoor",
            MealTime::Breakfast => "Breakfast",
            MealTime::Brunch => "Brunch",
            MealTime::Lunch => "Lunch",
            MealTime::TeaTime => "Tea Time",
            MealTime::Linner => "Linner",
            MealTime::Dinner => "Dinner",
            MealTime::LateDinner => "Late Dinner",
            MealTime::MidnightSnack => "Midnight Snack",
        }
    }

    /// Hour used when replaying a historical meal that only records its bucket.
    pub fn representative_hour(self) -> f64 {
        match self {
            MealTime::Suhoor => 5.5,
            MealTime::Breakfast => 8.5,
            MealTime::Brunch => 11.0,
            MealTime::Lunch => 14.0,
            MealTime::TeaTime => 16.75,
            MealTime::Linner => 18.5,
            MealTime::Dinner => 20.75,
            MealTime::LateDinner => 22.75,
            MealTime::MidnightSnack => 0.75,
        }
    }

    /// Case-insensitive parse of the display name; spaces, dashes and
    /// underscores are interchangeable ("tea_time", "Late-Dinner").
    pub fn parse(s: &str) -> Option<Self> {
        let key = fold_name(s);
        Self::ALL.into_iter().find(|m| fold_name(m.name()) == key)
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for MealTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    /// Weekday of a day count since 1970-01-01 (a Thursday).
    pub fn from_epoch_days(days: i64) -> Self {
        Self::ALL[(days + 3).rem_euclid(7) as usize]
    }

    /// Weekday of a `YYYY-MM-DD` date.
    pub fn from_date(date: &str) -> Option<Self> {
        parse_date(date).map(Self::from_epoch_days)
    }

    pub fn is_weekend(self) -> bool {
        matches!(self, Weekday::Saturday | Weekday::Sunday)
    }

    pub fn name(self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }

    /// Accepts full names and three-letter abbreviations, any case.
    pub fn parse(s: &str) -> Option<Self> {
        let key = s.trim().to_lowercase();
        if key.len() < 3 {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|d| d.name().to_lowercase() == key || d.name()[..3].to_lowercase() == key)
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved request context: `(day, meal_time, hour ∈ [0, 24))`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub day: Weekday,
    pub meal_time: MealTime,
    pub hour: f64,
}

impl Context {
    /// Context for a day and a fractional hour; the bucket follows the hour.
    pub fn new(day: Weekday, hour: f64) -> Self {
        let hour = normalize_hour(hour);
        Self {
            day,
            meal_time: MealTime::from_hour(hour),
            hour,
        }
    }

    /// Context of a Unix timestamp observed at a fixed UTC offset.
    pub fn at_unix(secs: i64, utc_offset_minutes: i32) -> Self {
        let (days, hour) = local_day_and_hour(secs, utc_offset_minutes);
        Self::new(Weekday::from_epoch_days(days), hour)
    }

    /// Context of the current wall clock.
    pub fn now(utc_offset_minutes: i32) -> Self {
        Self::at_unix(now_unix_secs(), utc_offset_minutes)
    }

    /// Replay context for a historical meal that recorded only its bucket.
    pub fn for_meal(day: Weekday, meal_time: MealTime) -> Self {
        Self {
            day,
            meal_time,
            hour: meal_time.representative_hour(),
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = (self.hour * 60.0).round() as u32 % (24 * 60);
        write!(
            f,
            "{} {} ({:02}:{:02})",
            self.day,
            self.meal_time,
            minutes / 60,
            minutes % 60
        )
    }
}

fn normalize_hour(hour: f64) -> f64 {
    if !hour.is_finite() {
        return 0.0;
    }
    let h = hour.rem_euclid(24.0);
    // rem_euclid can round up to exactly 24.0 for tiny negative input
    if h >= 24.0 { 0.0 } else { h }
}

fn fold_name(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}
