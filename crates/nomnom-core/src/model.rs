//! Domain entities shared by the engine, the store and the dataset format.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::context::{MealTime, Weekday};
use crate::geo::GeoPoint;
use crate::hours::OpeningHours;

pub type UserId = String;
pub type RestaurantId = String;

/// Restaurants carry at most this many tags.
pub const MAX_TAGS: usize = 3;

static PRICE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: Option<String>,
    pub location: Option<GeoPoint>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    /// Free-form area label ("Subang Jaya", "Bangsar").
    pub location_label: Option<String>,
}

impl User {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn at(mut self, lat: f64, lon: f64) -> Self {
        self.location = Some(GeoPoint::new(lat, lon));
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: RestaurantId,
    pub name: String,
    pub location: Option<GeoPoint>,
    /// Free-form price strings such as `"15"` or `"RM 12.50"`.
    pub price_min: Option<String>,
    pub price_max: Option<String>,
    pub tags: Vec<String>,
    pub opening_time: Option<String>,
    pub closing_time: Option<String>,
    pub rating: Option<f64>,
    pub review_count: u32,
}

impl Restaurant {
    pub fn new(id: impl Into<RestaurantId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn at(mut self, lat: f64, lon: f64) -> Self {
        self.location = Some(GeoPoint::new(lat, lon));
        self
    }

    /// Set tags, dropping blanks and keeping the first [`MAX_TAGS`].
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = clean_tags(tags);
        self
    }

    pub fn with_price(mut self, min: &str, max: &str) -> Self {
        self.price_min = Some(min.to_string());
        self.price_max = Some(max.to_string());
        self
    }

    pub fn with_hours(mut self, open: &str, close: &str) -> Self {
        self.opening_time = Some(open.to_string());
        self.closing_time = Some(close.to_string());
        self
    }

    pub fn with_reviews(mut self, count: u32) -> Self {
        self.review_count = count;
        self
    }

    /// Midpoint of the price range. A single parsable bound stands in for
    /// the midpoint; neither parsable yields `None`.
    pub fn mid_price(&self) -> Option<f64> {
        let lo = self.price_min.as_deref().and_then(parse_price);
        let hi = self.price_max.as_deref().and_then(parse_price);
        match (lo, hi) {
            (Some(lo), Some(hi)) => Some((lo + hi) / 2.0),
            (Some(p), None) | (None, Some(p)) => Some(p),
            (None, None) => None,
        }
    }

    pub fn hours(&self) -> OpeningHours {
        OpeningHours::parse(self.opening_time.as_deref(), self.closing_time.as_deref())
    }

    /// Normalised form of the first tag.
    pub fn primary_tag(&self) -> Option<String> {
        self.tags.first().map(|t| normalize_tag(t))
    }

    /// Normalised tags (trimmed, lowercased), in stored order.
    pub fn tag_keys(&self) -> impl Iterator<Item = String> + '_ {
        self.tags.iter().map(|t| normalize_tag(t))
    }

    /// Whether any normalised tag satisfies `pred`.
    pub fn has_tag_where(&self, pred: impl Fn(&str) -> bool) -> bool {
        self.tag_keys().any(|t| pred(&t))
    }
}

/// One recorded meal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MealEvent {
    pub id: String,
    pub user_id: UserId,
    pub restaurant_id: RestaurantId,
    /// `YYYY-MM-DD`
    pub date: String,
    pub day: Weekday,
    pub meal_time: MealTime,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub user_id: UserId,
    pub restaurant_id: RestaurantId,
    pub date: String,
    /// 1 to 5 stars.
    pub rating: u8,
    pub price_satisfaction: Option<bool>,
    pub visit_frequency: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Eat,
    Decline,
    Favorite,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Eat => "eat",
            Action::Decline => "decline",
            Action::Favorite => "favorite",
        }
    }

    /// Case-insensitive. Accepts the British spelling of favourite.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eat" => Some(Action::Eat),
            "decline" => Some(Action::Decline),
            "favorite" | "favourite" => Some(Action::Favorite),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User response to a presented recommendation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: String,
    pub user_id: UserId,
    pub restaurant_id: RestaurantId,
    pub action: Action,
    /// Unix seconds.
    pub timestamp: i64,
    pub recommendation_rank: Option<u32>,
}

/// First decimal number found in a price string.
pub fn parse_price(raw: &str) -> Option<f64> {
    PRICE_NUMBER
        .find(raw)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|p| p.is_finite())
}

pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

pub(crate) fn clean_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .take(MAX_TAGS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("15"), Some(15.0));
        assert_eq!(parse_price("RM 12.50"), Some(12.5));
        assert_eq!(parse_price("about 8-10"), Some(8.0));
        assert_eq!(parse_price("free-ish"), None);
        assert_eq!(parse_price(""), None);
    }

    #[test]
    fn test_mid_price() {
        let r = Restaurant::new("r1", "Nasi Kandar").with_price("10", "RM20");
        assert_eq!(r.mid_price(), Some(15.0));

        let one_sided = Restaurant {
            price_max: Some("30".into()),
            ..Restaurant::new("r2", "Steakhouse")
        };
        assert_eq!(one_sided.mid_price(), Some(30.0));

        assert_eq!(Restaurant::new("r3", "Mystery").mid_price(), None);
    }

    #[test]
    fn test_tags_are_cleaned_and_capped() {
        let r = Restaurant::new("r1", "Food Court").with_tags(["Malay", " ", "Chinese ", "Indian", "Thai"]);
        assert_eq!(r.tags, vec!["Malay", "Chinese", "Indian"]);
        assert_eq!(r.primary_tag().as_deref(), Some("malay"));
    }

    #[test]
    fn test_tag_matching_is_case_insensitive() {
        let r = Restaurant::new("r1", "Mamak").with_tags(["Mamak", "Indian"]);
        assert!(r.has_tag_where(|t| t == "indian"));
        assert!(!r.has_tag_where(|t| t == "Indian"));
    }

    #[test]
    fn test_action_parse() {
        assert_eq!(Action::parse("EAT"), Some(Action::Eat));
        assert_eq!(Action::parse("favourite"), Some(Action::Favorite));
        assert_eq!(Action::parse("skip"), None);
        assert_eq!(serde_json::to_string(&Action::Decline).unwrap(), "\"decline\"");
    }
}
