//! JSON dataset interchange.
//!
//! The wire format uses camelCase field names, flat `latitude`/`longitude`
//! fields and three nullable tag slots (`tag1`..`tag3`). Prices may be
//! strings or numbers. Rows missing an id get a fresh v4 UUID; rows that
//! cannot be interpreted (unknown action, meal time or rating) are dropped
//! with a warning.
//!
//! Records exported from the spreadsheet seed files ("ID", "User ID",
//! "Tag 1", "Number of Google Reviewers", ...) are accepted as well, with
//! numbers, booleans and timestamps given as text.

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::context::{MealTime, Weekday};
use crate::geo::GeoPoint;
use crate::model::{Action, Interaction, MealEvent, Restaurant, Review, User, clean_tags};
use crate::snapshot::Snapshot;
use crate::time::{now_iso8601, parse_datetime};

pub const CURRENT_VERSION: &str = "1.0";

/// Domain-side contents of a dataset file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    pub users: Vec<User>,
    pub restaurants: Vec<Restaurant>,
    pub meals: Vec<MealEvent>,
    pub reviews: Vec<Review>,
    pub interactions: Vec<Interaction>,
}

impl Dataset {
    pub fn into_snapshot(self, generation: u64) -> Snapshot {
        Snapshot::new()
            .with_users(self.users)
            .with_restaurants(self.restaurants)
            .with_meals(self.meals)
            .with_reviews(self.reviews)
            .with_interactions(self.interactions)
            .with_generation(generation)
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut users: Vec<User> = snapshot.users().cloned().collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            users,
            restaurants: snapshot.restaurants().to_vec(),
            meals: snapshot.meals().to_vec(),
            reviews: snapshot.reviews().to_vec(),
            interactions: snapshot.interactions().to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
            && self.restaurants.is_empty()
            && self.meals.is_empty()
            && self.reviews.is_empty()
            && self.interactions.is_empty()
    }
}

// --- Wire format types ---

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct WireDataset {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub users: Vec<WireUser>,
    #[serde(default)]
    pub restaurants: Vec<WireRestaurant>,
    #[serde(default, alias = "meal_data")]
    pub meals: Vec<WireMeal>,
    #[serde(default)]
    pub reviews: Vec<WireReview>,
    #[serde(default, alias = "interaction_log")]
    pub interactions: Vec<WireInteraction>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct WireUser {
    #[serde(alias = "ID")]
    pub id: String,
    #[serde(alias = "Name")]
    pub name: Option<String>,
    #[serde(alias = "Latitude", deserialize_with = "lenient::opt_f64")]
    pub latitude: Option<f64>,
    #[serde(alias = "Longitude", deserialize_with = "lenient::opt_f64")]
    pub longitude: Option<f64>,
    #[serde(alias = "Age", deserialize_with = "lenient::opt_u32")]
    pub age: Option<u32>,
    #[serde(alias = "Gender")]
    pub gender: Option<String>,
    /// Area label, e.g. "Petaling Jaya".
    #[serde(alias = "Location")]
    pub location: Option<String>,
}

/// A price written either as text ("RM 12") or as a bare number.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum WirePrice {
    Text(String),
    Number(f64),
}

impl WirePrice {
    fn into_text(self) -> String {
        match self {
            WirePrice::Text(s) => s,
            WirePrice::Number(n) => n.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct WireRestaurant {
    #[serde(alias = "ID")]
    pub id: String,
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Latitude", deserialize_with = "lenient::opt_f64")]
    pub latitude: Option<f64>,
    #[serde(alias = "Longitude", deserialize_with = "lenient::opt_f64")]
    pub longitude: Option<f64>,
    #[serde(alias = "Est Price Min per Person")]
    pub price_min: Option<WirePrice>,
    #[serde(alias = "Est Price Max per Person")]
    pub price_max: Option<WirePrice>,
    #[serde(alias = "Tag 1")]
    pub tag1: Option<String>,
    #[serde(alias = "Tag 2")]
    pub tag2: Option<String>,
    #[serde(alias = "Tag 3")]
    pub tag3: Option<String>,
    #[serde(alias = "Opening Time")]
    pub opening_time: Option<String>,
    #[serde(alias = "Closing Time")]
    pub closing_time: Option<String>,
    #[serde(alias = "Google Rating", deserialize_with = "lenient::opt_f64")]
    pub rating: Option<f64>,
    #[serde(alias = "Number of Google Reviewers", deserialize_with = "lenient::u32_or_zero")]
    pub review_count: u32,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct WireMeal {
    #[serde(alias = "ID")]
    pub id: String,
    #[serde(alias = "User ID")]
    pub user_id: String,
    #[serde(alias = "Restaurant ID")]
    pub restaurant_id: String,
    #[serde(alias = "Date")]
    pub date: String,
    /// Derived from `date` when absent.
    #[serde(alias = "Day")]
    pub day: Option<String>,
    #[serde(alias = "Meal")]
    pub meal_time: String,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct WireReview {
    #[serde(alias = "ID")]
    pub id: String,
    #[serde(alias = "User ID")]
    pub user_id: String,
    #[serde(alias = "Restaurant ID")]
    pub restaurant_id: String,
    #[serde(alias = "Date")]
    pub date: String,
    #[serde(alias = "Rating", deserialize_with = "lenient::rating")]
    pub rating: u8,
    #[serde(alias = "Price Satisfaction", deserialize_with = "lenient::opt_bool")]
    pub price_satisfaction: Option<bool>,
    #[serde(alias = "Frequency of Visits", deserialize_with = "lenient::opt_u32")]
    pub visit_frequency: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct WireInteraction {
    #[serde(alias = "ID")]
    pub id: String,
    #[serde(alias = "User ID")]
    pub user_id: String,
    #[serde(alias = "Restaurant ID")]
    pub restaurant_id: String,
    #[serde(alias = "User Action")]
    pub action: String,
    #[serde(alias = "Timestamp", deserialize_with = "lenient::timestamp")]
    pub timestamp: i64,
    #[serde(alias = "Recommendation Rank", deserialize_with = "lenient::opt_u32")]
    pub recommendation_rank: Option<u32>,
}

/// Field decoders for values that may arrive as text.
mod lenient {
    use serde::{Deserialize, Deserializer};

    use super::parse_datetime;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Bool(bool),
        Number(f64),
        Text(String),
    }

    impl Loose {
        fn number(&self) -> Option<f64> {
            let n = match self {
                Loose::Number(n) => Some(*n),
                Loose::Text(s) => s.trim().parse().ok(),
                Loose::Bool(_) => None,
            };
            n.filter(|n: &f64| n.is_finite())
        }
    }

    fn loose<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Loose>, D::Error> {
        Option::<Loose>::deserialize(d)
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(loose(d)?.and_then(|v| v.number()))
    }

    pub fn opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        Ok(loose(d)?
            .and_then(|v| v.number())
            .filter(|n| (0.0..=f64::from(u32::MAX)).contains(n))
            .map(|n| n as u32))
    }

    pub fn u32_or_zero<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        Ok(opt_u32(d)?.unwrap_or(0))
    }

    /// Unreadable ratings decode as 0 and are dropped as out of range.
    pub fn rating<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
        Ok(loose(d)?
            .and_then(|v| v.number())
            .filter(|n| (0.0..=f64::from(u8::MAX)).contains(n))
            .map_or(0, |n| n as u8))
    }

    pub fn opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(match loose(d)? {
            Some(Loose::Bool(b)) => Some(b),
            Some(Loose::Number(n)) => Some(n != 0.0),
            Some(Loose::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            None => None,
        })
    }

    /// Unix seconds, or `YYYY-MM-DD HH:MM:SS` text read as UTC.
    pub fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        Ok(match loose(d)? {
            Some(Loose::Number(n)) => n as i64,
            Some(Loose::Text(s)) => s
                .trim()
                .parse()
                .ok()
                .or_else(|| parse_datetime(&s))
                .unwrap_or_default(),
            _ => 0,
        })
    }
}

// --- Conversion: Wire → Domain ---

impl WireDataset {
    pub fn into_dataset(self) -> Dataset {
        Dataset {
            users: self.users.into_iter().map(wire_user_to_domain).collect(),
            restaurants: self
                .restaurants
                .into_iter()
                .map(wire_restaurant_to_domain)
                .collect(),
            meals: self.meals.into_iter().filter_map(wire_meal_to_domain).collect(),
            reviews: self
                .reviews
                .into_iter()
                .filter_map(wire_review_to_domain)
                .collect(),
            interactions: self
                .interactions
                .into_iter()
                .filter_map(wire_interaction_to_domain)
                .collect(),
        }
    }

    pub fn from_dataset(dataset: &Dataset) -> Self {
        WireDataset {
            version: CURRENT_VERSION.to_string(),
            timestamp: now_iso8601(),
            users: dataset.users.iter().map(domain_user_to_wire).collect(),
            restaurants: dataset
                .restaurants
                .iter()
                .map(domain_restaurant_to_wire)
                .collect(),
            meals: dataset.meals.iter().map(domain_meal_to_wire).collect(),
            reviews: dataset.reviews.iter().map(domain_review_to_wire).collect(),
            interactions: dataset
                .interactions
                .iter()
                .map(domain_interaction_to_wire)
                .collect(),
        }
    }
}

fn id_or_fresh(id: String) -> String {
    if id.trim().is_empty() {
        Uuid::new_v4().to_string()
    } else {
        id
    }
}

fn wire_user_to_domain(wire: WireUser) -> User {
    User {
        id: id_or_fresh(wire.id),
        name: wire.name,
        location: GeoPoint::from_parts(wire.latitude, wire.longitude),
        age: wire.age,
        gender: wire.gender,
        location_label: wire.location,
    }
}

fn wire_restaurant_to_domain(wire: WireRestaurant) -> Restaurant {
    Restaurant {
        id: id_or_fresh(wire.id),
        name: wire.name,
        location: GeoPoint::from_parts(wire.latitude, wire.longitude),
        price_min: wire.price_min.map(WirePrice::into_text),
        price_max: wire.price_max.map(WirePrice::into_text),
        tags: clean_tags([wire.tag1, wire.tag2, wire.tag3].into_iter().flatten()),
        opening_time: wire.opening_time,
        closing_time: wire.closing_time,
        rating: wire.rating,
        review_count: wire.review_count,
    }
}

fn wire_meal_to_domain(wire: WireMeal) -> Option<MealEvent> {
    let Some(meal_time) = MealTime::parse(&wire.meal_time) else {
        warn!(meal_id = %wire.id, meal_time = %wire.meal_time, "dropping meal with unknown meal time");
        return None;
    };
    let day = wire
        .day
        .as_deref()
        .and_then(Weekday::parse)
        .or_else(|| Weekday::from_date(&wire.date));
    let Some(day) = day else {
        warn!(meal_id = %wire.id, date = %wire.date, "dropping meal without a usable day");
        return None;
    };
    Some(MealEvent {
        id: id_or_fresh(wire.id),
        user_id: wire.user_id,
        restaurant_id: wire.restaurant_id,
        date: wire.date,
        day,
        meal_time,
    })
}

fn wire_review_to_domain(wire: WireReview) -> Option<Review> {
    if !(1..=5).contains(&wire.rating) {
        warn!(review_id = %wire.id, rating = wire.rating, "dropping review with out-of-range rating");
        return None;
    }
    Some(Review {
        id: id_or_fresh(wire.id),
        user_id: wire.user_id,
        restaurant_id: wire.restaurant_id,
        date: wire.date,
        rating: wire.rating,
        price_satisfaction: wire.price_satisfaction,
        visit_frequency: wire.visit_frequency,
    })
}

fn wire_interaction_to_domain(wire: WireInteraction) -> Option<Interaction> {
    let Some(action) = Action::parse(&wire.action) else {
        warn!(interaction_id = %wire.id, action = %wire.action, "dropping interaction with unknown action");
        return None;
    };
    Some(Interaction {
        id: id_or_fresh(wire.id),
        user_id: wire.user_id,
        restaurant_id: wire.restaurant_id,
        action,
        timestamp: wire.timestamp,
        recommendation_rank: wire.recommendation_rank,
    })
}

// --- Conversion: Domain → Wire ---

fn domain_user_to_wire(user: &User) -> WireUser {
    WireUser {
        id: user.id.clone(),
        name: user.name.clone(),
        latitude: user.location.map(|p| p.lat),
        longitude: user.location.map(|p| p.lon),
        age: user.age,
        gender: user.gender.clone(),
        location: user.location_label.clone(),
    }
}

fn domain_restaurant_to_wire(r: &Restaurant) -> WireRestaurant {
    let tag = |i: usize| r.tags.get(i).cloned();
    WireRestaurant {
        id: r.id.clone(),
        name: r.name.clone(),
        latitude: r.location.map(|p| p.lat),
        longitude: r.location.map(|p| p.lon),
        price_min: r.price_min.clone().map(WirePrice::Text),
        price_max: r.price_max.clone().map(WirePrice::Text),
        tag1: tag(0),
        tag2: tag(1),
        tag3: tag(2),
        opening_time: r.opening_time.clone(),
        closing_time: r.closing_time.clone(),
        rating: r.rating,
        review_count: r.review_count,
    }
}

fn domain_meal_to_wire(m: &MealEvent) -> WireMeal {
    WireMeal {
        id: m.id.clone(),
        user_id: m.user_id.clone(),
        restaurant_id: m.restaurant_id.clone(),
        date: m.date.clone(),
        day: Some(m.day.name().to_string()),
        meal_time: m.meal_time.name().to_string(),
    }
}

fn domain_review_to_wire(r: &Review) -> WireReview {
    WireReview {
        id: r.id.clone(),
        user_id: r.user_id.clone(),
        restaurant_id: r.restaurant_id.clone(),
        date: r.date.clone(),
        rating: r.rating,
        price_satisfaction: r.price_satisfaction,
        visit_frequency: r.visit_frequency,
    }
}

fn domain_interaction_to_wire(i: &Interaction) -> WireInteraction {
    WireInteraction {
        id: i.id.clone(),
        user_id: i.user_id.clone(),
        restaurant_id: i.restaurant_id.clone(),
        action: i.action.as_str().to_string(),
        timestamp: i.timestamp,
        recommendation_rank: i.recommendation_rank,
    }
}

/// Parse a JSON dataset.
pub fn import_json(json: &str) -> Result<Dataset, serde_json::Error> {
    let wire: WireDataset = serde_json::from_str(json)?;
    Ok(wire.into_dataset())
}

/// Serialize a dataset to pretty-printed JSON.
pub fn export_json(dataset: &Dataset) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&WireDataset::from_dataset(dataset))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": "1.0",
        "users": [
            {"id": "USR_1", "name": "Aina", "latitude": 3.07, "longitude": 101.6, "location": "Subang Jaya"},
            {"name": "No Id"}
        ],
        "restaurants": [
            {"id": "RST_1", "name": "Village Park", "latitude": 3.13, "longitude": 101.62,
             "priceMin": "RM 10", "priceMax": 20, "tag1": "Malay", "tag2": null, "tag3": "Nasi Lemak",
             "openingTime": "07:00", "closingTime": "17:00", "rating": 4.4, "reviewCount": 1200}
        ],
        "meals": [
            {"id": "M1", "userId": "USR_1", "restaurantId": "RST_1", "date": "2026-02-21", "mealTime": "Tea Time"},
            {"id": "M2", "userId": "USR_1", "restaurantId": "RST_1", "date": "2026-02-21", "mealTime": "Elevenses"}
        ],
        "reviews": [
            {"id": "V1", "userId": "USR_1", "restaurantId": "RST_1", "date": "2026-02-21", "rating": 5,
             "priceSatisfaction": true, "visitFrequency": 3},
            {"id": "V2", "userId": "USR_1", "restaurantId": "RST_1", "date": "2026-02-21", "rating": 9}
        ],
        "interactions": [
            {"id": "I1", "userId": "USR_1", "restaurantId": "RST_1", "action": "EAT", "timestamp": 1771632000, "recommendationRank": 2},
            {"id": "I2", "userId": "USR_1", "restaurantId": "RST_1", "action": "shrug", "timestamp": 1771632000}
        ]
    }"#;

    #[test]
    fn test_import_sample() {
        let ds = import_json(SAMPLE).unwrap();
        assert_eq!(ds.users.len(), 2);
        assert_eq!(ds.users[0].location_label.as_deref(), Some("Subang Jaya"));
        assert!(Uuid::parse_str(&ds.users[1].id).is_ok());

        let r = &ds.restaurants[0];
        assert_eq!(r.tags, vec!["Malay", "Nasi Lemak"]);
        assert_eq!(r.price_min.as_deref(), Some("RM 10"));
        assert_eq!(r.price_max.as_deref(), Some("20"));
        assert_eq!(r.mid_price(), Some(15.0));
        assert_eq!(r.review_count, 1200);
    }

    #[test]
    fn test_import_drops_uninterpretable_rows() {
        let ds = import_json(SAMPLE).unwrap();
        assert_eq!(ds.meals.len(), 1);
        assert_eq!(ds.meals[0].day, Weekday::Saturday);
        assert_eq!(ds.meals[0].meal_time, MealTime::TeaTime);
        assert_eq!(ds.reviews.len(), 1);
        assert_eq!(ds.interactions.len(), 1);
        assert_eq!(ds.interactions[0].action, Action::Eat);
    }

    #[test]
    fn test_export_then_import_preserves_rows() {
        let ds = import_json(SAMPLE).unwrap();
        let json = export_json(&ds).unwrap();
        assert!(json.contains("\"version\": \"1.0\""));
        assert!(json.contains("\"mealTime\": \"Tea Time\""));
        let back = import_json(&json).unwrap();
        assert_eq!(back, ds);
    }

    const SEED_SHAPED: &str = r#"{
        "users": [
            {"ID": "USR_7", "Username": "mei", "Name": "Mei", "Age": "29", "Gender": "F",
             "Location": "Cheras", "Latitude": "3.09", "Longitude": "101.74"}
        ],
        "restaurants": [
            {"ID": "RST_7", "Name": "Kedai Kopi", "District": "Cheras",
             "Est Price Min per Person": "RM 8", "Est Price Max per Person": "RM 15",
             "Google Rating": "4.1", "Number of Google Reviewers": "850",
             "Opening Time": "07:00", "Closing Time": "15:00",
             "Latitude": 3.1, "Longitude": 101.75, "Tag 1": "Kopitiam", "Tag 2": "", "Tag 3": "Halal"}
        ],
        "meal_data": [
            {"ID": "MEAL_1", "User ID": "USR_7", "Restaurant ID": "RST_7",
             "Date": "2026-02-21", "Day": "Saturday", "Meal": "Breakfast"}
        ],
        "reviews": [
            {"ID": "REV_1", "User ID": "USR_7", "Restaurant ID": "RST_7", "Date": "2026-02-21",
             "Rating": "4", "Price Satisfaction": "TRUE", "Frequency of Visits": "3"}
        ],
        "interaction_log": [
            {"ID": "LOG_1", "User ID": "USR_7", "Restaurant ID": "RST_7", "Recommendation Rank": "2",
             "User Action": "Favorite", "Timestamp": "2026-02-21 00:00:00", "Swipe Time (Sec)": "4"}
        ]
    }"#;

    #[test]
    fn test_import_seed_shaped_records() {
        let ds = import_json(SEED_SHAPED).unwrap();

        let u = &ds.users[0];
        assert_eq!(u.id, "USR_7");
        assert_eq!(u.age, Some(29));
        assert_eq!(u.location_label.as_deref(), Some("Cheras"));
        assert_eq!(u.location, Some(GeoPoint::new(3.09, 101.74)));

        let r = &ds.restaurants[0];
        assert_eq!(r.id, "RST_7");
        assert_eq!(r.tags, vec!["Kopitiam", "Halal"]);
        assert_eq!(r.review_count, 850);
        assert_eq!(r.rating, Some(4.1));
        assert_eq!(r.mid_price(), Some(11.5));
        assert_eq!(r.closing_time.as_deref(), Some("15:00"));

        assert_eq!(ds.meals.len(), 1);
        assert_eq!(ds.meals[0].meal_time, MealTime::Breakfast);
        assert_eq!(ds.meals[0].user_id, "USR_7");

        let v = &ds.reviews[0];
        assert_eq!(v.rating, 4);
        assert_eq!(v.price_satisfaction, Some(true));
        assert_eq!(v.visit_frequency, Some(3));

        let i = &ds.interactions[0];
        assert_eq!(i.action, Action::Favorite);
        assert_eq!(i.timestamp, 1771632000);
        assert_eq!(i.recommendation_rank, Some(2));
    }

    #[test]
    fn test_empty_object_is_empty_dataset() {
        let ds = import_json("{}").unwrap();
        assert!(ds.is_empty());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(import_json("{not json").is_err());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let ds = import_json(SAMPLE).unwrap();
        let snap = ds.clone().into_snapshot(3);
        assert_eq!(snap.generation(), 3);
        assert_eq!(snap.restaurants().len(), 1);
        let mut expected = ds;
        expected.users.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(Dataset::from_snapshot(&snap), expected);
    }
}
