//! Per-request user profile derived from meal history and interactions.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::config::ProfileDefaults;
use crate::context::{MealTime, Weekday};
use crate::geo::haversine_km;
use crate::model::{Action, RestaurantId, User, normalize_tag};
use crate::snapshot::Snapshot;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserProfile {
    pub user_id: String,
    /// Every tag tied for the highest count across the user's meals.
    pub top_tags: BTreeSet<String>,
    /// Most frequent tags among declined restaurants, most frequent first.
    pub disliked_tags: Vec<String>,
    pub avg_price: f64,
    pub weekday_travel_km: f64,
    pub weekend_travel_km: f64,
    pub top_meal_time: Option<MealTime>,
    pub top_day: Option<Weekday>,
    /// Restaurants the user has eaten at, from meals or "eat" interactions.
    pub eaten: HashSet<RestaurantId>,
    pub meal_count: usize,
}

impl UserProfile {
    pub fn build(user: &User, snapshot: &Snapshot, defaults: &ProfileDefaults) -> Self {
        let mut tag_counts: HashMap<String, usize> = HashMap::new();
        let mut prices = Vec::new();
        let mut weekday_km = Vec::new();
        let mut weekend_km = Vec::new();
        let mut meal_times = [0usize; 9];
        let mut days = [0usize; 7];
        let mut eaten = HashSet::new();
        let mut meal_count = 0;

        for meal in snapshot.meals_for(&user.id) {
            meal_count += 1;
            meal_times[meal.meal_time.index()] += 1;
            days[meal.day.index()] += 1;
            eaten.insert(meal.restaurant_id.clone());

            let Some(restaurant) = snapshot.restaurant(&meal.restaurant_id) else {
                continue;
            };
            for tag in restaurant.tag_keys() {
                *tag_counts.entry(tag).or_default() += 1;
            }
            if let Some(p) = restaurant.mid_price() {
                prices.push(p);
            }
            let d = haversine_km(user.location, restaurant.location);
            if d.is_finite() {
                if meal.day.is_weekend() {
                    weekend_km.push(d);
                } else {
                    weekday_km.push(d);
                }
            }
        }

        let mut declined_counts: HashMap<String, usize> = HashMap::new();
        for interaction in snapshot.interactions_for(&user.id) {
            match interaction.action {
                Action::Eat => {
                    eaten.insert(interaction.restaurant_id.clone());
                }
                Action::Decline => {
                    if let Some(r) = snapshot.restaurant(&interaction.restaurant_id) {
                        for tag in r.tag_keys() {
                            *declined_counts.entry(tag).or_default() += 1;
                        }
                    }
                }
                Action::Favorite => {}
            }
        }

        let avg_price = if prices.is_empty() {
            defaults.avg_price
        } else {
            prices.iter().sum::<f64>() / prices.len() as f64
        };

        Self {
            user_id: user.id.clone(),
            top_tags: modal_tags(&tag_counts),
            disliked_tags: ranked_tags(declined_counts, defaults.disliked_tag_count),
            avg_price,
            weekday_travel_km: typical_travel(&mut weekday_km, defaults.weekday_travel_km, defaults),
            weekend_travel_km: typical_travel(&mut weekend_km, defaults.weekend_travel_km, defaults),
            top_meal_time: argmax(&meal_times).map(|i| MealTime::ALL[i]),
            top_day: argmax(&days).map(|i| Weekday::ALL[i]),
            eaten,
            meal_count,
        }
    }

    /// Typical travel distance for the day type of `day`.
    pub fn expected_travel_km(&self, day: Weekday) -> f64 {
        if day.is_weekend() {
            self.weekend_travel_km
        } else {
            self.weekday_travel_km
        }
    }

    pub fn likes(&self, tag: &str) -> bool {
        self.top_tags.contains(tag)
    }

    pub fn dislikes(&self, tag: &str) -> bool {
        self.disliked_tags.iter().any(|t| t == tag)
    }
}

/// Account overview: meal totals, average rating, favourite cuisine and the
/// latest meals.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProfileSummary {
    pub user_id: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub total_meals: usize,
    /// Mean of the user's review ratings; `None` without reviews.
    pub average_rating: Option<f64>,
    pub favourite_cuisine: Option<String>,
    pub usual_meal_time: Option<MealTime>,
    pub usual_day: Option<Weekday>,
    /// Newest first.
    pub recent_meals: Vec<RecentMeal>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecentMeal {
    pub meal_id: String,
    pub restaurant_id: RestaurantId,
    pub restaurant_name: String,
    pub date: String,
    pub meal_time: MealTime,
    /// The user's rating of the restaurant, if they reviewed it.
    pub rating: Option<u8>,
}

impl ProfileSummary {
    pub fn build(user: &User, snapshot: &Snapshot, defaults: &ProfileDefaults, recent: usize) -> Self {
        let profile = UserProfile::build(user, snapshot, defaults);

        let ratings: HashMap<&str, u8> = snapshot
            .reviews_for(&user.id)
            .map(|r| (r.restaurant_id.as_str(), r.rating))
            .collect();
        let average_rating = (!ratings.is_empty())
            .then(|| ratings.values().map(|&r| f64::from(r)).sum::<f64>() / ratings.len() as f64);

        // latest date first; among equal dates the later-recorded meal wins
        let mut meals: Vec<_> = snapshot.meals_for(&user.id).collect();
        meals.reverse();
        meals.sort_by(|a, b| b.date.cmp(&a.date));

        // first matching display spelling of the alphabetically first modal tag
        let favourite_cuisine = profile.top_tags.first().and_then(|key| {
            meals
                .iter()
                .filter_map(|m| snapshot.restaurant(&m.restaurant_id))
                .flat_map(|r| r.tags.iter())
                .find(|t| normalize_tag(t) == *key)
                .cloned()
        });

        let recent_meals = meals
            .iter()
            .filter_map(|m| {
                let restaurant = snapshot.restaurant(&m.restaurant_id)?;
                Some(RecentMeal {
                    meal_id: m.id.clone(),
                    restaurant_id: restaurant.id.clone(),
                    restaurant_name: restaurant.name.clone(),
                    date: m.date.clone(),
                    meal_time: m.meal_time,
                    rating: ratings.get(restaurant.id.as_str()).copied(),
                })
            })
            .take(recent)
            .collect();

        Self {
            user_id: user.id.clone(),
            name: user.name.clone(),
            location: user.location_label.clone(),
            total_meals: profile.meal_count,
            average_rating,
            favourite_cuisine,
            usual_meal_time: profile.top_meal_time,
            usual_day: profile.top_day,
            recent_meals,
        }
    }
}

fn modal_tags(counts: &HashMap<String, usize>) -> BTreeSet<String> {
    let Some(&max) = counts.values().max() else {
        return BTreeSet::new();
    };
    counts
        .iter()
        .filter(|&(_, &c)| c == max)
        .map(|(t, _)| t.clone())
        .collect()
}

/// Top `n` tags by count, ties broken alphabetically.
fn ranked_tags(counts: HashMap<String, usize>, n: usize) -> Vec<String> {
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(n).map(|(t, _)| t).collect()
}

/// Median travel distance, floored at `min_travel_km`; `fallback` without data.
fn typical_travel(km: &mut [f64], fallback: f64, defaults: &ProfileDefaults) -> f64 {
    median(km).map_or(fallback, |m| m.max(defaults.min_travel_km))
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

/// Index of the largest non-zero count; the earliest index wins ties.
fn argmax(counts: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (i, &c) in counts.iter().enumerate() {
        if c > 0 && best.is_none_or(|(_, b)| c > b) {
            best = Some((i, c));
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Interaction, MealEvent, Restaurant};
    use approx::assert_relative_eq;

    fn meal(restaurant: &str, day: Weekday, meal_time: MealTime) -> MealEvent {
        MealEvent {
            id: format!("m-{restaurant}-{}", day.index()),
            user_id: "u1".into(),
            restaurant_id: restaurant.into(),
            date: "2026-02-16".into(),
            day,
            meal_time,
        }
    }

    fn declined(restaurant: &str) -> Interaction {
        Interaction {
            id: format!("i-{restaurant}"),
            user_id: "u1".into(),
            restaurant_id: restaurant.into(),
            action: Action::Decline,
            timestamp: 0,
            recommendation_rank: None,
        }
    }

    fn catalog() -> Vec<Restaurant> {
        vec![
            Restaurant::new("near", "Near")
                .at(3.0, 101.0)
                .with_tags(["Malay", "Halal"])
                .with_price("8", "12"),
            Restaurant::new("mid", "Mid")
                .at(3.0, 101.1)
                .with_tags(["Chinese"])
                .with_price("RM 20", "RM 30"),
            Restaurant::new("far", "Far")
                .at(3.0, 101.5)
                .with_tags(["Western", "Halal"]),
            Restaurant::new("nowhere", "Nowhere").with_tags(["Chinese"]),
        ]
    }

    #[test]
    fn test_empty_history_uses_defaults() {
        let snap = Snapshot::new().with_restaurants(catalog());
        let user = User::new("u1").at(3.0, 101.0);
        let p = UserProfile::build(&user, &snap, &ProfileDefaults::default());
        assert!(p.top_tags.is_empty());
        assert!(p.disliked_tags.is_empty());
        assert_eq!(p.avg_price, 25.0);
        assert_eq!(p.weekday_travel_km, 5.0);
        assert_eq!(p.weekend_travel_km, 15.0);
        assert_eq!(p.top_meal_time, None);
        assert_eq!(p.meal_count, 0);
    }

    #[test]
    fn test_modal_tags_include_ties() {
        let snap = Snapshot::new().with_restaurants(catalog()).with_meals([
            meal("near", Weekday::Monday, MealTime::Lunch),
            meal("far", Weekday::Tuesday, MealTime::Lunch),
            meal("mid", Weekday::Saturday, MealTime::Dinner),
        ]);
        let p = UserProfile::build(&User::new("u1"), &snap, &ProfileDefaults::default());
        assert_eq!(p.top_tags, BTreeSet::from(["halal".to_string()]));
        assert_eq!(p.top_meal_time, Some(MealTime::Lunch));
        assert_eq!(p.top_day, Some(Weekday::Monday));
        assert_eq!(p.meal_count, 3);
        assert!(p.eaten.contains("mid"));
    }

    #[test]
    fn test_avg_price_skips_unparsable() {
        let snap = Snapshot::new().with_restaurants(catalog()).with_meals([
            meal("near", Weekday::Monday, MealTime::Lunch),
            meal("mid", Weekday::Monday, MealTime::Lunch),
            meal("far", Weekday::Monday, MealTime::Lunch),
        ]);
        let p = UserProfile::build(&User::new("u1"), &snap, &ProfileDefaults::default());
        assert_relative_eq!(p.avg_price, (10.0 + 25.0) / 2.0);
    }

    #[test]
    fn test_travel_split_by_weekend() {
        let snap = Snapshot::new().with_restaurants(catalog()).with_meals([
            meal("near", Weekday::Monday, MealTime::Lunch),
            meal("mid", Weekday::Tuesday, MealTime::Lunch),
            meal("far", Weekday::Wednesday, MealTime::Lunch),
            meal("nowhere", Weekday::Saturday, MealTime::Lunch),
        ]);
        let user = User::new("u1").at(3.0, 101.0);
        let p = UserProfile::build(&user, &snap, &ProfileDefaults::default());
        let mid_km = haversine_km(user.location, snap.restaurant("mid").and_then(|r| r.location));
        assert_relative_eq!(p.weekday_travel_km, mid_km, epsilon = 1e-9);
        // only weekend meal has no coordinates
        assert_eq!(p.weekend_travel_km, 15.0);
    }

    #[test]
    fn test_disliked_tags_ranked_and_capped() {
        let extra = vec![
            Restaurant::new("d1", "D1").with_tags(["Spicy", "Thai", "Seafood"]),
            Restaurant::new("d2", "D2").with_tags(["Spicy", "Thai"]),
            Restaurant::new("d3", "D3").with_tags(["Spicy", "Bbq"]),
        ];
        let snap = Snapshot::new()
            .with_restaurants(extra)
            .with_interactions([declined("d1"), declined("d2"), declined("d3"), declined("ghost")]);
        let p = UserProfile::build(&User::new("u1"), &snap, &ProfileDefaults::default());
        assert_eq!(p.disliked_tags, vec!["spicy", "thai", "bbq"]);
        assert!(p.dislikes("thai"));
        assert!(!p.dislikes("seafood"));
    }

    #[test]
    fn test_meals_at_unknown_restaurants_are_ignored_for_tags() {
        let snap = Snapshot::new()
            .with_restaurants(catalog())
            .with_meals([meal("ghost", Weekday::Monday, MealTime::Lunch)]);
        let p = UserProfile::build(&User::new("u1"), &snap, &ProfileDefaults::default());
        assert!(p.top_tags.is_empty());
        assert_eq!(p.meal_count, 1);
    }

    #[test]
    fn test_eating_next_door_keeps_a_travel_floor() {
        let snap = Snapshot::new().with_restaurants(catalog()).with_meals([
            meal("near", Weekday::Monday, MealTime::Lunch),
            meal("near", Weekday::Tuesday, MealTime::Lunch),
            meal("near", Weekday::Wednesday, MealTime::Lunch),
        ]);
        let user = User::new("u1").at(3.0, 101.0);
        let defaults = ProfileDefaults::default();
        let p = UserProfile::build(&user, &snap, &defaults);
        assert_eq!(p.weekday_travel_km, defaults.min_travel_km);
        assert!(p.weekday_travel_km > 0.0);
    }

    fn reviewed(restaurant: &str, rating: u8) -> crate::model::Review {
        crate::model::Review {
            id: format!("v-{restaurant}"),
            user_id: "u1".into(),
            restaurant_id: restaurant.into(),
            date: "2026-02-20".into(),
            rating,
            price_satisfaction: None,
            visit_frequency: None,
        }
    }

    fn dated(restaurant: &str, date: &str, meal_time: MealTime) -> MealEvent {
        MealEvent {
            id: format!("m-{restaurant}-{date}"),
            date: date.into(),
            ..meal(restaurant, Weekday::Monday, meal_time)
        }
    }

    #[test]
    fn test_profile_summary() {
        let snap = Snapshot::new()
            .with_restaurants(catalog())
            .with_meals([
                dated("near", "2026-02-10", MealTime::Lunch),
                dated("far", "2026-02-12", MealTime::Lunch),
                dated("mid", "2026-02-14", MealTime::Dinner),
                dated("near", "2026-02-16", MealTime::Lunch),
                dated("ghost", "2026-02-18", MealTime::Lunch),
            ])
            .with_reviews([reviewed("near", 5), reviewed("mid", 2)]);
        let mut user = User::new("u1");
        user.name = Some("Aina".into());

        let summary = ProfileSummary::build(&user, &snap, &ProfileDefaults::default(), 3);
        assert_eq!(summary.total_meals, 5);
        assert_relative_eq!(summary.average_rating.unwrap(), 3.5);
        assert_eq!(summary.favourite_cuisine.as_deref(), Some("Halal"));
        assert_eq!(summary.usual_meal_time, Some(MealTime::Lunch));

        let recent: Vec<(&str, Option<u8>)> = summary
            .recent_meals
            .iter()
            .map(|m| (m.restaurant_id.as_str(), m.rating))
            .collect();
        assert_eq!(recent, vec![("near", Some(5)), ("mid", Some(2)), ("far", None)]);
        assert_eq!(summary.recent_meals[0].date, "2026-02-16");
        assert_eq!(summary.recent_meals[1].restaurant_name, "Mid");
    }

    #[test]
    fn test_profile_summary_without_history() {
        let snap = Snapshot::new().with_restaurants(catalog());
        let summary = ProfileSummary::build(&User::new("u1"), &snap, &ProfileDefaults::default(), 5);
        assert_eq!(summary.total_meals, 0);
        assert_eq!(summary.average_rating, None);
        assert_eq!(summary.favourite_cuisine, None);
        assert!(summary.recent_meals.is_empty());
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }
}
