use std::collections::{HashMap, HashSet};

use crate::context::MealTime;
use crate::geo::{GeoPoint, haversine_km};
use crate::model::RestaurantId;
use crate::snapshot::Snapshot;

use super::GeneratorInput;

pub(crate) fn generate(input: &GeneratorInput<'_>) -> Vec<RestaurantId> {
    let popular = popular_in_bucket(
        input.snapshot,
        input.context.meal_time,
        input.config.popular_pool,
    );
    let nearest = nearest(input.snapshot, input.user.location, input.config.nearest_pool);

    let mut seen = HashSet::new();
    popular
        .into_iter()
        .chain(nearest)
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Restaurants most eaten (by anyone) in `meal_time`, ties broken by first
/// appearance in the meal log.
pub fn popular_in_bucket(snapshot: &Snapshot, meal_time: MealTime, n: usize) -> Vec<RestaurantId> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (pos, meal) in snapshot.meals().iter().enumerate() {
        if meal.meal_time != meal_time || snapshot.restaurant(&meal.restaurant_id).is_none() {
            continue;
        }
        counts.entry(meal.restaurant_id.as_str()).or_insert((0, pos)).0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> =
        counts.into_iter().map(|(id, (c, first))| (id, c, first)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.into_iter().take(n).map(|(id, _, _)| id.to_string()).collect()
}

/// Restaurants closest to `origin`. Unknown distances never qualify.
pub fn nearest(snapshot: &Snapshot, origin: Option<GeoPoint>, n: usize) -> Vec<RestaurantId> {
    let mut by_distance: Vec<(f64, &str)> = snapshot
        .restaurants()
        .iter()
        .map(|r| (haversine_km(origin, r.location), r.id.as_str()))
        .filter(|(d, _)| d.is_finite())
        .collect();
    by_distance.sort_by(|a, b| a.0.total_cmp(&b.0));
    by_distance.into_iter().take(n).map(|(_, id)| id.to_string()).collect()
}
