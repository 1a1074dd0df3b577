//! Data access seam and the immutable per-request snapshot.

use std::collections::HashMap;

use crate::error::Result;
use crate::model::{Interaction, MealEvent, Restaurant, Review, User};

/// Read-only access to the recommender's inputs.
///
/// `user` filters restrict rows to one user; `None` returns every row.
/// `generation` increases whenever the underlying data changes.
pub trait DataSource {
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_restaurants(&self) -> Result<Vec<Restaurant>>;
    fn get_meals(&self, user: Option<&str>) -> Result<Vec<MealEvent>>;
    fn get_reviews(&self, user: Option<&str>) -> Result<Vec<Review>>;
    fn get_interactions(&self, user: Option<&str>) -> Result<Vec<Interaction>>;
    fn generation(&self) -> u64;

    /// Every table plus one user's row. Sources that can read at a single
    /// point in time should override this.
    fn snapshot_for(&self, user_id: &str) -> Result<Snapshot> {
        Snapshot::load(self, Some(user_id))
    }
}

/// Consistent, immutable view of every table, taken once per request.
///
/// Restaurants keep insertion order (the first row wins on duplicate ids);
/// rows that reference unknown restaurants are kept and skipped by readers.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    users: HashMap<String, User>,
    restaurants: Vec<Restaurant>,
    restaurant_index: HashMap<String, usize>,
    meals: Vec<MealEvent>,
    reviews: Vec<Review>,
    interactions: Vec<Interaction>,
    generation: u64,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy every table out of a source.
    pub fn from_source(source: &dyn DataSource) -> Result<Self> {
        Self::load(source, None)
    }

    /// Like [`Snapshot::from_source`], but also pulls a single user row,
    /// for sources that cannot enumerate users.
    pub fn from_source_for(source: &dyn DataSource, user_id: &str) -> Result<Self> {
        Self::load(source, Some(user_id))
    }

    fn load<S: DataSource + ?Sized>(source: &S, user_id: Option<&str>) -> Result<Self> {
        let generation = source.generation();
        let user = match user_id {
            Some(id) => source.get_user(id)?,
            None => None,
        };
        let restaurants = source.get_restaurants()?;
        let meals = source.get_meals(None)?;
        let reviews = source.get_reviews(None)?;
        let interactions = source.get_interactions(None)?;
        Ok(Self::new()
            .with_users(user)
            .with_restaurants(restaurants)
            .with_meals(meals)
            .with_reviews(reviews)
            .with_interactions(interactions)
            .with_generation(generation))
    }

    pub fn with_users(mut self, users: impl IntoIterator<Item = User>) -> Self {
        for user in users {
            self.users.insert(user.id.clone(), user);
        }
        self.generation += 1;
        self
    }

    pub fn with_restaurants(mut self, restaurants: impl IntoIterator<Item = Restaurant>) -> Self {
        for r in restaurants {
            if self.restaurant_index.contains_key(&r.id) {
                continue;
            }
            self.restaurant_index.insert(r.id.clone(), self.restaurants.len());
            self.restaurants.push(r);
        }
        self.generation += 1;
        self
    }

    pub fn with_meals(mut self, meals: impl IntoIterator<Item = MealEvent>) -> Self {
        self.meals.extend(meals);
        self.generation += 1;
        self
    }

    pub fn with_reviews(mut self, reviews: impl IntoIterator<Item = Review>) -> Self {
        self.reviews.extend(reviews);
        self.generation += 1;
        self
    }

    pub fn with_interactions(mut self, interactions: impl IntoIterator<Item = Interaction>) -> Self {
        self.interactions.extend(interactions);
        self.generation += 1;
        self
    }

    /// Pin the generation, e.g. to the one reported by a backing store.
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn restaurant(&self, id: &str) -> Option<&Restaurant> {
        self.restaurant_index.get(id).map(|&i| &self.restaurants[i])
    }

    pub fn restaurants(&self) -> &[Restaurant] {
        &self.restaurants
    }

    pub fn meals(&self) -> &[MealEvent] {
        &self.meals
    }

    pub fn meals_for<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a MealEvent> + 'a {
        self.meals.iter().filter(move |m| m.user_id == user_id)
    }

    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }

    pub fn reviews_for<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a Review> + 'a {
        self.reviews.iter().filter(move |r| r.user_id == user_id)
    }

    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    pub fn interactions_for<'a>(
        &'a self,
        user_id: &'a str,
    ) -> impl Iterator<Item = &'a Interaction> + 'a {
        self.interactions.iter().filter(move |i| i.user_id == user_id)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

fn filter_user<T: Clone>(rows: &[T], user: Option<&str>, owner: impl Fn(&T) -> &str) -> Vec<T> {
    match user {
        Some(id) => rows.iter().filter(|r| owner(r) == id).cloned().collect(),
        None => rows.to_vec(),
    }
}

impl DataSource for Snapshot {
    fn get_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.get(id).cloned())
    }

    fn get_restaurants(&self) -> Result<Vec<Restaurant>> {
        Ok(self.restaurants.clone())
    }

    fn get_meals(&self, user: Option<&str>) -> Result<Vec<MealEvent>> {
        Ok(filter_user(&self.meals, user, |m| m.user_id.as_str()))
    }

    fn get_reviews(&self, user: Option<&str>) -> Result<Vec<Review>> {
        Ok(filter_user(&self.reviews, user, |r| r.user_id.as_str()))
    }

    fn get_interactions(&self, user: Option<&str>) -> Result<Vec<Interaction>> {
        Ok(filter_user(&self.interactions, user, |i| i.user_id.as_str()))
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{MealTime, Weekday};

    fn meal(user: &str, restaurant: &str) -> MealEvent {
        MealEvent {
            id: format!("{user}-{restaurant}"),
            user_id: user.into(),
            restaurant_id: restaurant.into(),
            date: "2026-02-21".into(),
            day: Weekday::Saturday,
            meal_time: MealTime::Lunch,
        }
    }

    #[test]
    fn test_first_restaurant_wins_on_duplicate_id() {
        let snap = Snapshot::new().with_restaurants([
            Restaurant::new("r1", "First"),
            Restaurant::new("r2", "Other"),
            Restaurant::new("r1", "Second"),
        ]);
        assert_eq!(snap.restaurants().len(), 2);
        assert_eq!(snap.restaurant("r1").map(|r| r.name.as_str()), Some("First"));
    }

    #[test]
    fn test_user_filtering() {
        let snap = Snapshot::new().with_meals([meal("u1", "r1"), meal("u2", "r1"), meal("u1", "r2")]);
        assert_eq!(snap.meals_for("u1").count(), 2);
        assert_eq!(snap.get_meals(Some("u2")).unwrap().len(), 1);
        assert_eq!(snap.get_meals(None).unwrap().len(), 3);
    }

    #[test]
    fn test_from_source_copies_generation() {
        let source = Snapshot::new()
            .with_users([User::new("u1")])
            .with_restaurants([Restaurant::new("r1", "A")])
            .with_meals([meal("u1", "r1")])
            .with_generation(7);
        let copy = Snapshot::from_source_for(&source, "u1").unwrap();
        assert_eq!(copy.generation(), 7);
        assert!(copy.user("u1").is_some());
        assert_eq!(copy.meals().len(), 1);
    }

    #[test]
    fn test_adding_rows_moves_generation() {
        let base = Snapshot::new().with_restaurants([Restaurant::new("r1", "A")]);
        let before = base.generation();
        let grown = base.clone().with_meals([meal("u1", "r1")]);
        assert!(grown.generation() > before);
        assert_eq!(grown.clone().with_generation(3).generation(), 3);
    }

    #[test]
    fn test_default_snapshot_for_pulls_the_user() {
        let source = Snapshot::new()
            .with_users([User::new("u1"), User::new("u2")])
            .with_meals([meal("u1", "r1")])
            .with_generation(4);
        let snap = source.snapshot_for("u2").unwrap();
        assert!(snap.user("u2").is_some());
        assert!(snap.user("u1").is_none());
        assert_eq!(snap.generation(), 4);
    }

    #[test]
    fn test_snapshot_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Snapshot>();
    }
}
