use std::collections::HashSet;
use std::fs;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use nomnom_core::{
    Action, DataSource, Dataset, EngineError, GeoPoint, Interaction, MealEvent, MealTime,
    Restaurant, Review, Snapshot, User, Weekday,
};

use crate::config::DB_FILE;
use crate::error::{Result, StoreError};
use crate::schema;

const DATA_TABLES: [&str; 5] = ["users", "restaurants", "meals", "reviews", "interactions"];

const USER_COLUMNS: &str = "id, name, latitude, longitude, age, gender, location_label";
const RESTAURANT_COLUMNS: &str = "id, name, latitude, longitude, price_min, price_max, \
     tag1, tag2, tag3, opening_time, closing_time, rating, review_count";

pub struct Store {
    conn: Connection,
}

/// Row counts plus the current generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub users: u64,
    pub restaurants: u64,
    pub meals: u64,
    pub reviews: u64,
    pub interactions: u64,
    pub generation: u64,
}

/// What a dataset import wrote, and how many rows it skipped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub users: usize,
    pub restaurants: usize,
    pub meals: usize,
    pub reviews: usize,
    pub interactions: usize,
    pub skipped: usize,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Open `nomnom.db` inside `dir`, creating the directory if needed.
    pub fn open_in(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Self::open(&dir.join(DB_FILE))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        set_metadata_on(&self.conn, key, value)
    }

    /// Monotonic counter bumped by every write.
    pub fn generation_counter(&self) -> Result<u64> {
        let raw = self.get_metadata("generation")?.unwrap_or_default();
        if raw.is_empty() {
            return Ok(0);
        }
        raw.parse::<u64>()
            .map_err(|_| StoreError::InvalidData(format!("bad generation counter: {raw}")))
    }

    // --- Writes ---

    pub fn insert_user(&self, user: &User) -> Result<()> {
        if user.id.trim().is_empty() {
            return Err(StoreError::InvalidData("user id must not be empty".into()));
        }
        let tx = self.conn.unchecked_transaction()?;
        upsert_user_on(&tx, user)?;
        bump_generation_on(&tx)?;
        tx.commit()?;
        Ok(())
    }

    pub fn insert_restaurant(&self, restaurant: &Restaurant) -> Result<()> {
        if restaurant.id.trim().is_empty() {
            return Err(StoreError::InvalidData(
                "restaurant id must not be empty".into(),
            ));
        }
        let tx = self.conn.unchecked_transaction()?;
        upsert_restaurant_on(&tx, restaurant)?;
        bump_generation_on(&tx)?;
        tx.commit()?;
        Ok(())
    }

    /// Record a meal. An empty id is replaced by a fresh UUID, which is returned.
    pub fn record_meal(&self, meal: &MealEvent) -> Result<String> {
        self.require_known(&meal.user_id, &meal.restaurant_id)?;
        let meal = MealEvent {
            id: id_or_fresh(&meal.id),
            ..meal.clone()
        };
        let tx = self.conn.unchecked_transaction()?;
        insert_meal_on(&tx, &meal)?;
        bump_generation_on(&tx)?;
        tx.commit()?;
        debug!(user = %meal.user_id, restaurant = %meal.restaurant_id, "meal recorded");
        Ok(meal.id)
    }

    /// Record a review. A user has at most one review per restaurant, so a
    /// second review of the same restaurant replaces the first and keeps its id.
    pub fn record_review(&self, review: &Review) -> Result<String> {
        if !(1..=5).contains(&review.rating) {
            return Err(StoreError::InvalidData(format!(
                "rating must be between 1 and 5, got {}",
                review.rating
            )));
        }
        self.require_known(&review.user_id, &review.restaurant_id)?;
        let review = Review {
            id: id_or_fresh(&review.id),
            ..review.clone()
        };
        let tx = self.conn.unchecked_transaction()?;
        upsert_review_on(&tx, &review)?;
        let id: String = tx.query_row(
            "SELECT id FROM reviews WHERE user_id = ?1 AND restaurant_id = ?2",
            params![review.user_id, review.restaurant_id],
            |row| row.get(0),
        )?;
        bump_generation_on(&tx)?;
        tx.commit()?;
        Ok(id)
    }

    pub fn record_interaction(&self, interaction: &Interaction) -> Result<String> {
        self.require_known(&interaction.user_id, &interaction.restaurant_id)?;
        let interaction = Interaction {
            id: id_or_fresh(&interaction.id),
            ..interaction.clone()
        };
        let tx = self.conn.unchecked_transaction()?;
        insert_interaction_on(&tx, &interaction)?;
        bump_generation_on(&tx)?;
        tx.commit()?;
        Ok(interaction.id)
    }

    /// Replace every row with the contents of `dataset`.
    ///
    /// Rows that reference a user or restaurant absent from the dataset,
    /// and rows whose id was already seen, are skipped. Duplicate reviews of the same restaurant
    /// by one user collapse to the last one.
    pub fn replace_all(&self, dataset: &Dataset) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        let tx = self.conn.unchecked_transaction()?;

        for table in DATA_TABLES.iter().rev() {
            tx.execute(&format!("DELETE FROM {table}"), [])?;
        }

        let mut users = HashSet::new();
        for user in &dataset.users {
            if !users.insert(user.id.as_str()) {
                summary.skipped += 1;
                continue;
            }
            upsert_user_on(&tx, user)?;
            summary.users += 1;
        }

        let mut restaurants = HashSet::new();
        for restaurant in &dataset.restaurants {
            if !restaurants.insert(restaurant.id.as_str()) {
                summary.skipped += 1;
                continue;
            }
            upsert_restaurant_on(&tx, restaurant)?;
            summary.restaurants += 1;
        }

        let known = |user_id: &str, restaurant_id: &str| {
            users.contains(user_id) && restaurants.contains(restaurant_id)
        };

        let mut seen = HashSet::new();
        for meal in &dataset.meals {
            if !known(&meal.user_id, &meal.restaurant_id) || !seen.insert(meal.id.as_str()) {
                summary.skipped += 1;
                continue;
            }
            insert_meal_on(&tx, meal)?;
            summary.meals += 1;
        }

        let mut seen = HashSet::new();
        for review in &dataset.reviews {
            if !known(&review.user_id, &review.restaurant_id) || !seen.insert(review.id.as_str()) {
                summary.skipped += 1;
                continue;
            }
            upsert_review_on(&tx, review)?;
            summary.reviews += 1;
        }

        let mut seen = HashSet::new();
        for interaction in &dataset.interactions {
            if !known(&interaction.user_id, &interaction.restaurant_id)
                || !seen.insert(interaction.id.as_str())
            {
                summary.skipped += 1;
                continue;
            }
            insert_interaction_on(&tx, interaction)?;
            summary.interactions += 1;
        }

        bump_generation_on(&tx)?;
        tx.commit()?;

        if summary.skipped > 0 {
            warn!(skipped = summary.skipped, "import skipped orphaned or duplicate rows");
        }
        Ok(summary)
    }

    // --- Loads ---

    pub fn load_user(&self, id: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn load_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY rowid"))?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<std::result::Result<_, _>>()?;
        Ok(users)
    }

    pub fn load_restaurants(&self) -> Result<Vec<Restaurant>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RESTAURANT_COLUMNS} FROM restaurants ORDER BY rowid"
        ))?;
        let restaurants = stmt
            .query_map([], restaurant_from_row)?
            .collect::<std::result::Result<_, _>>()?;
        Ok(restaurants)
    }

    /// Meals in insertion order. Rows whose day or meal time no longer
    /// parse are skipped with a warning.
    pub fn load_meals(&self, user: Option<&str>) -> Result<Vec<MealEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, restaurant_id, date, day, meal_time
             FROM meals WHERE (?1 IS NULL OR user_id = ?1) ORDER BY rowid",
        )?;
        let rows: Vec<(String, String, String, String, String, String)> = stmt
            .query_map(params![user], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, user_id, restaurant_id, date, day, meal_time)| {
                let (Some(day), Some(meal_time)) = (Weekday::parse(&day), MealTime::parse(&meal_time))
                else {
                    warn!(meal_id = %id, %day, %meal_time, "skipping unreadable meal row");
                    return None;
                };
                Some(MealEvent {
                    id,
                    user_id,
                    restaurant_id,
                    date,
                    day,
                    meal_time,
                })
            })
            .collect())
    }

    pub fn load_reviews(&self, user: Option<&str>) -> Result<Vec<Review>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, restaurant_id, date, rating, price_satisfaction, visit_frequency
             FROM reviews WHERE (?1 IS NULL OR user_id = ?1) ORDER BY rowid",
        )?;
        let reviews = stmt
            .query_map(params![user], |row| {
                Ok(Review {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    restaurant_id: row.get(2)?,
                    date: row.get(3)?,
                    rating: row.get(4)?,
                    price_satisfaction: row.get(5)?,
                    visit_frequency: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<_, _>>()?;
        Ok(reviews)
    }

    pub fn load_interactions(&self, user: Option<&str>) -> Result<Vec<Interaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, restaurant_id, action, timestamp, recommendation_rank
             FROM interactions WHERE (?1 IS NULL OR user_id = ?1) ORDER BY rowid",
        )?;
        let rows: Vec<(String, String, String, String, i64, Option<u32>)> = stmt
            .query_map(params![user], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, user_id, restaurant_id, action, timestamp, rank)| {
                let Some(action) = Action::parse(&action) else {
                    warn!(interaction_id = %id, %action, "skipping unreadable interaction row");
                    return None;
                };
                Some(Interaction {
                    id,
                    user_id,
                    restaurant_id,
                    action,
                    timestamp,
                    recommendation_rank: rank,
                })
            })
            .collect())
    }

    /// Everything in the database as one immutable snapshot.
    pub fn load_snapshot(&self) -> Result<Snapshot> {
        self.read_consistent(|| self.load_users())
    }

    /// Every table, but only `user_id`'s user row.
    pub fn load_snapshot_for(&self, user_id: &str) -> Result<Snapshot> {
        self.read_consistent(|| Ok(self.load_user(user_id)?.into_iter().collect()))
    }

    /// All loads run inside one read transaction, so a concurrent writer
    /// cannot interleave between tables.
    fn read_consistent(&self, users: impl FnOnce() -> Result<Vec<User>>) -> Result<Snapshot> {
        let tx = self.conn.unchecked_transaction()?;
        let snapshot = Snapshot::new()
            .with_users(users()?)
            .with_restaurants(self.load_restaurants()?)
            .with_meals(self.load_meals(None)?)
            .with_reviews(self.load_reviews(None)?)
            .with_interactions(self.load_interactions(None)?)
            .with_generation(self.generation_counter()?);
        tx.commit()?;
        Ok(snapshot)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let count = |table: &str| -> Result<u64> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
                    row.get(0)
                })?;
            Ok(n as u64)
        };
        Ok(StoreStats {
            users: count("users")?,
            restaurants: count("restaurants")?,
            meals: count("meals")?,
            reviews: count("reviews")?,
            interactions: count("interactions")?,
            generation: self.generation_counter()?,
        })
    }

    fn require_known(&self, user_id: &str, restaurant_id: &str) -> Result<()> {
        let exists = |sql: &str, id: &str| -> Result<bool> {
            Ok(self
                .conn
                .query_row(sql, [id], |_| Ok(()))
                .optional()?
                .is_some())
        };
        if !exists("SELECT 1 FROM users WHERE id = ?1", user_id)? {
            return Err(StoreError::InvalidData(format!("unknown user: {user_id}")));
        }
        if !exists("SELECT 1 FROM restaurants WHERE id = ?1", restaurant_id)? {
            return Err(StoreError::InvalidData(format!(
                "unknown restaurant: {restaurant_id}"
            )));
        }
        Ok(())
    }
}

impl DataSource for Store {
    fn get_user(&self, id: &str) -> nomnom_core::error::Result<Option<User>> {
        Ok(self.load_user(id)?)
    }

    fn get_restaurants(&self) -> nomnom_core::error::Result<Vec<Restaurant>> {
        Ok(self.load_restaurants()?)
    }

    fn get_meals(&self, user: Option<&str>) -> nomnom_core::error::Result<Vec<MealEvent>> {
        Ok(self.load_meals(user)?)
    }

    fn get_reviews(&self, user: Option<&str>) -> nomnom_core::error::Result<Vec<Review>> {
        Ok(self.load_reviews(user)?)
    }

    fn get_interactions(&self, user: Option<&str>) -> nomnom_core::error::Result<Vec<Interaction>> {
        Ok(self.load_interactions(user)?)
    }

    fn generation(&self) -> u64 {
        self.generation_counter().unwrap_or_else(|e| {
            warn!(error = %EngineError::from(e), "generation counter unreadable");
            0
        })
    }

    fn snapshot_for(&self, user_id: &str) -> nomnom_core::error::Result<Snapshot> {
        Ok(self.load_snapshot_for(user_id)?)
    }
}

// --- Row mapping ---

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        location: GeoPoint::from_parts(row.get(2)?, row.get(3)?),
        age: row.get(4)?,
        gender: row.get(5)?,
        location_label: row.get(6)?,
    })
}

fn restaurant_from_row(row: &Row<'_>) -> rusqlite::Result<Restaurant> {
    let tags: [Option<String>; 3] = [row.get(6)?, row.get(7)?, row.get(8)?];
    let restaurant = Restaurant {
        id: row.get(0)?,
        name: row.get(1)?,
        location: GeoPoint::from_parts(row.get(2)?, row.get(3)?),
        price_min: row.get(4)?,
        price_max: row.get(5)?,
        tags: Vec::new(),
        opening_time: row.get(9)?,
        closing_time: row.get(10)?,
        rating: row.get(11)?,
        review_count: row.get(12)?,
    };
    Ok(restaurant.with_tags(tags.into_iter().flatten()))
}

// --- Statement helpers, usable inside a transaction ---

fn set_metadata_on(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

fn bump_generation_on(conn: &Connection) -> Result<()> {
    conn.execute(
        "UPDATE metadata SET value = CAST(CAST(value AS INTEGER) + 1 AS TEXT)
         WHERE key = 'generation'",
        [],
    )?;
    Ok(())
}

fn upsert_user_on(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, latitude, longitude, age, gender, location_label)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            latitude = excluded.latitude,
            longitude = excluded.longitude,
            age = excluded.age,
            gender = excluded.gender,
            location_label = excluded.location_label",
        params![
            user.id,
            user.name,
            user.location.map(|p| p.lat),
            user.location.map(|p| p.lon),
            user.age,
            user.gender,
            user.location_label,
        ],
    )?;
    Ok(())
}

fn upsert_restaurant_on(conn: &Connection, r: &Restaurant) -> Result<()> {
    let tag = |i: usize| r.tags.get(i).cloned();
    conn.execute(
        "INSERT INTO restaurants (id, name, latitude, longitude, price_min, price_max,
                                  tag1, tag2, tag3, opening_time, closing_time, rating, review_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            latitude = excluded.latitude,
            longitude = excluded.longitude,
            price_min = excluded.price_min,
            price_max = excluded.price_max,
            tag1 = excluded.tag1,
            tag2 = excluded.tag2,
            tag3 = excluded.tag3,
            opening_time = excluded.opening_time,
            closing_time = excluded.closing_time,
            rating = excluded.rating,
            review_count = excluded.review_count",
        params![
            r.id,
            r.name,
            r.location.map(|p| p.lat),
            r.location.map(|p| p.lon),
            r.price_min,
            r.price_max,
            tag(0),
            tag(1),
            tag(2),
            r.opening_time,
            r.closing_time,
            r.rating,
            r.review_count,
        ],
    )?;
    Ok(())
}

fn insert_meal_on(conn: &Connection, meal: &MealEvent) -> Result<()> {
    conn.execute(
        "INSERT INTO meals (id, user_id, restaurant_id, date, day, meal_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            meal.id,
            meal.user_id,
            meal.restaurant_id,
            meal.date,
            meal.day.name(),
            meal.meal_time.name(),
        ],
    )?;
    Ok(())
}

fn upsert_review_on(conn: &Connection, review: &Review) -> Result<()> {
    conn.execute(
        "INSERT INTO reviews (id, user_id, restaurant_id, date, rating, price_satisfaction, visit_frequency)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(user_id, restaurant_id) DO UPDATE SET
            date = excluded.date,
            rating = excluded.rating,
            price_satisfaction = excluded.price_satisfaction,
            visit_frequency = excluded.visit_frequency",
        params![
            review.id,
            review.user_id,
            review.restaurant_id,
            review.date,
            review.rating,
            review.price_satisfaction,
            review.visit_frequency,
        ],
    )?;
    Ok(())
}

fn insert_interaction_on(conn: &Connection, i: &Interaction) -> Result<()> {
    conn.execute(
        "INSERT INTO interactions (id, user_id, restaurant_id, action, timestamp, recommendation_rank)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            i.id,
            i.user_id,
            i.restaurant_id,
            i.action.as_str(),
            i.timestamp,
            i.recommendation_rank,
        ],
    )?;
    Ok(())
}

fn id_or_fresh(id: &str) -> String {
    if id.trim().is_empty() {
        Uuid::new_v4().to_string()
    } else {
        id.to_string()
    }
}
