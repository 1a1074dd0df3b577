use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    // Checkpoint every ~400KB instead of the default ~4MB
    conn.pragma_update(None, "wal_autocheckpoint", 100)?;

    // Errors are non-fatal: in-memory DBs and fresh files legitimately fail this.
    if conn
        .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        .is_ok()
    {
        tracing::debug!("startup WAL checkpoint complete");
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            id             TEXT PRIMARY KEY,
            name           TEXT,
            latitude       REAL,
            longitude      REAL,
            age            INTEGER,
            gender         TEXT,
            location_label TEXT
        );

        CREATE TABLE IF NOT EXISTS restaurants (
            id           TEXT PRIMARY KEY,
            name         TEXT NOT NULL,
            latitude     REAL,
            longitude    REAL,
            price_min    TEXT,
            price_max    TEXT,
            tag1         TEXT,
            tag2         TEXT,
            tag3         TEXT,
            opening_time TEXT,
            closing_time TEXT,
            rating       REAL,
            review_count INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS meals (
            id            TEXT PRIMARY KEY,
            user_id       TEXT NOT NULL REFERENCES users(id),
            restaurant_id TEXT NOT NULL REFERENCES restaurants(id),
            date          TEXT NOT NULL,
            day           TEXT NOT NULL,
            meal_time     TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS reviews (
            id                 TEXT PRIMARY KEY,
            user_id            TEXT NOT NULL REFERENCES users(id),
            restaurant_id      TEXT NOT NULL REFERENCES restaurants(id),
            date               TEXT NOT NULL,
            rating             INTEGER NOT NULL,
            price_satisfaction INTEGER,
            visit_frequency    INTEGER,
            UNIQUE (user_id, restaurant_id)
        );

        CREATE TABLE IF NOT EXISTS interactions (
            id                  TEXT PRIMARY KEY,
            user_id             TEXT NOT NULL REFERENCES users(id),
            restaurant_id       TEXT NOT NULL REFERENCES restaurants(id),
            action              TEXT NOT NULL,
            timestamp           INTEGER NOT NULL,
            recommendation_rank INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_meals_user ON meals(user_id);
        CREATE INDEX IF NOT EXISTS idx_reviews_user ON reviews(user_id);
        CREATE INDEX IF NOT EXISTS idx_interactions_user ON interactions(user_id);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO metadata (key, value) VALUES ('generation', '0')",
        [],
    )?;

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        for table in &[
            "metadata",
            "users",
            "restaurants",
            "meals",
            "reviews",
            "interactions",
        ] {
            let count: i64 = conn
                .query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .unwrap();
            assert!(count >= 0, "table {table} should exist");
        }
    }

    #[test]
    fn test_schema_version_set() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_wal_mode_enabled() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        // In-memory always reports "memory", on-disk would report "wal"
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert!(mode == "memory" || mode == "wal", "got mode: {mode}");
    }

    #[test]
    fn test_idempotent_initialize_keeps_generation() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn.execute(
            "UPDATE metadata SET value = '7' WHERE key = 'generation'",
            [],
        )
        .unwrap();
        initialize(&conn).unwrap();

        let generation: String = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'generation'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(generation, "7");
    }

    #[test]
    fn test_busy_timeout_set() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let timeout: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, 5000, "busy_timeout should be 5000ms");
    }

    #[test]
    fn test_review_pair_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn.execute("INSERT INTO users (id) VALUES ('u1')", []).unwrap();
        conn.execute("INSERT INTO restaurants (id, name) VALUES ('r1', 'R')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO reviews (id, user_id, restaurant_id, date, rating) VALUES ('a', 'u1', 'r1', '2026-01-01', 4)",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO reviews (id, user_id, restaurant_id, date, rating) VALUES ('b', 'u1', 'r1', '2026-01-02', 2)",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_meal_requires_known_user() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let orphan = conn.execute(
            "INSERT INTO meals (id, user_id, restaurant_id, date, day, meal_time) VALUES ('m', 'ghost', 'r', '2026-01-01', 'Monday', 'Lunch')",
            [],
        );
        assert!(orphan.is_err());
    }

    #[test]
    fn test_meal_requires_known_restaurant() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn.execute("INSERT INTO users (id) VALUES ('u1')", []).unwrap();
        let orphan = conn.execute(
            "INSERT INTO meals (id, user_id, restaurant_id, date, day, meal_time) VALUES ('m', 'u1', 'ghost', '2026-01-01', 'Monday', 'Lunch')",
            [],
        );
        assert!(orphan.is_err());
    }
}
