//! Engine tuning knobs. Every field has a default so partial TOML files work.

use serde::{Deserialize, Serialize};

use crate::constants::{
    ACTIVE_USER_THRESHOLD, DEFAULT_AVG_PRICE, DEFAULT_WEEKDAY_TRAVEL_KM,
    DEFAULT_WEEKEND_TRAVEL_KM, DISLIKED_TAG_COUNT, MIN_TRAVEL_KM, MAX_CANDIDATES, MAX_RESULTS, NEAREST_POOL,
    PATTERN_MIN_SAMPLES, POPULAR_POOL, TIME_BUDGET_MS, UTC_OFFSET_MINUTES,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Activity count at which the personalised path takes over.
    pub active_user_threshold: usize,
    pub max_results: usize,
    pub popular_pool: usize,
    pub nearest_pool: usize,
    pub max_candidates: usize,
    /// `None` disables the deadline.
    pub time_budget_ms: Option<u64>,
    pub utc_offset_minutes: i32,
    /// Ids never recommended, whatever the request says.
    pub always_exclude: Vec<String>,
    pub profile: ProfileDefaults,
    pub latent: LatentConfig,
    pub pattern: PatternConfig,
    pub scoring: ScoringConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            active_user_threshold: ACTIVE_USER_THRESHOLD,
            max_results: MAX_RESULTS,
            popular_pool: POPULAR_POOL,
            nearest_pool: NEAREST_POOL,
            max_candidates: MAX_CANDIDATES,
            time_budget_ms: Some(TIME_BUDGET_MS),
            utc_offset_minutes: UTC_OFFSET_MINUTES,
            always_exclude: Vec::new(),
            profile: ProfileDefaults::default(),
            latent: LatentConfig::default(),
            pattern: PatternConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileDefaults {
    pub weekday_travel_km: f64,
    pub weekend_travel_km: f64,
    /// Lower bound applied to the median travel distances.
    pub min_travel_km: f64,
    pub avg_price: f64,
    pub disliked_tag_count: usize,
}

impl Default for ProfileDefaults {
    fn default() -> Self {
        Self {
            weekday_travel_km: DEFAULT_WEEKDAY_TRAVEL_KM,
            weekend_travel_km: DEFAULT_WEEKEND_TRAVEL_KM,
            min_travel_km: MIN_TRAVEL_KM,
            avg_price: DEFAULT_AVG_PRICE,
            disliked_tag_count: DISLIKED_TAG_COUNT,
        }
    }
}

/// Matrix factorisation hyper-parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatentConfig {
    pub factors: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub regularization: f64,
    pub top_n: usize,
    pub seed: u64,
}

impl Default for LatentConfig {
    fn default() -> Self {
        Self {
            factors: 50,
            epochs: 20,
            learning_rate: 0.005,
            regularization: 0.02,
            top_n: 100,
            seed: 42,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub min_samples: usize,
    pub max_depth: usize,
    pub min_leaf: usize,
    /// Keep fitted trees across requests until the data generation changes.
    pub cache: bool,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            min_samples: PATTERN_MIN_SAMPLES,
            max_depth: 4,
            min_leaf: 2,
            cache: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub distance_weight: f64,
    pub price_weight: f64,
    pub tag_weight: f64,
    pub popularity_weight: f64,
    pub pattern_weight: f64,
    /// Tolerance multiplier on the expected travel distance.
    pub distance_tolerance: f64,
    pub dislike_penalty: f64,
    pub revisit_penalty: bool,
    pub revisit_factor: f64,
    /// Weekday median above which distance matters half as much.
    pub long_distance_km: f64,
    pub long_distance_factor: f64,
    /// Average price below which price matters more.
    pub price_sensitive_below: f64,
    pub price_sensitive_factor: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            distance_weight: 0.35,
            price_weight: 0.25,
            tag_weight: 0.25,
            popularity_weight: 0.1,
            pattern_weight: 0.15,
            distance_tolerance: 1.75,
            dislike_penalty: 0.3,
            revisit_penalty: true,
            revisit_factor: 0.8,
            long_distance_km: 10.0,
            long_distance_factor: 0.5,
            price_sensitive_below: 15.0,
            price_sensitive_factor: 1.5,
        }
    }
}
