/// Mean Earth radius in kilometres (haversine).
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Activity count at which a user switches from the new-user path to the
/// personalised path.
pub const ACTIVE_USER_THRESHOLD: usize = 15;

/// Upper bound on the number of restaurants returned per request.
pub const MAX_RESULTS: usize = 15;

/// Size of the "popular in this meal-time bucket" pool.
pub const POPULAR_POOL: usize = 30;

/// Size of the "nearest to the user" pool.
pub const NEAREST_POOL: usize = 30;

/// Candidate-set bound applied after generation.
pub const MAX_CANDIDATES: usize = 200;

/// Default request time budget in milliseconds.
pub const TIME_BUDGET_MS: u64 = 250;

/// Default local offset (UTC+8) used to resolve wall-clock context.
pub const UTC_OFFSET_MINUTES: i32 = 480;

/// Profile defaults for users without usable history.
pub const DEFAULT_WEEKDAY_TRAVEL_KM: f64 = 5.0;
pub const DEFAULT_WEEKEND_TRAVEL_KM: f64 = 15.0;
pub const DEFAULT_AVG_PRICE: f64 = 25.0;

/// Floor on a user's typical travel distance, so someone who always eats
/// next door still gets a distance gradient.
pub const MIN_TRAVEL_KM: f64 = 0.5;

/// Accepted values for the distance tolerance multiplier.
pub const DISTANCE_TOLERANCE_RANGE: std::ops::RangeInclusive<f64> = 1.5..=2.0;

/// Number of declined-restaurant tags kept as dislikes.
pub const DISLIKED_TAG_COUNT: usize = 3;

/// Implicit ratings are clamped to this range.
pub const IMPLICIT_RATING_MIN: f64 = 1.0;
pub const IMPLICIT_RATING_MAX: f64 = 7.0;

/// Minimum (day, meal-time, tag) samples before the pattern tree is fitted.
pub const PATTERN_MIN_SAMPLES: usize = 10;

/// `popularity = min(1, ln(reviews + 1) / POPULARITY_LOG_SCALE)`
pub const POPULARITY_LOG_SCALE: f64 = 7.0;

/// Numerical epsilon for near-zero comparisons
pub const EPSILON: f64 = 1e-10;
