//! NomNom hybrid contextual restaurant recommender.
//!
//! Given a user, their meal history and the current day and meal time,
//! ranks a short list of open restaurants. Candidates come from popularity
//! and proximity for new users, or from matrix factorisation and tag
//! similarity for active ones; a weighted scorer and a per-user habit tree
//! decide the final order.
//!
//! Zero I/O. Persistence lives behind the [`DataSource`] trait.

pub mod candidates;
pub mod config;
pub mod constants;
pub mod context;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod geo;
pub mod hours;
pub mod model;
pub mod pattern;
pub mod profile;
pub mod scorer;
pub mod snapshot;
pub mod time;

pub use candidates::{CandidateGenerator, FactorModel, GeneratorInput, TfIdfIndex, implicit_rating};
pub use config::{EngineConfig, LatentConfig, PatternConfig, ProfileDefaults, ScoringConfig};
pub use context::{Context, MealTime, Weekday};
pub use dataset::{CURRENT_VERSION, Dataset, export_json, import_json};
pub use engine::{RankedItem, Recommendation, RecommendationPath, Recommender, meal_count};
pub use error::EngineError;
pub use geo::{GeoPoint, haversine_km};
pub use hours::{OpeningHours, parse_clock};
pub use model::{Action, Interaction, MealEvent, Restaurant, RestaurantId, Review, User, UserId};
pub use pattern::{
    DecisionTree, GenerationCachedPredictor, PatternPredictor, PatternSample, RetrainEveryRequest,
};
pub use profile::{ProfileSummary, RecentMeal, UserProfile};
pub use scorer::{ScoreBreakdown, Scorer, Weights};
pub use snapshot::{DataSource, Snapshot};
