//! Hybrid orchestrator: picks a candidate strategy from the user's activity,
//! filters by availability and exclusions, then scores and truncates.

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::candidates::{CandidateGenerator, GeneratorInput};
use crate::config::EngineConfig;
use crate::context::Context;
use crate::error::{EngineError, Result};
use crate::model::{Action, Restaurant, RestaurantId, User};
use crate::pattern::{GenerationCachedPredictor, PatternPredictor, RetrainEveryRequest};
use crate::profile::UserProfile;
use crate::scorer::{ScoreBreakdown, Scorer, Weights, popularity_score};
use crate::snapshot::{DataSource, Snapshot};

/// Which branch produced the final candidate list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecommendationPath {
    /// Below the activity threshold: popularity and proximity only.
    NewUser,
    LatentFactor,
    ContentSimilarity,
    /// Active user, but both personalised generators came back empty.
    PopularityFallback,
    /// The time budget ran out; plain popularity order.
    BudgetFallback,
}

impl fmt::Display for RecommendationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecommendationPath::NewUser => "new-user",
            RecommendationPath::LatentFactor => "latent-factor",
            RecommendationPath::ContentSimilarity => "content-similarity",
            RecommendationPath::PopularityFallback => "popularity-fallback",
            RecommendationPath::BudgetFallback => "budget-fallback",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedItem {
    pub restaurant_id: RestaurantId,
    pub name: String,
    pub score: ScoreBreakdown,
}

/// A full recommendation with the reasoning behind it.
#[derive(Clone, Debug, Serialize)]
pub struct Recommendation {
    pub user_id: String,
    pub context: Context,
    pub path: RecommendationPath,
    pub activity: usize,
    pub predicted_tag: Option<String>,
    pub weights: Weights,
    pub items: Vec<RankedItem>,
}

impl Recommendation {
    pub fn ids(&self) -> Vec<RestaurantId> {
        self.items.iter().map(|i| i.restaurant_id.clone()).collect()
    }
}

/// Number of "eat" interactions or recorded meals, whichever is larger.
pub fn meal_count(snapshot: &Snapshot, user_id: &str) -> usize {
    let eats = snapshot
        .interactions_for(user_id)
        .filter(|i| i.action == Action::Eat)
        .count();
    eats.max(snapshot.meals_for(user_id).count())
}

pub struct Recommender {
    config: EngineConfig,
    predictor: Box<dyn PatternPredictor>,
}

impl Recommender {
    /// Predictor choice follows `config.pattern.cache`.
    pub fn new(config: EngineConfig) -> Self {
        let predictor: Box<dyn PatternPredictor> = if config.pattern.cache {
            Box::new(GenerationCachedPredictor::new(config.pattern.clone()))
        } else {
            Box::new(RetrainEveryRequest::new(config.pattern.clone()))
        };
        Self { config, predictor }
    }

    pub fn with_predictor(config: EngineConfig, predictor: Box<dyn PatternPredictor>) -> Self {
        Self { config, predictor }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ranked restaurant ids for `user_id`. Failures are logged and yield an
    /// empty list.
    pub fn recommend(
        &self,
        source: &dyn DataSource,
        user_id: &str,
        exclude_ids: &[String],
        context_override: Option<Context>,
    ) -> Vec<RestaurantId> {
        match self.explain(source, user_id, exclude_ids, context_override) {
            Ok(rec) => rec.ids(),
            Err(e) => {
                warn!(user_id, error = %e, "recommendation failed");
                Vec::new()
            }
        }
    }

    /// Like [`Recommender::recommend`] but returns the path taken and every
    /// item's score breakdown, and surfaces errors.
    pub fn explain(
        &self,
        source: &dyn DataSource,
        user_id: &str,
        exclude_ids: &[String],
        context_override: Option<Context>,
    ) -> Result<Recommendation> {
        if user_id.trim().is_empty() {
            return Err(EngineError::InvalidUser(user_id.to_string()));
        }
        let started = Instant::now();
        let deadline = self
            .config
            .time_budget_ms
            .map(|ms| started + Duration::from_millis(ms));

        let snapshot = source.snapshot_for(user_id)?;
        let user = snapshot
            .user(user_id)
            .cloned()
            .ok_or_else(|| EngineError::InvalidUser(user_id.to_string()))?;
        let context =
            context_override.unwrap_or_else(|| Context::now(self.config.utc_offset_minutes));

        let rec = self.run(&user, &snapshot, &context, exclude_ids, deadline);
        info!(
            user_id,
            path = %rec.path,
            results = rec.items.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "recommendation ready"
        );
        Ok(rec)
    }

    /// Replay entry point: rank for an explicit user, snapshot and context.
    /// No time budget applies, so repeated calls give identical output.
    pub fn recommend_with_context(
        &self,
        user: &User,
        snapshot: &Snapshot,
        context: &Context,
        exclude_ids: &[String],
    ) -> Vec<RestaurantId> {
        self.run(user, snapshot, context, exclude_ids, None).ids()
    }

    fn run(
        &self,
        user: &User,
        snapshot: &Snapshot,
        context: &Context,
        exclude_ids: &[String],
        deadline: Option<Instant>,
    ) -> Recommendation {
        let exclude: HashSet<RestaurantId> = exclude_ids
            .iter()
            .chain(&self.config.always_exclude)
            .cloned()
            .collect();
        let profile = UserProfile::build(user, snapshot, &self.config.profile);
        let activity = meal_count(snapshot, &user.id);
        let input = GeneratorInput {
            snapshot,
            user,
            profile: &profile,
            context,
            exclude: &exclude,
            config: &self.config,
        };
        let request = Request {
            input,
            activity,
            deadline,
        };

        if request.expired() {
            return self.budget_fallback(&request);
        }

        let (path, mut candidates) = if activity < self.config.active_user_threshold {
            (
                RecommendationPath::NewUser,
                CandidateGenerator::Popularity.generate(&input),
            )
        } else {
            let latent = CandidateGenerator::LatentFactor.generate(&input);
            if !latent.is_empty() {
                (RecommendationPath::LatentFactor, latent)
            } else {
                if request.expired() {
                    return self.budget_fallback(&request);
                }
                let content = CandidateGenerator::ContentSimilarity.generate(&input);
                if !content.is_empty() {
                    (RecommendationPath::ContentSimilarity, content)
                } else {
                    (
                        RecommendationPath::PopularityFallback,
                        CandidateGenerator::Popularity.generate(&input),
                    )
                }
            }
        };
        debug!(user_id = %user.id, %path, activity, candidates = candidates.len(), "generated candidates");
        candidates.truncate(self.config.max_candidates);

        if request.expired() {
            return self.budget_fallback(&request);
        }
        let eligible = self.eligible(&request, &candidates);
        debug!(eligible = eligible.len(), "after availability and exclusions");

        if request.expired() {
            return self.budget_fallback(&request);
        }
        let predicted_tag = self.predictor.predict(&user.id, snapshot, context);

        let scorer = Scorer::new(
            &self.config.scoring,
            &profile,
            context,
            user.location,
            predicted_tag.as_deref(),
        );
        let items = scorer
            .rank(eligible.iter().copied())
            .into_iter()
            .take(self.config.max_results)
            .map(|(id, score)| ranked_item(snapshot, id, score))
            .collect();
        let weights = scorer.weights();

        Recommendation {
            user_id: user.id.clone(),
            context: *context,
            path,
            activity,
            predicted_tag,
            weights,
            items,
        }
    }

    /// Known, open, non-excluded restaurants, first occurrence only.
    fn eligible<'s>(&self, request: &Request<'s>, candidates: &[RestaurantId]) -> Vec<&'s Restaurant> {
        let input = &request.input;
        let mut seen = HashSet::new();
        candidates
            .iter()
            .filter(|id| !input.exclude.contains(*id) && seen.insert(id.as_str()))
            .filter_map(|id| input.snapshot.restaurant(id))
            .filter(|r| r.hours().is_open_at(input.context.hour))
            .collect()
    }

    /// Cold-start candidates ordered by review popularity alone.
    fn budget_fallback(&self, request: &Request<'_>) -> Recommendation {
        let input = &request.input;
        warn!(user_id = %input.user.id, "time budget exceeded, using popularity order");

        let candidates = CandidateGenerator::Popularity.generate(input);
        let mut scored: Vec<(&Restaurant, f64)> = self
            .eligible(request, &candidates)
            .into_iter()
            .map(|r| (r, popularity_score(r.review_count)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let items = scored
            .into_iter()
            .take(self.config.max_results)
            .map(|(r, popularity)| RankedItem {
                restaurant_id: r.id.clone(),
                name: r.name.clone(),
                score: ScoreBreakdown {
                    distance_km: f64::NAN,
                    distance: 0.0,
                    price: 0.0,
                    tag: 0.0,
                    popularity,
                    pattern: 0.0,
                    revisited: false,
                    total: popularity,
                },
            })
            .collect();

        Recommendation {
            user_id: input.user.id.clone(),
            context: *input.context,
            path: RecommendationPath::BudgetFallback,
            activity: request.activity,
            predicted_tag: None,
            weights: Weights {
                distance: 0.0,
                price: 0.0,
                tag: 0.0,
                popularity: 1.0,
                pattern: 0.0,
            },
            items,
        }
    }
}

struct Request<'a> {
    input: GeneratorInput<'a>,
    activity: usize,
    deadline: Option<Instant>,
}

impl Request<'_> {
    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

fn ranked_item(snapshot: &Snapshot, id: RestaurantId, score: ScoreBreakdown) -> RankedItem {
    let name = snapshot
        .restaurant(&id)
        .map(|r| r.name.clone())
        .unwrap_or_default();
    RankedItem {
        restaurant_id: id,
        name,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{MealTime, Weekday};
    use crate::model::{Interaction, MealEvent, Review};

    fn catalog() -> Vec<Restaurant> {
        (0..20)
            .map(|i| {
                Restaurant::new(format!("r{i}"), format!("Restaurant {i}"))
                    .at(3.0, 101.0 + f64::from(i) * 0.01)
                    .with_tags([if i % 2 == 0 { "Malay" } else { "Chinese" }])
                    .with_price("10", "20")
                    .with_reviews(i * 10)
            })
            .collect()
    }

    fn meal(i: usize, user: &str, restaurant: &str) -> MealEvent {
        MealEvent {
            id: format!("{user}-m{i}"),
            user_id: user.into(),
            restaurant_id: restaurant.into(),
            date: "2026-02-16".into(),
            day: Weekday::Monday,
            meal_time: MealTime::Lunch,
        }
    }

    fn lunch() -> Context {
        Context::for_meal(Weekday::Monday, MealTime::Lunch)
    }

    fn base() -> Snapshot {
        Snapshot::new()
            .with_users([User::new("new").at(3.0, 101.0), User::new("regular").at(3.0, 101.0)])
            .with_restaurants(catalog())
    }

    fn regular_history(snap: Snapshot) -> Snapshot {
        snap.with_meals((0..16).map(|i| meal(i, "regular", &format!("r{}", i % 4))))
    }

    #[test]
    fn test_meal_count_takes_larger_source() {
        let eats = (0..3).map(|i| Interaction {
            id: format!("i{i}"),
            user_id: "new".into(),
            restaurant_id: "r1".into(),
            action: Action::Eat,
            timestamp: 0,
            recommendation_rank: Some(1),
        });
        let snap = base()
            .with_interactions(eats)
            .with_meals([meal(0, "new", "r1")]);
        assert_eq!(meal_count(&snap, "new"), 3);
        assert_eq!(meal_count(&snap, "nobody"), 0);
    }

    #[test]
    fn test_new_user_path() {
        let rec = Recommender::new(EngineConfig::default())
            .explain(&base(), "new", &[], Some(lunch()))
            .unwrap();
        assert_eq!(rec.path, RecommendationPath::NewUser);
        assert_eq!(rec.items.len(), 15);
    }

    #[test]
    fn test_unknown_user_is_an_error() {
        let engine = Recommender::new(EngineConfig::default());
        let err = engine.explain(&base(), "ghost", &[], Some(lunch())).unwrap_err();
        assert_eq!(err, EngineError::InvalidUser("ghost".into()));
        assert!(engine.recommend(&base(), "ghost", &[], Some(lunch())).is_empty());
        assert!(engine.recommend(&base(), "  ", &[], Some(lunch())).is_empty());
    }

    #[test]
    fn test_active_user_without_reviews_uses_content() {
        let snap = regular_history(base());
        let rec = Recommender::new(EngineConfig::default())
            .explain(&snap, "regular", &[], Some(lunch()))
            .unwrap();
        assert_eq!(rec.path, RecommendationPath::ContentSimilarity);
        for item in &rec.items {
            assert!(!["r0", "r1", "r2", "r3"].contains(&item.restaurant_id.as_str()));
        }
    }

    #[test]
    fn test_active_user_with_reviews_uses_latent() {
        let reviews = (0..4).map(|i| Review {
            id: format!("rv{i}"),
            user_id: "regular".into(),
            restaurant_id: format!("r{i}"),
            date: "2026-02-16".into(),
            rating: 4,
            price_satisfaction: Some(true),
            visit_frequency: None,
        });
        let snap = regular_history(base()).with_reviews(reviews);
        let rec = Recommender::new(EngineConfig::default())
            .explain(&snap, "regular", &[], Some(lunch()))
            .unwrap();
        assert_eq!(rec.path, RecommendationPath::LatentFactor);
        assert!(!rec.items.is_empty());
    }

    #[test]
    fn test_active_user_with_untagged_history_falls_back_to_popularity() {
        let snap = Snapshot::new()
            .with_users([User::new("regular").at(3.0, 101.0)])
            .with_restaurants((0..5).map(|i| Restaurant::new(format!("r{i}"), "Plain").at(3.0, 101.0)))
            .with_meals((0..16).map(|i| meal(i, "regular", "r0")));
        let rec = Recommender::new(EngineConfig::default())
            .explain(&snap, "regular", &[], Some(lunch()))
            .unwrap();
        assert_eq!(rec.path, RecommendationPath::PopularityFallback);
        assert_eq!(rec.items.len(), 5);
        // equal scores otherwise, so the revisit penalty pushes r0 last
        let last = rec.items.last().unwrap();
        assert_eq!(last.restaurant_id, "r0");
        assert!(last.score.revisited);
    }

    #[test]
    fn test_excludes_are_honoured() {
        let config = EngineConfig {
            always_exclude: vec!["r0".into()],
            ..EngineConfig::default()
        };
        let ids = Recommender::new(config).recommend(&base(), "new", &["r1".into()], Some(lunch()));
        assert!(!ids.contains(&"r0".to_string()));
        assert!(!ids.contains(&"r1".to_string()));
    }

    #[test]
    fn test_closed_restaurants_are_dropped() {
        let snap = Snapshot::new()
            .with_users([User::new("new").at(3.0, 101.0)])
            .with_restaurants([
                Restaurant::new("breakfast-only", "Dawn").at(3.0, 101.0).with_hours("06:00", "11:00"),
                Restaurant::new("late", "Night Owl").at(3.0, 101.0).with_hours("18:00", "03:00"),
            ]);
        let engine = Recommender::new(EngineConfig::default());
        let lunch_ids = engine.recommend(&snap, "new", &[], Some(lunch()));
        assert!(lunch_ids.is_empty());
        let midnight = Context::new(Weekday::Friday, 1.0);
        assert_eq!(engine.recommend(&snap, "new", &[], Some(midnight)), vec!["late"]);
    }

    #[test]
    fn test_zero_budget_uses_popularity_order() {
        let config = EngineConfig {
            time_budget_ms: Some(0),
            ..EngineConfig::default()
        };
        let rec = Recommender::new(config)
            .explain(&base(), "new", &[], Some(lunch()))
            .unwrap();
        assert_eq!(rec.path, RecommendationPath::BudgetFallback);
        let totals: Vec<f64> = rec.items.iter().map(|i| i.score.total).collect();
        assert!(totals.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(rec.items.first().map(|i| i.restaurant_id.as_str()), Some("r19"));
    }

    #[test]
    fn test_replay_is_deterministic() {
        let snap = regular_history(base());
        let engine = Recommender::new(EngineConfig::default());
        let user = User::new("regular").at(3.0, 101.0);
        let a = engine.recommend_with_context(&user, &snap, &lunch(), &[]);
        let b = engine.recommend_with_context(&user, &snap, &lunch(), &[]);
        assert_eq!(a, b);
        assert!(a.len() <= 15);
    }
}
