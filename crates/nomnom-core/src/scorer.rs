//! Multi-factor relevance scoring.
//!
//! `total = w_d·distance + w_p·price + tag + w_pop·popularity + pattern`
//!
//! where `tag` is `+w_tag` for a favourite tag and `-dislike_penalty` for a
//! disliked one, and `pattern` is `+w_pattern` when the habit predictor's tag
//! matches. Already-eaten restaurants with a positive total are scaled by the
//! revisit factor.

use std::cmp::Ordering;

use serde::Serialize;

use crate::config::ScoringConfig;
use crate::constants::{EPSILON, POPULARITY_LOG_SCALE};
use crate::context::Context;
use crate::geo::{GeoPoint, haversine_km};
use crate::model::{Restaurant, RestaurantId};
use crate::profile::UserProfile;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Weights {
    pub distance: f64,
    pub price: f64,
    pub tag: f64,
    pub popularity: f64,
    pub pattern: f64,
}

/// Base weights adjusted for long-distance and price-sensitive users.
pub fn effective_weights(cfg: &ScoringConfig, profile: &UserProfile) -> Weights {
    let mut w = Weights {
        distance: cfg.distance_weight,
        price: cfg.price_weight,
        tag: cfg.tag_weight,
        popularity: cfg.popularity_weight,
        pattern: cfg.pattern_weight,
    };
    if profile.weekday_travel_km > cfg.long_distance_km {
        w.distance *= cfg.long_distance_factor;
    }
    if profile.avg_price < cfg.price_sensitive_below {
        w.price *= cfg.price_sensitive_factor;
    }
    w
}

/// `max(0, 1 - d / (expected · tolerance))`; unknown distance scores 0.
pub fn distance_score(distance_km: f64, expected_km: f64, tolerance: f64) -> f64 {
    let reach = expected_km * tolerance;
    if !distance_km.is_finite() || !reach.is_finite() || reach <= EPSILON {
        return 0.0;
    }
    (1.0 - distance_km / reach).max(0.0)
}

/// `max(0, 1 - |p - avg| / avg)`; unknown price scores 0.
pub fn price_score(price: Option<f64>, avg_price: f64) -> f64 {
    match price {
        Some(p) if avg_price > EPSILON => (1.0 - (p - avg_price).abs() / avg_price).max(0.0),
        _ => 0.0,
    }
}

/// `min(1, ln(reviews + 1) / 7)`
pub fn popularity_score(review_count: u32) -> f64 {
    ((f64::from(review_count) + 1.0).ln() / POPULARITY_LOG_SCALE).min(1.0)
}

/// Weighted contributions of each factor to one restaurant's score.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub distance_km: f64,
    pub distance: f64,
    pub price: f64,
    pub tag: f64,
    pub popularity: f64,
    pub pattern: f64,
    pub revisited: bool,
    pub total: f64,
}

pub struct Scorer<'a> {
    cfg: &'a ScoringConfig,
    weights: Weights,
    profile: &'a UserProfile,
    context: &'a Context,
    origin: Option<GeoPoint>,
    predicted_tag: Option<&'a str>,
}

impl<'a> Scorer<'a> {
    pub fn new(
        cfg: &'a ScoringConfig,
        profile: &'a UserProfile,
        context: &'a Context,
        origin: Option<GeoPoint>,
        predicted_tag: Option<&'a str>,
    ) -> Self {
        Self {
            cfg,
            weights: effective_weights(cfg, profile),
            profile,
            context,
            origin,
            predicted_tag,
        }
    }

    pub fn weights(&self) -> Weights {
        self.weights
    }

    pub fn score(&self, r: &Restaurant) -> ScoreBreakdown {
        let w = &self.weights;
        let distance_km = haversine_km(self.origin, r.location);
        let expected = self.profile.expected_travel_km(self.context.day);
        let distance = w.distance * distance_score(distance_km, expected, self.cfg.distance_tolerance);
        let price = w.price * price_score(r.mid_price(), self.profile.avg_price);
        let popularity = w.popularity * popularity_score(r.review_count);

        let mut tag = 0.0;
        if r.has_tag_where(|t| self.profile.likes(t)) {
            tag += w.tag;
        }
        if r.has_tag_where(|t| self.profile.dislikes(t)) {
            tag -= self.cfg.dislike_penalty;
        }

        let pattern = match self.predicted_tag {
            Some(p) if r.has_tag_where(|t| t == p) => w.pattern,
            _ => 0.0,
        };

        let mut total = distance + price + tag + popularity + pattern;
        let revisited = self.cfg.revisit_penalty && self.profile.eaten.contains(&r.id);
        if revisited && total > 0.0 {
            total *= self.cfg.revisit_factor;
        }

        ScoreBreakdown {
            distance_km,
            distance,
            price,
            tag,
            popularity,
            pattern,
            revisited,
            total,
        }
    }

    /// Score and sort descending. Equal totals keep input order.
    pub fn rank<'r>(
        &self,
        candidates: impl IntoIterator<Item = &'r Restaurant>,
    ) -> Vec<(RestaurantId, ScoreBreakdown)> {
        let mut scored: Vec<(RestaurantId, ScoreBreakdown)> = candidates
            .into_iter()
            .map(|r| (r.id.clone(), self.score(r)))
            .collect();
        scored.sort_by(|a, b| b.1.total.partial_cmp(&a.1.total).unwrap_or(Ordering::Equal));
        scored
    }
}
