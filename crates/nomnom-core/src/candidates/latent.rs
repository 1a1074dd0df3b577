//! Biased matrix factorisation over implicit ratings, trained with SGD.
//!
//! `r̂(u, i) = μ + b_u + b_i + p_u · q_i`
//!
//! Training is deterministic: the RNG is seeded from configuration and both
//! user and item indexes follow first appearance in the review log.

use std::collections::{HashMap, HashSet};

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::LatentConfig;
use crate::constants::{IMPLICIT_RATING_MAX, IMPLICIT_RATING_MIN};
use crate::model::{RestaurantId, Review};

use super::GeneratorInput;

/// Standard deviation of the initial factor values.
const INIT_STD: f64 = 0.1;

/// Star rating adjusted by price satisfaction and visit frequency, clamped to
/// `[1, 7]`.
pub fn implicit_rating(review: &Review) -> f64 {
    let mut rating = f64::from(review.rating);
    match review.price_satisfaction {
        Some(true) => rating += 1.0,
        Some(false) => rating -= 0.5,
        None => {}
    }
    if review.visit_frequency.is_some_and(|v| v > 2) {
        rating += 1.0;
    }
    rating.clamp(IMPLICIT_RATING_MIN, IMPLICIT_RATING_MAX)
}

pub struct FactorModel {
    global_mean: f64,
    users: HashMap<String, usize>,
    items: HashMap<String, usize>,
    user_bias: Vec<f64>,
    item_bias: Vec<f64>,
    user_factors: Vec<Vec<f64>>,
    item_factors: Vec<Vec<f64>>,
}

impl FactorModel {
    /// Fit on every review. Returns `None` when there is nothing to learn from.
    pub fn fit(reviews: &[Review], cfg: &LatentConfig) -> Option<Self> {
        if reviews.is_empty() {
            return None;
        }
        let mut rng = SmallRng::seed_from_u64(cfg.seed);

        let mut users = HashMap::new();
        let mut items = HashMap::new();
        let mut triples = Vec::with_capacity(reviews.len());
        for review in reviews {
            let next_u = users.len();
            let u = *users.entry(review.user_id.clone()).or_insert(next_u);
            let next_i = items.len();
            let i = *items.entry(review.restaurant_id.clone()).or_insert(next_i);
            triples.push((u, i, implicit_rating(review)));
        }

        let global_mean = triples.iter().map(|t| t.2).sum::<f64>() / triples.len() as f64;
        let k = cfg.factors;
        let mut init = |n: usize| -> Vec<Vec<f64>> {
            (0..n)
                .map(|_| (0..k).map(|_| gauss_random(&mut rng) * INIT_STD).collect())
                .collect()
        };
        let user_factors = init(users.len());
        let item_factors = init(items.len());

        let mut model = Self {
            global_mean,
            user_bias: vec![0.0; users.len()],
            item_bias: vec![0.0; items.len()],
            users,
            items,
            user_factors,
            item_factors,
        };

        let (lr, reg) = (cfg.learning_rate, cfg.regularization);
        let mut order: Vec<usize> = (0..triples.len()).collect();
        for _ in 0..cfg.epochs {
            order.shuffle(&mut rng);
            for &idx in &order {
                let (u, i, r) = triples[idx];
                let err = r - model.estimate(u, i);

                let bu = model.user_bias[u];
                let bi = model.item_bias[i];
                model.user_bias[u] += lr * (err - reg * bu);
                model.item_bias[i] += lr * (err - reg * bi);

                for f in 0..k {
                    let puf = model.user_factors[u][f];
                    let qif = model.item_factors[i][f];
                    model.user_factors[u][f] += lr * (err * qif - reg * puf);
                    model.item_factors[i][f] += lr * (err * puf - reg * qif);
                }
            }
        }

        debug!(
            users = model.users.len(),
            items = model.items.len(),
            ratings = triples.len(),
            "fitted factor model"
        );
        Some(model)
    }

    /// Predicted rating. Unknown users or items contribute only the terms
    /// that are known.
    pub fn predict(&self, user: &str, item: &str) -> f64 {
        match (self.users.get(user), self.items.get(item)) {
            (Some(&u), Some(&i)) => self.estimate(u, i),
            (Some(&u), None) => self.global_mean + self.user_bias[u],
            (None, Some(&i)) => self.global_mean + self.item_bias[i],
            (None, None) => self.global_mean,
        }
    }

    pub fn knows_user(&self, user: &str) -> bool {
        self.users.contains_key(user)
    }

    #[cfg(test)]
    pub(crate) fn global_mean(&self) -> f64 {
        self.global_mean
    }

    fn estimate(&self, u: usize, i: usize) -> f64 {
        let dot: f64 = self.user_factors[u]
            .iter()
            .zip(&self.item_factors[i])
            .map(|(a, b)| a * b)
            .sum();
        self.global_mean + self.user_bias[u] + self.item_bias[i] + dot
    }
}

pub(crate) fn generate(input: &GeneratorInput<'_>) -> Vec<RestaurantId> {
    let user_id = input.user.id.as_str();
    let reviewed: HashSet<&str> = input
        .snapshot
        .reviews_for(user_id)
        .map(|r| r.restaurant_id.as_str())
        .collect();
    if reviewed.is_empty() {
        return Vec::new();
    }
    let Some(model) = FactorModel::fit(input.snapshot.reviews(), &input.config.latent) else {
        return Vec::new();
    };
    if !model.knows_user(user_id) {
        return Vec::new();
    }

    let mut scored: Vec<(f64, &str)> = input
        .snapshot
        .restaurants()
        .iter()
        .map(|r| r.id.as_str())
        .filter(|id| {
            !reviewed.contains(id) && !input.profile.eaten.contains(*id) && !input.exclude.contains(*id)
        })
        .map(|id| (model.predict(user_id, id), id))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(input.config.latent.top_n)
        .map(|(_, id)| id.to_string())
        .collect()
}

/// Box-Muller transform for Gaussian-distributed initial factors.
fn gauss_random(rng: &mut impl Rng) -> f64 {
    // Clamp u1 away from 0 to avoid ln(0) = -inf
    let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}
