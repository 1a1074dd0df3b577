//! Tag-based content similarity.
//!
//! Each restaurant is a bag of words drawn from its tags. Vectors use
//! smoothed TF-IDF, `idf(t) = ln((1 + n) / (1 + df(t))) + 1`, and are
//! L2-normalised so cosine similarity reduces to a dot product between
//! catalog vectors.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;

use crate::constants::EPSILON;
use crate::model::{Restaurant, RestaurantId};

use super::GeneratorInput;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

pub type SparseVector = BTreeMap<String, f64>;

pub struct TfIdfIndex {
    ids: Vec<RestaurantId>,
    vectors: Vec<SparseVector>,
    positions: HashMap<RestaurantId, usize>,
}

impl TfIdfIndex {
    pub fn build(restaurants: &[Restaurant]) -> Self {
        let docs: Vec<Vec<String>> = restaurants.iter().map(tokens).collect();
        let n = docs.len() as f64;

        let mut df: HashMap<&str, usize> = HashMap::new();
        for doc in &docs {
            let mut unique: Vec<&str> = doc.iter().map(String::as_str).collect();
            unique.sort_unstable();
            unique.dedup();
            for term in unique {
                *df.entry(term).or_default() += 1;
            }
        }

        let vectors = docs
            .iter()
            .map(|doc| {
                let mut v = SparseVector::new();
                for term in doc {
                    *v.entry(term.clone()).or_default() += 1.0;
                }
                for (term, weight) in v.iter_mut() {
                    let d = df.get(term.as_str()).copied().unwrap_or(0) as f64;
                    *weight *= ((1.0 + n) / (1.0 + d)).ln() + 1.0;
                }
                normalize(&mut v);
                v
            })
            .collect();

        let ids: Vec<RestaurantId> = restaurants.iter().map(|r| r.id.clone()).collect();
        let positions = ids.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();
        Self {
            ids,
            vectors,
            positions,
        }
    }

    pub fn vector(&self, id: &str) -> Option<&SparseVector> {
        self.positions.get(id).map(|&i| &self.vectors[i])
    }

    /// Mean of the known vectors among `ids`; `None` if none are known.
    pub fn centroid<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Option<SparseVector> {
        let mut sum = SparseVector::new();
        let mut count = 0usize;
        for v in ids.into_iter().filter_map(|id| self.vector(id)) {
            count += 1;
            for (term, w) in v {
                *sum.entry(term.clone()).or_default() += w;
            }
        }
        if count == 0 {
            return None;
        }
        for w in sum.values_mut() {
            *w /= count as f64;
        }
        Some(sum)
    }

    /// Catalog entries with positive similarity to `query`, most similar
    /// first; equal scores keep catalog order.
    pub fn rank(&self, query: &SparseVector, skip: impl Fn(&str) -> bool) -> Vec<(RestaurantId, f64)> {
        let mut scored: Vec<(usize, f64)> = self
            .vectors
            .iter()
            .enumerate()
            .filter(|(i, _)| !skip(self.ids[*i].as_str()))
            .map(|(i, v)| (i, cosine(query, v)))
            .filter(|(_, s)| *s > EPSILON)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
            .into_iter()
            .map(|(i, s)| (self.ids[i].clone(), s))
            .collect()
    }
}

pub fn cosine(a: &SparseVector, b: &SparseVector) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(t, w)| large.get(t).map(|x| w * x))
        .sum();
    let na = norm(a);
    let nb = norm(b);
    if na < EPSILON || nb < EPSILON {
        0.0
    } else {
        dot / (na * nb)
    }
}

fn norm(v: &SparseVector) -> f64 {
    v.values().map(|w| w * w).sum::<f64>().sqrt()
}

fn normalize(v: &mut SparseVector) {
    let n = norm(v);
    if n > EPSILON {
        for w in v.values_mut() {
            *w /= n;
        }
    }
}

fn tokens(r: &Restaurant) -> Vec<String> {
    r.tag_keys()
        .flat_map(|tag| {
            WORD.find_iter(&tag)
                .map(|m| m.as_str().to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}

pub(crate) fn generate(input: &GeneratorInput<'_>) -> Vec<RestaurantId> {
    if input.profile.eaten.is_empty() {
        return Vec::new();
    }
    let index = TfIdfIndex::build(input.snapshot.restaurants());

    let mut eaten: Vec<&str> = input.profile.eaten.iter().map(String::as_str).collect();
    eaten.sort_unstable();
    let Some(centroid) = index.centroid(eaten) else {
        return Vec::new();
    };

    index
        .rank(&centroid, |id| {
            input.profile.eaten.contains(id) || input.exclude.contains(id)
        })
        .into_iter()
        .map(|(id, _)| id)
        .collect()
}
