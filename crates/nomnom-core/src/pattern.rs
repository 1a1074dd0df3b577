//! Habit prediction: which tag does this user eat on a given day and meal time?
//!
//! A small CART tree over two categorical features (weekday, meal-time
//! bucket) with gini impurity and equality splits. Users with too little
//! history get no prediction.

use std::collections::{BTreeMap, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::debug;

use crate::config::PatternConfig;
use crate::context::{Context, MealTime, Weekday};
use crate::snapshot::Snapshot;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct PatternSample {
    pub day: Weekday,
    pub meal_time: MealTime,
    pub tag: String,
}

/// One sample per meal at a known restaurant with at least one tag.
pub fn samples_for(user_id: &str, snapshot: &Snapshot) -> Vec<PatternSample> {
    snapshot
        .meals_for(user_id)
        .filter_map(|meal| {
            let tag = snapshot.restaurant(&meal.restaurant_id)?.primary_tag()?;
            Some(PatternSample {
                day: meal.day,
                meal_time: meal.meal_time,
                tag,
            })
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Feature {
    Day,
    MealTime,
}

impl Feature {
    fn value(self, day: Weekday, meal_time: MealTime) -> usize {
        match self {
            Feature::Day => day.index(),
            Feature::MealTime => meal_time.index(),
        }
    }

    fn cardinality(self) -> usize {
        match self {
            Feature::Day => Weekday::ALL.len(),
            Feature::MealTime => MealTime::ALL.len(),
        }
    }
}

#[derive(Clone, Debug)]
enum Node {
    Leaf(String),
    Split {
        feature: Feature,
        value: usize,
        equal: Box<Node>,
        other: Box<Node>,
    },
}

#[derive(Clone, Debug)]
pub struct DecisionTree {
    root: Node,
}

impl DecisionTree {
    /// Fit on `samples`. `None` when there are none.
    pub fn fit(samples: &[PatternSample], max_depth: usize, min_leaf: usize) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let refs: Vec<&PatternSample> = samples.iter().collect();
        Some(Self {
            root: grow(&refs, 0, max_depth, min_leaf.max(1)),
        })
    }

    pub fn predict(&self, day: Weekday, meal_time: MealTime) -> &str {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf(tag) => return tag,
                Node::Split {
                    feature,
                    value,
                    equal,
                    other,
                } => {
                    node = if feature.value(day, meal_time) == *value {
                        equal.as_ref()
                    } else {
                        other.as_ref()
                    };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn depth(node: &Node) -> usize {
            match node {
                Node::Leaf(_) => 0,
                Node::Split { equal, other, .. } => 1 + depth(equal).max(depth(other)),
            }
        }
        depth(&self.root)
    }
}

fn grow(samples: &[&PatternSample], depth: usize, max_depth: usize, min_leaf: usize) -> Node {
    let parent = gini(samples);
    if depth >= max_depth || parent == 0.0 || samples.len() < 2 * min_leaf {
        return Node::Leaf(majority(samples));
    }

    let mut best: Option<(f64, Feature, usize)> = None;
    for feature in [Feature::Day, Feature::MealTime] {
        for value in 0..feature.cardinality() {
            let (eq, ne): (Vec<&PatternSample>, Vec<&PatternSample>) = samples
                .iter()
                .copied()
                .partition(|s| feature.value(s.day, s.meal_time) == value);
            if eq.len() < min_leaf || ne.len() < min_leaf {
                continue;
            }
            let n = samples.len() as f64;
            let impurity = (eq.len() as f64 * gini(&eq) + ne.len() as f64 * gini(&ne)) / n;
            if best.is_none_or(|(b, _, _)| impurity < b) {
                best = Some((impurity, feature, value));
            }
        }
    }

    match best {
        Some((impurity, feature, value)) if impurity < parent - 1e-12 => {
            let (eq, ne): (Vec<&PatternSample>, Vec<&PatternSample>) = samples
                .iter()
                .copied()
                .partition(|s| feature.value(s.day, s.meal_time) == value);
            Node::Split {
                feature,
                value,
                equal: Box::new(grow(&eq, depth + 1, max_depth, min_leaf)),
                other: Box::new(grow(&ne, depth + 1, max_depth, min_leaf)),
            }
        }
        _ => Node::Leaf(majority(samples)),
    }
}

fn tag_counts<'a>(samples: &[&'a PatternSample]) -> BTreeMap<&'a str, usize> {
    let mut counts = BTreeMap::new();
    for s in samples {
        *counts.entry(s.tag.as_str()).or_default() += 1;
    }
    counts
}

fn gini(samples: &[&PatternSample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let n = samples.len() as f64;
    1.0 - tag_counts(samples)
        .values()
        .map(|&c| (c as f64 / n).powi(2))
        .sum::<f64>()
}

/// Most common tag; alphabetical order breaks ties.
fn majority(samples: &[&PatternSample]) -> String {
    let mut best: Option<(&str, usize)> = None;
    for (tag, count) in tag_counts(samples) {
        if best.is_none_or(|(_, b)| count > b) {
            best = Some((tag, count));
        }
    }
    best.map(|(t, _)| t.to_string()).unwrap_or_default()
}

/// Fit a tree for one user if their history is large enough.
pub fn fit_for_user(user_id: &str, snapshot: &Snapshot, config: &PatternConfig) -> Option<DecisionTree> {
    fit_samples(user_id, &samples_for(user_id, snapshot), config)
}

fn fit_samples(user_id: &str, samples: &[PatternSample], config: &PatternConfig) -> Option<DecisionTree> {
    if samples.len() < config.min_samples {
        debug!(user_id, samples = samples.len(), "too few samples for pattern tree");
        return None;
    }
    let tree = DecisionTree::fit(samples, config.max_depth, config.min_leaf)?;
    debug!(user_id, samples = samples.len(), depth = tree.depth(), "fitted pattern tree");
    Some(tree)
}

/// Order-sensitive hash of a user's training samples.
fn fingerprint(samples: &[PatternSample]) -> u64 {
    let mut hasher = DefaultHasher::new();
    samples.hash(&mut hasher);
    hasher.finish()
}

/// Predicts the tag a user is likely to want in a context.
pub trait PatternPredictor: Send + Sync {
    fn predict(&self, user_id: &str, snapshot: &Snapshot, context: &Context) -> Option<String>;
}

/// Fits a fresh tree on every call.
#[derive(Clone, Debug, Default)]
pub struct RetrainEveryRequest {
    config: PatternConfig,
}

impl RetrainEveryRequest {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }
}

impl PatternPredictor for RetrainEveryRequest {
    fn predict(&self, user_id: &str, snapshot: &Snapshot, context: &Context) -> Option<String> {
        fit_for_user(user_id, snapshot, &self.config)
            .map(|tree| tree.predict(context.day, context.meal_time).to_string())
    }
}

/// Generation and sample fingerprint the tree was fitted on.
type CacheEntry = (u64, u64, Option<Arc<DecisionTree>>);

/// Keeps one tree per user until the snapshot generation or the user's
/// meal history changes.
#[derive(Debug, Default)]
pub struct GenerationCachedPredictor {
    config: PatternConfig,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl GenerationCachedPredictor {
    pub fn new(config: PatternConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub(crate) fn cached_users(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        // entries are replaced whole, so a poisoned map is still consistent
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PatternPredictor for GenerationCachedPredictor {
    fn predict(&self, user_id: &str, snapshot: &Snapshot, context: &Context) -> Option<String> {
        let generation = snapshot.generation();
        let samples = samples_for(user_id, snapshot);
        let print = fingerprint(&samples);
        let cached = self
            .lock()
            .get(user_id)
            .filter(|(g, f, _)| *g == generation && *f == print)
            .map(|(_, _, tree)| tree.clone());

        let tree = match cached {
            Some(tree) => tree,
            None => {
                let tree = fit_samples(user_id, &samples, &self.config).map(Arc::new);
                self.lock()
                    .insert(user_id.to_string(), (generation, print, tree.clone()));
                tree
            }
        };
        tree.map(|t| t.predict(context.day, context.meal_time).to_string())
    }
}
