//! Candidate generation strategies.
//!
//! Each generator proposes an ordered list of restaurant ids; the scorer
//! decides the final ranking.

pub mod content;
pub mod latent;
pub mod popularity;

use std::collections::HashSet;
use std::fmt;

use crate::config::EngineConfig;
use crate::context::Context;
use crate::model::{RestaurantId, User};
use crate::profile::UserProfile;
use crate::snapshot::Snapshot;

pub use content::TfIdfIndex;
pub use latent::{FactorModel, implicit_rating};

/// Everything a generator may look at for one request.
#[derive(Clone, Copy)]
pub struct GeneratorInput<'a> {
    pub snapshot: &'a Snapshot,
    pub user: &'a User,
    pub profile: &'a UserProfile,
    pub context: &'a Context,
    /// Request and permanent exclusions combined.
    pub exclude: &'a HashSet<RestaurantId>,
    pub config: &'a EngineConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CandidateGenerator {
    /// Most eaten in the current meal-time bucket plus nearest to the user.
    Popularity,
    /// Matrix factorisation over implicit ratings.
    LatentFactor,
    /// TF-IDF tag similarity to the user's eaten restaurants.
    ContentSimilarity,
}

impl CandidateGenerator {
    pub fn generate(self, input: &GeneratorInput<'_>) -> Vec<RestaurantId> {
        match self {
            CandidateGenerator::Popularity => popularity::generate(input),
            CandidateGenerator::LatentFactor => latent::generate(input),
            CandidateGenerator::ContentSimilarity => content::generate(input),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CandidateGenerator::Popularity => "popularity",
            CandidateGenerator::LatentFactor => "latent-factor",
            CandidateGenerator::ContentSimilarity => "content-similarity",
        }
    }
}

impl fmt::Display for CandidateGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
