//! Proposal strategies
//!
//! A strategy only generates candidate configurations; budget enforcement
//! and early stopping live in the [`SearchController`](super::SearchController).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::space::{ParamMap, SearchSpace};

/// One completed proposal as seen by a strategy
#[derive(Debug, Clone)]
pub struct Observation {
    /// The proposed configuration
    pub params: ParamMap,
    /// Signed validation score (higher is better); `None` if the trial failed
    pub score: Option<f64>,
}

/// Generates the next candidate configuration from the history so far
pub trait ProposalStrategy: Send {
    /// Next configuration to try, or `None` when the strategy is exhausted
    fn propose(&mut self, history: &[Observation]) -> Option<ParamMap>;
}

/// Strategy selection, serializable for run configs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Uniform random sampling
    Random,
    /// Exhaustive cartesian grid with `points` per continuous axis
    Grid { points: usize },
    /// Random exploration followed by perturbation of the incumbent
    Adaptive { exploration: usize },
}

impl StrategyKind {
    /// Build a strategy instance over `space`, seeded deterministically
    #[must_use]
    pub fn build(&self, space: SearchSpace, seed: u64) -> Box<dyn ProposalStrategy> {
        match self {
            StrategyKind::Random => Box::new(RandomStrategy::new(space, seed)),
            StrategyKind::Grid { points } => Box::new(GridStrategy::new(&space, *points)),
            StrategyKind::Adaptive { exploration } => {
                Box::new(AdaptiveStrategy::new(space, seed, *exploration))
            }
        }
    }
}

/// Uniform random sampling over the space
#[derive(Debug)]
pub struct RandomStrategy {
    space: SearchSpace,
    rng: StdRng,
}

impl RandomStrategy {
    /// New random strategy with a fixed seed
    #[must_use]
    pub fn new(space: SearchSpace, seed: u64) -> Self {
        Self { space, rng: StdRng::seed_from_u64(seed) }
    }
}

impl ProposalStrategy for RandomStrategy {
    fn propose(&mut self, _history: &[Observation]) -> Option<ParamMap> {
        Some(self.space.sample(&mut self.rng))
    }
}

/// Pre-materialized cartesian grid, consumed in order
#[derive(Debug)]
pub struct GridStrategy {
    configs: Vec<ParamMap>,
    cursor: usize,
}

impl GridStrategy {
    /// New grid strategy with `points` values per continuous axis
    #[must_use]
    pub fn new(space: &SearchSpace, points: usize) -> Self {
        Self { configs: space.grid(points), cursor: 0 }
    }

    /// Total grid size
    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Whether the grid is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

impl ProposalStrategy for GridStrategy {
    fn propose(&mut self, _history: &[Observation]) -> Option<ParamMap> {
        let config = self.configs.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(config)
    }
}

/// Exploration, then local perturbation of the best configuration so far
///
/// The first `exploration` proposals are uniform random. Afterwards each
/// proposal starts from the incumbent and resamples every parameter
/// independently with probability 1/2, which keeps the search local while
/// still escaping plateaus.
#[derive(Debug)]
pub struct AdaptiveStrategy {
    space: SearchSpace,
    rng: StdRng,
    exploration: usize,
    proposed: usize,
}

impl AdaptiveStrategy {
    /// New adaptive strategy; `exploration` is clamped to at least 1
    #[must_use]
    pub fn new(space: SearchSpace, seed: u64, exploration: usize) -> Self {
        Self { space, rng: StdRng::seed_from_u64(seed), exploration: exploration.max(1), proposed: 0 }
    }

    fn incumbent(history: &[Observation]) -> Option<&ParamMap> {
        history
            .iter()
            .filter_map(|obs| obs.score.map(|s| (s, &obs.params)))
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, params)| params)
    }
}

impl ProposalStrategy for AdaptiveStrategy {
    fn propose(&mut self, history: &[Observation]) -> Option<ParamMap> {
        self.proposed += 1;
        if self.proposed <= self.exploration {
            return Some(self.space.sample(&mut self.rng));
        }
        let Some(best) = Self::incumbent(history) else {
            // Nothing succeeded yet; keep exploring
            return Some(self.space.sample(&mut self.rng));
        };

        let mut config = ParamMap::new();
        for (name, domain) in self.space.iter() {
            let keep = self.rng.random::<f64>() < 0.5;
            let value = match best.get(name) {
                Some(v) if keep && domain.contains(v) => v.clone(),
                _ => domain.sample(&mut self.rng),
            };
            config.insert(name.clone(), value);
        }
        Some(config)
    }
}
