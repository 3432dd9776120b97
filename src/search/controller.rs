//! Per-family search controller state machine
//!
//! `Pending → Sampling → Evaluating (repeat) → {Converged, BudgetExhausted}`.
//! Terminal states stop proposing; trials already dispatched are allowed to
//! finish and their outcomes are still recorded.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::space::{ParamMap, SearchSpace};
use super::strategy::{Observation, ProposalStrategy, StrategyKind};

/// Search controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    /// Created, nothing proposed yet
    Pending,
    /// Ready to propose the next configuration
    Sampling,
    /// Waiting for a dispatched trial's outcome
    Evaluating,
    /// Early-stopped: recent proposals stopped improving the best score
    Converged,
    /// Resource denial or time allotment elapsed
    BudgetExhausted,
}

/// Early-stopping and budget knobs, injected per run
///
/// Defaults are starting points for small runs; callers tune them per
/// deployment rather than relying on constants baked into the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPolicy {
    /// Consecutive non-improving proposals tolerated before converging
    pub patience: usize,
    /// Minimum score improvement that resets the patience counter
    pub tolerance: f64,
    /// Hard cap on proposals per family per level
    pub max_proposals: usize,
    /// Optional per-family wall-clock allotment
    pub family_time_limit: Option<Duration>,
    /// Proposal strategy
    pub strategy: StrategyKind,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            patience: 5,
            tolerance: 1e-6,
            max_proposals: 50,
            family_time_limit: None,
            strategy: StrategyKind::Random,
        }
    }
}

/// Drives hyperparameter search for one model family at one stack level
pub struct SearchController {
    family: String,
    strategy: Box<dyn ProposalStrategy>,
    policy: SearchPolicy,
    state: SearchState,
    history: Vec<Observation>,
    best_score: Option<f64>,
    stalled: usize,
    proposed: usize,
    started: Option<Instant>,
}

impl SearchController {
    /// New controller over `space`, seeded deterministically
    #[must_use]
    pub fn new(family: &str, space: SearchSpace, policy: SearchPolicy, seed: u64) -> Self {
        let strategy = policy.strategy.build(space, seed);
        Self {
            family: family.to_string(),
            strategy,
            policy,
            state: SearchState::Pending,
            history: Vec::new(),
            best_score: None,
            stalled: 0,
            proposed: 0,
            started: None,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SearchState {
        self.state
    }

    /// Whether the controller has stopped proposing
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, SearchState::Converged | SearchState::BudgetExhausted)
    }

    /// Best signed score observed so far
    #[must_use]
    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    /// Number of proposals issued
    #[must_use]
    pub fn proposals_issued(&self) -> usize {
        self.proposed
    }

    /// Propose the next configuration, or `None` once terminal
    ///
    /// The first call starts the per-family clock. Exceeding the proposal cap
    /// or the time allotment transitions to `BudgetExhausted`; an exhausted
    /// strategy (finite grid) transitions to `Converged`.
    pub fn next_proposal(&mut self) -> Option<ParamMap> {
        if self.is_terminal() {
            return None;
        }
        let started = *self.started.get_or_insert_with(Instant::now);

        if self.proposed >= self.policy.max_proposals {
            debug!(family = %self.family, proposals = self.proposed, "proposal cap reached");
            self.state = SearchState::BudgetExhausted;
            return None;
        }
        if let Some(allotment) = self.policy.family_time_limit {
            if started.elapsed() >= allotment {
                debug!(family = %self.family, "family time allotment elapsed");
                self.state = SearchState::BudgetExhausted;
                return None;
            }
        }

        self.state = SearchState::Sampling;
        match self.strategy.propose(&self.history) {
            Some(config) => {
                self.proposed += 1;
                self.state = SearchState::Evaluating;
                Some(config)
            }
            None => {
                // Finite strategy ran out of configurations
                self.state = SearchState::Converged;
                None
            }
        }
    }

    /// Record a successful trial outcome for the last proposal
    pub fn record_success(&mut self, params: ParamMap, score: f64) {
        self.history.push(Observation { params, score: Some(score) });
        let improved = match self.best_score {
            Some(best) => score > best + self.policy.tolerance,
            None => true,
        };
        if improved {
            self.best_score = Some(score);
            self.stalled = 0;
        } else {
            self.stalled += 1;
        }
        self.after_outcome();
    }

    /// Record a failed or timed-out trial for the last proposal
    ///
    /// Failures count against patience: a family that keeps failing
    /// converges instead of looping forever.
    pub fn record_failure(&mut self, params: ParamMap) {
        self.history.push(Observation { params, score: None });
        self.stalled += 1;
        self.after_outcome();
    }

    /// The resource manager denied the next reservation: stop scheduling
    pub fn note_resource_denied(&mut self) {
        debug!(family = %self.family, "resource reservation denied");
        self.state = SearchState::BudgetExhausted;
    }

    fn after_outcome(&mut self) {
        if self.is_terminal() {
            return;
        }
        if self.stalled >= self.policy.patience {
            debug!(
                family = %self.family,
                stalled = self.stalled,
                best = ?self.best_score,
                "converged: no improvement within tolerance"
            );
            self.state = SearchState::Converged;
        } else {
            self.state = SearchState::Sampling;
        }
    }
}

impl std::fmt::Debug for SearchController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchController")
            .field("family", &self.family)
            .field("state", &self.state)
            .field("best_score", &self.best_score)
            .field("proposed", &self.proposed)
            .finish_non_exhaustive()
    }
}
