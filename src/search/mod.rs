//! Hyperparameter search
//!
//! Each model family gets a [`SearchController`]: a small state machine that
//! proposes configurations through a pluggable [`ProposalStrategy`], consumes
//! trial outcomes, and decides when to stop. Early-stopping thresholds are
//! injected via [`SearchPolicy`], never hard-coded.
//!
//! Proposal order is deterministic for a fixed seed: parameter maps are
//! `BTreeMap`-backed so sampling consumes random draws in a stable key order.

mod controller;
mod space;
mod strategy;

pub use controller::{SearchController, SearchPolicy, SearchState};
pub use space::{ParamDomain, ParamMap, ParamValue, SearchSpace, SpaceError};
pub use strategy::{
    AdaptiveStrategy, GridStrategy, Observation, ProposalStrategy, RandomStrategy, StrategyKind,
};
