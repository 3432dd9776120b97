//! Hyperparameter values, domains, and search spaces

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A concrete hyperparameter configuration
///
/// `BTreeMap` keeps key iteration order stable, which makes seeded sampling
/// and serialized configs reproducible.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// Search space errors
#[derive(Debug, Error)]
pub enum SpaceError {
    #[error("parameter not found: {0}")]
    ParameterNotFound(String),

    #[error("value {value} outside domain of parameter {name}")]
    OutOfDomain { name: String, value: String },
}

/// A sampled hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Str(String),
}

impl ParamValue {
    /// As float, converting ints
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Str(_) => None,
        }
    }

    /// As int, truncating floats
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) => Some(*v as i64),
            ParamValue::Str(_) => None,
        }
    }

    /// As string
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// The domain one hyperparameter is searched over
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ParamDomain {
    /// Continuous range `[low, high]`, optionally sampled on a log scale
    Uniform { low: f64, high: f64, log_scale: bool },
    /// Inclusive integer range
    IntRange { low: i64, high: i64 },
    /// Categorical choices
    Choice { options: Vec<String> },
}

impl ParamDomain {
    /// Sample a value uniformly from the domain
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamValue {
        match self {
            ParamDomain::Uniform { low, high, log_scale } => {
                let value = if *log_scale {
                    let log_low = low.max(f64::MIN_POSITIVE).ln();
                    let log_high = high.max(f64::MIN_POSITIVE).ln();
                    (log_low + rng.random::<f64>() * (log_high - log_low)).exp()
                } else {
                    low + rng.random::<f64>() * (high - low)
                };
                ParamValue::Float(value)
            }
            ParamDomain::IntRange { low, high } => {
                let span = (*high - *low + 1) as f64;
                let offset = (rng.random::<f64>() * span).floor() as i64;
                ParamValue::Int((*low + offset).min(*high))
            }
            ParamDomain::Choice { options } => {
                let idx = (rng.random::<f64>() * options.len() as f64).floor() as usize;
                ParamValue::Str(options[idx.min(options.len() - 1)].clone())
            }
        }
    }

    /// Whether a value lies inside the domain
    #[must_use]
    pub fn contains(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (ParamDomain::Uniform { low, high, .. }, ParamValue::Float(v)) => {
                *v >= *low && *v <= *high
            }
            (ParamDomain::IntRange { low, high }, ParamValue::Int(v)) => *v >= *low && *v <= *high,
            (ParamDomain::Choice { options }, ParamValue::Str(s)) => options.contains(s),
            _ => false,
        }
    }

    /// Evenly spaced grid values over the domain
    ///
    /// Continuous domains get `n_points` values (log-spaced when the domain
    /// is log-scaled); integer and categorical domains enumerate exhaustively.
    #[must_use]
    pub fn grid_values(&self, n_points: usize) -> Vec<ParamValue> {
        match self {
            ParamDomain::Uniform { low, high, log_scale } => {
                let n = n_points.max(2);
                let divisor = (n - 1) as f64;
                (0..n)
                    .map(|i| {
                        let t = i as f64 / divisor;
                        let v = if *log_scale {
                            let log_low = low.max(f64::MIN_POSITIVE).ln();
                            let log_high = high.max(f64::MIN_POSITIVE).ln();
                            (log_low + t * (log_high - log_low)).exp()
                        } else {
                            low + t * (high - low)
                        };
                        ParamValue::Float(v)
                    })
                    .collect()
            }
            ParamDomain::IntRange { low, high } => (*low..=*high).map(ParamValue::Int).collect(),
            ParamDomain::Choice { options } => {
                options.iter().cloned().map(ParamValue::Str).collect()
            }
        }
    }
}

/// Named collection of parameter domains
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    params: BTreeMap<String, ParamDomain>,
}

impl SearchSpace {
    /// Empty search space
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, builder style
    #[must_use]
    pub fn with(mut self, name: &str, domain: ParamDomain) -> Self {
        self.params.insert(name.to_string(), domain);
        self
    }

    /// Add a parameter
    pub fn add(&mut self, name: &str, domain: ParamDomain) {
        self.params.insert(name.to_string(), domain);
    }

    /// Look up a parameter domain
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamDomain> {
        self.params.get(name)
    }

    /// Number of parameters
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the space has no parameters
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterate parameters in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamDomain)> {
        self.params.iter()
    }

    /// Sample one configuration; draws are consumed in key order
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamMap {
        self.params.iter().map(|(name, domain)| (name.clone(), domain.sample(rng))).collect()
    }

    /// Check a configuration covers every parameter with in-domain values
    pub fn validate(&self, config: &ParamMap) -> Result<(), SpaceError> {
        for (name, domain) in &self.params {
            match config.get(name) {
                Some(value) if domain.contains(value) => {}
                Some(value) => {
                    return Err(SpaceError::OutOfDomain {
                        name: name.clone(),
                        value: format!("{value:?}"),
                    })
                }
                None => return Err(SpaceError::ParameterNotFound(name.clone())),
            }
        }
        Ok(())
    }

    /// Cartesian-product grid over all parameters
    #[must_use]
    pub fn grid(&self, points_per_axis: usize) -> Vec<ParamMap> {
        let axes: Vec<(&String, Vec<ParamValue>)> = self
            .params
            .iter()
            .map(|(name, domain)| (name, domain.grid_values(points_per_axis)))
            .collect();

        let mut configs = vec![ParamMap::new()];
        for (name, values) in axes {
            let mut next = Vec::with_capacity(configs.len() * values.len());
            for config in &configs {
                for value in &values {
                    let mut extended = config.clone();
                    extended.insert(name.clone(), value.clone());
                    next.push(extended);
                }
            }
            configs = next;
        }
        configs
    }
}
