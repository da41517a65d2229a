//! Measure-and-rank convergence loop
//!
//! Each iteration asks the measurement source for `rep_steps` more samples per
//! object, ranks the objects once per quantile pair and averages those ranks.
//! The loop stops when the adjacent-rank deltas stop moving:
//!
//! ```text
//! x[i]   = mean rank of working_order[i]
//! dx[i]  = x[i+1] - x[i]
//! norm   = ||dx - dy||_2 / n          (dy = previous dx, initially all ones)
//! ```
//!
//! After every iteration the working order is re-sorted by mean rank, so the
//! next `dx` diffs a different set of neighbours.

use crate::error::{RankError, Result};
use crate::measurements::{MeasurementSet, MeasurementSource};
use crate::quantile::{QuantileComparer, QuantilePair};
use crate::rank_table::{MeanRankRecord, MeanRankTable, QuantileRankTable};
use crate::ranking::{Method, PartialRanker, RankingStrategy};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Configuration for the convergence loop
///
/// # Example
/// ```
/// use partial_ranker::convergence::ConvergenceConfig;
/// use partial_ranker::ranking::Method;
///
/// let config = ConvergenceConfig::default();
/// assert_eq!(config.rep_steps, 3);
/// assert_eq!(config.method, Method::DfgReduced);
/// assert_eq!(config.quantile_pairs.len(), 8);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    /// Samples requested per object on every iteration
    pub rep_steps: usize,

    /// Stop once the rank-delta norm is at or below this value
    pub eps: f64,

    /// Stop once `iterations * rep_steps` reaches this many samples
    pub max_rep: usize,

    /// Ranking methodology applied at every quantile pair
    pub method: Method,

    /// Apply the 1.5×IQR fence before computing bounds
    pub remove_outliers: bool,

    /// Pairs whose ranks are averaged into the mean rank
    pub quantile_pairs: Vec<QuantilePair>,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            rep_steps: 3,
            eps: 0.001,
            max_rep: 50,
            method: Method::DfgReduced,
            remove_outliers: false,
            quantile_pairs: QuantilePair::defaults(),
        }
    }
}

impl ConvergenceConfig {
    /// Fewer, central quantile pairs and a looser tolerance
    pub fn quick() -> Self {
        Self {
            rep_steps: 3,
            eps: 0.01,
            max_rep: 30,
            quantile_pairs: [(75.0, 25.0), (70.0, 30.0), (65.0, 35.0), (55.0, 45.0)]
                .iter()
                .map(|&(q_max, q_min)| QuantilePair { q_max, q_min })
                .collect(),
            ..Self::default()
        }
    }

    /// Tighter tolerance and a larger sample budget
    pub fn thorough() -> Self {
        Self {
            rep_steps: 5,
            eps: 0.0001,
            max_rep: 200,
            ..Self::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.rep_steps == 0 {
            return Err(RankError::InvalidConfig("rep_steps must be >= 1, got 0".to_string()));
        }

        if self.eps.is_nan() || self.eps < 0.0 {
            return Err(RankError::InvalidConfig(format!(
                "eps must be non-negative, got {}",
                self.eps
            )));
        }

        if self.max_rep < self.rep_steps {
            return Err(RankError::InvalidConfig(format!(
                "max_rep ({}) must be >= rep_steps ({})",
                self.max_rep, self.rep_steps
            )));
        }

        if self.quantile_pairs.is_empty() {
            return Err(RankError::InvalidConfig(
                "quantile_pairs must not be empty".to_string(),
            ));
        }

        for pair in &self.quantile_pairs {
            pair.validate()?;
        }

        Ok(())
    }

    /// Load and validate a configuration from a TOML file
    ///
    /// Missing keys take their default values.
    ///
    /// # Example TOML
    /// ```toml
    /// rep_steps = 5
    /// eps = 0.005
    /// method = "min"
    /// quantile_pairs = [
    ///     { q_max = 75.0, q_min = 25.0 },
    ///     { q_max = 55.0, q_min = 45.0 },
    /// ]
    /// ```
    pub fn from_toml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read convergence config: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a configuration from TOML text
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self =
            toml::from_str(content).with_context(|| "Failed to parse TOML convergence config")?;
        config
            .validate()
            .with_context(|| "Invalid convergence config")?;
        Ok(config)
    }
}

/// Driver state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceState {
    Sampling,
    Converged,
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Norm dropped to `eps` or below
    Stable,
    /// Sample budget `max_rep` exhausted first
    SampleBudget,
}

/// Mean ranks recorded after one iteration (iteration 0 = the seed order)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub iteration: usize,
    pub samples_per_object: usize,
    /// `None` for the seed entry
    pub norm: Option<f64>,
    pub mean_ranks: MeanRankTable,
}

/// Result of a convergence run
#[derive(Debug, Clone)]
pub struct ConvergenceReport {
    /// Ranks per quantile pair from the last iteration
    pub rank_table: QuantileRankTable,
    /// Mean ranks from the last iteration, best first
    pub mean_ranks: MeanRankTable,
    /// Seed entry followed by one entry per iteration
    pub history: Vec<HistoryEntry>,
    pub iterations: usize,
    pub samples_per_object: usize,
    pub final_norm: f64,
    pub stop_reason: StopReason,
}

impl ConvergenceReport {
    pub fn converged(&self) -> bool {
        self.stop_reason == StopReason::Stable
    }

    /// Final working order, best first
    pub fn order(&self) -> Vec<String> {
        self.mean_ranks.order()
    }
}

/// Rank `order` once per quantile pair using `method`
///
/// The comparer is built once over `order` and re-pointed at each pair, so
/// bounds for every pair stay cached for the duration of the call. Objects in
/// `measurements` but not in `order` are ignored.
pub fn rank_across_pairs(
    measurements: &MeasurementSet,
    order: &[String],
    pairs: &[QuantilePair],
    method: Method,
    remove_outliers: bool,
) -> Result<QuantileRankTable> {
    let mut subset = MeasurementSet::new();
    for object in order {
        subset.extend(object, measurements.samples(object)?.iter().copied());
    }

    let mut comparer = QuantileComparer::new(subset);
    let mut table = QuantileRankTable::new(order.to_vec());
    for pair in pairs {
        comparer.compute_quantiles_for(*pair, remove_outliers)?;
        comparer.compare_all()?;

        let mut ranker = PartialRanker::new(&comparer, method);
        ranker.compute_ranks()?;
        table.add_column(*pair, ranker.computed()?)?;
    }
    Ok(table)
}

/// Normalized Euclidean distance between consecutive first differences
fn delta_norm(x: &[f64], dy: &[f64]) -> (f64, Vec<f64>) {
    let n = x.len();
    if n < 2 {
        return (0.0, Vec::new());
    }
    let dx: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let sum_sq: f64 = dx
        .iter()
        .zip(dy)
        .map(|(a, b)| (a - b) * (a - b))
        .sum();
    (sum_sq.sqrt() / n as f64, dx)
}

fn seed_table(order: &[String]) -> MeanRankTable {
    MeanRankTable::from_unsorted(
        order
            .iter()
            .enumerate()
            .map(|(position, object)| MeanRankRecord {
                object_id: object.clone(),
                mean_rank: position as f64,
            })
            .collect(),
    )
}

/// Drives a `MeasurementSource` until the mean-rank order stabilizes
#[derive(Debug, Clone)]
pub struct ConvergenceDriver {
    config: ConvergenceConfig,
    state: ConvergenceState,
}

impl ConvergenceDriver {
    /// Create a driver; fails with `InvalidConfig` if the config is invalid
    pub fn new(config: ConvergenceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: ConvergenceState::Sampling,
        })
    }

    pub fn config(&self) -> &ConvergenceConfig {
        &self.config
    }

    pub fn state(&self) -> ConvergenceState {
        self.state
    }

    /// Run the loop to completion
    ///
    /// `h0` is the seed working order; `None` uses the source's current object
    /// order. At least one iteration always runs.
    pub fn run<S>(&mut self, source: &mut S, h0: Option<Vec<String>>) -> Result<ConvergenceReport>
    where
        S: MeasurementSource + ?Sized,
    {
        let mut order = match h0 {
            Some(order) => order,
            None => source.measurements().objects().to_vec(),
        };
        let mut seen = HashSet::new();
        if let Some(dup) = order.iter().find(|o| !seen.insert(o.as_str())) {
            return Err(RankError::InvalidConfig(format!(
                "object '{}' appears twice in the seed order",
                dup
            )));
        }

        let config = &self.config;
        let n = order.len();
        let mut dy = vec![1.0; n.saturating_sub(1)];
        let mut history = vec![HistoryEntry {
            iteration: 0,
            samples_per_object: source.measurements().min_sample_count(),
            norm: None,
            mean_ranks: seed_table(&order),
        }];
        self.state = ConvergenceState::Sampling;

        let mut run_id = 0;
        loop {
            source.measure(run_id, config.rep_steps)?;
            run_id += 1;

            let rank_table = rank_across_pairs(
                source.measurements(),
                &order,
                &config.quantile_pairs,
                config.method,
                config.remove_outliers,
            )?;
            let mean_ranks = rank_table.mean_ranks();

            let mut x = Vec::with_capacity(n);
            for object in &order {
                let mean = mean_ranks
                    .mean_rank(object)
                    .ok_or_else(|| RankError::UnknownObject {
                        object: object.clone(),
                    })?;
                x.push(mean);
            }
            let (norm, dx) = delta_norm(&x, &dy);
            dy = dx;
            order = mean_ranks.order();

            let samples = source.measurements().min_sample_count();
            info!(
                iteration = run_id,
                norm,
                samples_per_object = samples,
                "convergence iteration"
            );
            history.push(HistoryEntry {
                iteration: run_id,
                samples_per_object: samples,
                norm: Some(norm),
                mean_ranks: mean_ranks.clone(),
            });

            let stop_reason = if norm <= config.eps {
                Some(StopReason::Stable)
            } else if run_id * config.rep_steps >= config.max_rep {
                Some(StopReason::SampleBudget)
            } else {
                None
            };

            if let Some(stop_reason) = stop_reason {
                match stop_reason {
                    StopReason::Stable => info!(iterations = run_id, norm, "ranking converged"),
                    StopReason::SampleBudget => warn!(
                        iterations = run_id,
                        norm,
                        eps = config.eps,
                        max_rep = config.max_rep,
                        "sample budget exhausted before ranking converged"
                    ),
                }
                self.state = ConvergenceState::Converged;
                return Ok(ConvergenceReport {
                    rank_table,
                    mean_ranks,
                    history,
                    iterations: run_id,
                    samples_per_object: samples,
                    final_norm: norm,
                    stop_reason,
                });
            }
            debug!(next_order = ?order, "re-sorted working order");
        }
    }
}
