//! Error taxonomy for ranking runs
//!
//! Every variant aborts the current ranking call. Nothing here is retried or
//! defaulted; callers receive the error as soon as it is detected.

use thiserror::Error;

/// Errors raised by the comparator, the dependency graph, the ranking
/// strategies and the convergence driver
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RankError {
    #[error("Invalid quantile pair: q_max={q_max}, q_min={q_min} (need 0 <= q_min < q_max <= 100)")]
    InvalidQuantile { q_max: f64, q_min: f64 },

    #[error("No measurements recorded for object '{object}'")]
    EmptyMeasurement { object: String },

    #[error("Unknown object '{object}' (not ranked in the current run)")]
    UnknownObject { object: String },

    #[error("Cycle detected in dependency graph at node '{node}'")]
    CycleDetected { node: String },

    #[error("Unsupported ranking strategy '{tag}' (expected dfg, dfg-reduced or min)")]
    UnsupportedStrategy { tag: String },

    #[error("Comparison between '{first}' and '{second}' has not been evaluated")]
    ComparisonPending { first: String, second: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Measurement source failed: {0}")]
    MeasurementSource(String),

    #[error("Malformed rank table: {0}")]
    Table(String),
}

/// Result type for ranking operations
pub type Result<T> = std::result::Result<T, RankError>;
