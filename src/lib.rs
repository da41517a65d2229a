//! partial-ranker - Partial ranking with ties from noisy repeated measurements
//!
//! Objects (typically algorithm variants) are compared by the overlap of
//! their quantile ranges. Non-overlapping ranges give a strict "better-than"
//! edge; overlapping ranges are ties. Three methodologies turn that relation
//! into rank levels, and a convergence loop decides how many samples to
//! collect before the ranking is trusted.
//!
//! ```text
//! samples -> QuantileComparer -> DependencyGraph -> PartialRanker -> ranks
//!                 ^                                                  |
//!                 +----------- ConvergenceDriver (more samples) <----+
//! ```

pub mod comparison;
pub mod convergence;
pub mod dependency_graph;
pub mod error;
pub mod measurements;
pub mod quantile;
pub mod rank_table;
pub mod ranking;
pub mod simulator;

pub use error::{RankError, Result};
