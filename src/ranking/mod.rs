// Partial ranking strategies over a quantile comparer
//
// Three methodologies turn the pairwise relation into rank levels:
// - Depth (dfg): rank = longest-path depth in the dependency graph
// - Reduced depth (dfg-reduced): depth graph, transitively reduced, then
//   re-ranked along its separable arrangement
// - Equivalence (min): connected components of the "equal" relation, ordered
//   by the lower bound of a representative
//
// All three share the `RankingStrategy` capability set; `PartialRanker` is the
// closed enum that dispatches between them by `Method`.

mod assignment;
mod depth;
mod equivalence;
mod reduced;

pub use assignment::RankAssignment;
pub use depth::DepthRanker;
pub use equivalence::EquivalenceRanker;
pub use reduced::ReducedDepthRanker;

use crate::dependency_graph::DependencyGraph;
use crate::error::{RankError, Result};
use crate::quantile::QuantileComparer;
use crate::rank_table::RankTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Ranking methodology tag
///
/// Serialized as its kebab-case tag. Deserialization goes through `FromStr`,
/// so config files accept exactly the spellings `parse` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum Method {
    /// Rank = dependency-graph depth
    Dfg,
    /// Depth graph, transitively reduced and re-ranked along its arrangement
    #[default]
    DfgReduced,
    /// Equivalence classes of the "equal" relation
    Min,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::Dfg, Method::DfgReduced, Method::Min];

    pub fn tag(self) -> &'static str {
        match self {
            Method::Dfg => "dfg",
            Method::DfgReduced => "dfg-reduced",
            Method::Min => "min",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Method {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dfg" | "depth" => Ok(Method::Dfg),
            "dfg-reduced" | "dfgreduced" | "reduced" => Ok(Method::DfgReduced),
            "min" | "equivalence" => Ok(Method::Min),
            _ => Err(RankError::UnsupportedStrategy { tag: s.to_string() }),
        }
    }
}

impl TryFrom<String> for Method {
    type Error = RankError;

    fn try_from(tag: String) -> Result<Self> {
        tag.parse()
    }
}

/// Capabilities shared by every ranking methodology
pub trait RankingStrategy {
    /// Which methodology this is
    fn method(&self) -> Method;

    /// Compute (or recompute) the rank assignment
    fn compute_ranks(&mut self) -> Result<()>;

    /// The assignment from the last `compute_ranks`, if any
    fn assignment(&self) -> Option<&RankAssignment>;

    /// Dependency graph describing the rank relation
    fn dependency_graph(&self) -> Result<DependencyGraph>;

    /// Linear order of objects used to seed re-ranking
    fn separable_arrangement(&mut self) -> Result<Vec<String>>;

    /// The last assignment, or `UnknownObject` if ranks were never computed
    fn computed(&self) -> Result<&RankAssignment> {
        self.assignment().ok_or_else(not_computed)
    }

    /// Objects at each rank
    fn ranks(&self) -> Result<&BTreeMap<usize, Vec<String>>> {
        Ok(self.computed()?.ranks())
    }

    /// Rank of one object; `UnknownObject` if never ranked
    fn rank_of(&self, object: &str) -> Result<usize> {
        self.computed()?.rank_of(object)
    }
}

fn not_computed() -> RankError {
    RankError::UnknownObject {
        object: "<ranks not computed>".to_string(),
    }
}

/// Strategy selector over the three methodologies
///
/// # Example
/// ```
/// use partial_ranker::measurements::MeasurementSet;
/// use partial_ranker::quantile::QuantileComparer;
/// use partial_ranker::ranking::{Method, PartialRanker, RankingStrategy};
///
/// # fn main() -> partial_ranker::error::Result<()> {
/// let set: MeasurementSet = vec![
///     ("A", vec![1.0, 1.0, 1.0, 1.0]),
///     ("B", vec![5.0, 5.0, 5.0, 5.0]),
///     ("C", vec![1.0, 1.0, 1.0, 1.0]),
/// ].into_iter().collect();
///
/// let mut comparer = QuantileComparer::new(set);
/// comparer.compute_quantiles(75.0, 25.0, false)?;
/// comparer.compare_all()?;
///
/// let mut ranker = PartialRanker::new(&comparer, Method::Dfg);
/// ranker.compute_ranks()?;
/// assert_eq!(ranker.rank_of("A")?, 0);
/// assert_eq!(ranker.rank_of("C")?, 0);
/// assert_eq!(ranker.rank_of("B")?, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub enum PartialRanker<'a> {
    Depth(DepthRanker<'a>),
    Reduced(ReducedDepthRanker<'a>),
    Equivalence(EquivalenceRanker<'a>),
}

impl<'a> PartialRanker<'a> {
    pub fn new(comparer: &'a QuantileComparer, method: Method) -> Self {
        match method {
            Method::Dfg => PartialRanker::Depth(DepthRanker::new(comparer)),
            Method::DfgReduced => PartialRanker::Reduced(ReducedDepthRanker::new(comparer)),
            Method::Min => PartialRanker::Equivalence(EquivalenceRanker::new(comparer)),
        }
    }

    /// Select the methodology by tag (`dfg`, `dfg-reduced`, `min`)
    pub fn from_tag(comparer: &'a QuantileComparer, tag: &str) -> Result<Self> {
        Ok(Self::new(comparer, tag.parse()?))
    }

    fn comparer(&self) -> &'a QuantileComparer {
        match self {
            PartialRanker::Depth(r) => r.comparer(),
            PartialRanker::Reduced(r) => r.comparer(),
            PartialRanker::Equivalence(r) => r.comparer(),
        }
    }

    /// Switch methodology on the same comparer and compute ranks
    pub fn compute_ranks_with(&mut self, method: Method) -> Result<()> {
        if self.method() != method {
            *self = Self::new(self.comparer(), method);
        }
        self.compute_ranks()
    }

    /// Ranks as an exportable `{object_id, rank}` table
    pub fn rank_table(&self) -> Result<RankTable> {
        Ok(RankTable::from_assignment(self.computed()?))
    }
}

impl RankingStrategy for PartialRanker<'_> {
    fn method(&self) -> Method {
        match self {
            PartialRanker::Depth(r) => r.method(),
            PartialRanker::Reduced(r) => r.method(),
            PartialRanker::Equivalence(r) => r.method(),
        }
    }

    fn compute_ranks(&mut self) -> Result<()> {
        match self {
            PartialRanker::Depth(r) => r.compute_ranks(),
            PartialRanker::Reduced(r) => r.compute_ranks(),
            PartialRanker::Equivalence(r) => r.compute_ranks(),
        }
    }

    fn assignment(&self) -> Option<&RankAssignment> {
        match self {
            PartialRanker::Depth(r) => r.assignment(),
            PartialRanker::Reduced(r) => r.assignment(),
            PartialRanker::Equivalence(r) => r.assignment(),
        }
    }

    fn dependency_graph(&self) -> Result<DependencyGraph> {
        match self {
            PartialRanker::Depth(r) => r.dependency_graph(),
            PartialRanker::Reduced(r) => r.dependency_graph(),
            PartialRanker::Equivalence(r) => r.dependency_graph(),
        }
    }

    fn separable_arrangement(&mut self) -> Result<Vec<String>> {
        match self {
            PartialRanker::Depth(r) => r.separable_arrangement(),
            PartialRanker::Reduced(r) => r.separable_arrangement(),
            PartialRanker::Equivalence(r) => r.separable_arrangement(),
        }
    }
}
