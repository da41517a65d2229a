// Reduced depth ranking: depth graph → transitive reduction → separable
// arrangement → running rank counter along that arrangement

use super::{DepthRanker, Method, RankAssignment, RankingStrategy};
use crate::comparison::Relation;
use crate::dependency_graph::DependencyGraph;
use crate::error::Result;
use crate::quantile::QuantileComparer;

/// Re-ranks the depth graph along its separable arrangement
///
/// Walking the arrangement left to right, an object starts a new rank only
/// when its left neighbour is strictly better than it; otherwise it shares the
/// neighbour's rank. Depth levels whose adjacent members cannot be told apart
/// collapse into one rank, so this yields fewer levels than `DepthRanker`.
#[derive(Debug, Clone)]
pub struct ReducedDepthRanker<'a> {
    comparer: &'a QuantileComparer,
    depth: DepthRanker<'a>,
    reduced: Option<DependencyGraph>,
    arrangement: Vec<String>,
    assignment: Option<RankAssignment>,
}

impl<'a> ReducedDepthRanker<'a> {
    pub fn new(comparer: &'a QuantileComparer) -> Self {
        Self {
            comparer,
            depth: DepthRanker::new(comparer),
            reduced: None,
            arrangement: Vec::new(),
            assignment: None,
        }
    }

    pub(crate) fn comparer(&self) -> &'a QuantileComparer {
        self.comparer
    }

    /// The arrangement walked by the last `compute_ranks`
    pub fn arrangement(&self) -> &[String] {
        &self.arrangement
    }
}

impl RankingStrategy for ReducedDepthRanker<'_> {
    fn method(&self) -> Method {
        Method::DfgReduced
    }

    fn compute_ranks(&mut self) -> Result<()> {
        self.depth.compute_ranks()?;
        let mut graph = self.depth.dependency_graph()?;
        graph.transitive_reduction()?;
        let arrangement = graph.separable_arrangement()?;

        let mut assignment = RankAssignment::new();
        let mut rank = 0;
        let mut prev: Option<usize> = None;
        for object in &arrangement {
            let curr = self.comparer.index_of(object)?;
            if let Some(p) = prev {
                if self.comparer.relation(p, curr)? == Relation::Better {
                    rank += 1;
                }
            }
            assignment.insert(object, rank);
            prev = Some(curr);
        }
        tracing::debug!(
            objects = assignment.len(),
            levels = assignment.levels(),
            "reduced depth ranking computed"
        );

        self.reduced = Some(graph);
        self.arrangement = arrangement;
        self.assignment = Some(assignment);
        Ok(())
    }

    fn assignment(&self) -> Option<&RankAssignment> {
        self.assignment.as_ref()
    }

    /// The transitively reduced graph
    fn dependency_graph(&self) -> Result<DependencyGraph> {
        match &self.reduced {
            Some(graph) => Ok(graph.clone()),
            None => {
                let mut graph = DependencyGraph::from_comparer(self.comparer)?;
                graph.transitive_reduction()?;
                Ok(graph)
            }
        }
    }

    fn separable_arrangement(&mut self) -> Result<Vec<String>> {
        match self.reduced.as_mut() {
            Some(graph) => graph.separable_arrangement(),
            None => self.dependency_graph()?.separable_arrangement(),
        }
    }
}
