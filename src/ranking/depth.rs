// Depth ranking: rank of an object = its depth in the dependency graph

use super::{Method, RankAssignment, RankingStrategy};
use crate::dependency_graph::DependencyGraph;
use crate::error::Result;
use crate::quantile::QuantileComparer;

/// Ranks objects by their longest "better-than" chain from a best object
///
/// Objects nothing is strictly better than get rank 0. The comparer's matrix
/// must be fully evaluated (`compare_all`) before `compute_ranks`.
#[derive(Debug, Clone)]
pub struct DepthRanker<'a> {
    comparer: &'a QuantileComparer,
    graph: Option<DependencyGraph>,
    assignment: Option<RankAssignment>,
}

impl<'a> DepthRanker<'a> {
    pub fn new(comparer: &'a QuantileComparer) -> Self {
        Self {
            comparer,
            graph: None,
            assignment: None,
        }
    }

    pub(crate) fn comparer(&self) -> &'a QuantileComparer {
        self.comparer
    }

    /// The unreduced graph built by the last `compute_ranks`
    pub fn graph(&self) -> Option<&DependencyGraph> {
        self.graph.as_ref()
    }
}

impl RankingStrategy for DepthRanker<'_> {
    fn method(&self) -> Method {
        Method::Dfg
    }

    fn compute_ranks(&mut self) -> Result<()> {
        let mut graph = DependencyGraph::from_comparer(self.comparer)?;
        let depths = graph.depths()?;

        let mut assignment = RankAssignment::new();
        for (object, depth) in self.comparer.objects().iter().zip(depths) {
            assignment.insert(object, depth);
        }
        tracing::debug!(
            objects = assignment.len(),
            levels = assignment.levels(),
            "depth ranking computed"
        );

        self.graph = Some(graph);
        self.assignment = Some(assignment);
        Ok(())
    }

    fn assignment(&self) -> Option<&RankAssignment> {
        self.assignment.as_ref()
    }

    fn dependency_graph(&self) -> Result<DependencyGraph> {
        match &self.graph {
            Some(graph) => Ok(graph.clone()),
            None => DependencyGraph::from_comparer(self.comparer),
        }
    }

    fn separable_arrangement(&mut self) -> Result<Vec<String>> {
        match self.graph.as_mut() {
            Some(graph) => graph.separable_arrangement(),
            None => DependencyGraph::from_comparer(self.comparer)?.separable_arrangement(),
        }
    }
}
