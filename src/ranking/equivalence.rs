// Equivalence ranking: connected components of the "equal" relation

use super::{DepthRanker, Method, RankAssignment, RankingStrategy};
use crate::comparison::Relation;
use crate::dependency_graph::DependencyGraph;
use crate::error::Result;
use crate::quantile::QuantileComparer;

/// Groups objects connected through chains of "equal" outcomes
///
/// Each component is one rank. Components are ordered by the lower quantile
/// bound of their lexicographically smallest member, ascending.
#[derive(Debug, Clone)]
pub struct EquivalenceRanker<'a> {
    comparer: &'a QuantileComparer,
    assignment: Option<RankAssignment>,
}

impl<'a> EquivalenceRanker<'a> {
    pub fn new(comparer: &'a QuantileComparer) -> Self {
        Self {
            comparer,
            assignment: None,
        }
    }

    pub(crate) fn comparer(&self) -> &'a QuantileComparer {
        self.comparer
    }

    /// Components of the equality graph, each sorted by object id
    pub fn equivalence_classes(&self) -> Result<Vec<Vec<String>>> {
        self.comparer.ensure_complete()?;
        let objects = self.comparer.objects();
        let n = objects.len();

        let mut adjacency = vec![Vec::new(); n];
        for i in 0..n {
            for j in (i + 1)..n {
                if self.comparer.relation(i, j)? == Relation::Equal {
                    adjacency[i].push(j);
                    adjacency[j].push(i);
                }
            }
        }

        let mut visited = vec![false; n];
        let mut classes = Vec::new();
        for start in 0..n {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            let mut stack = vec![start];
            let mut members = Vec::new();
            while let Some(node) = stack.pop() {
                members.push(objects[node].clone());
                for &next in &adjacency[node] {
                    if !visited[next] {
                        visited[next] = true;
                        stack.push(next);
                    }
                }
            }
            members.sort();
            classes.push(members);
        }
        Ok(classes)
    }
}

impl RankingStrategy for EquivalenceRanker<'_> {
    fn method(&self) -> Method {
        Method::Min
    }

    fn compute_ranks(&mut self) -> Result<()> {
        let mut keyed = Vec::new();
        for class in self.equivalence_classes()? {
            // classes are non-empty and sorted, so the first id is the smallest
            let lower = self.comparer.lower(&class[0])?;
            keyed.push((lower, class));
        }
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1[0].cmp(&b.1[0])));

        let mut assignment = RankAssignment::new();
        for (rank, (_, class)) in keyed.into_iter().enumerate() {
            for object in &class {
                assignment.insert(object, rank);
            }
        }
        tracing::debug!(
            objects = assignment.len(),
            levels = assignment.levels(),
            "equivalence ranking computed"
        );

        self.assignment = Some(assignment);
        Ok(())
    }

    fn assignment(&self) -> Option<&RankAssignment> {
        self.assignment.as_ref()
    }

    fn dependency_graph(&self) -> Result<DependencyGraph> {
        DependencyGraph::from_comparer(self.comparer)
    }

    /// Equivalence classes carry no linear order; falls back to depth ranking
    fn separable_arrangement(&mut self) -> Result<Vec<String>> {
        let mut depth = DepthRanker::new(self.comparer);
        depth.compute_ranks()?;
        depth.separable_arrangement()
    }
}
