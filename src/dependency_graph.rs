//! Dependency graph derived from the comparison matrix
//!
//! Nodes are ranked objects. An edge `better → worse` records that `worse`
//! depends on `better`: `better` must be ranked ahead of it. Equal pairs
//! never produce edges.
//!
//! # Depth
//!
//! ```text
//! depth(v) = 0                                   if v has no predecessor
//! depth(v) = 1 + max(depth(u) for u → v)         otherwise
//! ```
//!
//! Depth is computed with an explicit worklist (no recursion), memoized per
//! node, and dropped whenever an edge is added or removed.
//!
//! # Transitive reduction
//!
//! The reduction here is depth-based: an incoming edge `u → v` is removed
//! when `depth(u) + 1 < depth(v)`, i.e. a longer path already reaches `v`.
//! Edges implied through an alternate path whose length equals the edge's
//! own contribution are kept. Depth never changes under this reduction,
//! which is the property the rankers rely on.
//!
//! # Example
//!
//! ```
//! use partial_ranker::dependency_graph::DependencyGraph;
//!
//! # fn main() -> partial_ranker::error::Result<()> {
//! let mut graph = DependencyGraph::with_nodes(["a", "b", "c"]);
//! graph.add_edge("a", "b")?;
//! graph.add_edge("b", "c")?;
//! graph.add_edge("a", "c")?;
//!
//! assert_eq!(graph.depth("c")?, 2);
//! assert_eq!(graph.transitive_reduction()?, 1); // a → c is implied by a → b → c
//! assert_eq!(graph.depth("c")?, 2);
//! # Ok(())
//! # }
//! ```

use crate::comparison::Relation;
use crate::error::{RankError, Result};
use crate::quantile::QuantileComparer;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

/// Directed acyclic "better-than" graph over ranked objects
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Edge direction: better → worse
    graph: DiGraph<String, ()>,

    /// Object id → node
    index: HashMap<String, NodeIndex>,

    /// Memoized depth per node (indexed by `NodeIndex::index()`)
    depth_cache: Vec<Option<usize>>,

    /// False while `depth_cache` holds no entry
    depths_cached: bool,
}

impl DependencyGraph {
    /// Graph with the given nodes and no edges
    pub fn with_nodes<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        for name in nodes {
            let name = name.into();
            if index.contains_key(&name) {
                continue;
            }
            let node = graph.add_node(name.clone());
            index.insert(name, node);
        }
        let depth_cache = vec![None; graph.node_count()];
        Self {
            graph,
            index,
            depth_cache,
            depths_cached: false,
        }
    }

    /// Build from a fully evaluated comparer: one edge per strict pair
    ///
    /// Fails with `ComparisonPending` if any pair is still unknown.
    pub fn from_comparer(comparer: &QuantileComparer) -> Result<Self> {
        comparer.ensure_complete()?;
        let objects = comparer.objects();
        let mut graph = Self::with_nodes(objects.iter().cloned());

        // Node i is objects[i] and every unordered pair is visited once, so
        // edges go in unchecked.
        for i in 0..objects.len() {
            for j in (i + 1)..objects.len() {
                let (a, b) = (NodeIndex::new(i), NodeIndex::new(j));
                match comparer.relation(i, j)? {
                    Relation::Better => {
                        graph.graph.add_edge(a, b, ());
                    }
                    Relation::Worse => {
                        graph.graph.add_edge(b, a, ());
                    }
                    Relation::Equal => {}
                }
            }
        }

        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "built dependency graph"
        );
        Ok(graph)
    }

    /// Build from a hand-authored dependency map
    ///
    /// `dependencies[x]` lists the objects better than `x`. Such maps are not
    /// guaranteed acyclic; cycles surface as `CycleDetected` from `depth`.
    pub fn from_dependencies(
        order: &[String],
        dependencies: &HashMap<String, Vec<String>>,
    ) -> Result<Self> {
        let mut graph = Self::with_nodes(order.iter().cloned());
        for name in order {
            let Some(better) = dependencies.get(name) else {
                continue;
            };
            for b in better {
                graph.add_edge(b, name)?;
            }
        }
        if let Some(stray) = dependencies.keys().find(|k| !graph.index.contains_key(*k)) {
            return Err(RankError::UnknownObject {
                object: stray.clone(),
            });
        }
        Ok(graph)
    }

    fn node(&self, name: &str) -> Result<NodeIndex> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| RankError::UnknownObject {
                object: name.to_string(),
            })
    }

    fn invalidate_depths(&mut self) {
        if self.depths_cached {
            self.depth_cache.fill(None);
            self.depths_cached = false;
        }
    }

    /// Add `better → worse`; duplicate edges are ignored
    pub fn add_edge(&mut self, better: &str, worse: &str) -> Result<()> {
        let (b, w) = (self.node(better)?, self.node(worse)?);
        if self.graph.find_edge(b, w).is_none() {
            self.graph.add_edge(b, w, ());
            self.invalidate_depths();
        }
        Ok(())
    }

    /// Remove `better → worse`
    ///
    /// Removing an absent edge is a no-op: it is logged and reported as
    /// `Ok(false)`.
    pub fn remove_edge(&mut self, better: &str, worse: &str) -> Result<bool> {
        let (b, w) = (self.node(better)?, self.node(worse)?);
        match self.graph.find_edge(b, w) {
            Some(edge) => {
                self.graph.remove_edge(edge);
                self.invalidate_depths();
                Ok(true)
            }
            None => {
                tracing::warn!(better, worse, "edge does not exist, nothing removed");
                Ok(false)
            }
        }
    }

    fn predecessors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut preds: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .collect();
        preds.sort();
        preds
    }

    fn successors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut succs: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .collect();
        succs.sort();
        succs
    }

    /// Longest-path depth of `start`, filling the memo for every node visited
    ///
    /// `in_progress` must be all-false on entry and is all-false again on a
    /// successful return.
    fn visit(&mut self, start: NodeIndex, in_progress: &mut [bool]) -> Result<usize> {
        if let Some(d) = self.depth_cache[start.index()] {
            return Ok(d);
        }

        let mut stack = vec![(start, false)];

        while let Some((node, expanded)) = stack.pop() {
            let slot = node.index();
            if self.depth_cache[slot].is_some() {
                continue;
            }

            if expanded {
                let mut depth = 0;
                for pred in self.predecessors(node) {
                    let pd = self.depth_cache[pred.index()].ok_or_else(|| RankError::CycleDetected {
                        node: self.graph[pred].clone(),
                    })?;
                    depth = depth.max(pd + 1);
                }
                self.depth_cache[slot] = Some(depth);
                self.depths_cached = true;
                in_progress[slot] = false;
                continue;
            }

            if in_progress[slot] {
                return Err(RankError::CycleDetected {
                    node: self.graph[node].clone(),
                });
            }
            in_progress[slot] = true;
            stack.push((node, true));
            for pred in self.predecessors(node) {
                if self.depth_cache[pred.index()].is_none() {
                    if in_progress[pred.index()] {
                        return Err(RankError::CycleDetected {
                            node: self.graph[pred].clone(),
                        });
                    }
                    stack.push((pred, false));
                }
            }
        }

        self.depth_cache[start.index()].ok_or_else(|| RankError::CycleDetected {
            node: self.graph[start].clone(),
        })
    }

    fn depth_of(&mut self, start: NodeIndex) -> Result<usize> {
        let mut in_progress = vec![false; self.graph.node_count()];
        self.visit(start, &mut in_progress)
    }

    /// Depth of `name` (0 for objects nothing is better than)
    pub fn depth(&mut self, name: &str) -> Result<usize> {
        let node = self.node(name)?;
        self.depth_of(node)
    }

    /// Depth of every node, in node order
    pub fn depths(&mut self) -> Result<Vec<usize>> {
        let nodes: Vec<NodeIndex> = self.graph.node_indices().collect();
        let mut in_progress = vec![false; nodes.len()];
        nodes
            .into_iter()
            .map(|n| self.visit(n, &mut in_progress))
            .collect()
    }

    /// Incoming edges of `name` that a longer path already implies
    pub fn redundant_dependencies(&mut self, name: &str) -> Result<Vec<String>> {
        let node = self.node(name)?;
        let depth = self.depth_of(node)?;
        let mut redundant = Vec::new();
        for pred in self.predecessors(node) {
            if self.depth_of(pred)? + 1 < depth {
                redundant.push(self.graph[pred].clone());
            }
        }
        Ok(redundant)
    }

    /// Remove every redundant incoming edge; returns how many were removed
    ///
    /// The graph is rebuilt once with the kept edges. Node indices and the
    /// depth memo stay valid because no depth changes.
    pub fn transitive_reduction(&mut self) -> Result<usize> {
        let depths = self.depths()?;
        let keep: Vec<bool> = self
            .graph
            .raw_edges()
            .iter()
            .map(|e| depths[e.source().index()] + 1 >= depths[e.target().index()])
            .collect();

        let before = self.graph.edge_count();
        self.graph = self
            .graph
            .filter_map(|_, name| Some(name.clone()), |e, _| keep[e.index()].then_some(()));
        let removed = before - self.graph.edge_count();

        tracing::debug!(removed, remaining = self.edge_count(), "transitive reduction");
        Ok(removed)
    }

    /// Objects ordered by depth, then out-degree descending, then in-degree
    /// ascending; remaining ties keep node order
    ///
    /// Degrees count only edges that span exactly one depth level, which are
    /// the edges a transitive reduction keeps, so the arrangement is the same
    /// before and after reducing.
    pub fn separable_arrangement(&mut self) -> Result<Vec<String>> {
        let depths = self.depths()?;
        let mut in_deg = vec![0usize; depths.len()];
        let mut out_deg = vec![0usize; depths.len()];
        for edge in self.graph.raw_edges() {
            let (s, t) = (edge.source().index(), edge.target().index());
            if depths[s] + 1 == depths[t] {
                out_deg[s] += 1;
                in_deg[t] += 1;
            }
        }

        let mut order: Vec<usize> = (0..depths.len()).collect();
        order.sort_by_key(|&i| (depths[i], Reverse(out_deg[i]), in_deg[i]));
        Ok(order
            .into_iter()
            .map(|i| self.graph[NodeIndex::new(i)].clone())
            .collect())
    }

    /// Objects grouped by depth, each group in node order
    pub fn ranks_by_depth(&mut self) -> Result<BTreeMap<usize, Vec<String>>> {
        let depths = self.depths()?;
        let mut by_depth: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for (i, d) in depths.into_iter().enumerate() {
            by_depth
                .entry(d)
                .or_default()
                .push(self.graph[NodeIndex::new(i)].clone());
        }
        Ok(by_depth)
    }

    pub fn max_depth(&mut self) -> Result<usize> {
        Ok(self.depths()?.into_iter().max().unwrap_or(0))
    }

    /// Objects better than `name` (its direct predecessors)
    pub fn dependencies(&self, name: &str) -> Result<Vec<String>> {
        let node = self.node(name)?;
        Ok(self
            .predecessors(node)
            .into_iter()
            .map(|n| self.graph[n].clone())
            .collect())
    }

    /// Objects that depend on `name` (its direct successors)
    pub fn dependents(&self, name: &str) -> Result<Vec<String>> {
        let node = self.node(name)?;
        Ok(self
            .successors(node)
            .into_iter()
            .map(|n| self.graph[n].clone())
            .collect())
    }

    /// Node ids in insertion order
    pub fn nodes(&self) -> Vec<String> {
        self.graph
            .node_indices()
            .map(|n| self.graph[n].clone())
            .collect()
    }

    /// Edges as `(better, worse)` pairs, sorted by node order
    pub fn edges(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(NodeIndex, NodeIndex)> = self
            .graph
            .raw_edges()
            .iter()
            .map(|e| (e.source(), e.target()))
            .collect();
        pairs.sort();
        pairs
            .into_iter()
            .map(|(s, t)| (self.graph[s].clone(), self.graph[t].clone()))
            .collect()
    }

    pub fn has_edge(&self, better: &str, worse: &str) -> bool {
        match (self.index.get(better), self.index.get(worse)) {
            (Some(&b), Some(&w)) => self.graph.find_edge(b, w).is_some(),
            _ => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// True when depth can be computed for every node
    pub fn is_dag(&mut self) -> bool {
        self.depths().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> DependencyGraph {
        let mut g = DependencyGraph::with_nodes(["a", "b", "c", "d"]);
        g.add_edge("a", "b").unwrap();
        g.add_edge("b", "c").unwrap();
        g.add_edge("c", "d").unwrap();
        g.add_edge("a", "c").unwrap();
        g.add_edge("a", "d").unwrap();
        g
    }

    #[test]
    fn test_empty_graph() {
        let mut g = DependencyGraph::with_nodes(Vec::<String>::new());
        assert_eq!(g.node_count(), 0);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.max_depth().unwrap(), 0);
        assert!(g.separable_arrangement().unwrap().is_empty());
    }

    #[test]
    fn test_depths_along_chain() {
        let mut g = chain();
        assert_eq!(g.depths().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(g.max_depth().unwrap(), 3);
    }

    #[test]
    fn test_duplicate_edge_ignored() {
        let mut g = DependencyGraph::with_nodes(["a", "b"]);
        g.add_edge("a", "b").unwrap();
        g.add_edge("a", "b").unwrap();
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_depth_invalidated_on_edge_change() {
        let mut g = DependencyGraph::with_nodes(["a", "b", "c"]);
        g.add_edge("a", "b").unwrap();
        assert_eq!(g.depth("c").unwrap(), 0);
        g.add_edge("b", "c").unwrap();
        assert_eq!(g.depth("c").unwrap(), 2);
        g.remove_edge("b", "c").unwrap();
        assert_eq!(g.depth("c").unwrap(), 0);
    }

    #[test]
    fn test_transitive_reduction_keeps_depths() {
        let mut g = chain();
        let before = g.depths().unwrap();
        let removed = g.transitive_reduction().unwrap();
        assert_eq!(removed, 2);
        assert_eq!(g.depths().unwrap(), before);
        assert!(!g.has_edge("a", "c"));
        assert!(!g.has_edge("a", "d"));
        assert!(g.has_edge("c", "d"));
    }

    #[test]
    fn test_redundant_dependencies() {
        let mut g = chain();
        assert_eq!(g.redundant_dependencies("d").unwrap(), vec!["a".to_string()]);
        assert!(g.redundant_dependencies("b").unwrap().is_empty());
    }

    #[test]
    fn test_remove_missing_edge_is_noop() {
        let mut g = DependencyGraph::with_nodes(["a", "b"]);
        assert!(!g.remove_edge("a", "b").unwrap());
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_cycle_detected() {
        let order: Vec<String> = ["x", "y", "z"].iter().map(|s| s.to_string()).collect();
        let mut deps = HashMap::new();
        deps.insert("x".to_string(), vec!["z".to_string()]);
        deps.insert("y".to_string(), vec!["x".to_string()]);
        deps.insert("z".to_string(), vec!["y".to_string()]);

        let mut g = DependencyGraph::from_dependencies(&order, &deps).unwrap();
        assert!(matches!(g.depth("x"), Err(RankError::CycleDetected { .. })));
        assert!(!g.is_dag());
    }

    #[test]
    fn test_self_loop_is_cycle() {
        let mut g = DependencyGraph::with_nodes(["solo"]);
        g.add_edge("solo", "solo").unwrap();
        assert!(matches!(g.depth("solo"), Err(RankError::CycleDetected { .. })));
    }

    #[test]
    fn test_from_dependencies_unknown_object() {
        let order = vec!["a".to_string()];
        let mut deps = HashMap::new();
        deps.insert("a".to_string(), vec!["ghost".to_string()]);
        assert!(matches!(
            DependencyGraph::from_dependencies(&order, &deps),
            Err(RankError::UnknownObject { .. })
        ));
    }

    #[test]
    fn test_separable_arrangement_tie_break() {
        // Level 0: p, q. p has two dependents, q has one.
        // Level 1: r (two deps), s (one dep)
        let mut g = DependencyGraph::with_nodes(["q", "p", "r", "s"]);
        g.add_edge("p", "r").unwrap();
        g.add_edge("q", "r").unwrap();
        g.add_edge("p", "s").unwrap();

        let arrangement = g.separable_arrangement().unwrap();
        assert_eq!(arrangement, vec!["p", "q", "s", "r"]);
    }

    #[test]
    fn test_separable_arrangement_stable_under_reduction() {
        let mut g = chain();
        let before = g.separable_arrangement().unwrap();
        g.transitive_reduction().unwrap();
        assert_eq!(g.separable_arrangement().unwrap(), before);
    }

    #[test]
    fn test_accessors() {
        let g = chain();
        assert_eq!(g.dependencies("c").unwrap(), vec!["a", "b"]);
        assert_eq!(g.dependents("a").unwrap(), vec!["b", "c", "d"]);
        assert_eq!(g.nodes(), vec!["a", "b", "c", "d"]);
        assert_eq!(g.edges().len(), 5);
        assert!(g.dependencies("nope").is_err());
    }

    #[test]
    fn test_dense_total_order_reduces_to_chain() {
        use crate::measurements::MeasurementSet;

        let n = 2000;
        let set: MeasurementSet = (0..n)
            .map(|i| (format!("v{}", i), vec![i as f64, i as f64 + 0.5]))
            .collect();
        let mut comparer = QuantileComparer::new(set);
        comparer.compute_quantiles(75.0, 25.0, false).unwrap();
        comparer.compare_all().unwrap();

        let mut g = DependencyGraph::from_comparer(&comparer).unwrap();
        assert_eq!(g.edge_count(), n * (n - 1) / 2);
        assert_eq!(g.depth("v1999").unwrap(), n - 1);

        let removed = g.transitive_reduction().unwrap();
        assert_eq!(removed, n * (n - 1) / 2 - (n - 1));
        assert_eq!(g.edge_count(), n - 1);
        assert!(g.has_edge("v0", "v1"));
        assert!(!g.has_edge("v0", "v2"));
        assert_eq!(g.depth("v1999").unwrap(), n - 1);
        assert_eq!(g.nodes()[1234], "v1234");
    }

    #[test]
    fn test_depth_cache_survives_reduction_and_resets_on_edit() {
        let mut g = chain();
        g.transitive_reduction().unwrap();
        assert_eq!(g.depth("d").unwrap(), 3);
        g.remove_edge("b", "c").unwrap();
        assert_eq!(g.depth("c").unwrap(), 0);
        assert_eq!(g.depth("d").unwrap(), 1);
    }

    #[test]
    fn test_deep_chain_does_not_overflow_stack() {
        let names: Vec<String> = (0..20_000).map(|i| format!("n{}", i)).collect();
        let mut g = DependencyGraph::with_nodes(names.iter().cloned());
        for w in names.windows(2) {
            g.add_edge(&w[0], &w[1]).unwrap();
        }
        assert_eq!(g.depth("n19999").unwrap(), 19_999);
    }
}
