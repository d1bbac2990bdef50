//! Static weighted road graph.
//!
//! - **Shortest-path trees**: Dijkstra from one source, memoised per source in
//!   an LRU cache (the adjacency never changes after construction).
//! - **Path reconstruction**: predecessor walk from the target back to the source.
//! - **Stitching**: joins consecutive waypoints into one gap-free path.
//!
//! The graph is directed. A road is two-way only if both directions are listed.
//!
//! The adjacency is read without locking. The tree cache sits behind a single
//! mutex, the only lock the graph takes. It is held for a single lookup or
//! insert and released before Dijkstra runs.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use lru::LruCache;
use ordered_float::OrderedFloat;
use pathfinding::directed::dijkstra::dijkstra_all;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, StitchFailure};

/// Default number of shortest-path trees kept in memory.
pub const DEFAULT_PATH_CACHE_CAPACITY: usize = 1_024;

/// A stop on the road graph. The first character of the id is its zone.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Locality group used by the zone insertion heuristic.
    pub fn zone(&self) -> Option<char> {
        self.0.chars().next()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Outgoing edge of a node.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub to: NodeId,
    pub weight: f64,
}

/// A reconstructed path and its total weight.
///
/// An unreachable target is an empty path with infinite distance.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    pub nodes: Vec<NodeId>,
    pub distance: f64,
}

impl Route {
    pub fn unreachable() -> Self {
        Self {
            nodes: Vec::new(),
            distance: f64::INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Distances and predecessors from a single source.
#[derive(Clone, Debug)]
pub struct ShortestPathTree {
    source: NodeId,
    /// Reachable node -> (predecessor, distance). The source is not listed.
    parents: HashMap<NodeId, (NodeId, OrderedFloat<f64>)>,
}

impl ShortestPathTree {
    fn trivial(source: &NodeId) -> Self {
        Self {
            source: source.clone(),
            parents: HashMap::new(),
        }
    }

    /// Distance from the source, `f64::INFINITY` when unreachable.
    pub fn distance(&self, node: &NodeId) -> f64 {
        if *node == self.source {
            return 0.0;
        }
        self.parents
            .get(node)
            .map_or(f64::INFINITY, |(_, cost)| cost.into_inner())
    }

    /// Predecessor on a shortest path from the source. `None` for the source
    /// itself and for unreachable nodes.
    pub fn predecessor(&self, node: &NodeId) -> Option<&NodeId> {
        self.parents.get(node).map(|(parent, _)| parent)
    }

    /// All nodes reachable from the source, the source included.
    pub fn reachable(&self) -> impl Iterator<Item = &NodeId> {
        std::iter::once(&self.source).chain(self.parents.keys())
    }

    /// Walks predecessors back from `end`. Returns `None` unless the walk ends
    /// at the source.
    pub fn path_to(&self, end: &NodeId) -> Option<Vec<NodeId>> {
        let mut path = vec![end.clone()];
        let mut current = end;
        while *current != self.source {
            let (parent, _) = self.parents.get(current)?;
            if path.len() > self.parents.len() {
                return None;
            }
            path.push(parent.clone());
            current = parent;
        }
        path.reverse();
        Some(path)
    }
}

/// Result of [`RouteGraph::stitch_continuous`]: the joined path plus every
/// segment that had to be skipped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StitchOutcome {
    pub path: Vec<NodeId>,
    pub skipped: Vec<StitchFailure>,
}

impl StitchOutcome {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Immutable weighted adjacency with a shortest-path tree cache.
pub struct RouteGraph {
    adjacency: HashMap<NodeId, Vec<Edge>>,
    trees: Mutex<LruCache<NodeId, Arc<ShortestPathTree>>>,
}

impl fmt::Debug for RouteGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteGraph")
            .field("nodes", &self.adjacency.len())
            .field("edges", &self.edge_count())
            .finish()
    }
}

impl RouteGraph {
    /// Build a graph from `node -> [(neighbor, weight)]` entries.
    ///
    /// Nodes that only appear as neighbors become nodes without outgoing edges.
    pub fn new<I, E>(adjacency: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = (NodeId, E)>,
        E: IntoIterator<Item = (NodeId, f64)>,
    {
        Self::with_cache_capacity(adjacency, DEFAULT_PATH_CACHE_CAPACITY)
    }

    pub fn with_cache_capacity<I, E>(adjacency: I, cache_capacity: usize) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = (NodeId, E)>,
        E: IntoIterator<Item = (NodeId, f64)>,
    {
        let mut graph: HashMap<NodeId, Vec<Edge>> = HashMap::new();
        for (from, neighbors) in adjacency {
            if from.as_str().is_empty() {
                return Err(GraphError::EmptyNodeId);
            }
            let mut edges = Vec::new();
            for (to, weight) in neighbors {
                if to.as_str().is_empty() {
                    return Err(GraphError::EmptyNodeId);
                }
                if !weight.is_finite() || weight < 0.0 {
                    return Err(GraphError::InvalidWeight {
                        from: from.clone(),
                        to,
                        weight,
                    });
                }
                edges.push(Edge { to, weight });
            }
            graph.entry(from).or_default().extend(edges);
        }

        let dangling: Vec<NodeId> = graph
            .values()
            .flatten()
            .filter(|edge| !graph.contains_key(&edge.to))
            .map(|edge| edge.to.clone())
            .collect();
        for node in dangling {
            graph.entry(node).or_default();
        }

        Ok(Self {
            adjacency: graph,
            trees: Mutex::new(LruCache::new(
                NonZeroUsize::new(cache_capacity.max(1)).unwrap_or(NonZeroUsize::MIN),
            )),
        })
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.adjacency.contains_key(node)
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.adjacency.keys()
    }

    /// Outgoing edges of `node`, in definition order. Empty for unknown nodes.
    pub fn edges<'a>(&'a self, node: &NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.adjacency
            .get(node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
    }

    pub fn has_edge(&self, from: &NodeId, to: &NodeId) -> bool {
        self.edges(from).any(|edge| edge.to == *to)
    }

    /// True when every consecutive pair of `path` is joined by an edge.
    pub fn is_contiguous(&self, path: &[NodeId]) -> bool {
        path.windows(2).all(|pair| self.has_edge(&pair[0], &pair[1]))
    }

    /// Dijkstra from `source`.
    ///
    /// A source that is not in the graph yields a tree containing only itself.
    pub fn shortest_paths(&self, source: &NodeId) -> Arc<ShortestPathTree> {
        // Fast path: cache hit
        if let Ok(mut cache) = self.trees.lock() {
            if let Some(tree) = cache.get(source) {
                return Arc::clone(tree);
            }
        }

        let tree = Arc::new(self.compute_tree(source));

        if let Ok(mut cache) = self.trees.lock() {
            cache.put(source.clone(), Arc::clone(&tree));
        }
        tree
    }

    fn compute_tree(&self, source: &NodeId) -> ShortestPathTree {
        if !self.contains(source) {
            return ShortestPathTree::trivial(source);
        }
        let mut parents = dijkstra_all(source, |node: &NodeId| {
            self.edges(node)
                .map(|edge| (edge.to.clone(), OrderedFloat(edge.weight)))
        });
        parents.remove(source);
        debug!("shortest-path tree from {source}: {} reachable", parents.len() + 1);
        ShortestPathTree {
            source: source.clone(),
            parents,
        }
    }

    /// Shortest path from `start` to `end`.
    ///
    /// Empty with infinite distance when either node is unknown or `end` is
    /// unreachable.
    pub fn shortest_path(&self, start: &NodeId, end: &NodeId) -> Route {
        if !self.contains(start) || !self.contains(end) {
            return Route::unreachable();
        }
        let tree = self.shortest_paths(start);
        match tree.path_to(end) {
            Some(nodes) => Route {
                distance: tree.distance(end),
                nodes,
            },
            None => Route::unreachable(),
        }
    }

    /// Joins the shortest paths between consecutive waypoints, writing each
    /// boundary node once.
    ///
    /// A segment that cannot be routed is skipped and reported. The next
    /// segment starts from the end of what has been stitched so far, so the
    /// result never jumps between non-adjacent nodes.
    pub fn stitch_continuous(&self, waypoints: &[NodeId]) -> StitchOutcome {
        let mut outcome = StitchOutcome::default();
        let Some((first, rest)) = waypoints.split_first() else {
            return outcome;
        };

        let mut from = first.clone();
        for to in rest {
            let failure = if !self.contains(&from) || !self.contains(to) {
                Some(StitchFailure::MissingNode {
                    from: from.clone(),
                    to: to.clone(),
                })
            } else {
                let route = self.shortest_path(&from, to);
                if route.is_empty() {
                    Some(StitchFailure::Unreachable {
                        from: from.clone(),
                        to: to.clone(),
                    })
                } else {
                    let skip = usize::from(!outcome.path.is_empty());
                    outcome.path.extend(route.nodes.into_iter().skip(skip));
                    None
                }
            };

            if let Some(failure) = failure {
                warn!("stitching: {failure}");
                outcome.skipped.push(failure);
            }

            from = match outcome.path.last() {
                Some(end) => end.clone(),
                None if self.contains(to) => to.clone(),
                None => from,
            };
        }
        outcome
    }
}
