//! Dependency graph with mirrored adjacency views.
//!
//! The graph keeps two mappings that are exact mirrors of each other:
//!
//! - `downstream_of`: upstream -> set of items that depend on it
//! - `upstream_of`: downstream -> set of items it depends on
//!
//! Every mutation updates both views, and a set that becomes empty is removed
//! from its map so that no dangling entries are left behind.
//!
//! # Edge Direction Convention
//!
//! An edge `U -> D` means **D depends on U**: when `U` changes, `D` must be
//! invalidated. This is the direction notifications flow.
//!
//! # Cycle Rejection
//!
//! Before an edge `U -> D` is inserted, [`DependencyGraph::is_valid_dependency`]
//! collects every transitive ancestor of `U` by walking `upstream_of`
//! backward, and rejects the edge if `D` is among them. Only the existing
//! ancestor set is walked; the closure with the new edge included is never
//! materialized.

use crate::domain::{DependencyEdge, MetadataId};
use crate::error::{Error, Result};
use petgraph::algo;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Directed acyclic graph of metadata item dependencies.
///
/// Ordered maps keep iteration deterministic, which makes fan-out order
/// reproducible across runs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    /// upstream -> downstream-set
    downstream_of: BTreeMap<MetadataId, BTreeSet<MetadataId>>,

    /// downstream -> upstream-set
    upstream_of: BTreeMap<MetadataId, BTreeSet<MetadataId>>,
}

/// Serializable dump of every edge in the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// All edges, sorted by upstream then downstream
    pub edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    /// Create an empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `downstream` depends on `upstream`.
    ///
    /// Registering an edge that already exists is a no-op.
    ///
    /// # Errors
    ///
    /// - [`Error::SelfDependency`] if `upstream == downstream`
    /// - [`Error::CircularDependency`] if the edge would close a cycle
    pub fn register_dependency(
        &mut self,
        upstream: &MetadataId,
        downstream: &MetadataId,
    ) -> Result<()> {
        if upstream == downstream {
            return Err(Error::SelfDependency(upstream.clone()));
        }

        if !self.is_valid_dependency(upstream, downstream) {
            return Err(Error::CircularDependency {
                upstream: upstream.clone(),
                downstream: downstream.clone(),
            });
        }

        self.downstream_of
            .entry(upstream.clone())
            .or_default()
            .insert(downstream.clone());
        self.upstream_of
            .entry(downstream.clone())
            .or_default()
            .insert(upstream.clone());

        Ok(())
    }

    /// Check whether `upstream -> downstream` may be added.
    ///
    /// Returns `true` immediately for an edge that already exists. Otherwise
    /// returns `true` iff `downstream` is not a transitive ancestor of
    /// `upstream`.
    #[must_use]
    pub fn is_valid_dependency(&self, upstream: &MetadataId, downstream: &MetadataId) -> bool {
        if self.contains(upstream, downstream) {
            return true;
        }

        !self.ancestors(upstream).contains(downstream)
    }

    /// Every item `id` transitively depends on, not including `id` itself.
    fn ancestors(&self, id: &MetadataId) -> BTreeSet<&MetadataId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            let Some(upstreams) = self.upstream_of.get(current) else {
                continue;
            };
            for upstream in upstreams {
                if seen.insert(upstream) {
                    stack.push(upstream);
                }
            }
        }

        seen
    }

    /// Remove a single edge. Returns `true` if the edge existed.
    pub fn deregister_dependency(&mut self, upstream: &MetadataId, downstream: &MetadataId) -> bool {
        let removed = remove_from(&mut self.downstream_of, upstream, downstream);
        let mirrored = remove_from(&mut self.upstream_of, downstream, upstream);
        debug_assert_eq!(removed, mirrored, "adjacency views out of sync");
        removed
    }

    /// Remove every edge whose downstream is `downstream`.
    ///
    /// Used when an item is discarded. Returns the number of edges removed.
    pub fn deregister_dependencies(&mut self, downstream: &MetadataId) -> usize {
        let Some(upstreams) = self.upstream_of.remove(downstream) else {
            return 0;
        };

        for upstream in &upstreams {
            remove_from(&mut self.downstream_of, upstream, downstream);
        }

        upstreams.len()
    }

    /// Snapshot of the items that directly depend on `upstream`.
    #[must_use]
    pub fn get_downstream(&self, upstream: &MetadataId) -> BTreeSet<MetadataId> {
        self.downstream_of.get(upstream).cloned().unwrap_or_default()
    }

    /// Snapshot of the items `downstream` directly depends on.
    #[must_use]
    pub fn get_upstream(&self, downstream: &MetadataId) -> BTreeSet<MetadataId> {
        self.upstream_of.get(downstream).cloned().unwrap_or_default()
    }

    /// Returns `true` if the edge `upstream -> downstream` exists.
    #[must_use]
    pub fn contains(&self, upstream: &MetadataId, downstream: &MetadataId) -> bool {
        self.downstream_of
            .get(upstream)
            .is_some_and(|set| set.contains(downstream))
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.downstream_of.values().map(BTreeSet::len).sum()
    }

    /// Returns `true` if the graph has no edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.downstream_of.is_empty()
    }

    /// Every identifier that appears on either end of an edge.
    #[must_use]
    pub fn identifiers(&self) -> BTreeSet<MetadataId> {
        self.downstream_of
            .keys()
            .chain(self.upstream_of.keys())
            .cloned()
            .collect()
    }

    /// All edges, sorted by upstream then downstream.
    #[must_use]
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.downstream_of
            .iter()
            .flat_map(|(upstream, downstreams)| {
                downstreams.iter().map(move |downstream| DependencyEdge {
                    upstream: upstream.clone(),
                    downstream: downstream.clone(),
                })
            })
            .collect()
    }

    /// Serializable dump of the graph.
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            edges: self.edges(),
        }
    }

    /// Every item that transitively depends on `upstream`, with its depth.
    ///
    /// Breadth-first, so each item is reported at its shortest distance.
    /// Direct dependents have depth 1. When `max_depth` is set, items further
    /// away are not reported.
    #[must_use]
    pub fn transitive_downstream(
        &self,
        upstream: &MetadataId,
        max_depth: Option<usize>,
    ) -> Vec<(MetadataId, usize)> {
        let mut result = Vec::new();
        let mut visited = BTreeSet::new();
        let mut queue: VecDeque<(&MetadataId, usize)> = VecDeque::new();
        visited.insert(upstream);
        queue.push_back((upstream, 0));

        while let Some((current, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }

            let Some(downstreams) = self.downstream_of.get(current) else {
                continue;
            };
            for downstream in downstreams {
                if visited.insert(downstream) {
                    result.push((downstream.clone(), depth + 1));
                    queue.push_back((downstream, depth + 1));
                }
            }
        }

        result
    }

    /// All identifiers ordered so that every upstream precedes its downstreams.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CycleDetected`] if the graph contains a cycle, which
    /// registration is supposed to make impossible.
    pub fn topological_order(&self) -> Result<Vec<MetadataId>> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for (upstream, downstreams) in &self.downstream_of {
            for downstream in downstreams {
                graph.add_edge(upstream.as_str(), downstream.as_str(), ());
            }
        }

        match algo::toposort(&graph, None) {
            Ok(order) => order.into_iter().map(MetadataId::new).collect(),
            Err(cycle) => Err(Error::CycleDetected(MetadataId::new(cycle.node_id())?)),
        }
    }

    /// Verify that both adjacency views mirror each other exactly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphInconsistency`] describing the first mismatch
    /// found.
    pub fn check_consistency(&self) -> Result<()> {
        check_mirrored(&self.downstream_of, &self.upstream_of, "downstream")?;
        check_mirrored(&self.upstream_of, &self.downstream_of, "upstream")
    }
}

/// Remove `value` from `map[key]`, dropping the entry once it is empty.
fn remove_from(
    map: &mut BTreeMap<MetadataId, BTreeSet<MetadataId>>,
    key: &MetadataId,
    value: &MetadataId,
) -> bool {
    let Some(set) = map.get_mut(key) else {
        return false;
    };
    let removed = set.remove(value);
    if set.is_empty() {
        map.remove(key);
    }
    removed
}

fn check_mirrored(
    view: &BTreeMap<MetadataId, BTreeSet<MetadataId>>,
    mirror: &BTreeMap<MetadataId, BTreeSet<MetadataId>>,
    name: &str,
) -> Result<()> {
    for (key, values) in view {
        if values.is_empty() {
            return Err(Error::GraphInconsistency(format!(
                "empty {name} set left for {key}"
            )));
        }
        for value in values {
            if !mirror.get(value).is_some_and(|set| set.contains(key)) {
                return Err(Error::GraphInconsistency(format!(
                    "{name} view has {key} -> {value} without its mirror"
                )));
            }
        }
    }
    Ok(())
}
