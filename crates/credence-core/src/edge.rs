//! SUPPORTS edges and the in-memory graph index over them.
//!
//! The store owns the canonical edge table. [`SupportGraph`] is an index
//! built from it that answers both the `supports` (outgoing) and
//! `supported_by` (incoming) views, and is the single enforcement point for
//! acyclicity: an edge is checked before it is inserted, so traversal never
//! needs cycle detection.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use petgraph::{
  Direction,
  stable_graph::{NodeIndex, StableDiGraph},
  visit::{Dfs, EdgeRef, Reversed},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, belief::BeliefId};

/// `source` SUPPORTS `target` with `weight` in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportEdge {
  pub source:     BeliefId,
  pub target:     BeliefId,
  pub weight:     f64,
  pub created_at: DateTime<Utc>,
}

impl SupportEdge {
  pub fn validate(&self) -> Result<()> {
    if !self.weight.is_finite() || !(0.0..=1.0).contains(&self.weight) {
      return Err(Error::Validation(format!(
        "edge weight must be in [0.0, 1.0], got {}",
        self.weight
      )));
    }
    Ok(())
  }
}

// ─── Graph index ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
pub struct SupportGraph {
  graph: StableDiGraph<BeliefId, f64>,
  nodes: HashMap<BeliefId, NodeIndex>,
}

impl SupportGraph {
  pub fn new() -> Self { Self::default() }

  /// Build the index from a loaded edge table. Rejects tables that already
  /// contain a cycle or a duplicate edge.
  pub fn from_edges<'a>(
    edges: impl IntoIterator<Item = &'a SupportEdge>,
  ) -> Result<Self> {
    let mut graph = Self::new();
    for edge in edges {
      graph.insert(edge)?;
    }
    Ok(graph)
  }

  fn node(&mut self, id: &BeliefId) -> NodeIndex {
    if let Some(index) = self.nodes.get(id) {
      return *index;
    }
    let index = self.graph.add_node(id.clone());
    self.nodes.insert(id.clone(), index);
    index
  }

  pub fn edge_count(&self) -> usize { self.graph.edge_count() }

  pub fn contains_edge(&self, source: &BeliefId, target: &BeliefId) -> bool {
    match (self.nodes.get(source), self.nodes.get(target)) {
      (Some(s), Some(t)) => self.graph.contains_edge(*s, *t),
      _ => false,
    }
  }

  /// `true` if a path `from → … → to` exists (a node reaches itself).
  pub fn reaches(&self, from: &BeliefId, to: &BeliefId) -> bool {
    if from == to {
      return true;
    }
    let (Some(start), Some(goal)) = (self.nodes.get(from), self.nodes.get(to))
    else {
      return false;
    };
    let mut dfs = Dfs::new(&self.graph, *start);
    while let Some(node) = dfs.next(&self.graph) {
      if node == *goal {
        return true;
      }
    }
    false
  }

  /// Adding `source → target` closes a cycle iff `target` already reaches
  /// `source`. Self-loops are cycles.
  pub fn would_create_cycle(&self, source: &BeliefId, target: &BeliefId) -> bool {
    self.reaches(target, source)
  }

  /// Check an edge against the index without inserting it.
  pub fn check(&self, edge: &SupportEdge) -> Result<()> {
    edge.validate()?;
    if self.would_create_cycle(&edge.source, &edge.target) {
      return Err(Error::Cycle {
        source_id: edge.source.clone(),
        target_id: edge.target.clone(),
      });
    }
    if self.contains_edge(&edge.source, &edge.target) {
      return Err(Error::Validation(format!(
        "support edge {} -> {} already exists",
        edge.source, edge.target
      )));
    }
    Ok(())
  }

  /// Validate and insert. On error the index is unchanged.
  pub fn insert(&mut self, edge: &SupportEdge) -> Result<()> {
    self.check(edge)?;
    let source = self.node(&edge.source);
    let target = self.node(&edge.target);
    self.graph.add_edge(source, target, edge.weight);
    Ok(())
  }

  fn neighbors(&self, id: &BeliefId, direction: Direction) -> Vec<(BeliefId, f64)> {
    let Some(index) = self.nodes.get(id) else {
      return Vec::new();
    };
    let mut out: Vec<(BeliefId, f64)> = self
      .graph
      .edges_directed(*index, direction)
      .map(|edge| {
        let other = match direction {
          Direction::Incoming => edge.source(),
          Direction::Outgoing => edge.target(),
        };
        (self.graph[other].clone(), *edge.weight())
      })
      .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
  }

  /// Beliefs that support `id`, with edge weights.
  pub fn supported_by(&self, id: &BeliefId) -> Vec<(BeliefId, f64)> {
    self.neighbors(id, Direction::Incoming)
  }

  /// Beliefs that `id` supports, with edge weights.
  pub fn supports(&self, id: &BeliefId) -> Vec<(BeliefId, f64)> {
    self.neighbors(id, Direction::Outgoing)
  }

  /// Every belief reachable from `id` over outgoing edges, excluding `id`.
  pub fn descendants(&self, id: &BeliefId) -> BTreeSet<BeliefId> {
    let Some(start) = self.nodes.get(id) else {
      return BTreeSet::new();
    };
    let mut found = BTreeSet::new();
    let mut dfs = Dfs::new(&self.graph, *start);
    while let Some(node) = dfs.next(&self.graph) {
      if node != *start {
        found.insert(self.graph[node].clone());
      }
    }
    found
  }

  /// Every belief that reaches `id` over incoming edges, excluding `id`.
  pub fn ancestors(&self, id: &BeliefId) -> BTreeSet<BeliefId> {
    let Some(start) = self.nodes.get(id) else {
      return BTreeSet::new();
    };
    let reversed = Reversed(&self.graph);
    let mut found = BTreeSet::new();
    let mut dfs = Dfs::new(reversed, *start);
    while let Some(node) = dfs.next(reversed) {
      if node != *start {
        found.insert(self.graph[node].clone());
      }
    }
    found
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn edge(source: &str, target: &str, weight: f64) -> SupportEdge {
    SupportEdge {
      source: BeliefId::from(source),
      target: BeliefId::from(target),
      weight,
      created_at: Utc::now(),
    }
  }

  fn id(s: &str) -> BeliefId { BeliefId::from(s) }

  #[test]
  fn closing_edge_is_rejected_and_graph_unchanged() {
    let mut graph =
      SupportGraph::from_edges(&[edge("a", "b", 0.5), edge("b", "c", 0.5)])
        .unwrap();
    let err = graph.insert(&edge("c", "a", 0.5)).unwrap_err();
    assert!(matches!(err, Error::Cycle { .. }));
    assert_eq!(graph.edge_count(), 2);
    assert!(!graph.contains_edge(&id("c"), &id("a")));
  }

  #[test]
  fn self_loop_is_a_cycle() {
    let mut graph = SupportGraph::new();
    assert!(matches!(
      graph.insert(&edge("a", "a", 0.5)),
      Err(Error::Cycle { .. })
    ));
  }

  #[test]
  fn duplicate_edge_is_a_validation_error() {
    let mut graph = SupportGraph::from_edges(&[edge("a", "b", 0.5)]).unwrap();
    assert!(matches!(
      graph.insert(&edge("a", "b", 0.9)),
      Err(Error::Validation(_))
    ));
  }

  #[test]
  fn weight_out_of_range_is_rejected() {
    let mut graph = SupportGraph::new();
    assert!(matches!(
      graph.insert(&edge("a", "b", 1.5)),
      Err(Error::Validation(_))
    ));
    assert_eq!(graph.edge_count(), 0);
  }

  #[test]
  fn diamond_is_not_a_cycle() {
    let graph = SupportGraph::from_edges(&[
      edge("a", "b", 0.5),
      edge("a", "c", 0.5),
      edge("b", "d", 0.5),
      edge("c", "d", 0.5),
    ])
    .unwrap();
    assert_eq!(graph.edge_count(), 4);
    assert_eq!(
      graph.descendants(&id("a")),
      [id("b"), id("c"), id("d")].into_iter().collect()
    );
    assert_eq!(
      graph.ancestors(&id("d")),
      [id("a"), id("b"), id("c")].into_iter().collect()
    );
  }

  #[test]
  fn views_over_one_edge_table() {
    let graph = SupportGraph::from_edges(&[edge("a", "b", 0.8)]).unwrap();
    assert_eq!(graph.supports(&id("a")), vec![(id("b"), 0.8)]);
    assert_eq!(graph.supported_by(&id("b")), vec![(id("a"), 0.8)]);
    assert!(graph.supported_by(&id("a")).is_empty());
  }
}
