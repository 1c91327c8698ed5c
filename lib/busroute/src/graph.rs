use std::cmp::Ordering;
use std::collections::BinaryHeap;
use bit_vec::BitVec;
use tracing::*;

use crate::data::school::{Coord, NodeIdx, RoadGraph};

const NO_PRED: NodeIdx = NodeIdx::MAX;

/// Read-only view of a road network. Lengths are in metres.
pub trait RoadNetwork: Sync {
  fn num_nodes(&self) -> usize;

  fn coord(&self, node: NodeIdx) -> Coord;

  fn nearest_node(&self, c: Coord) -> Option<NodeIdx>;

  fn visit_arcs<F: FnMut(NodeIdx, f64)>(&self, node: NodeIdx, f: F);
}

impl RoadNetwork for RoadGraph {
  #[inline]
  fn num_nodes(&self) -> usize { RoadGraph::num_nodes(self) }

  #[inline]
  fn coord(&self, node: NodeIdx) -> Coord { RoadGraph::coord(self, node) }

  fn nearest_node(&self, c: Coord) -> Option<NodeIdx> { RoadGraph::nearest_node(self, c) }

  #[inline]
  fn visit_arcs<F: FnMut(NodeIdx, f64)>(&self, node: NodeIdx, mut f: F) {
    for (v, l) in self.arcs(node) {
      f(v, l)
    }
  }
}

#[derive(Copy, Clone, PartialEq)]
struct State {
  cost: f64,
  node: NodeIdx,
}

impl Eq for State {}

impl Ord for State {
  fn cmp(&self, other: &Self) -> Ordering {
    // min-heap on cost; costs are never NaN
    other.cost.partial_cmp(&self.cost)
      .unwrap_or(Ordering::Equal)
      .then_with(|| self.node.cmp(&other.node))
  }
}

impl PartialOrd for State {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

/// Single-source shortest path distances and predecessor links.
#[derive(Debug, Clone)]
pub struct ShortestPathTree {
  pub source: NodeIdx,
  dist: Vec<f64>,
  pred: Vec<NodeIdx>,
}

impl ShortestPathTree {
  /// Metres from the source, `None` if `target` is unreachable.
  #[inline]
  pub fn distance(&self, target: NodeIdx) -> Option<f64> {
    let d = self.dist[target as usize];
    if d.is_finite() { Some(d) } else { None }
  }

  /// Node sequence from the source to `target`, both inclusive.
  pub fn path_to(&self, target: NodeIdx) -> Option<Vec<NodeIdx>> {
    self.distance(target)?;
    let mut path = vec![target];
    let mut node = target;
    while node != self.source {
      node = self.pred[node as usize];
      debug_assert_ne!(node, NO_PRED);
      path.push(node);
    }
    path.reverse();
    return Some(path)
  }

  pub fn num_reached(&self) -> usize {
    self.dist.iter().filter(|d| d.is_finite()).count()
  }
}

#[instrument(level="trace", skip(graph))]
pub fn dijkstra<G: RoadNetwork>(graph: &G, source: NodeIdx) -> ShortestPathTree {
  let n = graph.num_nodes();
  let mut dist = vec![f64::INFINITY; n];
  let mut pred = vec![NO_PRED; n];
  let mut settled = BitVec::from_elem(n, false);
  let mut heap = BinaryHeap::new();

  dist[source as usize] = 0.0;
  heap.push(State { cost: 0.0, node: source });

  while let Some(State { cost, node }) = heap.pop() {
    if settled[node as usize] {
      continue;
    }
    settled.set(node as usize, true);

    graph.visit_arcs(node, |v, l| {
      let next = cost + l;
      if !settled[v as usize] && next < dist[v as usize] {
        dist[v as usize] = next;
        pred[v as usize] = node;
        heap.push(State { cost: next, node: v });
      }
    });
  }

  let tree = ShortestPathTree { source, dist, pred };
  trace!(reached=tree.num_reached(), "tree built");
  return tree
}


#[cfg(test)]
pub(crate) mod test_graphs {
  use super::*;

  /// `rows x cols` two-way street grid anchored at `origin`, `step` degrees apart.
  /// Node ids are `r * cols + c`.
  pub fn grid(origin: Coord, rows: u64, cols: u64, step: f64) -> RoadGraph {
    let mut b = RoadGraph::builder();
    for r in 0..rows {
      for c in 0..cols {
        b = b.node(r * cols + c, Coord::new(origin.lat + r as f64 * step, origin.lon + c as f64 * step));
      }
    }
    for r in 0..rows {
      for c in 0..cols {
        let id = r * cols + c;
        if c + 1 < cols { b = b.edge(id, id + 1, None, false); }
        if r + 1 < rows { b = b.edge(id, id + cols, None, false); }
      }
    }
    b.build().unwrap()
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use super::test_graphs::grid;

  fn diamond() -> RoadGraph {
    // 1 -> 2 -> 4 is shorter than 1 -> 3 -> 4; node 5 is isolated
    RoadGraph::builder()
      .node(1, Coord::new(0.0, 0.0))
      .node(2, Coord::new(0.0, 0.001))
      .node(3, Coord::new(0.001, 0.0))
      .node(4, Coord::new(0.001, 0.001))
      .node(5, Coord::new(1.0, 1.0))
      .edge(1, 2, Some(100.0), true)
      .edge(2, 4, Some(100.0), true)
      .edge(1, 3, Some(50.0), true)
      .edge(3, 4, Some(500.0), true)
      .build()
      .unwrap()
  }

  #[test]
  fn shortest_distances() {
    let g = diamond();
    let idx = |id| g.index_of(id).unwrap();
    let t = dijkstra(&g, idx(1));
    assert_eq!(t.distance(idx(1)), Some(0.0));
    assert_eq!(t.distance(idx(4)), Some(200.0));
    assert_eq!(t.distance(idx(3)), Some(50.0));
    assert_eq!(t.distance(idx(5)), None);
    assert_eq!(t.path_to(idx(4)), Some(vec![idx(1), idx(2), idx(4)]));
    assert_eq!(t.path_to(idx(5)), None);
    assert_eq!(t.num_reached(), 4);
  }

  #[test]
  fn one_way_streets() {
    let g = diamond();
    let idx = |id| g.index_of(id).unwrap();
    let t = dijkstra(&g, idx(4));
    assert_eq!(t.num_reached(), 1);
    assert_eq!(t.path_to(idx(4)), Some(vec![idx(4)]));
  }

  #[test]
  fn grid_is_connected() {
    let g = grid(Coord::new(40.0, -74.0), 3, 4, 0.001);
    assert_eq!(g.num_nodes(), 12);
    let t = dijkstra(&g, 0);
    assert_eq!(t.num_reached(), 12);
    let far = g.index_of(11).unwrap();
    assert_eq!(t.path_to(far).unwrap().len(), 6);
  }
}
