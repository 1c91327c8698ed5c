use itertools::Itertools;
use ndarray::Array2;
use rayon::prelude::*;
use tracing::*;

use crate::*;
use crate::data::school::{Coord, NodeIdx, Stop};
use crate::graph::{dijkstra, RoadNetwork};

/// Matrix entry for a pair of stops the road graph does not connect.
pub const UNREACHABLE: i64 = 1_000_000;

/// Square stop-indexed matrix of road distances in whole metres.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix(Array2<i64>);

impl DistanceMatrix {
  pub fn from_array(a: Array2<i64>) -> Self {
    debug_assert_eq!(a.nrows(), a.ncols());
    DistanceMatrix(a)
  }

  /// Builds a matrix from a closure, mostly for tests.
  pub fn from_fn(n: usize, f: impl Fn(usize, usize) -> i64) -> Self {
    DistanceMatrix(Array2::from_shape_fn((n, n), |(i, j)| if i == j { 0 } else { f(i, j) }))
  }

  #[inline]
  pub fn len(&self) -> usize { self.0.nrows() }

  #[inline]
  pub fn is_empty(&self) -> bool { self.len() == 0 }

  #[inline]
  pub fn get(&self, i: usize, j: usize) -> i64 { self.0[[i, j]] }

  pub fn as_array(&self) -> &Array2<i64> { &self.0 }

  /// Sum of consecutive entries along `stops`.
  pub fn path_length(&self, stops: &[usize]) -> i64 {
    stops.iter().tuple_windows().map(|(&i, &j)| self.get(i, j)).sum()
  }
}

/// Where a stop joins the road graph. Pickup stops are shown at their node; the depot
/// keeps its own position.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Snap {
  pub node: NodeIdx,
  pub coord: Coord,
}

pub struct DistanceOracle {
  pub snaps: Vec<Snap>,
  pub matrix: DistanceMatrix,
  /// Node paths between every ordered pair of distinct, connected stop nodes.
  paths: Map<(NodeIdx, NodeIdx), Vec<NodeIdx>>,
  pub unreachable_pairs: usize,
}

struct SourceRow {
  source: NodeIdx,
  dist: Vec<Option<f64>>,
  paths: Vec<(NodeIdx, Vec<NodeIdx>)>,
}

impl DistanceOracle {
  #[instrument(level="info", skip(graph, stops), fields(stops=stops.len(), nodes=graph.num_nodes()))]
  pub fn build<G: RoadNetwork>(graph: &G, stops: &[Stop]) -> Result<Self, Error> {
    if graph.num_nodes() == 0 {
      return Err(Error::EmptyRoadGraph)
    }
    let snaps = stops.iter()
      .map(|s| {
        let node = graph.nearest_node(s.centroid).ok_or(Error::EmptyRoadGraph)?;
        let coord = if s.is_depot() { s.centroid } else { graph.coord(node) };
        Ok(Snap { node, coord })
      })
      .collect::<Result<Vec<_>, Error>>()?;

    let nodes: Vec<NodeIdx> = snaps.iter().map(|s| s.node).sorted().dedup().collect();
    let column: Map<NodeIdx, usize> = nodes.iter().enumerate().map(|(k, &n)| (n, k)).collect();

    let rows: Vec<SourceRow> = nodes.par_iter()
      .map(|&source| {
        let tree = dijkstra(graph, source);
        let dist = nodes.iter().map(|&t| tree.distance(t)).collect();
        let paths = nodes.iter()
          .filter(|&&t| t != source)
          .filter_map(|&t| tree.path_to(t).map(|p| (t, p)))
          .collect();
        SourceRow { source, dist, paths }
      })
      .collect();
    debug!(sources=rows.len(), "shortest path trees done");

    let n = stops.len();
    let mut matrix = Array2::<i64>::zeros((n, n));
    let mut unreachable_pairs = 0;
    for i in 0..n {
      let row = &rows[column[&snaps[i].node]];
      for j in 0..n {
        if i == j { continue; }
        matrix[[i, j]] = match row.dist[column[&snaps[j].node]] {
          Some(d) => d.round() as i64,
          None => {
            unreachable_pairs += 1;
            UNREACHABLE
          }
        };
      }
    }
    if unreachable_pairs > 0 {
      warn!(unreachable_pairs, "some stops are not connected");
    }

    let mut paths = Map::default();
    for row in rows {
      for (t, p) in row.paths {
        paths.insert((row.source, t), p);
      }
    }

    info!(distinct_nodes=nodes.len(), paths=paths.len(), "distance matrix built");
    Ok(DistanceOracle { snaps, matrix: DistanceMatrix(matrix), paths, unreachable_pairs })
  }

  /// Road nodes from stop `i` to stop `j`. Stops sharing a node give that single node.
  pub fn path(&self, i: usize, j: usize) -> Option<Vec<NodeIdx>> {
    let (u, v) = (self.snaps[i].node, self.snaps[j].node);
    if u == v {
      return Some(vec![u])
    }
    self.paths.get(&(u, v)).cloned()
  }

  /// Road geometry of a stop sequence. Legs without a road connection are drawn as a
  /// straight line between the two stops.
  pub fn polyline<G: RoadNetwork>(&self, graph: &G, stops: &[usize]) -> Vec<Coord> {
    let mut line: Vec<Coord> = Vec::new();
    for (&i, &j) in stops.iter().tuple_windows() {
      let leg: Vec<Coord> = match self.path(i, j) {
        Some(p) => p.into_iter().map(|n| graph.coord(n)).collect(),
        None => vec![self.snaps[i].coord, self.snaps[j].coord],
      };
      let skip = if line.last() == leg.first() { 1 } else { 0 };
      line.extend(leg.into_iter().skip(skip));
    }
    line
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;
  use crate::data::school::{RoadGraph, StopId};
  use crate::graph::test_graphs::grid;

  fn stop_at(cluster: u32, lat: f64, lon: f64) -> Stop {
    Stop { id: StopId::cluster(cluster), centroid: Coord::new(lat, lon), students: vec![format!("s{}", cluster)] }
  }

  fn line_graph() -> RoadGraph {
    RoadGraph::builder()
      .node(1, Coord::new(40.0, -74.0))
      .node(2, Coord::new(40.0, -74.01))
      .node(3, Coord::new(40.0, -74.02))
      .node(4, Coord::new(41.0, -74.0))
      .edge(1, 2, Some(1000.4), false)
      .edge(2, 3, Some(999.5), false)
      .build()
      .unwrap()
  }

  #[test]
  fn matrix_and_paths() -> anyhow::Result<()> {
    let g = line_graph();
    let stops = vec![
      Stop::depot(Coord::new(40.0001, -74.0001)),
      stop_at(0, 40.0, -74.0201),
      stop_at(1, 40.0, -74.0099),
    ];
    let o = DistanceOracle::build(&g, &stops)?;
    let m = &o.matrix;
    assert_eq!(m.len(), 3);
    assert_eq!(m.get(0, 1), 2000);
    assert_eq!(m.get(1, 2), 1000);
    assert_eq!(m.get(2, 0), 1000);
    assert_eq!(o.snaps[0].coord, Coord::new(40.0001, -74.0001));
    assert_eq!(o.snaps[1].coord, Coord::new(40.0, -74.02));
    assert_eq!(m.path_length(&[0, 2, 1, 0]), 1000 + 1000 + 2000);

    let idx = |id| g.index_of(id).unwrap();
    assert_eq!(o.path(0, 1), Some(vec![idx(1), idx(2), idx(3)]));
    assert_eq!(o.polyline(&g, &[0, 1, 0]).len(), 5);
    assert_eq!(o.unreachable_pairs, 0);
    Ok(())
  }

  #[test]
  fn disconnected_stops_get_sentinel() -> anyhow::Result<()> {
    let g = line_graph();
    let stops = vec![Stop::depot(Coord::new(40.0, -74.0)), stop_at(0, 41.0, -74.0)];
    let o = DistanceOracle::build(&g, &stops)?;
    assert_eq!(o.matrix.get(0, 1), UNREACHABLE);
    assert_eq!(o.matrix.get(1, 0), UNREACHABLE);
    assert_eq!(o.unreachable_pairs, 2);
    assert_eq!(o.path(0, 1), None);
    assert_eq!(o.polyline(&g, &[0, 1]), vec![Coord::new(40.0, -74.0), Coord::new(41.0, -74.0)]);
    Ok(())
  }

  #[test]
  fn stops_on_one_node() -> anyhow::Result<()> {
    let g = line_graph();
    let stops = vec![Stop::depot(Coord::new(40.0, -74.0)), stop_at(0, 40.0, -74.0), stop_at(1, 40.0, -74.0)];
    let o = DistanceOracle::build(&g, &stops)?;
    assert!(o.matrix.as_array().iter().all(|&d| d == 0));
    assert_eq!(o.path(1, 2), Some(vec![g.index_of(1).unwrap()]));
    Ok(())
  }

  #[test]
  fn empty_graph_is_an_error() {
    let stops = vec![Stop::depot(Coord::new(40.0, -74.0))];
    assert!(matches!(DistanceOracle::build(&RoadGraph::default(), &stops), Err(Error::EmptyRoadGraph)));
  }

  proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn zero_diagonal_and_symmetric_on_two_way_streets(
      pts in prop::collection::vec((40.0f64..40.004, -74.0f64..-73.996), 1..8),
    ) {
      let g = grid(Coord::new(40.0, -74.0), 5, 5, 0.001);
      let mut stops = vec![Stop::depot(Coord::new(40.0, -74.0))];
      stops.extend(pts.iter().enumerate().map(|(k, &(lat, lon))| stop_at(k as u32, lat, lon)));
      let o = DistanceOracle::build(&g, &stops).unwrap();
      let m = &o.matrix;
      for i in 0..m.len() {
        prop_assert_eq!(m.get(i, i), 0);
        for j in 0..m.len() {
          prop_assert!((m.get(i, j) - m.get(j, i)).abs() <= 1);
          prop_assert!(m.get(i, j) < UNREACHABLE);
        }
      }
    }
  }
}
