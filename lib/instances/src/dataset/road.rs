use std::borrow::Cow;
use itertools::Itertools;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::{Error, Map, Result};
use crate::metrics::{Haversine, Metric};
use crate::raw::{FromRaw, road::RawRoadGraph};
use super::school::Coord;

/// Dense index of a node inside a [`RoadGraph`].
pub type NodeIdx = u32;

/// Directed road network in compressed sparse row form. Edge lengths are in metres.
#[derive(Debug, Clone, Default)]
pub struct RoadGraph {
  node_ids: Vec<u64>,
  coords: Vec<Coord>,
  first_arc: Vec<usize>,
  targets: Vec<NodeIdx>,
  lengths: Vec<f64>,
  index: Map<u64, NodeIdx>,
  /// Nodes at `[lon * lon_scale, lat]`, so planar distance approximates ground distance.
  node_tree: RTree<GeomWithData<[f64; 2], NodeIdx>>,
  lon_scale: f64,
}

impl RoadGraph {
  pub fn builder() -> RoadGraphBuilder {
    RoadGraphBuilder::default()
  }

  #[inline]
  pub fn num_nodes(&self) -> usize { self.coords.len() }

  #[inline]
  pub fn num_arcs(&self) -> usize { self.targets.len() }

  #[inline]
  pub fn is_empty(&self) -> bool { self.coords.is_empty() }

  #[inline]
  pub fn coord(&self, node: NodeIdx) -> Coord { self.coords[node as usize] }

  #[inline]
  pub fn external_id(&self, node: NodeIdx) -> u64 { self.node_ids[node as usize] }

  pub fn index_of(&self, external_id: u64) -> Option<NodeIdx> {
    self.index.get(&external_id).copied()
  }

  /// Outgoing arcs of `node` as `(head, length in metres)`.
  pub fn arcs(&self, node: NodeIdx) -> impl Iterator<Item=(NodeIdx, f64)> + '_ {
    let node = node as usize;
    let range = self.first_arc[node]..self.first_arc[node + 1];
    self.targets[range.clone()].iter().copied().zip(self.lengths[range].iter().copied())
  }

  #[inline]
  fn planar(&self, c: Coord) -> [f64; 2] {
    [c.lon * self.lon_scale, c.lat]
  }

  /// Node closest to `c`, using an equirectangular projection about the mean latitude of
  /// the graph; at city scale this picks the same node as great-circle distance.
  /// `None` for an empty graph or a non-finite `c`.
  pub fn nearest_node(&self, c: Coord) -> Option<NodeIdx> {
    if !c.is_finite() {
      return None
    }
    self.node_tree.nearest_neighbor(&self.planar(c)).map(|p| p.data)
  }
}

#[derive(Debug, Clone, Default)]
pub struct RoadGraphBuilder {
  nodes: Vec<(u64, Coord)>,
  arcs: Vec<(u64, u64, Option<f64>)>,
}

impl RoadGraphBuilder {
  pub fn node(mut self, id: u64, coord: Coord) -> Self {
    self.nodes.push((id, coord));
    self
  }

  /// Adds a street segment; two-way segments become a pair of opposite arcs.
  /// A `length` of `None` is filled in with the haversine distance between the ends.
  pub fn edge(mut self, from: u64, to: u64, length: Option<f64>, oneway: bool) -> Self {
    self.arcs.push((from, to, length));
    if !oneway {
      self.arcs.push((to, from, length));
    }
    self
  }

  pub fn build(self) -> Result<RoadGraph> {
    let RoadGraphBuilder { nodes, arcs } = self;
    let mut index = Map::with_capacity_and_hasher(nodes.len(), Default::default());
    let mut node_ids = Vec::with_capacity(nodes.len());
    let mut coords = Vec::with_capacity(nodes.len());
    for (id, c) in nodes {
      if !c.is_finite() {
        anyhow::bail!("node {} has a non-finite coordinate {:?}", id, c);
      }
      if index.insert(id, node_ids.len() as NodeIdx).is_some() {
        anyhow::bail!("duplicate node id {}", id);
      }
      node_ids.push(id);
      coords.push(c);
    }

    let lookup = |id: u64| -> Result<NodeIdx> {
      index.get(&id).copied().ok_or_else(|| Error::UnknownGraphNode(id).into())
    };

    let mut resolved = Vec::with_capacity(arcs.len());
    for (from, to, length) in arcs {
      let (u, v) = (lookup(from)?, lookup(to)?);
      let length = match length {
        Some(l) => l,
        None => Haversine::compute(coords[u as usize].as_tuple(), coords[v as usize].as_tuple()) * 1000.0,
      };
      if !length.is_finite() || length < 0.0 {
        anyhow::bail!("edge {} -> {} has invalid length {}", from, to, length);
      }
      resolved.push((u, v, length));
    }

    let n = coords.len();
    let mut first_arc = vec![0usize; n + 1];
    let mut targets = Vec::with_capacity(resolved.len());
    let mut lengths = Vec::with_capacity(resolved.len());
    for (u, v, l) in resolved.into_iter().sorted_by_key(|a| a.0) {
      first_arc[u as usize + 1] += 1;
      targets.push(v);
      lengths.push(l);
    }
    for k in 0..n {
      first_arc[k + 1] += first_arc[k];
    }

    let lon_scale = Coord::mean(coords.iter().copied())
      .map_or(1.0, |m| m.lat.to_radians().cos());
    let points: Vec<GeomWithData<[f64; 2], NodeIdx>> = coords.iter()
      .enumerate()
      .map(|(k, c)| GeomWithData::new([c.lon * lon_scale, c.lat], k as NodeIdx))
      .collect();
    let node_tree = RTree::bulk_load(points);

    Ok(RoadGraph { node_ids, coords, first_arc, targets, lengths, index, node_tree, lon_scale })
  }
}

impl FromRaw<RawRoadGraph> for RoadGraph {
  fn from_raw(raw: RawRoadGraph, _id: Cow<str>) -> Result<RoadGraph> {
    let builder = raw.nodes.into_iter()
      .fold(RoadGraph::builder(), |b, (id, lat, lon)| b.node(id, Coord::new(lat, lon)));
    raw.edges.into_iter()
      .fold(builder, |b, e| b.edge(e.from, e.to, e.length, e.oneway))
      .build()
  }
}
