use tracing::*;

use crate::Error;
use crate::config::{ClassifierKind, PlanConfig};
use crate::data::school::{Classification, Coord, RosterEntry, Student};
use crate::graph::{dijkstra, RoadNetwork, ShortestPathTree};

/// Labels every student as a walker or a rider by their distance to school.
pub trait WalkClassifier {
  /// Distance from `home` to the depot in kilometres, infinite if there is no way there.
  fn distance_km(&self, home: Coord) -> f64;

  fn threshold_km(&self) -> f64;

  fn classify(&self, roster: &[RosterEntry]) -> Vec<Student> {
    let threshold = self.threshold_km();
    let students: Vec<Student> = roster.iter()
      .map(|e| {
        let d = self.distance_km(e.home);
        let class = if d > threshold || !d.is_finite() { Classification::Rider } else { Classification::Walker };
        Student { id: e.id.clone(), name: e.name.clone(), home: e.home, class, distance_to_depot_km: d }
      })
      .collect();
    let riders = students.iter().filter(|s| s.is_rider()).count();
    info!(riders, walkers=students.len() - riders, threshold_km=threshold, "classified students");
    return students
  }
}

pub struct GeodesicClassifier {
  depot: Coord,
  threshold_km: f64,
}

impl GeodesicClassifier {
  pub fn new(depot: Coord, threshold_km: f64) -> Self {
    GeodesicClassifier { depot, threshold_km }
  }
}

impl WalkClassifier for GeodesicClassifier {
  fn distance_km(&self, home: Coord) -> f64 {
    home.distance_km(self.depot)
  }

  fn threshold_km(&self) -> f64 { self.threshold_km }
}

/// Walking distance over a pedestrian network. Homes and school are snapped to their
/// nearest nodes and one shortest-path tree from the school serves every student, so
/// the walking graph is expected to be two-way.
pub struct NetworkClassifier<'a, G> {
  graph: &'a G,
  tree: ShortestPathTree,
  threshold_km: f64,
}

impl<'a, G: RoadNetwork> NetworkClassifier<'a, G> {
  #[instrument(level="debug", skip(graph))]
  pub fn new(graph: &'a G, depot: Coord, threshold_km: f64) -> Result<Self, Error> {
    let school = graph.nearest_node(depot).ok_or(Error::EmptyRoadGraph)?;
    let tree = dijkstra(graph, school);
    debug!(reached=tree.num_reached(), nodes=graph.num_nodes(), "walking tree built");
    Ok(NetworkClassifier { graph, tree, threshold_km })
  }
}

impl<'a, G: RoadNetwork> WalkClassifier for NetworkClassifier<'a, G> {
  fn distance_km(&self, home: Coord) -> f64 {
    self.graph.nearest_node(home)
      .and_then(|n| self.tree.distance(n))
      .map(|m| m / 1000.0)
      .unwrap_or(f64::INFINITY)
  }

  fn threshold_km(&self) -> f64 { self.threshold_km }
}

/// Builds the classifier selected by `config`. `walk_graph` is only consulted by the
/// network classifier.
pub fn classify_roster<G: RoadNetwork>(roster: &[RosterEntry], depot: Coord, walk_graph: &G, config: &PlanConfig)
  -> Result<Vec<Student>, Error>
{
  let students = match config.classifier {
    ClassifierKind::Geodesic =>
      GeodesicClassifier::new(depot, config.walk_threshold_km()).classify(roster),
    ClassifierKind::Network =>
      NetworkClassifier::new(walk_graph, depot, config.network_walk_threshold_km)?.classify(roster),
  };
  Ok(students)
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::data::school::RoadGraph;
  use crate::graph::test_graphs::grid;

  fn entry(id: &str, lat: f64, lon: f64) -> RosterEntry {
    RosterEntry { id: id.into(), name: id.to_lowercase(), home: Coord::new(lat, lon) }
  }

  #[test]
  fn geodesic_threshold() {
    let depot = Coord::new(40.0, -74.0);
    let c = GeodesicClassifier::new(depot, PlanConfig::default().walk_threshold_km());
    // 0.005 deg of latitude is ~0.56 km, 0.01 deg is ~1.11 km; threshold ~0.894 km
    let s = c.classify(&[entry("NEAR", 40.005, -74.0), entry("FAR", 40.01, -74.0)]);
    assert_eq!(s[0].class, Classification::Walker);
    assert_eq!(s[1].class, Classification::Rider);
    assert!((s[1].distance_to_depot_km - 1.112).abs() < 0.01);
  }

  #[test]
  fn boundary_is_a_walker() {
    let depot = Coord::new(40.0, -74.0);
    let home = Coord::new(40.003, -74.0);
    let c = GeodesicClassifier::new(depot, home.distance_km(depot));
    assert_eq!(c.classify(&[entry("X", home.lat, home.lon)])[0].class, Classification::Walker);
  }

  #[test]
  fn network_distance_and_disconnected_homes() {
    // 1 x 5 street: nodes 0.01 deg of longitude apart (~0.85 km at 40N)
    let g = grid(Coord::new(40.0, -74.0), 1, 5, 0.01);
    let c = NetworkClassifier::new(&g, Coord::new(40.0, -74.0), 2.4).unwrap();
    let s = c.classify(&[entry("TWO", 40.0, -73.98), entry("FOUR", 40.0, -73.96)]);
    assert_eq!(s[0].class, Classification::Walker);
    assert_eq!(s[1].class, Classification::Rider);

    let island = RoadGraph::builder()
      .node(1, Coord::new(40.0, -74.0))
      .node(2, Coord::new(40.001, -74.0))
      .build()
      .unwrap();
    let c = NetworkClassifier::new(&island, Coord::new(40.0, -74.0), 2.4).unwrap();
    let s = c.classify(&[entry("STUCK", 40.001, -74.0)]);
    assert_eq!(s[0].class, Classification::Rider);
    assert!(s[0].distance_to_depot_km.is_infinite());
  }

  #[test]
  fn network_needs_nodes() {
    let g = RoadGraph::default();
    assert!(matches!(NetworkClassifier::new(&g, Coord::new(0.0, 0.0), 2.4), Err(Error::EmptyRoadGraph)));
  }

  #[test]
  fn selected_by_config() {
    let g = RoadGraph::default();
    let roster = [entry("A", 40.0, -74.0)];
    let s = classify_roster(&roster, Coord::new(40.0, -74.0), &g, &PlanConfig::default()).unwrap();
    assert_eq!(s[0].class, Classification::Walker);
    let cfg = PlanConfig { classifier: ClassifierKind::Network, ..PlanConfig::default() };
    assert!(classify_roster(&roster, Coord::new(40.0, -74.0), &g, &cfg).is_err());
  }
}
