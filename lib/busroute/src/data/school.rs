use std::fmt;

pub use instances::dataset::{
  Coord,
  RosterEntry,
  RoadGraph,
  NodeIdx,
  SchoolInstance,
};

pub type StudentId = String;
pub type Demand = u32;

/// Position of the depot in every stop list produced by the pipeline.
pub const DEPOT: usize = 0;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Classification {
  Walker,
  Rider,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Student {
  pub id: StudentId,
  pub name: String,
  pub home: Coord,
  pub class: Classification,
  /// Kilometres. Infinite when the network classifier found no walking path.
  pub distance_to_depot_km: f64,
}

impl Student {
  #[inline]
  pub fn is_rider(&self) -> bool {
    self.class == Classification::Rider
  }
}

/// Stop identifier. Clusters are numbered per run; capacity splits keep the cluster
/// number and add a 1-based `part`, with `part == 0` meaning "not split".
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum StopId {
  Depot,
  Cluster { cluster: u32, part: u32 },
}

impl StopId {
  pub fn cluster(cluster: u32) -> Self {
    StopId::Cluster { cluster, part: 0 }
  }

  /// Derived id of the `part`-th sibling (1-based) of a split stop.
  pub fn sibling(self, part: u32) -> Self {
    match self {
      StopId::Depot => StopId::Depot,
      StopId::Cluster { cluster, .. } => StopId::Cluster { cluster, part },
    }
  }
}

impl fmt::Display for StopId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StopId::Depot => f.write_str("school"),
      StopId::Cluster { cluster, part: 0 } => write!(f, "{}", cluster),
      StopId::Cluster { cluster, part } => write!(f, "{}_part{}", cluster, part),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
  pub id: StopId,
  pub centroid: Coord,
  pub students: Vec<StudentId>,
}

impl Stop {
  pub fn depot(at: Coord) -> Self {
    Stop { id: StopId::Depot, centroid: at, students: Vec::new() }
  }

  #[inline]
  pub fn is_depot(&self) -> bool {
    self.id == StopId::Depot
  }

  #[inline]
  pub fn demand(&self) -> Demand {
    if self.is_depot() { 0 } else { self.students.len() as Demand }
  }
}

pub trait StopsExt {
  fn demands(&self) -> Vec<Demand>;
  fn total_demand(&self) -> Demand;
  fn num_pickup_stops(&self) -> usize;
}

impl StopsExt for [Stop] {
  fn demands(&self) -> Vec<Demand> {
    self.iter().map(Stop::demand).collect()
  }

  fn total_demand(&self) -> Demand {
    self.iter().map(Stop::demand).sum()
  }

  fn num_pickup_stops(&self) -> usize {
    self.iter().filter(|s| !s.is_depot()).count()
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stop_id_display() {
    assert_eq!(StopId::Depot.to_string(), "school");
    assert_eq!(StopId::cluster(7).to_string(), "7");
    assert_eq!(StopId::cluster(7).sibling(2).to_string(), "7_part2");
  }

  #[test]
  fn depot_has_no_demand() {
    let stops = vec![
      Stop::depot(Coord::new(0.0, 0.0)),
      Stop { id: StopId::cluster(0), centroid: Coord::new(1.0, 1.0), students: vec!["a".into(), "b".into()] },
    ];
    assert_eq!(stops.demands(), vec![0, 2]);
    assert_eq!(stops.total_demand(), 2);
    assert_eq!(stops.num_pickup_stops(), 1);
  }
}
