use std::borrow::Cow;
use std::path::Path;
use lazy_static::lazy_static;

use super::*;
use super::road::RoadGraph;
use crate::metrics::{Haversine, Metric};
use crate::parsers::{ParseInstance, RosterFmt, RoadGraphFmt};
use crate::raw::{FromRaw, roster::RawRoster, road::RawRoadGraph};

/// WGS-84 position in degrees.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Coord {
  pub lat: f64,
  pub lon: f64,
}

impl Coord {
  #[inline]
  pub fn new(lat: f64, lon: f64) -> Self { Coord { lat, lon } }

  #[inline]
  pub fn as_tuple(self) -> (f64, f64) { (self.lat, self.lon) }

  #[inline]
  pub fn is_finite(&self) -> bool { self.lat.is_finite() && self.lon.is_finite() }

  pub fn in_range(&self) -> bool {
    (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
  }

  /// Great-circle distance in kilometres.
  #[inline]
  pub fn distance_km(self, other: Coord) -> f64 {
    Haversine::compute(self.as_tuple(), other.as_tuple())
  }

  /// Arithmetic mean of the given positions, `None` when empty.
  pub fn mean(coords: impl IntoIterator<Item=Coord>) -> Option<Coord> {
    let (n, lat, lon) = coords.into_iter()
      .fold((0usize, 0.0, 0.0), |(n, lat, lon), c| (n + 1, lat + c.lat, lon + c.lon));
    if n == 0 { None } else { Some(Coord::new(lat / n as f64, lon / n as f64)) }
  }
}

/// A roster row as handed over by the ingestion side; not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
  pub id: String,
  pub name: String,
  pub home: Coord,
}

pub struct SchoolInstance {
  pub id: String,
  pub depot: Coord,
  pub roster: Vec<RosterEntry>,
  pub road: RoadGraph,
}

impl FromRaw<(RawRoster, RawRoadGraph)> for SchoolInstance {
  fn from_raw((roster, road): (RawRoster, RawRoadGraph), id: Cow<str>) -> Result<SchoolInstance> {
    let road = RoadGraph::from_raw(road, id.clone())?;
    let depot = Coord::new(roster.depot.0, roster.depot.1);
    let roster = roster.students.into_iter()
      .map(|s| RosterEntry { id: s.id, name: s.name, home: Coord::new(s.lat, s.lon) })
      .collect();
    Ok(SchoolInstance { id: id.into_owned(), depot, roster, road })
  }
}

/// Load a roster file and a road graph file; the instance is named after the roster file.
pub fn load_files(roster: impl AsRef<Path>, graph: impl AsRef<Path>) -> Result<SchoolInstance> {
  let (roster, graph) = (roster.as_ref(), graph.as_ref());
  let id = roster.file_stem()
    .map(|s| s.to_string_lossy())
    .unwrap_or(Cow::Borrowed("roster"));
  let raw_roster = RawRoster::parse(RosterFmt(roster)).context(format!("failed to load {:?}", roster))?;
  let raw_graph = RawRoadGraph::parse(RoadGraphFmt(graph)).context(format!("failed to load {:?}", graph))?;
  SchoolInstance::from_raw((raw_roster, raw_graph), id)
}

pub enum School {}

impl Dataset for DynLayout<School> {
  type Instance = SchoolInstance;

  fn load_instance(&self, idx: usize) -> Result<Self::Instance> {
    self.check_idx(idx)?;
    let roster = &self.name_order[idx];
    load_files(roster, roster.with_extension("graph"))
  }
}

lazy_static!{
    /// `$DATA_ROOT/SCHOOL/*.roster`, each with a sibling `.graph` file.
    pub static ref DSET: DynLayout<School> = {
        pretty_unwrap(DynLayout::new("SCHOOL", "*.roster"))
    };
}


#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use std::path::PathBuf;

  fn scratch_dir(name: &str) -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("instances-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir)?;
    Ok(dir)
  }

  fn write_instance(dir: &Path, name: &str) -> Result<()> {
    fs::write(dir.join(format!("{}.roster", name)),
              "depot 40.0 -74.0\nA 40.01 -74.0 Amy\nB 40.02 -74.0 Ben\n")?;
    fs::write(dir.join(format!("{}.graph", name)),
              "nodes 2\n1 40.0 -74.0\n2 40.02 -74.0\nedges 1\n1 2 - 0\n")?;
    Ok(())
  }

  #[test]
  fn coord_mean() {
    let m = Coord::mean(vec![Coord::new(1.0, 2.0), Coord::new(3.0, 4.0)]).unwrap();
    assert_eq!(m, Coord::new(2.0, 3.0));
    assert_eq!(Coord::mean(Vec::new()), None);
  }

  #[test]
  fn coord_validity() {
    assert!(Coord::new(40.0, -74.0).in_range());
    assert!(!Coord::new(91.0, 0.0).in_range());
    assert!(!Coord::new(f64::NAN, 0.0).is_finite());
  }

  #[test]
  fn load_pair_of_files() -> Result<()> {
    let dir = scratch_dir("files")?;
    write_instance(&dir, "tiny")?;
    let inst = load_files(dir.join("tiny.roster"), dir.join("tiny.graph"))?;
    assert_eq!(inst.id, "tiny");
    assert_eq!(inst.depot, Coord::new(40.0, -74.0));
    assert_eq!(inst.roster.len(), 2);
    assert_eq!(inst.roster[1].name, "Ben");
    assert_eq!(inst.road.num_nodes(), 2);
    assert_eq!(inst.road.num_arcs(), 2);
    Ok(())
  }

  #[test]
  fn dyn_layout_dataset() -> Result<()> {
    let dir = scratch_dir("layout")?;
    write_instance(&dir, "b-school")?;
    write_instance(&dir, "a-school")?;
    let dset: DynLayout<School> = DynLayout::from_dir(&dir, "*.roster")?;
    assert_eq!(dset.len(), 2);
    assert_eq!(dset.index_to_name(0)?, "a-school");
    assert_eq!(dset.name_to_index("b-school")?, 1);
    assert!(dset.name_to_index("c-school").is_err());
    let inst = dset.load_instance(1)?;
    assert_eq!(inst.id, "b-school");
    assert!(dset.load_instance(2).is_err());
    Ok(())
  }
}
