use tracing::*;

use crate::*;
use crate::classify::classify_roster;
use crate::cluster::{cluster_stops, ClusterSummary};
use crate::config::PlanConfig;
use crate::data::school::{Coord, RosterEntry, SchoolInstance, Stop, StopsExt, Student};
use crate::graph::RoadNetwork;
use crate::normalize::split_oversized;
use crate::oracle::DistanceOracle;
use crate::report::{build_report, Report};
use crate::routing::{CvrpSolver, FleetPlan, FleetRouter, InsertionGls, RouterSettings};

/// Everything a run needs besides its configuration.
pub struct PlanInput<'a, G> {
  pub depot: Coord,
  pub roster: &'a [RosterEntry],
  pub road: &'a G,
  /// Pedestrian network for the network classifier; the road graph is used if unset.
  pub walk: Option<&'a G>,
}

impl<'a> PlanInput<'a, crate::data::school::RoadGraph> {
  pub fn from_instance(inst: &'a SchoolInstance) -> Self {
    PlanInput { depot: inst.depot, roster: &inst.roster, road: &inst.road, walk: None }
  }
}

pub struct PlanOutcome {
  pub students: Vec<Student>,
  /// Depot first, then the pickup stops after capacity normalisation.
  pub stops: Vec<Stop>,
  pub clusters: ClusterSummary,
  pub oracle: DistanceOracle,
  pub plan: FleetPlan,
  pub report: Report,
  pub warnings: Vec<Warning>,
}

/// Runs the whole pipeline with the default solver.
pub fn plan<G: RoadNetwork>(input: &PlanInput<G>, config: &PlanConfig) -> Result<PlanOutcome, Error> {
  plan_with_solver(input, config, &InsertionGls::default())
}

#[instrument(level="info", skip_all, fields(roster=input.roster.len()))]
pub fn plan_with_solver<G: RoadNetwork, S: CvrpSolver>(input: &PlanInput<G>, config: &PlanConfig, solver: &S)
  -> Result<PlanOutcome, Error>
{
  config.validate()?;
  if !input.depot.is_finite() || !input.depot.in_range() {
    error!(depot=?input.depot, "depot rejected");
    return Err(Error::InvalidConfig(format!("depot coordinate {:?} is not a valid position", input.depot)))
  }
  let (roster, mut warnings) = roster::validate_roster(input.roster, config.input_policy)?;

  let walk = input.walk.unwrap_or(input.road);
  let students = classify_roster(&roster, input.depot, walk, config)?;
  let riders: Vec<Student> = students.iter().filter(|s| s.is_rider()).cloned().collect();

  let (stops, clusters) = cluster_stops(&riders, input.depot, config);
  if clusters.repair.bound_reached {
    warnings.push(Warning::RepairBoundReached { passes: clusters.repair.passes, singletons: clusters.repair.singletons });
  }
  let stops = split_oversized(stops, config.capacity, config.split_policy);

  let oracle = DistanceOracle::build(input.road, &stops)?;
  if oracle.unreachable_pairs > 0 {
    warnings.push(Warning::UnreachableStops { pairs: oracle.unreachable_pairs });
  }

  let router = FleetRouter::new(solver, RouterSettings::from_config(config));
  let (plan, fleet_warnings) = router.plan(&oracle.matrix, &stops.demands())?;
  warnings.extend(fleet_warnings);

  let (report, report_warnings) = build_report(&students, &stops, &oracle, input.road, &plan, config.average_speed_kmh);
  warnings.extend(report_warnings);

  info!(riders=riders.len(), stops=stops.num_pickup_stops(), buses=plan.used(), warnings=warnings.len(), "plan complete");
  Ok(PlanOutcome { students, stops, clusters, oracle, plan, report, warnings })
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{InputPolicy, SplitPolicy};
  use crate::data::school::{RoadGraph, DEPOT};
  use crate::graph::test_graphs::grid;
  use crate::init_test_logging;
  use crate::routing::PlanStatus;

  const DEPOT_AT: Coord = Coord { lat: 40.0, lon: -74.0 };

  fn town() -> RoadGraph {
    grid(DEPOT_AT, 6, 6, 0.005)
  }

  fn entry(id: &str, lat: f64, lon: f64) -> RosterEntry {
    RosterEntry { id: id.into(), name: format!("Student {}", id), home: Coord::new(lat, lon) }
  }

  /// `per` riders around each neighbourhood centre plus two walkers next to school.
  fn roster(centres: &[(f64, f64)], per: usize) -> Vec<RosterEntry> {
    let mut r = vec![entry("W1", 40.001, -74.0), entry("W2", 40.0, -73.999)];
    for (j, &(lat, lon)) in centres.iter().enumerate() {
      for i in 0..per {
        let o = i as f64 * 0.00005;
        r.push(entry(&format!("N{}-{}", j, i), lat + o, lon - o));
      }
    }
    r
  }

  fn fast_config() -> PlanConfig {
    PlanConfig { k_max: 8, kmeans_restarts: 4, ..PlanConfig::default() }
  }

  fn check_plan(out: &PlanOutcome, config: &PlanConfig) {
    let riders: Vec<&Student> = out.students.iter().filter(|s| s.is_rider()).collect();
    for s in &riders {
      let holding: Vec<&Stop> = out.stops.iter().filter(|st| st.students.contains(&s.id)).collect();
      assert_eq!(holding.len(), 1, "{} is at {} stops", s.id, holding.len());
      assert!(s.home.distance_km(holding[0].centroid) <= config.max_stop_distance_km + 1e-9);
    }
    assert!(out.stops.iter().all(|s| s.demand() <= config.capacity));

    let plan = &out.plan;
    for r in &plan.routes {
      assert_eq!(r.stops.first(), Some(&DEPOT));
      assert_eq!(r.stops.last(), Some(&DEPOT));
      assert!(r.load <= config.capacity);
    }
    assert_eq!(plan.loads().iter().sum::<u32>() as usize, riders.len());
    assert!(plan.used() <= config.max_fleet);
    assert!(plan.used() >= plan.theoretical_min);
    assert_eq!(out.report.routes.len(), plan.routes.len());
  }

  #[test]
  fn neighbourhoods() -> anyhow::Result<()> {
    let _g = init_test_logging(None::<&str>);
    let g = town();
    let roster = roster(&[(40.02, -73.98), (40.025, -73.99), (40.01, -73.975)], 15);
    let config = PlanConfig { capacity: 20, max_fleet: 6, ..fast_config() };
    let out = plan(&PlanInput { depot: DEPOT_AT, roster: &roster, road: &g, walk: None }, &config)?;

    check_plan(&out, &config);
    assert_eq!(out.students.iter().filter(|s| !s.is_rider()).count(), 2);
    assert_eq!(out.plan.theoretical_min, 3);
    assert!(out.warnings.is_empty(), "{:?}", out.warnings);
    Ok(())
  }

  #[test]
  fn tight_triangle_needs_two_buses() -> anyhow::Result<()> {
    let g = town();
    let roster = vec![
      entry("A", 40.02, -73.98),
      entry("B", 40.0201, -73.98),
      entry("C", 40.02, -73.9799),
    ];
    let config = PlanConfig { capacity: 2, max_fleet: 2, ..fast_config() };
    let out = plan(&PlanInput { depot: DEPOT_AT, roster: &roster, road: &g, walk: None }, &config)?;

    check_plan(&out, &config);
    assert!((1..=3).contains(&out.clusters.chosen_k));
    assert_eq!(out.plan.theoretical_min, 2);
    assert_eq!(out.plan.used(), 2);
    Ok(())
  }

  #[test]
  fn single_rider() -> anyhow::Result<()> {
    let g = town();
    let roster = vec![entry("ONLY", 40.02, -73.98)];
    let out = plan(&PlanInput { depot: DEPOT_AT, roster: &roster, road: &g, walk: None }, &fast_config())?;

    assert_eq!(out.plan.theoretical_min, 1);
    assert_eq!(out.plan.used(), 1);
    assert_eq!(out.plan.routes[0].pickups().len(), 1);
    assert_eq!(out.plan.status(), PlanStatus::Optimal);
    let detail = &out.report.routes[0];
    assert_eq!(detail.stops[0].students[0].id, "ONLY");
    assert!(detail.distance_km > 0.0);
    Ok(())
  }

  #[test]
  fn too_few_buses_gives_overloaded_plan() -> anyhow::Result<()> {
    let g = town();
    let roster = roster(&[(40.02, -73.98)], 100);
    let config = PlanConfig { capacity: 40, max_fleet: 1, ..fast_config() };
    let out = plan(&PlanInput { depot: DEPOT_AT, roster: &roster, road: &g, walk: None }, &config)?;

    assert_eq!(out.plan.theoretical_min, 3);
    assert!(out.plan.best_effort);
    assert_eq!(out.plan.used(), 1);
    assert_eq!(out.plan.routes[0].load, 100);
    assert_eq!(out.plan.overloaded(), vec![0]);
    assert!(out.warnings.contains(&Warning::FleetTooSmall { theoretical_min: 3, max_fleet: 1 }));
    Ok(())
  }

  #[test]
  fn full_stop_is_split() -> anyhow::Result<()> {
    let g = town();
    let roster = roster(&[(40.02, -73.98)], 100);
    let config = PlanConfig { k_max: 1, split_policy: SplitPolicy::FillToCapacity, ..fast_config() };
    let out = plan(&PlanInput { depot: DEPOT_AT, roster: &roster, road: &g, walk: None }, &config)?;

    assert_eq!(out.stops.num_pickup_stops(), 3);
    assert_eq!(&out.stops.demands()[1..], &[40, 40, 20]);
    check_plan(&out, &config);
    Ok(())
  }

  #[test]
  fn only_walkers() -> anyhow::Result<()> {
    let g = town();
    let roster = roster(&[], 0);
    let out = plan(&PlanInput { depot: DEPOT_AT, roster: &roster, road: &g, walk: None }, &fast_config())?;
    assert_eq!(out.stops.len(), 1);
    assert_eq!(out.plan.used(), 0);
    assert!(out.report.routes.is_empty());
    Ok(())
  }

  #[test]
  fn reproducible() -> anyhow::Result<()> {
    let g = town();
    let roster = roster(&[(40.02, -73.98), (40.01, -73.975)], 12);
    let config = PlanConfig { capacity: 10, max_fleet: 5, ..fast_config() };
    let input = PlanInput { depot: DEPOT_AT, roster: &roster, road: &g, walk: None };
    let (a, b) = (plan(&input, &config)?, plan(&input, &config)?);
    assert_eq!(a.stops, b.stops);
    assert_eq!(a.plan.routes, b.plan.routes);
    Ok(())
  }

  #[test]
  fn bad_rows() {
    let g = town();
    let mut roster = roster(&[(40.02, -73.98)], 3);
    roster.push(entry("", 40.02, -73.98));
    roster.push(entry("BAD", f64::NAN, -73.98));
    let input = PlanInput { depot: DEPOT_AT, roster: &roster, road: &g, walk: None };

    match plan(&input, &fast_config()) {
      Err(Error::InvalidInput(issues)) => assert_eq!(issues.len(), 2),
      other => panic!("expected rejection, got {:?}", other.map(|o| o.plan)),
    }

    let lenient = PlanConfig { input_policy: InputPolicy::Lenient, ..fast_config() };
    let out = plan(&input, &lenient).unwrap();
    let dropped = out.warnings.iter().filter(|w| matches!(w, Warning::DroppedRow(_))).count();
    assert_eq!(dropped, 2);
    assert_eq!(out.students.len(), 5);
  }

  #[test]
  fn invalid_config_and_graph() {
    let g = town();
    let roster = roster(&[(40.02, -73.98)], 3);
    let input = PlanInput { depot: DEPOT_AT, roster: &roster, road: &g, walk: None };
    let config = PlanConfig { capacity: 0, ..fast_config() };
    assert!(matches!(plan(&input, &config), Err(Error::InvalidConfig(_))));

    let empty = RoadGraph::default();
    let input = PlanInput { depot: DEPOT_AT, roster: &roster, road: &empty, walk: None };
    assert!(matches!(plan(&input, &fast_config()), Err(Error::EmptyRoadGraph)));
  }

  #[test]
  fn depot_must_be_a_valid_position() {
    let g = town();
    let roster = vec![entry("A", 40.001, -74.0), entry("B", 40.0, -74.001)];
    for &depot in [Coord::new(f64::NAN, -74.0), Coord::new(40.0, f64::INFINITY), Coord::new(95.0, -74.0), Coord::new(40.0, -181.0)].iter() {
      let input = PlanInput { depot, roster: &roster, road: &g, walk: None };
      assert!(matches!(plan(&input, &fast_config()), Err(Error::InvalidConfig(_))), "{:?}", depot);
    }
  }
}
