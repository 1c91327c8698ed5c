use std::fmt;
use tracing::*;

use crate::*;
use crate::data::school::{Coord, Stop, StopId, StopsExt, Student};
use crate::graph::RoadNetwork;
use crate::oracle::DistanceOracle;
use crate::routing::FleetPlan;

#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
  Count(usize),
  Number(f64),
  Text(String),
  /// 1-based bus numbers.
  Buses(Vec<usize>),
}

impl fmt::Display for MetricValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MetricValue::Count(n) => write!(f, "{}", n),
      MetricValue::Number(x) => write!(f, "{}", x),
      MetricValue::Text(s) => f.write_str(s),
      MetricValue::Buses(b) => write!(f, "{} {:?}", b.len(), b),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
  pub name: &'static str,
  pub value: MetricValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentRef {
  pub id: String,
  pub name: String,
  pub home: Coord,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopVisit {
  /// 1-based position among the pickups of the route.
  pub seq: usize,
  pub stop: StopId,
  pub centroid: Coord,
  pub snapped: Coord,
  pub students: Vec<StudentRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteDetail {
  pub bus: usize,
  pub stops: Vec<StopVisit>,
  pub total_students: usize,
  pub distance_km: f64,
  pub duration_hours: f64,
  pub polyline: Vec<Coord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
  pub overview: Vec<Metric>,
  pub routes: Vec<RouteDetail>,
}

impl Report {
  pub fn metric(&self, name: &str) -> Option<&MetricValue> {
    self.overview.iter().find(|m| m.name == name).map(|m| &m.value)
  }
}

#[inline]
fn round2(x: f64) -> f64 {
  (x * 100.0).round() / 100.0
}

#[inline]
fn km(metres: i64) -> f64 {
  metres as f64 / 1000.0
}

fn bus_numbers(routes: Vec<usize>) -> MetricValue {
  MetricValue::Buses(routes.into_iter().map(|r| r + 1).collect())
}

fn overview(students: &[Student], stops: &[Stop], plan: &FleetPlan) -> Vec<Metric> {
  let riders = students.iter().filter(|s| s.is_rider()).count();
  let num_stops = stops.num_pickup_stops();
  let total = stops.total_demand() as usize;
  let used = plan.routes.len();
  let total_km = km(plan.total_distance());
  let per_stop = if num_stops > 0 { total as f64 / num_stops as f64 } else { 0.0 };
  let per_bus = if used > 0 { total_km / used as f64 } else { 0.0 };

  let m = |name, value| Metric { name, value };
  vec![
    m("Total Students", MetricValue::Count(total)),
    m("Total Buses", MetricValue::Count(used)),
    m("Overloaded Buses", bus_numbers(plan.overloaded())),
    m("Underutilized Buses", bus_numbers(plan.underutilized())),
    m("Total Stops", MetricValue::Count(num_stops)),
    m("Average Students per Stop", MetricValue::Number(round2(per_stop))),
    m("Total Route Distance (km)", MetricValue::Number(round2(total_km))),
    m("Average Route Distance (km)", MetricValue::Number(round2(per_bus))),
    m("Buses Requested", MetricValue::Count(plan.requested_max as usize)),
    m("Buses Actually Used", MetricValue::Count(used)),
    m("Bus Efficiency", MetricValue::Text(format!("{:.1}%", plan.efficiency_pct()))),
    m("Bus Riders", MetricValue::Count(riders)),
    m("Walkers", MetricValue::Count(students.len() - riders)),
    m("Average Bus Load", MetricValue::Text(format!("{:.1} students", plan.average_load()))),
    m("Plan Status", MetricValue::Text(plan.status().as_str().to_string())),
  ]
}

/// Overview metrics and per-bus details for a finished plan. Stop members that are not
/// among `students` are left out of the listing and reported as warnings.
#[instrument(level="info", skip_all, fields(routes=plan.routes.len()))]
pub fn build_report<G: RoadNetwork>(
  students: &[Student],
  stops: &[Stop],
  oracle: &DistanceOracle,
  graph: &G,
  plan: &FleetPlan,
  average_speed_kmh: f64,
) -> (Report, Vec<Warning>) {
  let by_id: Map<&str, &Student> = students.iter().map(|s| (s.id.as_str(), s)).collect();
  let mut warnings = Vec::new();
  let mut routes = Vec::with_capacity(plan.routes.len());

  for (r, route) in plan.routes.iter().enumerate() {
    let mut visits = Vec::with_capacity(route.pickups().len());
    for (seq, &idx) in route.pickups().iter().enumerate() {
      let stop = &stops[idx];
      let mut listed = Vec::with_capacity(stop.students.len());
      for id in &stop.students {
        match by_id.get(id.as_str()) {
          Some(s) => listed.push(StudentRef { id: s.id.clone(), name: s.name.clone(), home: s.home }),
          None => {
            warn!(stop=%stop.id, student=%id, "student not found in roster");
            warnings.push(Warning::MissingStudent { stop: stop.id, student: id.clone() });
          }
        }
      }
      visits.push(StopVisit {
        seq: seq + 1,
        stop: stop.id,
        centroid: stop.centroid,
        snapped: oracle.snaps[idx].coord,
        students: listed,
      });
    }

    let distance_km = km(route.distance);
    routes.push(RouteDetail {
      bus: r + 1,
      total_students: visits.iter().map(|v| v.students.len()).sum(),
      stops: visits,
      distance_km,
      duration_hours: round2(distance_km / average_speed_kmh),
      polyline: oracle.polyline(graph, &route.stops),
    });
  }

  let report = Report { overview: overview(students, stops, plan), routes };
  debug!(missing=warnings.len(), "report built");
  (report, warnings)
}
