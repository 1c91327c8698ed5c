use std::cmp::max;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use num::integer::div_ceil;
use rayon::prelude::*;
use tracing::*;

use crate::*;
use crate::config::PlanConfig;
use crate::data::school::{Demand, DEPOT};
use crate::oracle::DistanceMatrix;
use super::*;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoadClass {
  Overloaded,
  Underutilized,
  Nominal,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PlanStatus {
  /// The fleet is as small as total demand allows.
  Optimal,
  Good,
}

impl PlanStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      PlanStatus::Optimal => "optimal",
      PlanStatus::Good => "good",
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
  /// Stop indices, starting and ending at the depot.
  pub stops: Vec<usize>,
  pub load: Demand,
  /// Metres, summed over consecutive matrix entries.
  pub distance: i64,
  pub class: LoadClass,
}

impl Route {
  pub fn pickups(&self) -> &[usize] {
    &self.stops[1..self.stops.len() - 1]
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FleetPlan {
  pub routes: Vec<Route>,
  pub theoretical_min: u32,
  pub requested_max: u32,
  pub capacity: Demand,
  /// Capacity was relaxed because the fleet is too small for the demand.
  pub best_effort: bool,
  /// `(vehicles offered, vehicles used)` per solver attempt; `None` for no solution.
  pub attempts: Vec<(u32, Option<u32>)>,
}

impl FleetPlan {
  #[inline]
  pub fn used(&self) -> u32 { self.routes.len() as u32 }

  pub fn loads(&self) -> Vec<Demand> {
    self.routes.iter().map(|r| r.load).collect()
  }

  fn indices_of(&self, class: LoadClass) -> Vec<usize> {
    self.routes.iter().enumerate().filter(|(_, r)| r.class == class).map(|(i, _)| i).collect()
  }

  pub fn overloaded(&self) -> Vec<usize> { self.indices_of(LoadClass::Overloaded) }

  pub fn underutilized(&self) -> Vec<usize> { self.indices_of(LoadClass::Underutilized) }

  /// Share of the requested fleet left unused, in percent.
  pub fn efficiency_pct(&self) -> f64 {
    if self.requested_max == 0 {
      return 0.0
    }
    (self.requested_max as f64 - self.used() as f64) / self.requested_max as f64 * 100.0
  }

  pub fn average_load(&self) -> f64 {
    if self.routes.is_empty() {
      return 0.0
    }
    self.routes.iter().map(|r| r.load as f64).sum::<f64>() / self.routes.len() as f64
  }

  pub fn total_distance(&self) -> i64 {
    self.routes.iter().map(|r| r.distance).sum()
  }

  pub fn status(&self) -> PlanStatus {
    if self.used() == self.theoretical_min { PlanStatus::Optimal } else { PlanStatus::Good }
  }
}

#[derive(Debug, Clone)]
pub struct RouterSettings {
  pub capacity: Demand,
  pub max_fleet: u32,
  pub min_fleet: u32,
  pub stop_margin: u32,
  pub budget: Duration,
  pub parallel_attempts: bool,
  pub underutilized_ratio: f64,
  pub overload_penalty: i64,
}

impl RouterSettings {
  pub fn from_config(config: &PlanConfig) -> Self {
    RouterSettings {
      capacity: config.capacity,
      max_fleet: config.max_fleet,
      min_fleet: config.min_fleet(),
      stop_margin: config.stop_margin,
      budget: config.solver_budget,
      parallel_attempts: config.parallel_attempts,
      underutilized_ratio: config.underutilized_ratio,
      overload_penalty: DEFAULT_OVERLOAD_PENALTY,
    }
  }
}

/// Searches for the smallest fleet that serves every stop.
pub struct FleetRouter<'s, S> {
  solver: &'s S,
  settings: RouterSettings,
  cancel: Arc<AtomicBool>,
}

impl<'s, S: CvrpSolver> FleetRouter<'s, S> {
  pub fn new(solver: &'s S, settings: RouterSettings) -> Self {
    FleetRouter { solver, settings, cancel: Arc::new(AtomicBool::new(false)) }
  }

  /// Flag that aborts every running and future attempt when set.
  pub fn cancel_flag(&self) -> Arc<AtomicBool> {
    self.cancel.clone()
  }

  pub fn theoretical_min(&self, demands: &[Demand]) -> u32 {
    div_ceil(demands.iter().sum::<Demand>(), self.settings.capacity)
  }

  fn budget(&self) -> SolveBudget {
    SolveBudget::new(self.settings.budget, self.cancel.clone())
  }

  fn attempt(&self, inst: &CvrpInstance, vehicles: u32) -> Option<RouteSet> {
    let routes = self.solver.solve(inst, vehicles as usize, &self.budget())?;
    let used: RouteSet = routes.into_iter().filter(|r| !r.is_empty()).collect();
    debug!(vehicles, used=used.len(), "attempt finished");
    Some(used)
  }

  #[instrument(level="info", skip(self, matrix, demands), fields(stops=demands.len()))]
  pub fn plan(&self, matrix: &DistanceMatrix, demands: &[Demand]) -> Result<(FleetPlan, Vec<Warning>), Error> {
    let s = &self.settings;
    let theoretical_min = self.theoretical_min(demands);
    let mut warnings = Vec::new();
    let mut attempts = Vec::new();
    let mut inst = CvrpInstance { matrix, demands, capacity: s.capacity, depot: DEPOT, mode: CapacityMode::Hard };

    let best_effort = theoretical_min > s.max_fleet;
    let best = if best_effort {
      warn!(theoretical_min, max_fleet=s.max_fleet, "fleet too small, planning with overloaded buses");
      warnings.push(Warning::FleetTooSmall { theoretical_min, max_fleet: s.max_fleet });
      inst.mode = CapacityMode::Soft { penalty_per_unit: s.overload_penalty };
      let routes = self.attempt(&inst, s.max_fleet);
      attempts.push((s.max_fleet, routes.as_ref().map(|r| r.len() as u32)));
      routes
    } else {
      let lo = max(theoretical_min, s.min_fleet);
      let target = theoretical_min + s.stop_margin;
      info!(lo, hi=s.max_fleet, theoretical_min, "searching fleet sizes");
      let results: Box<dyn Iterator<Item=(u32, Option<RouteSet>)> + '_> = if s.parallel_attempts {
        let all: Vec<_> = (lo..=s.max_fleet).into_par_iter().map(|k| (k, self.attempt(&inst, k))).collect();
        Box::new(all.into_iter())
      } else {
        Box::new((lo..=s.max_fleet).map(|k| (k, self.attempt(&inst, k))))
      };
      select_fewest(results, target, &mut attempts)
    };

    let routes = match best {
      Some(r) => r,
      None => {
        error!(theoretical_min, max_fleet=s.max_fleet, "no feasible plan");
        return Err(Error::NoFeasiblePlan { theoretical_min, max_fleet: s.max_fleet })
      }
    };

    let routes: Vec<Route> = routes.into_iter().map(|r| self.finish_route(&inst, r)).collect();
    let plan = FleetPlan {
      routes,
      theoretical_min,
      requested_max: s.max_fleet,
      capacity: s.capacity,
      best_effort,
      attempts,
    };
    info!(used=plan.used(), theoretical_min, status=plan.status().as_str(), "fleet planned");
    Ok((plan, warnings))
  }

  fn finish_route(&self, inst: &CvrpInstance, customers: Vec<usize>) -> Route {
    let load = inst.load(&customers);
    let mut stops = Vec::with_capacity(customers.len() + 2);
    stops.push(DEPOT);
    stops.extend(customers);
    stops.push(DEPOT);
    let class = if load > self.settings.capacity {
      LoadClass::Overloaded
    } else if (load as f64) < self.settings.capacity as f64 * self.settings.underutilized_ratio {
      LoadClass::Underutilized
    } else {
      LoadClass::Nominal
    };
    Route { distance: inst.matrix.path_length(&stops), stops, load, class }
  }
}

/// Walks attempts in increasing fleet size, keeping the one with the fewest vehicles in
/// use and stopping as soon as that count is at most `target`.
fn select_fewest(
  results: impl Iterator<Item=(u32, Option<RouteSet>)>,
  target: u32,
  log: &mut Vec<(u32, Option<u32>)>,
) -> Option<RouteSet> {
  let mut best: Option<RouteSet> = None;
  for (k, routes) in results {
    log.push((k, routes.as_ref().map(|r| r.len() as u32)));
    let routes = match routes {
      Some(r) => r,
      None => continue,
    };
    let used = routes.len() as u32;
    if best.as_ref().map_or(true, |b| routes.len() < b.len()) {
      best = Some(routes);
    }
    if used <= target {
      break;
    }
  }
  best
}
