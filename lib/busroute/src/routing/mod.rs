use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::data::school::Demand;
use crate::oracle::DistanceMatrix;

pub mod insertion;
pub mod gls;
pub mod fleet;

pub use fleet::{FleetPlan, FleetRouter, LoadClass, PlanStatus, Route, RouterSettings};
pub use gls::{GlsParams, InsertionGls};

/// Customer sequences, one per vehicle, without the depot. Vehicles may be empty.
pub type RouteSet = Vec<Vec<usize>>;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CapacityMode {
  /// No route may carry more than the capacity.
  Hard,
  /// Overload is allowed at `penalty_per_unit` metres per rider above capacity.
  Soft { penalty_per_unit: i64 },
}

/// Penalty used for best-effort plans; large enough to dominate any route length.
pub const DEFAULT_OVERLOAD_PENALTY: i64 = 10_000_000;

#[derive(Debug, Clone)]
pub struct CvrpInstance<'a> {
  pub matrix: &'a DistanceMatrix,
  pub demands: &'a [Demand],
  pub capacity: Demand,
  pub depot: usize,
  pub mode: CapacityMode,
}

impl<'a> CvrpInstance<'a> {
  pub fn customers(&self) -> impl Iterator<Item=usize> + '_ {
    let depot = self.depot;
    (0..self.demands.len()).filter(move |&i| i != depot)
  }

  #[inline]
  pub fn dist(&self, i: usize, j: usize) -> i64 { self.matrix.get(i, j) }

  pub fn load(&self, route: &[usize]) -> Demand {
    route.iter().map(|&c| self.demands[c]).sum()
  }

  /// Depot to depot length of a customer sequence.
  pub fn route_distance(&self, route: &[usize]) -> i64 {
    if route.is_empty() {
      return 0
    }
    let inner: i64 = route.windows(2).map(|w| self.dist(w[0], w[1])).sum();
    self.dist(self.depot, route[0]) + inner + self.dist(route[route.len() - 1], self.depot)
  }

  /// Cost of carrying `load`; zero within capacity.
  #[inline]
  pub fn overload_cost(&self, load: Demand) -> i64 {
    match self.mode {
      CapacityMode::Hard => 0,
      CapacityMode::Soft { penalty_per_unit } =>
        load.saturating_sub(self.capacity) as i64 * penalty_per_unit,
    }
  }

  #[inline]
  pub fn fits(&self, load: Demand) -> bool {
    match self.mode {
      CapacityMode::Hard => load <= self.capacity,
      CapacityMode::Soft { .. } => true,
    }
  }

  pub fn cost(&self, routes: &[Vec<usize>]) -> i64 {
    routes.iter().map(|r| self.route_distance(r) + self.overload_cost(self.load(r))).sum()
  }
}

/// Wall-clock limit plus a shared cancellation flag for one solver attempt.
#[derive(Debug, Clone)]
pub struct SolveBudget {
  deadline: Instant,
  cancel: Arc<AtomicBool>,
}

impl SolveBudget {
  pub fn new(limit: Duration, cancel: Arc<AtomicBool>) -> Self {
    SolveBudget { deadline: Instant::now() + limit, cancel }
  }

  pub fn unlimited() -> Self {
    // far enough away to never trigger, small enough not to overflow Instant
    Self::new(Duration::from_secs(60 * 60 * 24 * 365), Arc::new(AtomicBool::new(false)))
  }

  #[inline]
  pub fn exhausted(&self) -> bool {
    self.cancel.load(Ordering::Relaxed) || Instant::now() >= self.deadline
  }

  pub fn cancel(&self) {
    self.cancel.store(true, Ordering::Relaxed)
  }
}

pub trait CvrpSolver: Sync {
  /// Routes for at most `vehicles` vehicles covering every customer, or `None` if no
  /// solution was found within `budget`.
  fn solve(&self, instance: &CvrpInstance, vehicles: usize, budget: &SolveBudget) -> Option<RouteSet>;
}


#[cfg(test)]
pub(crate) mod test_instances {
  use super::*;

  /// Depot at 0 and customers on a line at 1 km spacing.
  pub fn line(n: usize) -> DistanceMatrix {
    DistanceMatrix::from_fn(n + 1, |i, j| (i as i64 - j as i64).abs() * 1000)
  }

  /// `groups` clusters of `per_group` customers; 100 m within a cluster, 5 km between
  /// clusters and from the depot.
  pub fn clustered(groups: usize, per_group: usize) -> DistanceMatrix {
    let group = |i: usize| if i == 0 { usize::MAX } else { (i - 1) / per_group };
    DistanceMatrix::from_fn(groups * per_group + 1, |i, j| if group(i) == group(j) { 100 } else { 5000 })
  }

  /// Customers at 1, 2, 10 and 11 km along a line with demands 10, 10, 30, 30. Two
  /// vehicles of capacity 40 only work if each takes one near and one far customer.
  pub fn tight_pairs() -> (DistanceMatrix, Vec<Demand>) {
    let at = [0i64, 1, 2, 10, 11];
    let m = DistanceMatrix::from_fn(at.len(), |i, j| (at[i] - at[j]).abs() * 1000);
    return (m, vec![0, 10, 10, 30, 30])
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn route_accounting() {
    let m = test_instances::line(4);
    let demands = vec![0, 10, 10, 10, 10];
    let inst = CvrpInstance { matrix: &m, demands: &demands, capacity: 15, depot: 0, mode: CapacityMode::Hard };
    assert_eq!(inst.customers().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    assert_eq!(inst.route_distance(&[1, 2]), 4000);
    assert_eq!(inst.route_distance(&[]), 0);
    assert_eq!(inst.load(&[1, 2]), 20);
    assert!(!inst.fits(20));
    assert_eq!(inst.overload_cost(20), 0);

    let soft = CvrpInstance { mode: CapacityMode::Soft { penalty_per_unit: 7 }, ..inst };
    assert!(soft.fits(20));
    assert_eq!(soft.overload_cost(20), 35);
    assert_eq!(soft.cost(&[vec![1, 2], vec![]]), 4035);
  }

  #[test]
  fn budget_cancellation() {
    let flag = Arc::new(AtomicBool::new(false));
    let b = SolveBudget::new(Duration::from_secs(60), flag.clone());
    assert!(!b.exhausted());
    flag.store(true, Ordering::Relaxed);
    assert!(b.exhausted());
    assert!(SolveBudget::new(Duration::from_secs(0), Arc::new(AtomicBool::new(false))).exhausted());
  }
}
