use ndarray::Array2;
use tracing::*;

use super::*;
use super::insertion::{first_fit_decreasing, parallel_cheapest_insertion};

const EPS: f64 = 1e-6;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GlsParams {
  /// Scales the penalty weight relative to the average edge cost of the first local optimum.
  pub lambda_coefficient: f64,
  /// Penalisation rounds before giving up.
  pub max_rounds: usize,
  /// Rounds without a new best solution before giving up.
  pub max_stale_rounds: usize,
}

impl Default for GlsParams {
  fn default() -> Self {
    GlsParams { lambda_coefficient: 0.1, max_rounds: 300, max_stale_rounds: 40 }
  }
}

/// Local search on the penalised objective `distance + lambda * sum of edge penalties`.
struct Search<'i, 'm> {
  inst: &'i CvrpInstance<'m>,
  penalties: Array2<u32>,
  lambda: f64,
}

impl<'i, 'm> Search<'i, 'm> {
  fn new(inst: &'i CvrpInstance<'m>) -> Self {
    let n = inst.demands.len();
    Search { inst, penalties: Array2::zeros((n, n)), lambda: 0.0 }
  }

  #[inline]
  fn w(&self, i: usize, j: usize) -> f64 {
    self.inst.dist(i, j) as f64 + self.lambda * self.penalties[[i, j]] as f64
  }

  #[inline]
  fn before(&self, route: &[usize], pos: usize) -> usize {
    if pos == 0 { self.inst.depot } else { route[pos - 1] }
  }

  #[inline]
  fn after(&self, route: &[usize], pos: usize) -> usize {
    if pos + 1 >= route.len() { self.inst.depot } else { route[pos + 1] }
  }

  fn overload_delta(&self, load: u32, new_load: u32) -> f64 {
    (self.inst.overload_cost(new_load) - self.inst.overload_cost(load)) as f64
  }

  /// Moves one customer to another vehicle.
  fn relocate(&self, routes: &mut RouteSet, loads: &mut [u32]) -> bool {
    for r1 in 0..routes.len() {
      for i in 0..routes[r1].len() {
        let c = routes[r1][i];
        let d = self.inst.demands[c];
        let (a, b) = (self.before(&routes[r1], i), self.after(&routes[r1], i));
        let removal = self.w(a, b) - self.w(a, c) - self.w(c, b)
          + self.overload_delta(loads[r1], loads[r1] - d);

        let mut tried_empty = false;
        for r2 in 0..routes.len() {
          if r2 == r1 || !self.inst.fits(loads[r2] + d) { continue; }
          if routes[r2].is_empty() {
            if tried_empty { continue; }
            tried_empty = true;
          }
          let into = &routes[r2];
          for j in 0..=into.len() {
            let x = if j == 0 { self.inst.depot } else { into[j - 1] };
            let y = if j == into.len() { self.inst.depot } else { into[j] };
            let delta = removal + self.w(x, c) + self.w(c, y) - self.w(x, y)
              + self.overload_delta(loads[r2], loads[r2] + d);
            if delta < -EPS {
              routes[r1].remove(i);
              routes[r2].insert(j, c);
              loads[r1] -= d;
              loads[r2] += d;
              return true
            }
          }
        }
      }
    }
    false
  }

  /// Exchanges two customers between vehicles.
  fn swap(&self, routes: &mut RouteSet, loads: &mut [u32]) -> bool {
    for r1 in 0..routes.len() {
      for r2 in (r1 + 1)..routes.len() {
        for i in 0..routes[r1].len() {
          for j in 0..routes[r2].len() {
            let (c1, c2) = (routes[r1][i], routes[r2][j]);
            let (d1, d2) = (self.inst.demands[c1], self.inst.demands[c2]);
            let l1 = loads[r1] - d1 + d2;
            let l2 = loads[r2] - d2 + d1;
            if !self.inst.fits(l1) || !self.inst.fits(l2) { continue; }
            let (a1, b1) = (self.before(&routes[r1], i), self.after(&routes[r1], i));
            let (a2, b2) = (self.before(&routes[r2], j), self.after(&routes[r2], j));
            let delta = self.w(a1, c2) + self.w(c2, b1) - self.w(a1, c1) - self.w(c1, b1)
              + self.w(a2, c1) + self.w(c1, b2) - self.w(a2, c2) - self.w(c2, b2)
              + self.overload_delta(loads[r1], l1) + self.overload_delta(loads[r2], l2);
            if delta < -EPS {
              routes[r1][i] = c2;
              routes[r2][j] = c1;
              loads[r1] = l1;
              loads[r2] = l2;
              return true
            }
          }
        }
      }
    }
    false
  }

  /// Reverses a segment of one route. Inner edges are re-priced since the matrix
  /// need not be symmetric.
  fn two_opt(&self, routes: &mut RouteSet) -> bool {
    for route in routes.iter_mut() {
      let m = route.len();
      for i in 0..m {
        for j in (i + 1)..m {
          let (prev, next) = (self.before(route, i), self.after(route, j));
          let mut old = self.w(prev, route[i]) + self.w(route[j], next);
          let mut new = self.w(prev, route[j]) + self.w(route[i], next);
          for k in i..j {
            old += self.w(route[k], route[k + 1]);
            new += self.w(route[k + 1], route[k]);
          }
          if new - old < -EPS {
            route[i..=j].reverse();
            return true
          }
        }
      }
    }
    false
  }

  /// First-improvement descent until no move helps or the budget runs out.
  fn descend(&self, routes: &mut RouteSet, loads: &mut [u32], budget: &SolveBudget) -> usize {
    let mut moves = 0;
    while !budget.exhausted() {
      if self.two_opt(routes) || self.relocate(routes, loads) || self.swap(routes, loads) {
        moves += 1;
      } else {
        break;
      }
    }
    moves
  }

  fn edges(&self, routes: &RouteSet) -> Vec<(usize, usize)> {
    let depot = self.inst.depot;
    let mut edges = Vec::new();
    for r in routes.iter().filter(|r| !r.is_empty()) {
      edges.push((depot, r[0]));
      edges.extend(r.windows(2).map(|w| (w[0], w[1])));
      edges.push((r[r.len() - 1], depot));
    }
    edges
  }

  /// Penalises the solution edges of maximum utility `cost / (1 + penalty)`.
  /// Returns false when there is nothing worth penalising.
  fn penalize(&mut self, routes: &RouteSet) -> bool {
    let edges = self.edges(routes);
    let utility = |s: &Self, (i, j): (usize, usize)| s.inst.dist(i, j) as f64 / (1.0 + s.penalties[[i, j]] as f64);
    let max = edges.iter().map(|&e| utility(self, e)).fold(0.0, f64::max);
    if max <= 0.0 {
      return false
    }
    for &e in &edges {
      if utility(self, e) >= max - EPS {
        self.penalties[[e.0, e.1]] += 1;
      }
    }
    true
  }
}

/// Guided local search from `routes`. Returns the cheapest solution seen by the real
/// objective; with a hard capacity every intermediate solution stays feasible.
#[instrument(level="debug", skip_all, fields(vehicles=routes.len()))]
pub fn improve(inst: &CvrpInstance, mut routes: RouteSet, params: &GlsParams, budget: &SolveBudget) -> RouteSet {
  let mut loads: Vec<u32> = routes.iter().map(|r| inst.load(r)).collect();
  let mut search = Search::new(inst);

  search.descend(&mut routes, &mut loads, budget);
  let mut best_cost = inst.cost(&routes);
  let mut best = routes.clone();
  let n_edges = search.edges(&routes).len();
  if n_edges == 0 {
    return best
  }
  search.lambda = params.lambda_coefficient * best_cost as f64 / n_edges as f64;

  let mut stale = 0;
  let mut rounds = 0;
  while rounds < params.max_rounds && stale < params.max_stale_rounds && !budget.exhausted() {
    rounds += 1;
    if !search.penalize(&routes) {
      break;
    }
    search.descend(&mut routes, &mut loads, budget);
    let cost = inst.cost(&routes);
    if cost < best_cost {
      trace!(round=rounds, cost, "new best");
      best_cost = cost;
      best = routes.clone();
      stale = 0;
    } else {
      stale += 1;
    }
  }

  debug!(rounds, best_cost, "guided local search finished");
  return best
}

/// Parallel cheapest insertion followed by guided local search. If insertion gets stuck
/// under a hard capacity, the start comes from first-fit decreasing or, failing that,
/// from a penalised search that happened to end up within capacity.
#[derive(Debug, Clone, Default)]
pub struct InsertionGls {
  pub params: GlsParams,
}

impl InsertionGls {
  fn repack(&self, inst: &CvrpInstance, vehicles: usize, budget: &SolveBudget) -> Option<RouteSet> {
    if inst.mode != CapacityMode::Hard || budget.exhausted() {
      return None
    }
    if let Some(routes) = first_fit_decreasing(inst, vehicles) {
      debug!(vehicles, "insertion stuck, starting from first-fit decreasing");
      return Some(routes)
    }

    let soft = CvrpInstance { mode: CapacityMode::Soft { penalty_per_unit: DEFAULT_OVERLOAD_PENALTY }, ..inst.clone() };
    let routes = parallel_cheapest_insertion(&soft, vehicles, budget)?;
    let routes = improve(&soft, routes, &self.params, budget);
    if routes.iter().all(|r| inst.fits(inst.load(r))) {
      debug!(vehicles, "insertion stuck, penalised search reached a feasible start");
      Some(routes)
    } else {
      trace!(vehicles, "no feasible start found");
      None
    }
  }
}

impl CvrpSolver for InsertionGls {
  fn solve(&self, instance: &CvrpInstance, vehicles: usize, budget: &SolveBudget) -> Option<RouteSet> {
    let routes = parallel_cheapest_insertion(instance, vehicles, budget)
      .or_else(|| self.repack(instance, vehicles, budget))?;
    Some(improve(instance, routes, &self.params, budget))
  }
}
