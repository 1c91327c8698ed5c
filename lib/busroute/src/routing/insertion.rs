use bit_set::BitSet;
use tracing::*;

use super::{CvrpInstance, RouteSet, SolveBudget};

#[derive(Debug, Copy, Clone)]
struct Candidate {
  customer: usize,
  route: usize,
  position: usize,
  delta: i64,
}

/// Extra cost of putting `c` between `route[pos - 1]` and `route[pos]`, depot at both ends.
fn insertion_delta(inst: &CvrpInstance, route: &[usize], load: u32, c: usize, pos: usize) -> i64 {
  let prev = if pos == 0 { inst.depot } else { route[pos - 1] };
  let next = if pos == route.len() { inst.depot } else { route[pos] };
  let detour = inst.dist(prev, c) + inst.dist(c, next) - inst.dist(prev, next);
  detour + inst.overload_cost(load + inst.demands[c]) - inst.overload_cost(load)
}

/// Parallel cheapest insertion: all vehicles are grown together, and each step commits
/// the single cheapest (customer, vehicle, position) over every unrouted customer.
/// Returns `None` if a customer fits nowhere or the budget runs out first.
#[instrument(level="debug", skip(inst, budget))]
pub fn parallel_cheapest_insertion(inst: &CvrpInstance, vehicles: usize, budget: &SolveBudget) -> Option<RouteSet> {
  let mut routes: RouteSet = vec![Vec::new(); vehicles];
  let mut loads = vec![0u32; vehicles];
  let mut unrouted: BitSet = inst.customers().collect();

  while !unrouted.is_empty() {
    if budget.exhausted() {
      debug!(unrouted=unrouted.len(), "budget exhausted during construction");
      return None
    }

    let mut best: Option<Candidate> = None;
    for c in unrouted.iter() {
      // empty vehicles are interchangeable, so only the first one is tried
      let mut tried_empty = false;
      for (r, route) in routes.iter().enumerate() {
        if route.is_empty() {
          if tried_empty { continue; }
          tried_empty = true;
        }
        if !inst.fits(loads[r] + inst.demands[c]) {
          continue;
        }
        for pos in 0..=route.len() {
          let delta = insertion_delta(inst, route, loads[r], c, pos);
          if best.map_or(true, |b| delta < b.delta) {
            best = Some(Candidate { customer: c, route: r, position: pos, delta });
          }
        }
      }
    }

    let b = match best {
      Some(b) => b,
      None => {
        trace!(unrouted=unrouted.len(), "no vehicle can take the remaining customers");
        return None
      }
    };
    routes[b.route].insert(b.position, b.customer);
    loads[b.route] += inst.demands[b.customer];
    unrouted.remove(b.customer);
  }

  return Some(routes)
}

/// First-fit decreasing: customers by falling demand, each into the first vehicle with
/// room, at its cheapest position there. Only fails if the packing itself fails, which
/// makes it a fallback for tight instances where cheapest insertion paints itself into
/// a corner.
#[instrument(level="debug", skip(inst))]
pub fn first_fit_decreasing(inst: &CvrpInstance, vehicles: usize) -> Option<RouteSet> {
  let mut order: Vec<usize> = inst.customers().collect();
  order.sort_by_key(|&c| std::cmp::Reverse(inst.demands[c]));

  let mut routes: RouteSet = vec![Vec::new(); vehicles];
  let mut loads = vec![0u32; vehicles];
  for c in order {
    let r = (0..vehicles).find(|&r| inst.fits(loads[r] + inst.demands[c]))?;
    let position = (0..=routes[r].len())
      .min_by_key(|&pos| insertion_delta(inst, &routes[r], loads[r], c, pos))
      .unwrap_or(0);
    routes[r].insert(position, c);
    loads[r] += inst.demands[c];
  }
  return Some(routes)
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::routing::CapacityMode;
  use crate::routing::test_instances::{clustered, line, tight_pairs};

  #[test]
  fn line_fits_in_one_vehicle() {
    let m = line(4);
    let demands = vec![0, 1, 1, 1, 1];
    let inst = CvrpInstance { matrix: &m, demands: &demands, capacity: 10, depot: 0, mode: CapacityMode::Hard };
    let routes = parallel_cheapest_insertion(&inst, 3, &SolveBudget::unlimited()).unwrap();
    let used: Vec<_> = routes.iter().filter(|r| !r.is_empty()).collect();
    assert_eq!(used.len(), 1);
    assert_eq!(inst.route_distance(used[0]), 8000);
  }

  #[test]
  fn respects_capacity() {
    let m = clustered(3, 4);
    let demands: Vec<u32> = std::iter::once(0).chain(std::iter::repeat(10).take(12)).collect();
    let inst = CvrpInstance { matrix: &m, demands: &demands, capacity: 40, depot: 0, mode: CapacityMode::Hard };
    let routes = parallel_cheapest_insertion(&inst, 3, &SolveBudget::unlimited()).unwrap();
    assert!(routes.iter().all(|r| inst.load(r) <= 40));
    let mut all: Vec<_> = routes.iter().flatten().copied().collect();
    all.sort();
    assert_eq!(all, (1..=12).collect::<Vec<_>>());
  }

  #[test]
  fn too_few_vehicles() {
    let m = line(3);
    let demands = vec![0, 30, 30, 30];
    let inst = CvrpInstance { matrix: &m, demands: &demands, capacity: 40, depot: 0, mode: CapacityMode::Hard };
    assert!(parallel_cheapest_insertion(&inst, 2, &SolveBudget::unlimited()).is_none());

    let soft = CvrpInstance { mode: CapacityMode::Soft { penalty_per_unit: 1000 }, ..inst };
    let routes = parallel_cheapest_insertion(&soft, 2, &SolveBudget::unlimited()).unwrap();
    assert_eq!(routes.iter().map(|r| r.len()).sum::<usize>(), 3);
  }

  #[test]
  fn out_of_time() {
    let m = line(2);
    let demands = vec![0, 1, 1];
    let inst = CvrpInstance { matrix: &m, demands: &demands, capacity: 10, depot: 0, mode: CapacityMode::Hard };
    let budget = SolveBudget::unlimited();
    budget.cancel();
    assert!(parallel_cheapest_insertion(&inst, 1, &budget).is_none());
  }

  #[test]
  fn decreasing_packing_finds_tight_split() {
    let (m, demands) = tight_pairs();
    let inst = CvrpInstance { matrix: &m, demands: &demands, capacity: 40, depot: 0, mode: CapacityMode::Hard };
    assert!(parallel_cheapest_insertion(&inst, 2, &SolveBudget::unlimited()).is_none());

    let routes = first_fit_decreasing(&inst, 2).unwrap();
    assert_eq!(routes.iter().map(|r| inst.load(r)).collect::<Vec<_>>(), vec![40, 40]);
    let mut all: Vec<_> = routes.iter().flatten().copied().collect();
    all.sort();
    assert_eq!(all, vec![1, 2, 3, 4]);
  }

  #[test]
  fn decreasing_packing_fails_when_nothing_fits() {
    let m = line(3);
    let demands = vec![0, 30, 30, 30];
    let inst = CvrpInstance { matrix: &m, demands: &demands, capacity: 40, depot: 0, mode: CapacityMode::Hard };
    assert!(first_fit_decreasing(&inst, 2).is_none());
    assert_eq!(first_fit_decreasing(&inst, 3).map(|r| r.len()), Some(3));
  }
}
