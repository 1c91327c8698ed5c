use num::integer::div_ceil;
use tracing::*;

use crate::config::SplitPolicy;
use crate::data::school::{Demand, Stop};

/// Sizes of the siblings an over-full stop of `demand` riders is split into.
pub fn sibling_sizes(demand: Demand, capacity: Demand, policy: SplitPolicy) -> Vec<Demand> {
  debug_assert!(capacity > 0);
  if demand <= capacity {
    return vec![demand]
  }
  let parts = div_ceil(demand, capacity);
  let per_part = match policy {
    SplitPolicy::Even => div_ceil(demand, parts),
    SplitPolicy::FillToCapacity => capacity,
  };
  let mut sizes = vec![per_part; parts as usize - 1];
  sizes.push(demand - per_part * (parts - 1));
  return sizes
}

/// Replaces every non-depot stop whose demand exceeds `capacity` by co-located
/// siblings that share its members in order. Other stops pass through unchanged.
#[instrument(level="info", skip(stops), fields(stops=stops.len()))]
pub fn split_oversized(stops: Vec<Stop>, capacity: Demand, policy: SplitPolicy) -> Vec<Stop> {
  let mut out = Vec::with_capacity(stops.len());
  let mut split = 0;
  for stop in stops {
    if stop.is_depot() || stop.demand() <= capacity {
      out.push(stop);
      continue;
    }
    let sizes = sibling_sizes(stop.demand(), capacity, policy);
    debug!(stop=%stop.id, demand=stop.demand(), ?sizes, "splitting stop");
    let mut members = stop.students.into_iter();
    for (part, &n) in sizes.iter().enumerate() {
      out.push(Stop {
        id: stop.id.sibling(part as u32 + 1),
        centroid: stop.centroid,
        students: members.by_ref().take(n as usize).collect(),
      });
    }
    split += 1;
  }
  info!(split, stops=out.len(), "capacity normalised");
  return out
}
