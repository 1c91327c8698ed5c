use std::collections::BTreeMap;
use tracing::*;

use crate::*;
use crate::data::school::Coord;
use super::ClusterId;
use super::kmeans::{KMeans, distinct_points};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepairOutcome {
  pub passes: usize,
  pub splits: usize,
  /// Students moved to a cluster of their own by the fallback.
  pub singletons: usize,
  pub bound_reached: bool,
}

/// Groups members by cluster, in ascending id order.
pub fn members(labels: &[ClusterId]) -> BTreeMap<ClusterId, Vec<usize>> {
  let mut groups: BTreeMap<ClusterId, Vec<usize>> = BTreeMap::new();
  for (i, &c) in labels.iter().enumerate() {
    groups.entry(c).or_default().push(i);
  }
  groups
}

/// Largest member-to-centroid distance of every cluster that exceeds `max_km`.
pub fn violations(points: &[Coord], labels: &[ClusterId], max_km: f64) -> Vec<(ClusterId, Vec<usize>, f64)> {
  members(labels).into_iter()
    .filter_map(|(c, m)| {
      let centroid = Coord::mean(m.iter().map(|&i| points[i]))?;
      let worst = m.iter().map(|&i| points[i].distance_km(centroid)).fold(0.0, f64::max);
      if worst > max_km { Some((c, m, worst)) } else { None }
    })
    .collect()
}

/// Splits clusters until every member is within `max_km` of its cluster's mean.
/// A violating cluster is re-clustered into `max(2, ceil(worst / max_km))` groups that
/// receive fresh ids. After `max_passes` any remaining violators become singletons.
#[instrument(level="debug", skip(points, labels, ids, kmeans))]
pub fn enforce_max_distance(
  points: &[Coord],
  labels: &mut [ClusterId],
  ids: &mut UidCounter<ClusterId>,
  kmeans: &KMeans,
  max_km: f64,
  max_passes: usize,
) -> RepairOutcome {
  debug_assert_eq!(points.len(), labels.len());
  let mut outcome = RepairOutcome::default();

  loop {
    let bad = violations(points, labels, max_km);
    if bad.is_empty() {
      break;
    }
    if outcome.passes >= max_passes {
      outcome.bound_reached = true;
      for (_, m, _) in bad {
        outcome.singletons += split_into_singletons(&m, labels, ids);
      }
      warn!(passes=outcome.passes, singletons=outcome.singletons, "repair bound reached");
      break;
    }
    outcome.passes += 1;
    trace!(pass=outcome.passes, violators=bad.len());

    for (cluster, m, worst) in bad {
      let sub_points: Vec<_> = m.iter().map(|&i| [points[i].lat, points[i].lon]).collect();
      let wanted = (worst / max_km).ceil().max(2.0) as usize;
      let k = wanted.min(distinct_points(&sub_points));
      let fit = kmeans.with_k(k).fit(&sub_points);
      let used: Set<_> = fit.labels.iter().copied().collect();
      if used.len() < 2 {
        debug!(%cluster, "sub-clustering collapsed, splitting into singletons");
        outcome.singletons += split_into_singletons(&m, labels, ids);
        continue;
      }
      let base = ids.reserve(fit.k()).raw();
      for (&i, &l) in m.iter().zip(&fit.labels) {
        labels[i] = ClusterId::from_raw(base + l as u32);
      }
      outcome.splits += 1;
    }
  }

  debug!(?outcome, "repair finished");
  return outcome
}

fn split_into_singletons(m: &[usize], labels: &mut [ClusterId], ids: &mut UidCounter<ClusterId>) -> usize {
  for &i in m {
    labels[i] = ids.next_id();
  }
  m.len()
}
