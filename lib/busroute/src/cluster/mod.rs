use rayon::prelude::*;
use tracing::*;

use crate::*;
use crate::config::PlanConfig;
use crate::data::school::{Coord, Stop, StopId, Student};

pub mod kmeans;
pub mod knee;
pub mod repair;

pub use kmeans::{KMeans, KMeansFit};
pub use repair::RepairOutcome;

define_u32_id_type!(ClusterId);

#[derive(Debug, Clone)]
pub struct ClusterSummary {
  /// `(k, inertia)` for every candidate stop count.
  pub elbow: Vec<(usize, f64)>,
  pub chosen_k: usize,
  pub repair: RepairOutcome,
}

/// Inertia of the best k-means fit for each `k` in `k_min..=k_max`, clamped to the
/// number of distinct points.
pub fn elbow_curve(points: &[kmeans::Point], k_min: usize, k_max: usize, kmeans: &KMeans) -> Vec<(usize, f64)> {
  let k_max = k_max.min(kmeans::distinct_points(points));
  if k_max < k_min {
    return Vec::new()
  }
  (k_min..=k_max)
    .into_par_iter()
    .map(|k| (k, kmeans.with_k(k).fit(points).inertia))
    .collect()
}

/// Kneedle on the elbow curve, then the largest distance to the diagonal, then the
/// smallest candidate.
pub fn choose_k(elbow: &[(usize, f64)]) -> Option<usize> {
  let xs: Vec<f64> = elbow.iter().map(|&(k, _)| k as f64).collect();
  let ys: Vec<f64> = elbow.iter().map(|&(_, i)| i).collect();
  knee::kneedle(&xs, &ys)
    .or_else(|| knee::global_maximum(&xs, &ys))
    .or(if elbow.is_empty() { None } else { Some(0) })
    .map(|i| elbow[i].0)
}

/// Groups riders into stops. The depot comes first; every other stop holds the riders
/// of one cluster, in roster order, and sits at their mean position.
#[instrument(level="info", skip(riders, config), fields(riders=riders.len()))]
pub fn cluster_stops(riders: &[Student], depot: Coord, config: &PlanConfig) -> (Vec<Stop>, ClusterSummary) {
  let mut stops = vec![Stop::depot(depot)];
  let kmeans = KMeans::new(config.k_min)
    .restarts(config.kmeans_restarts)
    .max_iter(config.kmeans_max_iter)
    .seed(config.seed);

  let points: Vec<kmeans::Point> = riders.iter().map(|s| [s.home.lat, s.home.lon]).collect();
  let elbow = elbow_curve(&points, config.k_min, config.k_max, &kmeans);
  let chosen_k = match choose_k(&elbow) {
    Some(k) => k,
    None => {
      // fewer distinct homes than the smallest candidate
      kmeans::distinct_points(&points).min(config.k_min)
    }
  };
  debug!(?elbow, chosen_k);

  if riders.is_empty() {
    let summary = ClusterSummary { elbow, chosen_k: 0, repair: RepairOutcome::default() };
    return (stops, summary)
  }

  let fit = kmeans.with_k(chosen_k).fit(&points);
  let mut labels: Vec<ClusterId> = fit.labels.iter().map(|&l| ClusterId::from_raw(l as u32)).collect();
  let mut ids = UidCounter::starting_at(fit.k() as u32);

  let homes: Vec<Coord> = riders.iter().map(|s| s.home).collect();
  let repair = repair::enforce_max_distance(
    &homes, &mut labels, &mut ids, &kmeans, config.max_stop_distance_km, config.repair_max_passes);

  for (cluster, m) in repair::members(&labels) {
    let centroid = Coord::mean(m.iter().map(|&i| homes[i]));
    if let Some(centroid) = centroid {
      stops.push(Stop {
        id: StopId::cluster(cluster.raw()),
        centroid,
        students: m.iter().map(|&i| riders[i].id.clone()).collect(),
      });
    }
  }

  info!(stops=stops.len() - 1, chosen_k, splits=repair.splits, "stops placed");
  return (stops, ClusterSummary { elbow, chosen_k, repair })
}
