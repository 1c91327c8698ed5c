use std::cmp::max;
use std::str::FromStr;
use std::time::Duration;

use crate::Error;

pub const KM_PER_MILE: f64 = 1.60934;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ClassifierKind {
  /// Great-circle distance from home to school.
  Geodesic,
  /// Shortest walking path over the road graph.
  Network,
}

/// How the members of an over-full stop are shared between its siblings.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SplitPolicy {
  /// `ceil(demand / siblings)` per sibling, remainder last.
  Even,
  /// Full siblings first, remainder last.
  FillToCapacity,
}

/// What to do with roster rows that fail validation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InputPolicy {
  Strict,
  Lenient,
}

macro_rules! impl_from_str {
  ($t:ty, $names:ident, { $($s:literal => $v:expr),+ $(,)? }) => {
    pub const $names: &[&str] = &[$($s),+];

    impl FromStr for $t {
      type Err = String;

      fn from_str(s: &str) -> Result<Self, Self::Err> {
        return match s {
          $($s => Ok($v),)+
          _ => Err(format!("invalid string: {}", s))
        };
      }
    }
  };
}

impl_from_str!(ClassifierKind, CLASSIFIER_STRINGS, {
  "geodesic" => ClassifierKind::Geodesic,
  "network" => ClassifierKind::Network,
});

impl_from_str!(SplitPolicy, SPLIT_POLICY_STRINGS, {
  "even" => SplitPolicy::Even,
  "fill" => SplitPolicy::FillToCapacity,
});

impl_from_str!(InputPolicy, INPUT_POLICY_STRINGS, {
  "strict" => InputPolicy::Strict,
  "lenient" => InputPolicy::Lenient,
});

#[derive(Debug, Clone, PartialEq)]
pub struct PlanConfig {
  pub capacity: u32,
  pub max_fleet: u32,
  /// Defaults to `max(1, max_fleet / 2)` when unset.
  pub min_fleet: Option<u32>,
  pub classifier: ClassifierKind,
  pub safe_walk_miles: f64,
  pub walk_scale_divisor: f64,
  pub network_walk_threshold_km: f64,
  pub max_stop_distance_km: f64,
  pub k_min: usize,
  pub k_max: usize,
  pub kmeans_restarts: usize,
  pub kmeans_max_iter: usize,
  pub repair_max_passes: usize,
  pub split_policy: SplitPolicy,
  pub seed: u64,
  pub solver_budget: Duration,
  pub stop_margin: u32,
  pub parallel_attempts: bool,
  pub average_speed_kmh: f64,
  pub underutilized_ratio: f64,
  pub input_policy: InputPolicy,
}

impl Default for PlanConfig {
  fn default() -> Self {
    PlanConfig {
      capacity: 40,
      max_fleet: 60,
      min_fleet: None,
      classifier: ClassifierKind::Geodesic,
      safe_walk_miles: 1.5,
      walk_scale_divisor: 2.7,
      network_walk_threshold_km: 2.4,
      max_stop_distance_km: 1.0,
      k_min: 1,
      k_max: 30,
      kmeans_restarts: 10,
      kmeans_max_iter: 300,
      repair_max_passes: 1000,
      split_policy: SplitPolicy::Even,
      seed: 42,
      solver_budget: Duration::from_secs(30),
      stop_margin: 2,
      parallel_attempts: false,
      average_speed_kmh: 35.0,
      underutilized_ratio: 0.5,
      input_policy: InputPolicy::Strict,
    }
  }
}

impl PlanConfig {
  #[inline]
  pub fn min_fleet(&self) -> u32 {
    self.min_fleet.unwrap_or_else(|| max(1, self.max_fleet / 2))
  }

  /// Geodesic walk threshold in kilometres.
  #[inline]
  pub fn walk_threshold_km(&self) -> f64 {
    (self.safe_walk_miles / self.walk_scale_divisor) * KM_PER_MILE
  }

  pub fn validate(&self) -> Result<(), Error> {
    fn positive(name: &str, x: f64) -> Result<(), Error> {
      if x.is_finite() && x > 0.0 { Ok(()) }
      else { Err(Error::InvalidConfig(format!("{} must be positive and finite, got {}", name, x))) }
    }
    let bail = |msg: String| Err(Error::InvalidConfig(msg));

    if self.capacity == 0 { return bail("capacity must be at least 1".into()) }
    if self.max_fleet == 0 { return bail("max_fleet must be at least 1".into()) }
    if let Some(m) = self.min_fleet {
      if m == 0 || m > self.max_fleet {
        return bail(format!("min_fleet must be in 1..={}, got {}", self.max_fleet, m))
      }
    }
    positive("safe_walk_miles", self.safe_walk_miles)?;
    positive("walk_scale_divisor", self.walk_scale_divisor)?;
    positive("network_walk_threshold_km", self.network_walk_threshold_km)?;
    positive("max_stop_distance_km", self.max_stop_distance_km)?;
    positive("average_speed_kmh", self.average_speed_kmh)?;
    if self.k_min == 0 || self.k_min > self.k_max {
      return bail(format!("cluster range {}..={} is empty or starts at zero", self.k_min, self.k_max))
    }
    if self.kmeans_restarts == 0 || self.kmeans_max_iter == 0 {
      return bail("k-means needs at least one restart and one iteration".into())
    }
    if self.repair_max_passes == 0 { return bail("repair_max_passes must be at least 1".into()) }
    if self.solver_budget == Duration::from_secs(0) { return bail("solver budget must be non-zero".into()) }
    if !(self.underutilized_ratio > 0.0 && self.underutilized_ratio <= 1.0) {
      return bail(format!("underutilized_ratio must be in (0, 1], got {}", self.underutilized_ratio))
    }
    Ok(())
  }
}
