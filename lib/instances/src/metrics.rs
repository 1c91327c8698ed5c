use num_traits::{AsPrimitive, Num};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

pub trait Metric {
  const SYM: bool = false;

  fn compute<T: Num + AsPrimitive<f64>>(p1: (T, T), p2: (T, T)) -> f64;
}


pub struct Euclidean();

impl Metric for Euclidean {
  const SYM: bool = true;

  fn compute<T: Num + AsPrimitive<f64>>(p1: (T, T), p2: (T, T)) -> f64 {
    let a = p1.0.as_() - p2.0.as_();
    let b = p1.1.as_() - p2.1.as_();
    (a*a + b*b).sqrt()
  }
}

/// Great-circle distance in kilometres between two `(lat, lon)` points given in degrees.
pub struct Haversine();

impl Metric for Haversine {
  const SYM: bool = true;

  fn compute<T: Num + AsPrimitive<f64>>(p1: (T, T), p2: (T, T)) -> f64 {
    let (lat1, lon1) = (p1.0.as_().to_radians(), p1.1.as_().to_radians());
    let (lat2, lon2) = (p2.0.as_().to_radians(), p2.1.as_().to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = lon2 - lon1;
    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // clamp guards against a > 1 from rounding on antipodal points
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
  }
}

/// Squared Euclidean distance in raw coordinate space, the k-means objective.
#[inline]
pub fn sq_euclidean(p1: (f64, f64), p2: (f64, f64)) -> f64 {
  let d = Euclidean::compute(p1, p2);
  d * d
}
