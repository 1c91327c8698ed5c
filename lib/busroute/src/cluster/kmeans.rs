use rand::prelude::*;
use rand::rngs::StdRng;
use instances::metrics::sq_euclidean;

use crate::Set;

pub type Point = [f64; 2];

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
  pub labels: Vec<usize>,
  pub centers: Vec<Point>,
  /// Sum of squared distances from each point to its center.
  pub inertia: f64,
}

impl KMeansFit {
  #[inline]
  pub fn k(&self) -> usize { self.centers.len() }
}

/// Seeded Lloyd's k-means with k-means++ initialisation. The best of `restarts`
/// independent runs (lowest inertia) is kept.
#[derive(Debug, Clone)]
pub struct KMeans {
  k: usize,
  restarts: usize,
  max_iter: usize,
  tol: f64,
  seed: u64,
}

impl KMeans {
  pub fn new(k: usize) -> Self {
    KMeans { k, restarts: 10, max_iter: 300, tol: 1e-4, seed: 42 }
  }

  pub fn restarts(mut self, n: usize) -> Self { self.restarts = n.max(1); self }

  pub fn max_iter(mut self, n: usize) -> Self { self.max_iter = n.max(1); self }

  pub fn seed(mut self, seed: u64) -> Self { self.seed = seed; self }

  pub fn with_k(&self, k: usize) -> Self { KMeans { k, ..self.clone() } }

  /// `k` is clamped to the number of distinct points; an empty input gives an empty fit.
  pub fn fit(&self, points: &[Point]) -> KMeansFit {
    let k = self.k.min(distinct_points(points));
    if k == 0 {
      return KMeansFit { labels: vec![0; points.len()], centers: Vec::new(), inertia: 0.0 }
    }
    let mut rng = StdRng::seed_from_u64(self.seed);
    let mut best = self.lloyd(points, plus_plus_init(points, k, &mut rng));
    for _ in 1..self.restarts {
      let fit = self.lloyd(points, plus_plus_init(points, k, &mut rng));
      if fit.inertia < best.inertia {
        best = fit;
      }
    }
    return best
  }

  fn lloyd(&self, points: &[Point], mut centers: Vec<Point>) -> KMeansFit {
    let k = centers.len();
    let mut labels = vec![usize::MAX; points.len()];
    // tolerance is relative to the spread of the data, as a fraction of the mean variance
    let tol = self.tol * mean_variance(points);

    for _ in 0..self.max_iter {
      let mut changed = false;
      for (i, p) in points.iter().enumerate() {
        let c = nearest_center(*p, &centers).0;
        if labels[i] != c {
          labels[i] = c;
          changed = true;
        }
      }
      if !changed {
        break;
      }

      let mut sums = vec![[0.0, 0.0]; k];
      let mut counts = vec![0usize; k];
      for (p, &c) in points.iter().zip(&labels) {
        sums[c][0] += p[0];
        sums[c][1] += p[1];
        counts[c] += 1;
      }

      let mut shift = 0.0;
      for j in 0..k {
        let new = if counts[j] > 0 {
          [sums[j][0] / counts[j] as f64, sums[j][1] / counts[j] as f64]
        } else {
          // empty cluster takes the point worst served by the current centers
          farthest_point(points, &labels, &centers)
        };
        shift += sq_euclidean((new[0], new[1]), (centers[j][0], centers[j][1]));
        centers[j] = new;
      }
      if shift <= tol {
        for (i, p) in points.iter().enumerate() {
          labels[i] = nearest_center(*p, &centers).0;
        }
        break;
      }
    }

    let inertia = points.iter()
      .zip(&labels)
      .map(|(p, &c)| sq_dist(*p, centers[c]))
      .sum();
    return KMeansFit { labels, centers, inertia }
  }
}

#[inline]
fn sq_dist(a: Point, b: Point) -> f64 {
  sq_euclidean((a[0], a[1]), (b[0], b[1]))
}

fn nearest_center(p: Point, centers: &[Point]) -> (usize, f64) {
  let mut best = (0, f64::INFINITY);
  for (j, c) in centers.iter().enumerate() {
    let d = sq_dist(p, *c);
    if d < best.1 {
      best = (j, d);
    }
  }
  best
}

fn farthest_point(points: &[Point], labels: &[usize], centers: &[Point]) -> Point {
  points.iter()
    .zip(labels)
    .map(|(p, &c)| (*p, sq_dist(*p, centers[c])))
    .fold((points[0], -1.0), |acc, x| if x.1 > acc.1 { x } else { acc })
    .0
}

fn mean_variance(points: &[Point]) -> f64 {
  let n = points.len() as f64;
  let mut var = 0.0;
  for dim in 0..2 {
    let mean = points.iter().map(|p| p[dim]).sum::<f64>() / n;
    var += points.iter().map(|p| (p[dim] - mean).powi(2)).sum::<f64>() / n;
  }
  var / 2.0
}

/// k-means++: first center uniformly at random, then each next center drawn with
/// probability proportional to the squared distance to the closest chosen center.
fn plus_plus_init(points: &[Point], k: usize, rng: &mut StdRng) -> Vec<Point> {
  let mut centers = Vec::with_capacity(k);
  centers.push(points[rng.gen_range(0, points.len())]);
  let mut d2: Vec<f64> = points.iter().map(|p| sq_dist(*p, centers[0])).collect();

  while centers.len() < k {
    let total: f64 = d2.iter().sum();
    let next = if total > 0.0 {
      let mut target = rng.gen::<f64>() * total;
      let mut chosen = None;
      for (i, &w) in d2.iter().enumerate() {
        if w > 0.0 {
          chosen = Some(i);
          if target < w { break; }
          target -= w;
        }
      }
      chosen
    } else {
      None
    };
    // k never exceeds the distinct point count, so a positive weight always exists
    let next = match next {
      Some(i) => i,
      None => break,
    };
    let c = points[next];
    centers.push(c);
    for (w, p) in d2.iter_mut().zip(points) {
      *w = w.min(sq_dist(*p, c));
    }
  }
  centers
}

pub fn distinct_points(points: &[Point]) -> usize {
  points.iter()
    .map(|p| (p[0].to_bits(), p[1].to_bits()))
    .collect::<Set<_>>()
    .len()
}


#[cfg(test)]
mod tests {
  use super::*;

  fn blobs() -> Vec<Point> {
    let mut pts = Vec::new();
    for &(cx, cy) in &[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)] {
      for i in 0..5 {
        let o = i as f64 * 0.1;
        pts.push([cx + o, cy - o]);
      }
    }
    pts
  }

  #[test]
  fn finds_separated_blobs() {
    let pts = blobs();
    let fit = KMeans::new(3).fit(&pts);
    assert_eq!(fit.k(), 3);
    for b in 0..3 {
      let l = fit.labels[b * 5];
      assert!(fit.labels[b * 5..(b + 1) * 5].iter().all(|&x| x == l));
    }
    let distinct: Set<_> = fit.labels.iter().collect();
    assert_eq!(distinct.len(), 3);
    assert!(fit.inertia < 1.0);
  }

  #[test]
  fn deterministic_for_a_seed() {
    let pts = blobs();
    assert_eq!(KMeans::new(4).fit(&pts), KMeans::new(4).fit(&pts));
  }

  #[test]
  fn clamps_to_distinct_points() {
    let pts = vec![[1.0, 1.0], [1.0, 1.0], [2.0, 2.0]];
    let fit = KMeans::new(5).fit(&pts);
    assert_eq!(fit.k(), 2);
    assert_eq!(fit.labels[0], fit.labels[1]);
    assert_ne!(fit.labels[0], fit.labels[2]);
    assert_eq!(fit.inertia, 0.0);
    assert_eq!(KMeans::new(3).fit(&[]).k(), 0);
  }

  #[test]
  fn inertia_drops_until_the_blobs_separate() {
    let pts = blobs();
    let i: Vec<_> = (1..=3).map(|k| KMeans::new(k).fit(&pts).inertia).collect();
    assert!(i[0] > i[1] && i[1] > i[2], "{:?}", i);
  }
}
