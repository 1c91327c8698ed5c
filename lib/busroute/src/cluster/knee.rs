//! Knee detection on a convex, decreasing curve (the "Kneedle" method).

/// Sensitivity; higher values wait for a more pronounced drop before accepting a knee.
pub const SENSITIVITY: f64 = 1.0;

/// Returns the index of the knee of the convex decreasing curve `(xs[i], ys[i])`, or
/// `None` when the difference curve has no local maximum followed by a drop below its
/// threshold. `xs` must be strictly increasing.
pub fn kneedle(xs: &[f64], ys: &[f64]) -> Option<usize> {
  let n = xs.len();
  debug_assert_eq!(n, ys.len());
  let diff = difference_curve(xs, ys)?;

  let maxima: Vec<usize> = (0..n).filter(|&i| is_extremum(&diff, i, |a, b| a >= b)).collect();
  let minima: Vec<usize> = (0..n).filter(|&i| is_extremum(&diff, i, |a, b| a <= b)).collect();
  let first = *maxima.first()?;

  let x_norm = normalize(xs)?;
  let mean_step = x_norm.windows(2).map(|w| w[1] - w[0]).sum::<f64>() / (n - 1) as f64;

  let mut threshold = 0.0;
  let mut threshold_index = first;
  for i in first..n - 1 {
    if maxima.binary_search(&i).is_ok() {
      threshold = diff[i] - SENSITIVITY * mean_step.abs();
      threshold_index = i;
    }
    if minima.binary_search(&i).is_ok() {
      threshold = 0.0;
    }
    if diff[i + 1] < threshold {
      return Some(threshold_index)
    }
  }
  None
}

/// Index of the largest value of the difference curve.
pub fn global_maximum(xs: &[f64], ys: &[f64]) -> Option<usize> {
  let diff = difference_curve(xs, ys)?;
  diff.iter()
    .enumerate()
    .fold(None, |best: Option<(usize, f64)>, (i, &d)| match best {
      Some((_, b)) if b >= d => best,
      _ => Some((i, d)),
    })
    .map(|(i, _)| i)
}

/// Normalised distance of the flipped curve above the diagonal.
fn difference_curve(xs: &[f64], ys: &[f64]) -> Option<Vec<f64>> {
  if xs.len() < 2 {
    return None
  }
  let x = normalize(xs)?;
  let y = normalize(ys)?;
  Some(x.iter().zip(&y).map(|(x, y)| (1.0 - y) - x).collect())
}

fn normalize(v: &[f64]) -> Option<Vec<f64>> {
  let lo = v.iter().cloned().fold(f64::INFINITY, f64::min);
  let hi = v.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
  let span = hi - lo;
  if !(span > 0.0) || !span.is_finite() {
    return None
  }
  Some(v.iter().map(|x| (x - lo) / span).collect())
}

fn is_extremum(v: &[f64], i: usize, cmp: impl Fn(f64, f64) -> bool) -> bool {
  let prev = v[i.saturating_sub(1)];
  let next = v[(i + 1).min(v.len() - 1)];
  cmp(v[i], prev) && cmp(v[i], next)
}


#[cfg(test)]
mod tests {
  use super::*;

  fn ks(n: usize) -> Vec<f64> { (1..=n).map(|k| k as f64).collect() }

  #[test]
  fn elbow_of_a_sharp_curve() {
    // inertia collapses until k = 3 and barely moves afterwards
    let ys = vec![1000.0, 420.0, 60.0, 50.0, 45.0, 41.0, 38.0, 36.0];
    assert_eq!(kneedle(&ks(8), &ys), Some(2));
  }

  #[test]
  fn elbow_of_inverse_curve() {
    let xs = ks(10);
    let ys: Vec<_> = xs.iter().map(|x| 1.0 / x).collect();
    let knee = kneedle(&xs, &ys).unwrap();
    assert!(knee == 1 || knee == 2, "{}", knee);
  }

  #[test]
  fn degenerate_curves() {
    assert_eq!(kneedle(&ks(1), &[5.0]), None);
    assert_eq!(kneedle(&ks(3), &[2.0, 2.0, 2.0]), None);
    assert_eq!(global_maximum(&ks(3), &[2.0, 2.0, 2.0]), None);
  }

  #[test]
  fn straight_line_falls_back() {
    let ys = vec![4.0, 3.0, 2.0, 1.0];
    // every point lies on the diagonal, so nothing drops below a threshold
    assert_eq!(kneedle(&ks(4), &ys), None);
    assert!(global_maximum(&ks(4), &ys).is_some());
  }
}
