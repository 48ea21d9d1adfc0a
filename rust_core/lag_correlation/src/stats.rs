//! Dependence statistics over two equally long samples.
//!
//! Every function returns `None` instead of NaN when the statistic is not
//! defined for its input (too few points, mismatched lengths, or a sample
//! with no spread).

use ndarray::{Array2, Axis};

fn is_constant(x: &[f64]) -> bool {
    x.iter().all(|v| *v == x[0])
}

fn max_abs(x: &[f64]) -> f64 {
    x.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
}

/// Centre `x` and scale it into [-1, 1].
///
/// Both statistics are invariant to shifting and scaling a sample, and working
/// on unit-sized deviations keeps squares and cross products away from
/// overflow and underflow. `None` when the sample has no spread.
fn standardize(x: &[f64]) -> Option<Vec<f64>> {
    let magnitude = max_abs(x);
    if magnitude == 0.0 || !magnitude.is_finite() {
        return None;
    }
    let unit: Vec<f64> = x.iter().map(|v| v / magnitude).collect();
    let mean = unit.iter().sum::<f64>() / (unit.len() as f64);
    let mut centred: Vec<f64> = unit.iter().map(|v| v - mean).collect();
    let spread = max_abs(&centred);
    if spread == 0.0 || !spread.is_finite() {
        return None;
    }
    centred.iter_mut().for_each(|v| *v /= spread);
    Some(centred)
}

/// 1-based ranks; tied values share the mean of the ranks they span.
pub fn average_ranks(x: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..x.len()).collect();
    order.sort_by(|&a, &b| x[a].total_cmp(&x[b]));

    let mut ranks = vec![0.0; x.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && x[order[end]] == x[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let shared = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = shared;
        }
        start = end;
    }
    ranks
}

/// Pearson product-moment correlation.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 || is_constant(x) || is_constant(y) {
        return None;
    }
    let (x, y) = (standardize(x)?, standardize(y)?);
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (dx, dy) in x.iter().zip(&y) {
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = sxx.sqrt() * syy.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some((sxy / denom).clamp(-1.0, 1.0))
}

/// Spearman's rank correlation: Pearson correlation of the average ranks.
pub fn spearman(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    pearson(&average_ranks(x), &average_ranks(y))
}

/// Double-centred pairwise distance matrix `|x_i - x_j|`, centred in place.
fn centred_distances(x: &[f64]) -> Option<Array2<f64>> {
    let n = x.len();
    let mut dist = Array2::from_shape_fn((n, n), |(i, j)| (x[i] - x[j]).abs());
    // symmetric, so row and column means coincide
    let means = dist.mean_axis(Axis(0))?;
    let grand = means.mean()?;
    for ((i, j), d) in dist.indexed_iter_mut() {
        *d += grand - means[i] - means[j];
    }
    Some(dist)
}

fn mean_product(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(p, q)| p * q).sum::<f64>() / (a.len() as f64)
}

/// Distance correlation (Székely, Rizzo & Bakirov), V-statistic form.
///
/// Zero only under independence; 1 when one sample is a similarity
/// transform of the other.
pub fn distance_correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 || is_constant(x) || is_constant(y) {
        return None;
    }
    let a = centred_distances(&standardize(x)?)?;
    let b = centred_distances(&standardize(y)?)?;

    let dcov_xy = mean_product(&a, &b).max(0.0);
    let dvar_x = mean_product(&a, &a);
    let dvar_y = mean_product(&b, &b);
    let denom = dvar_x.sqrt() * dvar_y.sqrt();
    if denom <= 0.0 || !denom.is_finite() {
        return None;
    }
    Some((dcov_xy / denom).sqrt().clamp(0.0, 1.0))
}
