//! Statistical utility functions shared across modules

use std::cmp::Ordering;

/// Median of the finite values; NaN when there are none
pub fn median(values: &[f64]) -> f64 {
    let mut finite: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = finite.len();
    if n % 2 == 0 {
        (finite[n / 2 - 1] + finite[n / 2]) / 2.0
    } else {
        finite[n / 2]
    }
}

/// Median absolute deviation scaled by 1.4826 (consistent for the normal sd)
pub fn mad(values: &[f64]) -> f64 {
    let center = median(values);
    let deviations: Vec<f64> = values.iter().map(|x| (x - center).abs()).collect();
    median(&deviations) * 1.4826
}

/// Trigamma function (second derivative of ln Gamma)
pub fn trigamma(x: f64) -> f64 {
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).powi(2) - trigamma(1.0 - x);
    }
    let mut acc = 0.0;
    let mut z = x;
    while z < 8.0 {
        acc += 1.0 / (z * z);
        z += 1.0;
    }
    // asymptotic expansion
    let z2 = z * z;
    acc + 1.0 / z + 0.5 / z2 + 1.0 / (6.0 * z2 * z) - 1.0 / (30.0 * z2 * z2 * z) + 1.0 / (42.0 * z2 * z2 * z2 * z)
}

/// Type-7 sample quantile of sorted data
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let h = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Maximize `f` over [lo, hi] with a coarse grid followed by a fine grid around the best point
pub fn grid_maximize<F: Fn(f64) -> f64>(f: F, lo: f64, hi: f64, n: usize) -> f64 {
    let best_on = |from: f64, to: f64| -> (f64, f64) {
        let step = (to - from) / (n - 1) as f64;
        (0..n)
            .map(|i| from + i as f64 * step)
            .map(|x| (x, f(x)))
            .filter(|(_, v)| v.is_finite())
            .fold((from, f64::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best })
    };
    let delta = (hi - lo) / (n - 1) as f64;
    let (coarse, _) = best_on(lo, hi);
    let (fine, _) = best_on((coarse - delta).max(lo), (coarse + delta).min(hi));
    fine
}
