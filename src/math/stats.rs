//! Order statistics and hypothesis tests.
//!
//! Every reduction here first sorts its (finite) inputs so that results are
//! bit-identical regardless of input order.

use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;

/// Finite values of `values`, ascending.
pub fn finite_sorted(values: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    out.sort_by(f64::total_cmp);
    out
}

/// Median of an already-sorted slice.
pub fn median_sorted(sorted: &[f64]) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Median of the finite entries.
pub fn median(values: &[f64]) -> Option<f64> {
    median_sorted(&finite_sorted(values))
}

/// Mean of the finite entries (summed in ascending order).
pub fn mean(values: &[f64]) -> Option<f64> {
    let sorted = finite_sorted(values);
    if sorted.is_empty() {
        return None;
    }
    Some(sorted.iter().sum::<f64>() / sorted.len() as f64)
}

pub fn max(values: &[f64]) -> Option<f64> {
    finite_sorted(values).last().copied()
}

/// Linear-interpolation quantile of a sorted slice, `q ∈ [0, 1]`.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Exact two-sided binomial test of `k` successes in `n` trials under `p = 1/2`.
///
/// The p-value sums the probabilities of all outcomes no more likely than the
/// observed one (relative tolerance `1e-7`), capped at 1.
pub fn binomial_two_sided(k: usize, n: usize) -> f64 {
    if n == 0 || k > n {
        return 1.0;
    }
    let log_pmf = binomial_half_log_pmf(n);
    let threshold = log_pmf[k] + (1.0 + 1e-7_f64).ln();
    let p: f64 = log_pmf
        .iter()
        .filter(|lp| **lp <= threshold)
        .map(|lp| lp.exp())
        .sum();
    p.min(1.0)
}

/// `ln P(X = i)` for `X ~ Binomial(n, 1/2)`, `i = 0..=n`.
fn binomial_half_log_pmf(n: usize) -> Vec<f64> {
    let ln_half_n = -(n as f64) * std::f64::consts::LN_2;
    let mut out = Vec::with_capacity(n + 1);
    let mut ln_choose = 0.0_f64;
    out.push(ln_half_n);
    for i in 0..n {
        ln_choose += ((n - i) as f64).ln() - ((i + 1) as f64).ln();
        out.push(ln_choose + ln_half_n);
    }
    out
}

/// Percentile bootstrap confidence interval for the median.
///
/// Resample `i` draws from its own generator seeded with `seed + i`, so the
/// result does not depend on how rayon schedules the work.
pub fn bootstrap_median_ci(values: &[f64], samples: usize, alpha: f64, seed: u64) -> Option<(f64, f64)> {
    let data = finite_sorted(values);
    if data.is_empty() || samples == 0 {
        return None;
    }
    let n = data.len();

    let mut medians: Vec<f64> = (0..samples)
        .into_par_iter()
        .filter_map(|i| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let mut draw: Vec<f64> = (0..n).map(|_| data[rng.gen_range(0..n)]).collect();
            draw.sort_by(f64::total_cmp);
            median_sorted(&draw)
        })
        .collect();
    medians.sort_by(f64::total_cmp);

    let lo = quantile_sorted(&medians, alpha / 2.0)?;
    let hi = quantile_sorted(&medians, 1.0 - alpha / 2.0)?;
    Some((lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_skips_non_finite_and_is_order_free() {
        let a = median(&[3.0, f64::NAN, 1.0, 2.0, f64::INFINITY]).unwrap();
        assert!((a - 2.0).abs() < 1e-12);
        let b = median(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert!((b - 2.5).abs() < 1e-12);
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn mean_is_bit_stable_under_permutation() {
        let a = [0.1, 1e-17, 0.3, 1e10, 0.2];
        let b = [1e10, 0.2, 0.1, 0.3, 1e-17];
        assert_eq!(mean(&a).unwrap().to_bits(), mean(&b).unwrap().to_bits());
    }

    #[test]
    fn quantile_interpolates() {
        let s = [0.0, 10.0];
        assert!((quantile_sorted(&s, 0.25).unwrap() - 2.5).abs() < 1e-12);
        assert_eq!(quantile_sorted(&s, 0.0), Some(0.0));
        assert_eq!(quantile_sorted(&s, 1.0), Some(10.0));
    }

    #[test]
    fn binomial_known_values() {
        // P(X<=1 or X>=9), n=10.
        let expected = 2.0 * (1.0 + 10.0) / 1024.0;
        assert!((binomial_two_sided(1, 10) - expected).abs() < 1e-12);
        // The centre of a symmetric distribution is never significant.
        assert!((binomial_two_sided(5, 10) - 1.0).abs() < 1e-12);
        assert_eq!(binomial_two_sided(0, 0), 1.0);
    }

    #[test]
    fn binomial_is_symmetric() {
        for n in [7usize, 20, 100] {
            for k in 0..=n {
                let a = binomial_two_sided(k, n);
                let b = binomial_two_sided(n - k, n);
                assert!((a - b).abs() < 1e-12, "n={n} k={k}");
            }
        }
    }

    #[test]
    fn binomial_large_n_does_not_underflow() {
        let p = binomial_two_sided(1000, 2000);
        assert!((p - 1.0).abs() < 1e-9);
        let q = binomial_two_sided(1200, 2000);
        assert!(q > 0.0 && q < 1e-10);
    }

    #[test]
    fn bootstrap_ci_is_seeded() {
        let values: Vec<f64> = (0..50).map(|i| (i as f64 * 0.37).sin().abs()).collect();
        let a = bootstrap_median_ci(&values, 500, 0.05, 1234).unwrap();
        let b = bootstrap_median_ci(&values, 500, 0.05, 1234).unwrap();
        assert_eq!(a, b);
        let m = median(&values).unwrap();
        assert!(a.0 <= m && m <= a.1);
    }
}
