// 📊 Statistics Module
// Pearson correlation with significance, OLS regression, quintiles, descriptives

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Minimum sample size for a correlation
pub const MIN_CORRELATION_N: usize = 3;

/// Minimum sample size for a regression line
pub const MIN_REGRESSION_N: usize = 2;

/// Number of ranked groups in a quintile partition
pub const QUINTILES: usize = 5;

pub const QUINTILE_LABELS: [&str; QUINTILES] = ["Very low", "Low", "Medium", "High", "Very high"];

// ============================================================================
// CORRELATION
// ============================================================================

/// Outcome of a correlation test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Correlation {
    Computed { r: f64, p: f64, n: usize },
    Insufficient { n: usize },
}

impl Correlation {
    pub fn n(&self) -> usize {
        match self {
            Correlation::Computed { n, .. } | Correlation::Insufficient { n } => *n,
        }
    }

    /// (r, p) when enough data was available
    pub fn values(&self) -> Option<(f64, f64)> {
        match self {
            Correlation::Computed { r, p, .. } => Some((*r, *p)),
            Correlation::Insufficient { .. } => None,
        }
    }
}

struct Moments {
    n: usize,
    mean_x: f64,
    mean_y: f64,
    sxx: f64,
    syy: f64,
    sxy: f64,
    constant_x: bool,
    constant_y: bool,
}

/// Exact check: rounding in the mean leaves the sum of squares of a repeated
/// value slightly positive
fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

fn moments(xs: &[f64], ys: &[f64]) -> Moments {
    let n = xs.len().min(ys.len());
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mean_x = mean(xs).unwrap_or(0.0);
    let mean_y = mean(ys).unwrap_or(0.0);

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    Moments {
        n,
        mean_x,
        mean_y,
        sxx,
        syy,
        sxy,
        constant_x: is_constant(xs),
        constant_y: is_constant(ys),
    }
}

fn correlation_coefficient(m: &Moments) -> f64 {
    if m.constant_x || m.constant_y || m.sxx <= 0.0 || m.syy <= 0.0 {
        return 0.0;
    }
    (m.sxy / (m.sxx * m.syy).sqrt()).clamp(-1.0, 1.0)
}

/// Two-sided p-value of r under H0: rho = 0, from Student's t with n-2 df
pub fn correlation_p_value(r: f64, n: usize) -> f64 {
    if n < MIN_CORRELATION_N {
        return 1.0;
    }
    let df = (n - 2) as f64;
    let r2 = r * r;
    if r2 >= 1.0 {
        return 0.0;
    }
    let t2 = r2 * df / (1.0 - r2);
    // P(|T| > t) = I_{df/(df+t^2)}(df/2, 1/2)
    regularized_incomplete_beta(df / 2.0, 0.5, df / (df + t2)).clamp(0.0, 1.0)
}

/// Pearson correlation between paired samples
///
/// Returns `Insufficient` below `min_n` pairs. A constant series has no
/// linear association and yields r = 0, p = 1.
pub fn pearson(xs: &[f64], ys: &[f64], min_n: usize) -> Correlation {
    let m = moments(xs, ys);
    if m.n < min_n.max(MIN_CORRELATION_N) {
        return Correlation::Insufficient { n: m.n };
    }
    if m.constant_x || m.constant_y || m.sxx <= 0.0 || m.syy <= 0.0 {
        return Correlation::Computed { r: 0.0, p: 1.0, n: m.n };
    }
    let r = correlation_coefficient(&m);
    Correlation::Computed {
        r,
        p: correlation_p_value(r, m.n),
        n: m.n,
    }
}

// ============================================================================
// REGRESSION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
    pub r: f64,
    pub p: f64,
    pub std_err: f64,
    pub n: usize,
}

impl Regression {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// Two endpoints of the fitted line over [x_min, x_max]
    pub fn fit_line(&self, x_min: f64, x_max: f64) -> [(f64, f64); 2] {
        [(x_min, self.predict(x_min)), (x_max, self.predict(x_max))]
    }
}

/// Ordinary least squares of y on x
///
/// `None` with fewer than two points or when every x is identical.
pub fn linear_regression(xs: &[f64], ys: &[f64]) -> Option<Regression> {
    let m = moments(xs, ys);
    if m.n < MIN_REGRESSION_N || m.constant_x || m.sxx <= 0.0 {
        return None;
    }

    let slope = m.sxy / m.sxx;
    let intercept = m.mean_y - slope * m.mean_x;
    let r = correlation_coefficient(&m);

    let (p, std_err) = if m.n == 2 {
        // Two points always fit exactly
        (if r == 0.0 { 1.0 } else { 0.0 }, 0.0)
    } else {
        let df = (m.n - 2) as f64;
        let std_err = ((1.0 - r * r).max(0.0) * m.syy / m.sxx / df).sqrt();
        (correlation_p_value(r, m.n), std_err)
    };

    Some(Regression {
        slope,
        intercept,
        r,
        p,
        std_err,
        n: m.n,
    })
}

// ============================================================================
// DESCRIPTIVE STATISTICS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; `None` below two values
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Quantile with linear interpolation between closest ranks
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted_copy(values);
    Some(quantile_sorted(&sorted, q))
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

pub fn summarize(values: &[f64]) -> Option<Summary> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted_copy(values);
    Some(Summary {
        mean: mean(values)?,
        median: quantile_sorted(&sorted, 0.5),
        std: sample_std(values),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        count: values.len(),
    })
}

/// Equal-width histogram: (bin start, bin end, count) per bin
pub fn histogram(values: &[f64], bins: usize) -> Vec<(f64, f64, usize)> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = if max > min { (max - min) / bins as f64 } else { 1.0 };

    let mut counts = vec![0usize; bins];
    for v in values {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, c)| (min + i as f64 * width, min + (i + 1) as f64 * width, c))
        .collect()
}

// ============================================================================
// QUINTILES
// ============================================================================

/// Rank ranges of `groups` near-equal partitions of `n` ranked items
///
/// Group i covers ranks [i*n/groups, (i+1)*n/groups): sizes sum to n and
/// differ by at most one.
pub fn partition_ranks(n: usize, groups: usize) -> Vec<Range<usize>> {
    (0..groups)
        .map(|i| (i * n / groups)..((i + 1) * n / groups))
        .collect()
}

/// Positions of `metrics` in ascending order, ties kept in input order
pub fn rank_ascending(metrics: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..metrics.len()).collect();
    // sort_by is stable
    order.sort_by(|&a, &b| metrics[a].total_cmp(&metrics[b]));
    order
}

/// Item indices of each quintile, lowest metric first
pub fn quintile_groups(metrics: &[f64]) -> Vec<Vec<usize>> {
    let order = rank_ascending(metrics);
    partition_ranks(order.len(), QUINTILES)
        .into_iter()
        .map(|range| order[range].to_vec())
        .collect()
}

// ============================================================================
// SPECIAL FUNCTIONS
// ============================================================================

/// ln Γ(x) for x > 0 (Lanczos approximation)
pub fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 6] = [
        76.180_091_729_471_46,
        -86.505_320_329_416_77,
        24.014_098_240_830_91,
        -1.231_739_572_450_155,
        0.120_865_097_386_617_9e-2,
        -0.539_523_938_495_3e-5,
    ];
    let mut y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut series = 1.000_000_000_190_015;
    for c in COEFFS {
        y += 1.0;
        series += c / y;
    }
    -tmp + (2.506_628_274_631_000_5 * series / x).ln()
}

/// Continued fraction for the incomplete beta function (modified Lentz)
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 1e-15;
    const FPMIN: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < FPMIN {
        d = FPMIN;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Regularized incomplete beta function I_x(a, b)
pub fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_perfect_positive_correlation() {
        let scores = [50.0, 55.0, 60.0, 65.0, 70.0];
        let returns = [2.0, 4.0, 6.0, 8.0, 10.0];
        match pearson(&scores, &returns, MIN_CORRELATION_N) {
            Correlation::Computed { r, p, n } => {
                assert!(close(r, 1.0, 1e-12));
                assert!(p < 1e-6);
                assert_eq!(n, 5);
            }
            other => panic!("expected computed correlation, got {other:?}"),
        }
    }

    #[test]
    fn test_perfect_negative_correlation() {
        let (r, p) = pearson(&[1.0, 2.0, 3.0, 4.0], &[8.0, 6.0, 4.0, 2.0], 3)
            .values()
            .unwrap();
        assert!(close(r, -1.0, 1e-12));
        assert!(p < 1e-6);
    }

    #[test]
    fn test_insufficient_correlation() {
        assert_eq!(
            pearson(&[1.0, 2.0], &[3.0, 4.0], MIN_CORRELATION_N),
            Correlation::Insufficient { n: 2 }
        );
        // A larger configured minimum is honoured
        assert_eq!(
            pearson(&[1.0, 2.0, 3.0, 4.0], &[1.0, 3.0, 2.0, 4.0], 30),
            Correlation::Insufficient { n: 4 }
        );
    }

    #[test]
    fn test_constant_series_has_no_correlation() {
        let c = pearson(&[5.0, 5.0, 5.0, 5.0], &[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(c, Correlation::Computed { r: 0.0, p: 1.0, n: 4 });
    }

    #[test]
    fn test_repeated_fractional_scores_are_constant() {
        for (value, n) in [(0.1, 7), (63.27, 11), (63.27, 9), (41.3, 5)] {
            let xs = vec![value; n];
            let ys: Vec<f64> = (0..n).map(|i| i as f64 * 1.7 - 3.0).collect();
            assert!(linear_regression(&xs, &ys).is_none(), "{value} x {n}");
            assert_eq!(
                pearson(&xs, &ys, 3),
                Correlation::Computed { r: 0.0, p: 1.0, n },
                "{value} x {n}"
            );
            // Constant returns against varying scores
            assert_eq!(pearson(&ys, &xs, 3).values(), Some((0.0, 1.0)));
            assert_eq!(linear_regression(&ys, &xs).map(|reg| reg.r), Some(0.0));
        }
    }

    #[test]
    fn test_p_value_reference_points() {
        // r = 0.5 with n = 10: t = 1.633 on 8 df, two-sided p = 0.1411
        assert!(close(correlation_p_value(0.5, 10), 0.1411, 5e-4));
        // r = 0 is never significant
        assert!(close(correlation_p_value(0.0, 20), 1.0, 1e-9));
    }

    #[test]
    fn test_correlation_bounds_on_noisy_data() {
        let xs: Vec<f64> = (0..40).map(|i| (i as f64 * 0.37).sin() * 30.0 + 50.0).collect();
        let ys: Vec<f64> = (0..40).map(|i| (i as f64 * 1.91).cos() * 12.0).collect();
        let (r, p) = pearson(&xs, &ys, 3).values().unwrap();
        assert!((-1.0..=1.0).contains(&r));
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_regression_line() {
        let reg = linear_regression(&[1.0, 2.0, 3.0, 4.0], &[3.0, 5.0, 7.0, 9.0]).unwrap();
        assert!(close(reg.slope, 2.0, 1e-12));
        assert!(close(reg.intercept, 1.0, 1e-12));
        assert!(close(reg.r, 1.0, 1e-12));
        assert!(close(reg.std_err, 0.0, 1e-9));
        assert_eq!(reg.fit_line(0.0, 10.0), [(0.0, 1.0), (10.0, 21.0)]);
    }

    #[test]
    fn test_regression_degenerate() {
        assert!(linear_regression(&[1.0], &[2.0]).is_none());
        assert!(linear_regression(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0]).is_none());
        let two = linear_regression(&[0.0, 1.0], &[0.0, 2.0]).unwrap();
        assert_eq!(two.p, 0.0);
    }

    #[test]
    fn test_summary_and_quantiles() {
        let values = [4.0, 1.0, 3.0, 2.0];
        let s = summarize(&values).unwrap();
        assert_eq!(s.mean, 2.5);
        assert_eq!(s.median, 2.5);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 4.0);
        assert!(close(s.std.unwrap(), 1.2909944487358056, 1e-12));
        assert_eq!(quantile(&values, 0.25), Some(1.75));
        assert!(summarize(&[]).is_none());
        assert!(summarize(&[7.0]).unwrap().std.is_none());
    }

    #[test]
    fn test_partition_sizes() {
        for n in 0..40 {
            let ranges = partition_ranks(n, QUINTILES);
            let sizes: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
            assert_eq!(sizes.iter().sum::<usize>(), n);
            let max = *sizes.iter().max().unwrap();
            let min = *sizes.iter().min().unwrap();
            assert!(max - min <= 1, "n = {n}: {sizes:?}");
        }
    }

    #[test]
    fn test_quintile_ties_keep_input_order() {
        let metrics = [10.0, 5.0, 10.0, 1.0, 10.0];
        let groups = quintile_groups(&metrics);
        assert_eq!(groups, vec![vec![3], vec![1], vec![0], vec![2], vec![4]]);
    }

    #[test]
    fn test_histogram_counts_everything() {
        let values: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let bins = histogram(&values, 40);
        assert_eq!(bins.len(), 40);
        assert_eq!(bins.iter().map(|b| b.2).sum::<usize>(), 100);
        assert_eq!(histogram(&[3.0, 3.0], 4).iter().map(|b| b.2).sum::<usize>(), 2);
    }

    #[test]
    fn test_incomplete_beta_edges() {
        assert_eq!(regularized_incomplete_beta(2.0, 3.0, 0.0), 0.0);
        assert_eq!(regularized_incomplete_beta(2.0, 3.0, 1.0), 1.0);
        // I_x(1, 1) = x
        assert!(close(regularized_incomplete_beta(1.0, 1.0, 0.3), 0.3, 1e-9));
    }
}
