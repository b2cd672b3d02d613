//! Statistical reducers built on the broadcasting engine.
//!
//! Every reducer flattens its inputs and is then written as a short
//! composition of [`broadcast`](crate::broadcast) operations, so it accepts
//! the same nested shapes as the arithmetic does and inherits its
//! permissive behavior: non-finite leaves are skipped by the sums, an
//! empty input yields NaN, a zero divisor yields an infinity.
//!
//! # Weights
//!
//! Weights are flattened too and aligned with the data by position. A
//! shorter weight list leaves the remaining data unweighted in element-wise
//! steps; extra weights are ignored there but still count towards the
//! total weight.
//!
//! # Weighted dispersion
//!
//! The weighted variance is `Σ wᵢ(xᵢ − x̄_w) / d`, linear in the deviations,
//! and the weighted covariance is `Σ wᵢ(xᵢ − x̄_w)(yᵢ − ȳ_w) / d`. These are
//! kept for compatibility and are not the textbook weighted estimators.

use std::str::FromStr;

use crate::broadcast::{self, map_scalar, Operator};
use crate::error::ParseKindError;
use crate::flatten::flatten;
use crate::value::Value;

/// Divisor used by [`variance`], [`standard_deviation`] and [`covariance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VarianceKind {
    /// Bessel's correction: divide by `n − 1`.
    #[default]
    Unbiased,
    /// Divide by `n`.
    Biased,
    /// Same divisor as [`VarianceKind::Biased`].
    Population,
}

impl VarianceKind {
    fn divisor(self, n: usize) -> f64 {
        match self {
            VarianceKind::Unbiased => n as f64 - 1.0,
            VarianceKind::Biased | VarianceKind::Population => n as f64,
        }
    }
}

impl FromStr for VarianceKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unbiased" => Ok(VarianceKind::Unbiased),
            "biased" => Ok(VarianceKind::Biased),
            "population" => Ok(VarianceKind::Population),
            other => Err(ParseKindError(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn flat(value: &Value) -> Value {
    Value::Sequence(flatten(value))
}

fn leaf_count(value: &Value) -> usize {
    match value {
        Value::Sequence(items) => items.len(),
        _ => 1,
    }
}

/// Sum of the finite leaves, as a number.
fn total(value: &Value) -> f64 {
    scalar(&broadcast::sum(value, None))
}

fn scalar(value: &Value) -> f64 {
    value.as_f64().unwrap_or(f64::NAN)
}

/// `x − m` for every leaf. Goes through [`map_scalar`] so that a zero mean
/// is subtracted rather than read as a missing argument.
fn deviations(x: &Value, m: f64) -> Value {
    Value::Sequence(map_scalar(&flatten(x), m, |a, b| a - b))
}

// ---------------------------------------------------------------------------
// Means
// ---------------------------------------------------------------------------

/// Arithmetic mean, optionally weighted.
///
/// # Formula
/// ```text
/// unweighted:  Σ xᵢ / n
/// weighted:    Σ wᵢxᵢ / Σ wᵢ
/// ```
/// `n` counts every leaf of `x`, finite or not.
///
/// # Examples
/// ```
/// use u_numchain::{stats::mean, Value};
/// let age = Value::from(vec![19, 22, 18, 36, 25]);
/// assert_eq!(mean(&age, None), 24.0);
/// let weight = Value::from(vec![2, 1, 2, 5, 3]);
/// assert_eq!(mean(&age, Some(&weight)), 27.0);
/// ```
pub fn mean(x: &Value, weight: Option<&Value>) -> f64 {
    let x = flat(x);
    match weight {
        None => total(&x) / leaf_count(&x) as f64,
        Some(w) => {
            let w = flat(w);
            let weighted = broadcast::multiply(&x, Some(&w));
            total(&weighted) / total(&w)
        }
    }
}

/// Geometric mean, optionally weighted.
///
/// # Formula
/// ```text
/// unweighted:  (Π xᵢ)^(1/n)
/// weighted:    (Π xᵢ^wᵢ)^(1/Σ wᵢ)
/// ```
///
/// # Examples
/// ```
/// use u_numchain::{stats::geometric_mean, Value};
/// assert_eq!(geometric_mean(&Value::from(vec![2.0, 8.0]), None), 4.0);
/// ```
pub fn geometric_mean(x: &Value, weight: Option<&Value>) -> f64 {
    let x = flat(x);
    match weight {
        None => {
            let product = broadcast::multiply(&x, None);
            scalar(&broadcast::root(&product, leaf_count(&x) as f64))
        }
        Some(w) => {
            let w = flat(w);
            let powered = broadcast::apply(&x, Some(&w), Operator::Pow);
            let product = broadcast::multiply(&powered, None);
            scalar(&broadcast::root(&product, total(&w)))
        }
    }
}

/// Harmonic mean, optionally weighted.
///
/// # Formula
/// ```text
/// unweighted:  n / Σ (1/xᵢ)
/// weighted:    Σ wᵢ / Σ (wᵢ/xᵢ)
/// ```
///
/// # Examples
/// ```
/// use u_numchain::{stats::harmonic_mean, Value};
/// let hm = harmonic_mean(&Value::from(vec![1.0, 2.0, 4.0]), None);
/// assert!((hm - 12.0 / 7.0).abs() < 1e-12);
/// ```
pub fn harmonic_mean(x: &Value, weight: Option<&Value>) -> f64 {
    let x = flat(x);
    match weight {
        None => {
            let reciprocals = broadcast::apply_unary(&x, f64::recip);
            leaf_count(&x) as f64 / total(&reciprocals)
        }
        Some(w) => {
            let w = flat(w);
            let ratios = broadcast::divide(&w, Some(&x));
            total(&w) / total(&ratios)
        }
    }
}

// ---------------------------------------------------------------------------
// Dispersion
// ---------------------------------------------------------------------------

/// Variance, optionally weighted.
///
/// # Formula
/// ```text
/// unweighted:  Σ (xᵢ − x̄)² / d
/// weighted:    Σ wᵢ(xᵢ − x̄_w) / d
/// ```
/// with `d = n − 1` for [`VarianceKind::Unbiased`] and `d = n` otherwise.
/// See the module documentation about the weighted form.
///
/// # Examples
/// ```
/// use u_numchain::{stats::{variance, VarianceKind}, Value};
/// let v = Value::from(vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
/// assert!((variance(&v, None, VarianceKind::Unbiased) - 4.571428571428571).abs() < 1e-10);
/// assert_eq!(variance(&v, None, VarianceKind::Population), 4.0);
/// ```
pub fn variance(x: &Value, weight: Option<&Value>, kind: VarianceKind) -> f64 {
    let x = flat(x);
    let divisor = kind.divisor(leaf_count(&x));
    match weight {
        None => {
            let dev = deviations(&x, mean(&x, None));
            total(&broadcast::pow(&dev, 2.0)) / divisor
        }
        Some(w) => {
            let w = flat(w);
            let dev = deviations(&x, mean(&x, Some(&w)));
            total(&broadcast::multiply(&w, Some(&dev))) / divisor
        }
    }
}

/// Square root of [`variance`].
pub fn standard_deviation(x: &Value, weight: Option<&Value>, kind: VarianceKind) -> f64 {
    variance(x, weight, kind).sqrt()
}

/// Covariance of `x` and `y`, optionally weighted.
///
/// # Formula
/// ```text
/// unweighted:  Σ (xᵢ − x̄)(yᵢ − ȳ) / d
/// weighted:    Σ wᵢ(xᵢ − x̄_w)(yᵢ − ȳ_w) / d
/// ```
/// `d` is derived from the number of leaves of `x`.
///
/// # Examples
/// ```
/// use u_numchain::{stats::{covariance, VarianceKind}, Value};
/// let x = Value::from(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
/// let y = Value::from(vec![2.0, 4.0, 6.0, 8.0, 10.0]);
/// assert_eq!(covariance(&x, &y, None, VarianceKind::Unbiased), 5.0);
/// ```
pub fn covariance(x: &Value, y: &Value, weight: Option<&Value>, kind: VarianceKind) -> f64 {
    let (x, y) = (flat(x), flat(y));
    let divisor = kind.divisor(leaf_count(&x));
    let w = weight.map(flat);
    let dev_x = deviations(&x, mean(&x, w.as_ref()));
    let dev_y = deviations(&y, mean(&y, w.as_ref()));
    let products = broadcast::multiply(&dev_x, Some(&dev_y));
    let products = match &w {
        Some(w) => broadcast::multiply(w, Some(&products)),
        None => products,
    };
    total(&products) / divisor
}

/// Pearson correlation of `x` and `y`, optionally weighted.
///
/// # Formula
/// ```text
/// ρ = cov(x, y) / √(cov(x, x) · cov(y, y))
/// ```
/// with every covariance taken under the same weights. Unweighted,
/// `cov(x, x)` is the variance, so this is the usual
/// `cov(x, y) / (σₓσᵧ)`.
///
/// # Examples
/// ```
/// use u_numchain::{stats::correlation, Value};
/// let x = Value::from(vec![1.0, 2.0, 3.0, 4.0]);
/// let y = Value::from(vec![8.0, 6.0, 4.0, 2.0]);
/// assert!((correlation(&x, &y, None) + 1.0).abs() < 1e-12);
/// ```
pub fn correlation(x: &Value, y: &Value, weight: Option<&Value>) -> f64 {
    let kind = VarianceKind::Unbiased;
    let cov = covariance(x, y, weight, kind);
    let sx = covariance(x, x, weight, kind);
    let sy = covariance(y, y, weight, kind);
    cov / (sx * sy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn seq(xs: &[f64]) -> Value {
        Value::from(xs.to_vec())
    }

    // --- mean ---

    #[test]
    fn test_mean_basic() {
        assert_eq!(mean(&seq(&[19.0, 22.0, 18.0, 36.0, 25.0]), None), 24.0);
    }

    #[test]
    fn test_mean_weighted() {
        let x = seq(&[19.0, 22.0, 18.0, 36.0, 25.0]);
        let w = seq(&[2.0, 1.0, 2.0, 5.0, 3.0]);
        assert_eq!(mean(&x, Some(&w)), 27.0);
    }

    #[test]
    fn test_mean_nested_input() {
        let x = Value::from(vec![
            Value::from(vec![1.0, 2.0]),
            Value::mapping([("a", 3.0)]),
        ]);
        assert_eq!(mean(&x, None), 2.0);
    }

    #[test]
    fn test_mean_empty_is_nan() {
        assert!(mean(&seq(&[]), None).is_nan());
    }

    #[test]
    fn test_mean_counts_non_finite_leaves() {
        // the infinity is skipped by the sum but still counted
        let x = Value::from(vec![Value::from(3.0), Value::from(f64::INFINITY)]);
        assert_eq!(mean(&x, None), 1.5);
    }

    #[test]
    fn test_mean_short_weights() {
        // the third value is summed unweighted, total weight is 2
        let x = seq(&[1.0, 2.0, 3.0]);
        let w = seq(&[1.0, 1.0]);
        assert_eq!(mean(&x, Some(&w)), 3.0);
    }

    // --- geometric / harmonic ---

    #[test]
    fn test_geometric_mean() {
        assert_eq!(geometric_mean(&seq(&[2.0, 8.0]), None), 4.0);
        assert_relative_eq!(geometric_mean(&seq(&[1.0, 3.0, 9.0]), None), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_geometric_mean_weighted() {
        // (2^1 * 8^2)^(1/3) = 128^(1/3)
        let gm = geometric_mean(&seq(&[2.0, 8.0]), Some(&seq(&[1.0, 2.0])));
        assert_relative_eq!(gm, 128_f64.cbrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_geometric_mean_unit_weights_match_unweighted() {
        let x = seq(&[1.5, 4.0, 7.25]);
        let w = seq(&[1.0, 1.0, 1.0]);
        assert_relative_eq!(
            geometric_mean(&x, Some(&w)),
            geometric_mean(&x, None),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_harmonic_mean() {
        assert_relative_eq!(
            harmonic_mean(&seq(&[1.0, 2.0, 4.0]), None),
            12.0 / 7.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_harmonic_mean_weighted() {
        // (1 + 3) / (1/1 + 3/3) = 2
        let hm = harmonic_mean(&seq(&[1.0, 3.0]), Some(&seq(&[1.0, 3.0])));
        assert_eq!(hm, 2.0);
    }

    // --- variance ---

    #[test]
    fn test_variance_kinds() {
        let v = seq(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_relative_eq!(
            variance(&v, None, VarianceKind::Unbiased),
            4.571428571428571,
            epsilon = 1e-10
        );
        assert_eq!(variance(&v, None, VarianceKind::Biased), 4.0);
        assert_eq!(variance(&v, None, VarianceKind::Population), 4.0);
    }

    #[test]
    fn test_variance_zero_mean() {
        let v = seq(&[-1.0, 1.0]);
        assert_eq!(variance(&v, None, VarianceKind::Population), 1.0);
    }

    #[test]
    fn test_variance_single_unbiased_is_nan() {
        assert!(variance(&seq(&[3.0]), None, VarianceKind::Unbiased).is_nan());
    }

    #[test]
    fn test_weighted_variance_is_linear_in_deviations() {
        // Σ wᵢ(xᵢ − x̄_w) vanishes when x̄_w is the weighted mean
        let x = seq(&[19.0, 22.0, 18.0, 36.0, 25.0]);
        let w = seq(&[2.0, 1.0, 2.0, 5.0, 3.0]);
        assert!(variance(&x, Some(&w), VarianceKind::Unbiased).abs() < 1e-12);
    }

    #[test]
    fn test_standard_deviation() {
        let v = seq(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(standard_deviation(&v, None, VarianceKind::Population), 2.0);
    }

    #[test]
    fn test_variance_kind_from_str() {
        assert_eq!("biased".parse::<VarianceKind>(), Ok(VarianceKind::Biased));
        assert_eq!("population".parse::<VarianceKind>(), Ok(VarianceKind::Population));
        assert!("sample".parse::<VarianceKind>().is_err());
    }

    // --- covariance / correlation ---

    #[test]
    fn test_covariance() {
        let x = seq(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = seq(&[2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(covariance(&x, &y, None, VarianceKind::Unbiased), 5.0);
        assert_eq!(covariance(&x, &y, None, VarianceKind::Biased), 4.0);
    }

    #[test]
    fn test_covariance_weighted() {
        // weighted means are 2 and 4; Σ w·dx·dy = 1·(-1)(-2) + 2·0 + 1·(1)(2) = 4
        let x = seq(&[1.0, 2.0, 3.0]);
        let y = seq(&[2.0, 4.0, 6.0]);
        let w = seq(&[1.0, 2.0, 1.0]);
        assert_eq!(covariance(&x, &y, Some(&w), VarianceKind::Unbiased), 2.0);
    }

    #[test]
    fn test_correlation_perfect() {
        let x = seq(&[1.0, 2.0, 3.0, 4.0]);
        let y = seq(&[3.0, 5.0, 7.0, 9.0]);
        assert_relative_eq!(correlation(&x, &y, None), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_correlation_weighted_perfect() {
        let x = seq(&[1.0, 2.0, 3.0, 4.0]);
        let y = seq(&[-2.0, -4.0, -6.0, -8.0]);
        let w = seq(&[4.0, 1.0, 2.0, 3.0]);
        assert_relative_eq!(correlation(&x, &y, Some(&w)), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_correlation_constant_is_nan() {
        let x = seq(&[1.0, 1.0, 1.0]);
        let y = seq(&[1.0, 2.0, 3.0]);
        assert!(correlation(&x, &y, None).is_nan());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn finite_vec(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
        proptest::collection::vec(-1e4_f64..1e4, min_len..=max_len)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        // --- Variance is non-negative ---
        #[test]
        fn variance_non_negative(data in finite_vec(2, 60)) {
            let var = variance(&Value::from(data), None, VarianceKind::Unbiased);
            prop_assert!(var >= 0.0, "variance must be >= 0, got {}", var);
        }

        // --- Mean linearity: mean(a*x + b) = a*mean(x) + b ---
        #[test]
        fn mean_linearity(
            data in finite_vec(1, 60),
            a in -100.0_f64..100.0,
            b in -100.0_f64..100.0,
        ) {
            let m = mean(&Value::from(data.clone()), None);
            let transformed: Vec<f64> = data.iter().map(|&x| a * x + b).collect();
            let mt = mean(&Value::from(transformed), None);
            let expected = a * m + b;
            let tol = 1e-8 * expected.abs().max(1.0) * (1.0 + a.abs());
            prop_assert!((mt - expected).abs() < tol, "mean(a*x+b)={} != {}", mt, expected);
        }

        // --- cov(x, x) = var(x) ---
        #[test]
        fn covariance_with_self_is_variance(data in finite_vec(2, 60)) {
            let x = Value::from(data);
            let cov = covariance(&x, &x, None, VarianceKind::Biased);
            let var = variance(&x, None, VarianceKind::Biased);
            prop_assert!((cov - var).abs() <= 1e-9 * var.max(1.0));
        }

        // --- |ρ| ≤ 1 ---
        #[test]
        fn correlation_is_bounded(
            pairs in proptest::collection::vec((-1e3_f64..1e3, -1e3_f64..1e3), 3..40)
        ) {
            let (x, y): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
            let r = correlation(&Value::from(x), &Value::from(y), None);
            prop_assume!(r.is_finite());
            prop_assert!(r.abs() <= 1.0 + 1e-9, "correlation out of range: {}", r);
        }

        // --- Unit weights reproduce the unweighted mean ---
        #[test]
        fn unit_weights_match_unweighted_mean(data in finite_vec(1, 60)) {
            let w = vec![1.0; data.len()];
            let x = Value::from(data);
            let plain = mean(&x, None);
            let weighted = mean(&x, Some(&Value::from(w)));
            prop_assert!((plain - weighted).abs() <= 1e-9 * plain.abs().max(1.0));
        }
    }
}
