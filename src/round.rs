//! Precision-safe decimal rounding.
//!
//! The naive `(x * 10^p).round() / 10^p` multiplies binary error into the
//! result: `1.005 * 100` is `100.49999999999999`, so it rounds down. Here
//! the decimal point is moved through the *text* of the number instead:
//!
//! 1. Format `x` with 8 fixed decimals.
//! 2. Append `e{p}` and parse, which shifts by `p` decimal places with a
//!    single correctly-rounded conversion.
//! 3. Round half up to an integer.
//! 4. Format that integer with `e-{p}` and parse it back.
//!
//! With `p = 0` the ones digit is first settled at one-tenth scale
//! (`round(x / 10, 1) * 10`) and the result is then cleaned at the default
//! precision.
//!
//! A rounded value that is not finite is reported through `tracing` and
//! returned as is; callers never see an error.

use crate::flatten::flatten;
use crate::value::Value;

/// Decimal digits kept when no precision is given.
pub const DEFAULT_PRECISION: u32 = 10;

/// Decimals kept by the fixed-point formatting step.
const FIXED_DECIMALS: usize = 8;

/// Rounds one number to `precision` decimal digits.
///
/// Infinities are returned unchanged. `precision == 0` rounds to an
/// integer.
///
/// # Examples
/// ```
/// use u_numchain::round::round_number;
/// assert_eq!(round_number(55.000000001, 2), 55.0);
/// assert_eq!(round_number(10.876, 2), 10.88);
/// assert_eq!(round_number(1.005, 2), 1.01);
/// assert_eq!(round_number(-2.5, 0), -2.0);
/// ```
pub fn round_number(num: f64, precision: u32) -> f64 {
    if num.is_infinite() {
        return num;
    }

    let (num, precision) = if precision == 0 {
        (round_number(num / 10.0, 1) * 10.0, DEFAULT_PRECISION)
    } else {
        (num, precision)
    };

    let shifted = parse_or_nan(&format!("{:.*}e{}", FIXED_DECIMALS, num, precision));
    let integral = round_half_up(shifted);
    let rounded = parse_or_nan(&format!("{integral}e-{precision}"));

    if !rounded.is_finite() {
        tracing::warn!(
            input = num,
            precision,
            rounded,
            "rounding produced a non-finite value"
        );
    }
    rounded
}

/// Rounds a number, or every leaf of a structure, to `precision` digits.
///
/// Collections come back flattened, and every leaf comes back a number:
/// text is read as its leading decimal number (`"12.5kg"` is `12.5`) and
/// anything unreadable becomes NaN, which is reported like any other
/// non-finite result. Infinities are kept. A non-numeric scalar outside a
/// collection is returned unchanged.
///
/// # Examples
/// ```
/// use u_numchain::{round::round, Value};
/// let v = Value::from(vec![vec![1.23456], vec![9.87654]]);
/// assert_eq!(round(&v, 2), Value::from(vec![1.23, 9.88]));
/// ```
pub fn round(value: &Value, precision: u32) -> Value {
    match value {
        Value::Number(x) if x.is_finite() => Value::Number(round_number(*x, precision)),
        v if v.is_collection() => Value::Sequence(
            flatten(v)
                .into_iter()
                .map(|leaf| Value::Number(round_number(leaf_number(&leaf), precision)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// [`round`] at [`DEFAULT_PRECISION`].
pub fn round_default(value: &Value) -> Value {
    round(value, DEFAULT_PRECISION)
}

/// Nearest integer, ties toward positive infinity.
fn round_half_up(x: f64) -> f64 {
    let floor = x.floor();
    let r = if x - floor >= 0.5 { floor + 1.0 } else { floor };
    if r == 0.0 {
        0.0_f64.copysign(x)
    } else {
        r
    }
}

fn parse_or_nan(text: &str) -> f64 {
    text.parse().unwrap_or(f64::NAN)
}

/// Numeric reading of a collection leaf.
fn leaf_number(leaf: &Value) -> f64 {
    match leaf {
        Value::Number(x) => *x,
        Value::Text(text) => leading_number(text),
        _ => f64::NAN,
    }
}

/// Longest decimal prefix of `text` (after leading whitespace) that parses
/// as a number, or NaN.
fn leading_number(text: &str) -> f64 {
    let text = text.trim_start();
    let end = text
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')))
        .unwrap_or(text.len());
    (1..=end)
        .rev()
        .find_map(|len| text[..len].parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        // --- Rounding twice changes nothing ---
        #[test]
        fn round_is_idempotent(x in -1e6_f64..1e6, p in 1_u32..=6) {
            let once = round_number(x, p);
            prop_assert_eq!(round_number(once, p), once);
        }

        // --- The result is within half a unit in the last kept place ---
        #[test]
        fn round_error_is_bounded(x in -1e6_f64..1e6, p in 1_u32..=6) {
            let r = round_number(x, p);
            let tol = 0.5 * 10_f64.powi(-(p as i32)) + 1e-8;
            prop_assert!((r - x).abs() <= tol, "round({}, {}) = {}", x, p, r);
        }
    }
}
