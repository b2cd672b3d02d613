//! Broadcasting arithmetic over scalars and nested structures.
//!
//! Every arithmetic operation in this crate is one binary function pushed
//! through [`apply`], which picks a shape rule from the kinds of its two
//! operands. Collections are flattened first, so nesting never matters,
//! only leaf order does.
//!
//! # Shape rules
//!
//! Checked in this order:
//!
//! | left       | right              | result                                     |
//! |------------|--------------------|--------------------------------------------|
//! | finite     | finite             | `f(a, b)`                                  |
//! | collection | absent or falsy    | scalar: [`reduce`] from the identity        |
//! | collection | finite             | collection: [`map_scalar`]                  |
//! | collection | collection         | collection: [`elementwise`] by position     |
//! | finite     | collection         | scalar: [`fold_with`] starting from `a`     |
//! | anything else                   || the left operand, unchanged               |
//!
//! The last two numeric rules are deliberately asymmetric: a collection on
//! the left keeps its shape, a scalar on the left absorbs the collection
//! into a single running value. `divide(100, [2, 5])` is `10`, not
//! `[50, 20]`.
//!
//! Functions whose right operand is a fixed parameter (`pow`, `root`,
//! `ln`, `sqrt`) use [`apply_parameter`] instead, which always maps leaf
//! by leaf: `pow([2, 3], 0)` is `[1, 1]`.
//!
//! Only finite leaves are combined. Infinities, NaN and non-numeric leaves
//! are skipped by reductions and copied through by element-wise rules.
//!
//! # Strict mode
//!
//! [`try_apply`] runs the same rules after checking that both operands are
//! made of numbers and that element-wise operands line up, reporting a
//! [`BroadcastError`] otherwise. It also treats a zero right operand as a
//! real scalar instead of "absent".

use crate::error::{BroadcastError, Side};
use crate::flatten::flatten;
use crate::value::Value;

/// The binary numeric functions the broadcasting engine knows by name.
///
/// Unary functions (`Ln`, `Sqrt`) ignore their right argument. `Pow` and
/// `Root` use it as the exponent and the degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Ln,
    Log,
    Pow,
    Root,
    Sqrt,
}

impl Operator {
    /// Applies the operator to two numbers.
    ///
    /// # Examples
    /// ```
    /// use u_numchain::broadcast::Operator;
    /// assert_eq!(Operator::Subtract.combine(5.0, 2.0), 3.0);
    /// assert_eq!(Operator::Root.combine(16.0, 4.0), 2.0);
    /// ```
    pub fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            Operator::Add => a + b,
            Operator::Subtract => a - b,
            Operator::Multiply => a * b,
            Operator::Divide => a / b,
            Operator::Ln => a.ln(),
            Operator::Log => a.ln() / b.ln(),
            Operator::Pow => a.powf(b),
            Operator::Root => a.powf(1.0 / b),
            Operator::Sqrt => a.sqrt(),
        }
    }

    /// Starting value of a reduction over a collection.
    pub fn identity(self) -> f64 {
        match self {
            Operator::Multiply | Operator::Divide => 1.0,
            _ => 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Shape rules
// ---------------------------------------------------------------------------

/// Left-to-right reduction of the finite leaves of `a`, starting from
/// `identity`.
///
/// # Examples
/// ```
/// use u_numchain::{broadcast::reduce, Value};
/// let leaves = [Value::from(5), Value::from(f64::INFINITY), Value::from(7)];
/// assert_eq!(reduce(&leaves, |acc, x| acc + x, 0.0), 12.0);
/// ```
pub fn reduce<F>(a: &[Value], f: F, identity: f64) -> f64
where
    F: Fn(f64, f64) -> f64,
{
    a.iter()
        .filter_map(Value::as_finite)
        .fold(identity, |acc, x| f(acc, x))
}

/// Replaces every finite leaf `a[i]` with `f(a[i], b)`.
///
/// Non-finite leaves pass through unchanged.
pub fn map_scalar<F>(a: &[Value], b: f64, f: F) -> Vec<Value>
where
    F: Fn(f64, f64) -> f64,
{
    a.iter()
        .map(|leaf| match leaf.as_finite() {
            Some(x) => Value::Number(f(x, b)),
            None => leaf.clone(),
        })
        .collect()
}

/// Pairs leaves by position and replaces `a[i]` with `f(a[i], b[i])`
/// wherever both are finite.
///
/// The result always has `a.len()` entries: a shorter `b` leaves the tail
/// of `a` untouched and a longer `b` is truncated.
///
/// # Examples
/// ```
/// use u_numchain::{broadcast::elementwise, Value};
/// let a = [Value::from(1), Value::from(2), Value::from(3)];
/// let b = [Value::from(10), Value::from(20)];
/// let out = elementwise(&a, &b, |x, y| x + y);
/// assert_eq!(out, vec![Value::from(11), Value::from(22), Value::from(3)]);
/// ```
pub fn elementwise<F>(a: &[Value], b: &[Value], f: F) -> Vec<Value>
where
    F: Fn(f64, f64) -> f64,
{
    a.iter()
        .enumerate()
        .map(|(i, leaf)| {
            match (leaf.as_finite(), b.get(i).and_then(Value::as_finite)) {
                (Some(x), Some(y)) => Value::Number(f(x, y)),
                _ => leaf.clone(),
            }
        })
        .collect()
}

/// Runs the scalar `init` through every finite leaf of `b` in order:
/// `acc = f(acc, b[i])`.
///
/// # Examples
/// ```
/// use u_numchain::{broadcast::fold_with, Value};
/// let b = [Value::from(2), Value::from(5)];
/// assert_eq!(fold_with(100.0, &b, |acc, x| acc / x), 10.0);
/// ```
pub fn fold_with<F>(init: f64, b: &[Value], f: F) -> f64
where
    F: Fn(f64, f64) -> f64,
{
    b.iter()
        .filter_map(Value::as_finite)
        .fold(init, |acc, x| f(acc, x))
}

/// Broadcasts an arbitrary binary function across `a` and `b`.
///
/// `identity` seeds the reduction used when `b` is absent or falsy.
/// See the module documentation for the full rule table.
///
/// # Examples
/// ```
/// use u_numchain::{broadcast::apply_with, Value};
/// let a = Value::from(vec![1.0, 2.0, 3.0]);
/// let max = apply_with(&a, None, f64::max, f64::NEG_INFINITY);
/// assert_eq!(max, Value::from(3.0));
/// ```
pub fn apply_with<F>(a: &Value, b: Option<&Value>, f: F, identity: f64) -> Value
where
    F: Fn(f64, f64) -> f64,
{
    if let (Some(x), Some(y)) = (a.as_finite(), b.and_then(Value::as_finite)) {
        return Value::Number(f(x, y));
    }

    if a.is_collection() {
        let leaves = flatten(a);
        return match b {
            None => Value::Number(reduce(&leaves, f, identity)),
            Some(b) if b.is_falsy() => Value::Number(reduce(&leaves, f, identity)),
            Some(b) => match b.as_finite() {
                Some(y) => Value::Sequence(map_scalar(&leaves, y, f)),
                None if b.is_collection() => {
                    Value::Sequence(elementwise(&leaves, &flatten(b), f))
                }
                None => a.clone(),
            },
        };
    }

    match (a.as_finite(), b) {
        (Some(x), Some(b)) if b.is_collection() => Value::Number(fold_with(x, &flatten(b), f)),
        _ => a.clone(),
    }
}

/// Broadcasts a named operator across `a` and `b`.
pub fn apply(a: &Value, b: Option<&Value>, op: Operator) -> Value {
    apply_with(a, b, |x, y| op.combine(x, y), op.identity())
}

/// Applies a one-argument function to `a` or to every finite leaf of `a`.
///
/// This is the binary engine with the right operand fixed to `1`, so a
/// collection keeps its (flattened) shape instead of being reduced.
///
/// # Examples
/// ```
/// use u_numchain::{broadcast::apply_unary, Value};
/// let v = apply_unary(&Value::from(vec![1.0, 4.0, 9.0]), f64::sqrt);
/// assert_eq!(v, Value::from(vec![1.0, 2.0, 3.0]));
/// ```
pub fn apply_unary<F>(a: &Value, f: F) -> Value
where
    F: Fn(f64) -> f64,
{
    apply_with(a, Some(&Value::Number(1.0)), |x, _| f(x), 0.0)
}

/// Applies `op` with a fixed right operand `parameter` to `a` or to every
/// finite leaf of `a`.
///
/// Unlike [`apply`], the parameter is never read as a shape: a zero or NaN
/// exponent still maps every leaf instead of reducing the collection.
/// Used by [`pow`], [`root`], [`ln`] and [`sqrt`].
///
/// # Examples
/// ```
/// use u_numchain::{broadcast::{apply_parameter, Operator}, Value};
/// let v = apply_parameter(&Value::from(vec![2.0, 3.0, 4.0]), Operator::Pow, 0.0);
/// assert_eq!(v, Value::from(vec![1.0, 1.0, 1.0]));
/// ```
pub fn apply_parameter(a: &Value, op: Operator, parameter: f64) -> Value {
    apply_unary(a, |x| op.combine(x, parameter))
}

/// Strict variant of [`apply_parameter`].
///
/// # Errors
/// - [`BroadcastError::NonNumericLeaf`] if `a` flattens to a leaf that is
///   not a number.
/// - [`BroadcastError::UnsupportedOperands`] if `a` is a non-numeric scalar.
pub fn try_apply_parameter(
    a: &Value,
    op: Operator,
    parameter: f64,
) -> Result<Value, BroadcastError> {
    checked_leaves(a, Side::Left, Some(&Value::Number(parameter)))?;
    Ok(apply_parameter(a, op, parameter))
}

/// Strict variant of [`apply`].
///
/// # Errors
/// - [`BroadcastError::NonNumericLeaf`] if a flattened operand contains a
///   leaf that is not a number (infinities and NaN are numbers).
/// - [`BroadcastError::LengthMismatch`] if two collections flatten to
///   different lengths.
/// - [`BroadcastError::UnsupportedOperands`] if either operand is a
///   non-numeric scalar.
///
/// # Examples
/// ```
/// use u_numchain::broadcast::{try_apply, Operator};
/// use u_numchain::Value;
/// let a = Value::from(vec![1.0, 2.0]);
/// let b = Value::from(vec![1.0, 2.0, 3.0]);
/// assert!(try_apply(&a, Some(&b), Operator::Add).is_err());
/// // zero is a scalar here, not "no argument"
/// assert_eq!(
///     try_apply(&a, Some(&Value::from(0.0)), Operator::Multiply).unwrap(),
///     Value::from(vec![0.0, 0.0]),
/// );
/// ```
pub fn try_apply(a: &Value, b: Option<&Value>, op: Operator) -> Result<Value, BroadcastError> {
    let left = checked_leaves(a, Side::Left, b)?;
    let right = match b {
        Some(b) => Some(checked_leaves(b, Side::Right, Some(a))?),
        None => None,
    };

    let f = |x: f64, y: f64| op.combine(x, y);
    let out = match (a.is_collection(), b, right) {
        (false, None, _) => a.clone(),
        (false, Some(b), right) => match right {
            Some(leaves) if b.is_collection() => match a.as_finite() {
                Some(x) => Value::Number(fold_with(x, &leaves, f)),
                None => a.clone(),
            },
            _ => apply(a, Some(b), op),
        },
        (true, None, _) => Value::Number(reduce(&left, f, op.identity())),
        (true, Some(b), Some(right)) if b.is_collection() => {
            if left.len() != right.len() {
                return Err(BroadcastError::LengthMismatch {
                    left: left.len(),
                    right: right.len(),
                });
            }
            Value::Sequence(elementwise(&left, &right, f))
        }
        (true, Some(b), _) => match b.as_f64() {
            Some(y) => Value::Sequence(map_scalar(&left, y, f)),
            None => a.clone(),
        },
    };
    Ok(out)
}

/// Flattens `operand` and checks every leaf is a number.
fn checked_leaves(
    operand: &Value,
    side: Side,
    other: Option<&Value>,
) -> Result<Vec<Value>, BroadcastError> {
    if !operand.is_collection() && operand.as_f64().is_none() {
        let other_kind = other.map_or("none", Value::kind);
        let (left, right) = match side {
            Side::Left => (operand.kind(), other_kind),
            Side::Right => (other_kind, operand.kind()),
        };
        return Err(BroadcastError::UnsupportedOperands { left, right });
    }
    let leaves = flatten(operand);
    if let Some(index) = leaves.iter().position(|leaf| leaf.as_f64().is_none()) {
        return Err(BroadcastError::NonNumericLeaf {
            operand: side,
            index,
        });
    }
    Ok(leaves)
}

// ---------------------------------------------------------------------------
// Named operations
// ---------------------------------------------------------------------------

/// Adds `b` to `a`, or sums the leaves of `a` when `b` is absent.
///
/// # Examples
/// ```
/// use u_numchain::{broadcast::sum, Value};
/// let data = Value::from(vec![5, 7, 1, 4]);
/// assert_eq!(sum(&data, None), Value::from(17));
/// let values = Value::from(vec![1, 0, 2, -2]);
/// assert_eq!(sum(&data, Some(&values)), Value::from(vec![6, 7, 3, 2]));
/// ```
pub fn sum(a: &Value, b: Option<&Value>) -> Value {
    apply(a, b, Operator::Add)
}

/// Subtracts `b` from `a` (`a - b`).
pub fn subtract(a: &Value, b: Option<&Value>) -> Value {
    apply(a, b, Operator::Subtract)
}

/// Multiplies `a` by `b`, or takes the product of the leaves of `a`.
pub fn multiply(a: &Value, b: Option<&Value>) -> Value {
    apply(a, b, Operator::Multiply)
}

/// Divides `a` by `b` (`a / b`).
///
/// # Examples
/// ```
/// use u_numchain::{broadcast::divide, Value};
/// let data = Value::from(vec![5.0, 7.0, 1.0, 4.0]);
/// let by = Value::from(vec![1.0, 7.0, 0.5, -2.0]);
/// assert_eq!(divide(&data, Some(&by)), Value::from(vec![5.0, 1.0, 2.0, -2.0]));
/// ```
pub fn divide(a: &Value, b: Option<&Value>) -> Value {
    apply(a, b, Operator::Divide)
}

/// Natural logarithm of `a` or of each of its leaves.
pub fn ln(a: &Value) -> Value {
    apply_parameter(a, Operator::Ln, 1.0)
}

/// Logarithm of `a` to `base`; the natural logarithm when `base` is `None`.
///
/// # Examples
/// ```
/// use u_numchain::{broadcast::log, Value};
/// let v = log(&Value::from(vec![2.0, 4.0]), Some(&Value::from(2.0)));
/// assert_eq!(v, Value::from(vec![1.0, 2.0]));
/// ```
pub fn log(a: &Value, base: Option<&Value>) -> Value {
    match base {
        None => ln(a),
        Some(b) => apply(a, Some(b), Operator::Log),
    }
}

/// Raises `a` (or each of its leaves) to `degree`.
pub fn pow(a: &Value, degree: f64) -> Value {
    apply_parameter(a, Operator::Pow, degree)
}

/// The `degree`-th root of `a` (or of each of its leaves).
///
/// # Examples
/// ```
/// use u_numchain::{broadcast::root, Value};
/// assert_eq!(root(&Value::from(81.0), 4.0), Value::from(3.0));
/// ```
pub fn root(a: &Value, degree: f64) -> Value {
    apply_parameter(a, Operator::Root, degree)
}

/// Square root of `a` (or of each of its leaves).
pub fn sqrt(a: &Value) -> Value {
    apply_parameter(a, Operator::Sqrt, 1.0)
}

/// Alias of [`sqrt`].
pub fn square_root(a: &Value) -> Value {
    sqrt(a)
}

/// Alias of [`root`].
pub fn rt(a: &Value, degree: f64) -> Value {
    root(a, degree)
}

/// Alias of [`pow`].
pub fn power(a: &Value, degree: f64) -> Value {
    pow(a, degree)
}

/// Sum of any number of scalars.
pub fn sum_of(values: &[f64]) -> f64 {
    values.iter().sum()
}

/// Product of any number of scalars.
pub fn product_of(values: &[f64]) -> f64 {
    values.iter().product()
}
