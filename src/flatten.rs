//! Structural flattening of nested values.
//!
//! Flattening (also called *linearizing*) collapses any nesting of
//! sequences and mappings into one ordered list of leaves.
//!
//! # Order
//!
//! Depth-first, left to right. Sequences are visited by index, mappings in
//! insertion order. Leaves are copied verbatim, including non-numeric ones:
//! filtering is left to the caller.

use crate::value::Value;

/// Flattens a single value into its ordered leaves.
///
/// A leaf flattens to a one-element list containing itself.
///
/// # Complexity
/// Time: O(n) in the total number of nodes, Space: O(n + depth)
///
/// # Examples
/// ```
/// use u_numchain::{flatten::flatten, Value};
/// let v = Value::from(vec![Value::from(1), Value::from(vec![2, 3])]);
/// assert_eq!(flatten(&v), vec![Value::from(1), Value::from(2), Value::from(3)]);
/// ```
pub fn flatten(value: &Value) -> Vec<Value> {
    let mut out = Vec::new();
    flatten_into(value, &mut out);
    out
}

/// Flattens every item in order and concatenates the results.
///
/// # Examples
/// ```
/// use u_numchain::{flatten::linearize, Value};
/// let items = [
///     Value::from(5),
///     Value::from(vec![4, 7]),
///     Value::mapping([("0", 1)]),
///     Value::from(12),
///     Value::from(vec![34]),
/// ];
/// let flat: Vec<f64> = linearize(&items).iter().filter_map(Value::as_f64).collect();
/// assert_eq!(flat, vec![5.0, 4.0, 7.0, 1.0, 12.0, 34.0]);
/// ```
pub fn linearize(items: &[Value]) -> Vec<Value> {
    let mut out = Vec::new();
    for item in items {
        flatten_into(item, &mut out);
    }
    out
}

/// Number of leaves `value` flattens to.
///
/// # Examples
/// ```
/// use u_numchain::{flatten::size, Value};
/// assert_eq!(size(&Value::from(vec![vec![1, 2], vec![3]])), 3);
/// assert_eq!(size(&Value::from(8)), 1);
/// ```
pub fn size(value: &Value) -> usize {
    match value {
        Value::Sequence(items) => items.iter().map(size).sum(),
        Value::Mapping(entries) => entries.iter().map(|(_, v)| size(v)).sum(),
        _ => 1,
    }
}

fn flatten_into(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::Sequence(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        Value::Mapping(entries) => {
            for (_, item) in entries {
                flatten_into(item, out);
            }
        }
        leaf => out.push(leaf.clone()),
    }
}
