//! Structured values: numbers, nested sequences and ordered mappings.
//!
//! A [`Value`] is the operand type of every operation in this crate. It is
//! shaped like JSON so that data can be fed straight from `serde_json`,
//! with one difference: mappings keep their insertion order, which is the
//! order the flattener visits them in.
//!
//! # Leaves
//!
//! Anything that is not a [`Value::Sequence`] or a [`Value::Mapping`] is a
//! leaf. Only finite [`Value::Number`] leaves take part in arithmetic;
//! infinities, NaN and non-numeric leaves are carried along untouched.

use serde::{Deserialize, Serialize};

/// A number, a nested collection of values, or an opaque non-numeric leaf.
///
/// # Examples
/// ```
/// use u_numchain::Value;
/// let v = Value::from(vec![1.0, 2.0, 3.0]);
/// assert!(v.is_collection());
/// assert_eq!(Value::from(4).as_f64(), Some(4.0));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Sequence(Vec<Value>),
    #[serde(with = "mapping_serde")]
    Mapping(Vec<(String, Value)>),
}

impl Value {
    /// Builds a mapping from `(key, value)` pairs, keeping their order.
    pub fn mapping<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns the number held by this leaf, finite or not.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(x) => Some(*x),
            _ => None,
        }
    }

    /// Returns the number if this is a finite numeric leaf.
    pub fn as_finite(&self) -> Option<f64> {
        self.as_f64().filter(|x| x.is_finite())
    }

    /// `true` for a finite numeric leaf. Infinities and NaN are not finite.
    pub fn is_finite(&self) -> bool {
        self.as_finite().is_some()
    }

    /// `true` for sequences and mappings.
    pub fn is_collection(&self) -> bool {
        matches!(self, Value::Sequence(_) | Value::Mapping(_))
    }

    /// `true` for values that count as "no argument" for broadcasting:
    /// null, `false`, zero, NaN and the empty string.
    ///
    /// A zero right-hand operand therefore turns `sum(array, 0)` into a
    /// reduction. Strict broadcasting does not use this rule.
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Number(x) => *x == 0.0 || x.is_nan(),
            Value::Text(s) => s.is_empty(),
            Value::Sequence(_) | Value::Mapping(_) => false,
        }
    }

    /// Short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }

    /// Flattens this value and keeps only its finite numeric leaves.
    ///
    /// # Examples
    /// ```
    /// use u_numchain::Value;
    /// let v = Value::from(vec![Value::from(1.0), Value::from(f64::INFINITY), Value::from("x")]);
    /// assert_eq!(v.to_f64_vec(), vec![1.0]);
    /// ```
    pub fn to_f64_vec(&self) -> Vec<f64> {
        crate::flatten::flatten(self)
            .iter()
            .filter_map(Value::as_finite)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Number(x)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Number(f64::from(x))
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(x: $t) -> Self {
                    Value::Number(x as f64)
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(items: &[T]) -> Self {
        Value::Sequence(items.iter().cloned().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(items: [T; N]) -> Self {
        Value::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(item: Option<T>) -> Self {
        item.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Mapping(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// Mappings serialize as JSON objects rather than as lists of pairs.
mod mapping_serde {
    use super::Value;
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(
        entries: &[(String, Value)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (k, v) in entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, Value)>, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = Vec<(String, Value)>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry::<String, Value>()? {
                    entries.push((k, v));
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}
