//! `Value` — the JSON-like data model patterns are matched against.
//!
//! A [`Value`] is a closed sum over the six JSON-like shapes: null, booleans,
//! numbers, strings, ordered sequences, and string-keyed mappings. Mappings
//! preserve insertion order and keep keys unique; two mappings are equal only
//! if their pairs agree *in order*.
//!
//! Positions inside a tree are addressed by [`PathStep`] lists, resolved with
//! [`Value::at`] / [`Value::at_mut`] and rendered for diagnostics with
//! [`render_path`].
//!
//! # Example
//!
//! ```
//! use treema::{render_path, PathStep, Value};
//!
//! let doc = Value::mapping([
//!     ("name", Value::from("arbiter")),
//!     ("ports", Value::seq([Value::from(80), Value::from(443)])),
//! ]);
//!
//! let path = vec![PathStep::Key("ports".into()), PathStep::Index(1)];
//! assert_eq!(doc.at(&path), Some(&Value::from(443)));
//! assert_eq!(render_path(&path), "$.ports[1]");
//! ```

use std::fmt;

/// A JSON-like value: the input (and output) shape of the engine.
///
/// Numbers are `f64` throughout. Equality is structural and total: `NaN`
/// equals `NaN` so repeated-variable unification stays reflexive, sequences
/// compare element-wise in order, and mappings compare pair-by-pair in order.
#[derive(Clone, Debug)]
pub enum Value {
    /// The null value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A double-precision number.
    Number(f64),
    /// A UTF-8 string.
    String(String),
    /// An ordered list of values.
    Sequence(Vec<Value>),
    /// An ordered list of unique `(key, value)` pairs.
    Mapping(Vec<(String, Value)>),
}

/// One step of a path from the root of a tree to a position inside it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PathStep {
    /// Descend into the pair with this key (mappings).
    Key(String),
    /// Descend into the element at this index (sequences).
    Index(usize),
}

/// Renders a path as a compact locator string, e.g. `$.items[2].name`.
///
/// The root is `$`; keys append `.key`, indices append `[i]`.
#[must_use]
pub fn render_path(path: &[PathStep]) -> String {
    let mut out = String::from("$");
    for step in path {
        match step {
            PathStep::Key(k) => {
                out.push('.');
                out.push_str(k);
            }
            PathStep::Index(i) => {
                out.push('[');
                out.push_str(&i.to_string());
                out.push(']');
            }
        }
    }
    out
}

impl Value {
    /// Builds a sequence from anything iterable over values.
    pub fn seq<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Value::Sequence(items.into_iter().collect())
    }

    /// Builds a mapping, keeping pairs in first-seen key order.
    ///
    /// A repeated key overwrites the earlier value in place rather than
    /// producing a duplicate pair.
    pub fn mapping<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut out: Vec<(String, Value)> = Vec::new();
        for (k, v) in pairs {
            let k = k.into();
            if let Some(slot) = out.iter_mut().find(|(existing, _)| *existing == k) {
                slot.1 = v;
            } else {
                out.push((k, v));
            }
        }
        Value::Mapping(out)
    }

    /// Type name for diagnostics: `"null"`, `"bool"`, `"number"`, `"string"`,
    /// `"sequence"`, or `"mapping"`.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }

    /// Returns `true` for `Value::Null`.
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the boolean if this is a `Bool`.
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number if this is a `Number`.
    #[inline]
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string slice if this is a `String`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the elements if this is a `Sequence`.
    #[inline]
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the pairs if this is a `Mapping`.
    #[inline]
    #[must_use]
    pub fn as_mapping(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Mapping(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Looks up a mapping key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Looks up a sequence index.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.as_sequence()?.get(index)
    }

    /// Resolves a path from this value downward.
    #[must_use]
    pub fn at(&self, path: &[PathStep]) -> Option<&Value> {
        let mut cur = self;
        for step in path {
            cur = match step {
                PathStep::Key(k) => cur.get(k)?,
                PathStep::Index(i) => cur.get_index(*i)?,
            };
        }
        Some(cur)
    }

    /// Resolves a path to a mutable position. Used by the edit planner.
    pub fn at_mut(&mut self, path: &[PathStep]) -> Option<&mut Value> {
        let mut cur = self;
        for step in path {
            cur = match step {
                PathStep::Key(k) => match cur {
                    Value::Mapping(pairs) => {
                        pairs.iter_mut().find(|(pk, _)| pk == k).map(|(_, v)| v)?
                    }
                    _ => return None,
                },
                PathStep::Index(i) => match cur {
                    Value::Sequence(items) => items.get_mut(*i)?,
                    _ => return None,
                },
            };
        }
        Some(cur)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            // Total equality: NaN == NaN, so a variable bound to NaN can be
            // re-seen without breaking unification symmetry.
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::Mapping(a), Value::Mapping(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(f64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Sequence(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    // Integral doubles print without a trailing ".0" (2^53 keeps the cast exact).
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => fmt_number(*n, f),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Sequence(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Mapping(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(feature = "serde")]
mod serde_impls {
    use super::Value;
    use serde::de::{MapAccess, SeqAccess, Visitor};
    use serde::ser::{SerializeMap, SerializeSeq};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::fmt;

    impl Serialize for Value {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Value::Null => serializer.serialize_unit(),
                Value::Bool(b) => serializer.serialize_bool(*b),
                Value::Number(n) => {
                    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                        serializer.serialize_i64(*n as i64)
                    } else {
                        serializer.serialize_f64(*n)
                    }
                }
                Value::String(s) => serializer.serialize_str(s),
                Value::Sequence(items) => {
                    let mut seq = serializer.serialize_seq(Some(items.len()))?;
                    for item in items {
                        seq.serialize_element(item)?;
                    }
                    seq.end()
                }
                Value::Mapping(pairs) => {
                    let mut map = serializer.serialize_map(Some(pairs.len()))?;
                    for (k, v) in pairs {
                        map.serialize_entry(k, v)?;
                    }
                    map.end()
                }
            }
        }
    }

    struct ValueVisitor;

    impl<'de> Visitor<'de> for ValueVisitor {
        type Value = Value;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a JSON-like value")
        }

        fn visit_unit<E>(self) -> Result<Value, E> {
            Ok(Value::Null)
        }

        fn visit_none<E>(self) -> Result<Value, E> {
            Ok(Value::Null)
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
            Value::deserialize(deserializer)
        }

        fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
            Ok(Value::Bool(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
            Ok(Value::Number(v as f64))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Value, E> {
            Ok(Value::Number(v as f64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
            Ok(Value::Number(v))
        }

        fn visit_str<E>(self, v: &str) -> Result<Value, E> {
            Ok(Value::String(v.to_owned()))
        }

        fn visit_string<E>(self, v: String) -> Result<Value, E> {
            Ok(Value::String(v))
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
            let mut items = Vec::new();
            while let Some(item) = seq.next_element()? {
                items.push(item);
            }
            Ok(Value::Sequence(items))
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
            let mut pairs: Vec<(String, Value)> = Vec::new();
            while let Some((k, v)) = map.next_entry::<String, Value>()? {
                if let Some(slot) = pairs.iter_mut().find(|(existing, _)| *existing == k) {
                    slot.1 = v;
                } else {
                    pairs.push((k, v));
                }
            }
            Ok(Value::Mapping(pairs))
        }
    }

    impl<'de> Deserialize<'de> for Value {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_any(ValueVisitor)
        }
    }
}

#[cfg(feature = "json")]
mod json_bridge {
    use super::Value;

    impl From<serde_json::Value> for Value {
        fn from(v: serde_json::Value) -> Self {
            match v {
                serde_json::Value::Null => Value::Null,
                serde_json::Value::Bool(b) => Value::Bool(b),
                serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
                serde_json::Value::String(s) => Value::String(s),
                serde_json::Value::Array(items) => {
                    Value::Sequence(items.into_iter().map(Value::from).collect())
                }
                serde_json::Value::Object(map) => {
                    Value::Mapping(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
                }
            }
        }
    }

    impl From<Value> for serde_json::Value {
        fn from(v: Value) -> Self {
            match v {
                Value::Null => serde_json::Value::Null,
                Value::Bool(b) => serde_json::Value::Bool(b),
                // JSON has no non-finite numbers; NaN and infinities map to null.
                Value::Number(n) => {
                    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                        serde_json::Value::Number(serde_json::Number::from(n as i64))
                    } else {
                        serde_json::Number::from_f64(n)
                            .map_or(serde_json::Value::Null, serde_json::Value::Number)
                    }
                }
                Value::String(s) => serde_json::Value::String(s),
                Value::Sequence(items) => {
                    serde_json::Value::Array(items.into_iter().map(Into::into).collect())
                }
                Value::Mapping(pairs) => serde_json::Value::Object(
                    pairs.into_iter().map(|(k, v)| (k, v.into())).collect(),
                ),
            }
        }
    }
}
