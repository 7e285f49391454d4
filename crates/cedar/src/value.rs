//! [`Value`]: the plain value tree the codec encodes from and decodes to.

use indexmap::IndexMap;

/// A response value, shaped by a [`TypeDescriptor`](crate::TypeDescriptor).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// An omittable field that was left out. Distinct from [`Value::Null`].
    Absent,
    Null,
    /// The field failed to resolve upstream. Siblings are unaffected.
    Errored,
    Bool(bool),
    Int(i32),
    Float(f64),
    Str(String),
    /// `BYTES` and `FIXED` payloads.
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    /// Record fields, in declared order after decoding.
    Record(IndexMap<String, Value>),
}

impl Value {
    /// Builds a record from `(name, value)` pairs.
    pub fn record<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Record(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Short name of the variant, used in type mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Absent => "absent",
            Value::Null => "null",
            Value::Errored => "errored",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
        }
    }

    /// Looks up a record field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Value::Record(entries) => entries.get(field),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Untyped conversion from JSON: integers that fit in 32 bits become
/// [`Value::Int`], every other number [`Value::Float`].
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64().and_then(|i| i32::try_from(i).ok()) {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(arr) => Value::Array(arr.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(obj) => {
                Value::Record(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// Conversion for JSON consumers: absent fields are dropped, errored fields
/// become `null`, bytes become arrays of numbers.
impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Absent | Value::Null | Value::Errored => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(n) => serde_json::json!(n),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s),
            Value::Bytes(b) => serde_json::Value::Array(b.into_iter().map(|x| serde_json::json!(x)).collect()),
            Value::Array(arr) => serde_json::Value::Array(arr.into_iter().map(Into::into).collect()),
            Value::Record(entries) => serde_json::Value::Object(
                entries
                    .into_iter()
                    .filter(|(_, v)| !matches!(v, Value::Absent))
                    .map(|(k, v)| (k, v.into()))
                    .collect(),
            ),
        }
    }
}
