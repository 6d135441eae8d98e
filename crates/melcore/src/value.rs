use crate::NodeError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Dynamic value type carried by "any data" envelopes and node configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Object(HashMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as u64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Resolve a dotted path such as `items` or `response.rows.0`.
    ///
    /// Object segments are looked up by key, array segments by index. An empty
    /// path resolves to `self`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Convert into plain JSON. `Bytes` become an array of numbers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(|num| {
                    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                        serde_json::Value::Number((*n as i64).into())
                    } else {
                        serde_json::Value::Number(num)
                    }
                })
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(bytes) => serde_json::Value::Array(
                bytes.iter().map(|b| serde_json::Value::from(*b)).collect(),
            ),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Checked conversion into a concrete type.
    ///
    /// Fails with [`NodeError::TypeMismatch`] instead of panicking when the
    /// value does not have the shape `T` expects.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, NodeError> {
        serde_json::from_value(self.to_json()).map_err(|e| NodeError::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
            actual: self.data_type().to_string(),
            detail: e.to_string(),
        })
    }

    /// Convert any serializable value into a `Value`.
    pub fn encode<T: Serialize + ?Sized>(data: &T) -> Result<Value, NodeError> {
        serde_json::to_value(data)
            .map(Value::from)
            .map_err(|e| NodeError::TypeMismatch {
                expected: "serializable payload".to_string(),
                actual: std::any::type_name::<T>().to_string(),
                detail: e.to_string(),
            })
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Bool(_) => DataType::Boolean,
            Value::Number(_) => DataType::Number,
            Value::String(_) => DataType::String,
            Value::Bytes(_) => DataType::Binary,
            Value::Array(_) => DataType::Array,
            Value::Object(_) => DataType::Object,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(map: HashMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => Value::Array(arr.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(obj) => {
                Value::Object(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// Coarse semantic tag describing the shape of an envelope payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Null,
    Boolean,
    Number,
    String,
    Binary,
    Array,
    Object,
    Unknown,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Null => "null",
            DataType::Boolean => "boolean",
            DataType::Number => "number",
            DataType::String => "string",
            DataType::Binary => "binary",
            DataType::Array => "array",
            DataType::Object => "object",
            DataType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payloads that can report their [`DataType`].
///
/// Typed node payloads opt in with an empty impl, which reports `object`.
pub trait DataKind {
    fn data_type(&self) -> DataType {
        DataType::Object
    }
}

impl DataKind for Value {
    fn data_type(&self) -> DataType {
        Value::data_type(self)
    }
}

impl DataKind for serde_json::Value {
    fn data_type(&self) -> DataType {
        match self {
            serde_json::Value::Null => DataType::Null,
            serde_json::Value::Bool(_) => DataType::Boolean,
            serde_json::Value::Number(_) => DataType::Number,
            serde_json::Value::String(_) => DataType::String,
            serde_json::Value::Array(_) => DataType::Array,
            serde_json::Value::Object(_) => DataType::Object,
        }
    }
}

impl DataKind for String {
    fn data_type(&self) -> DataType {
        DataType::String
    }
}

impl DataKind for bool {
    fn data_type(&self) -> DataType {
        DataType::Boolean
    }
}

macro_rules! numeric_kind {
    ($($t:ty),*) => {
        $(impl DataKind for $t {
            fn data_type(&self) -> DataType {
                DataType::Number
            }
        })*
    };
}

numeric_kind!(i32, i64, u32, u64, usize, f32, f64);

impl<T> DataKind for Vec<T> {
    fn data_type(&self) -> DataType {
        DataType::Array
    }
}

impl<V> DataKind for HashMap<String, V> {}

impl<T: DataKind> DataKind for Option<T> {
    fn data_type(&self) -> DataType {
        match self {
            Some(inner) => inner.data_type(),
            None => DataType::Null,
        }
    }
}

impl DataKind for () {
    fn data_type(&self) -> DataType {
        DataType::Null
    }
}

/// Serde adapter writing a [`Value`] as plain JSON instead of the tagged form.
///
/// For payloads exchanged with systems outside the engine:
/// `#[serde(with = "melcore::plain_json")]`.
pub mod plain_json {
    use super::Value;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Value, serializer: S) -> Result<S::Ok, S::Error> {
        value.to_json().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}
