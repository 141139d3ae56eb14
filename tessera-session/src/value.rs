//! Session attribute keys and values.
//!
//! Attributes are a closed set of serializable variants so every codec can
//! round-trip them without runtime type registration. Arbitrary `serde` types
//! are stored by mapping them onto these variants with
//! [`Value::from_serialize`] and read back with [`Value::deserialize_into`].

use crate::error::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// The attribute map of one session.
pub type AttributeMap = HashMap<Key, Value>;

/// Attribute key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    /// String key
    Str(String),
    /// Integer key
    Int(i64),
    /// Boolean key
    Bool(bool),
    /// Raw bytes key
    Bytes(Vec<u8>),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => f.write_str(s),
            Key::Int(i) => write!(f, "{}", i),
            Key::Bool(b) => write!(f, "{}", b),
            Key::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Key::Int(i.into())
    }
}

impl From<bool> for Key {
    fn from(b: bool) -> Self {
        Key::Bool(b)
    }
}

impl From<Vec<u8>> for Key {
    fn from(b: Vec<u8>) -> Self {
        Key::Bytes(b)
    }
}

/// Attribute value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// Absence of a value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// UTF-8 string
    Str(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Ordered list
    List(Vec<Value>),
    /// Nested map
    Map(#[serde(with = "entries")] BTreeMap<Key, Value>),
}

impl Value {
    /// Get the string, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the number as a float. Integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get the boolean, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the bytes, if this is a byte sequence.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get the list, if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Get the nested map, if this is a map.
    pub fn as_map(&self) -> Option<&BTreeMap<Key, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Check for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Map any serializable value onto the attribute variants.
    ///
    /// Unsigned integers above `i64::MAX` are rejected, as are values
    /// `serde_json` cannot represent.
    ///
    /// ```
    /// use tessera_session::Value;
    /// use std::collections::BTreeMap;
    ///
    /// let mut cart = BTreeMap::new();
    /// cart.insert("sku-1".to_string(), 2);
    /// let value = Value::from_serialize(&cart).unwrap();
    /// let back: BTreeMap<String, i32> = value.deserialize_into().unwrap();
    /// assert_eq!(back, cart);
    /// ```
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> SessionResult<Self> {
        let json =
            serde_json::to_value(value).map_err(|e| SessionError::Serialization(e.to_string()))?;
        Self::try_from(json)
    }

    /// Rebuild a typed value stored with [`Value::from_serialize`].
    pub fn deserialize_into<T: for<'de> Deserialize<'de>>(&self) -> SessionResult<T> {
        let json = self.to_json()?;
        serde_json::from_value(json).map_err(|e| SessionError::Deserialization(e.to_string()))
    }

    fn to_json(&self) -> SessionResult<serde_json::Value> {
        use serde_json::Value as Json;

        Ok(match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .ok_or_else(|| {
                    SessionError::Deserialization(format!("non-finite float {}", f))
                })?,
            Value::Str(s) => Json::String(s.clone()),
            Value::Bytes(b) => Json::from(b.clone()),
            Value::List(items) => Json::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<SessionResult<_>>()?,
            ),
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| -> SessionResult<(String, Json)> {
                        Ok((k.to_string(), v.to_json()?))
                    })
                    .collect::<SessionResult<_>>()?,
            ),
        })
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = SessionError;

    /// Numbers that fit neither `i64` nor a float exactly are rejected.
    fn try_from(json: serde_json::Value) -> SessionResult<Self> {
        use serde_json::Value as Json;

        Ok(match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if n.is_f64() {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                } else {
                    return Err(SessionError::Serialization(format!(
                        "integer {} is out of range for an i64 attribute",
                        n
                    )));
                }
            }
            Json::String(s) => Value::Str(s),
            Json::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<SessionResult<_>>()?,
            ),
            Json::Object(obj) => Value::Map(
                obj.into_iter()
                    .map(|(k, v)| -> SessionResult<(Key, Value)> {
                        Ok((Key::Str(k), Value::try_from(v)?))
                    })
                    .collect::<SessionResult<_>>()?,
            ),
        })
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

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i.into())
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

impl From<BTreeMap<Key, Value>> for Value {
    fn from(m: BTreeMap<Key, Value>) -> Self {
        Value::Map(m)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Maps travel as `[key, value]` pairs so non-string keys survive text formats.
pub(crate) mod entries {
    use super::{Key, Value};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S>(map: &BTreeMap<Key, Value>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<Key, Value>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pairs = Vec::<(Key, Value)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
