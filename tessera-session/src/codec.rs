//! Byte encodings for attribute maps.

use crate::error::{SessionError, SessionResult};
use crate::value::{AttributeMap, Key, Value};

/// Converts attribute maps to and from the bytes stored in the backend.
///
/// An empty payload always decodes to an empty map; regenerated sessions are
/// created with an empty value.
pub trait Codec: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Encode an attribute map.
    fn encode(&self, attributes: &AttributeMap) -> SessionResult<Vec<u8>>;

    /// Decode an attribute map.
    fn decode(&self, bytes: &[u8]) -> SessionResult<AttributeMap>;
}

/// MessagePack encoding (default).
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePackCodec;

impl Codec for MessagePackCodec {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn encode(&self, attributes: &AttributeMap) -> SessionResult<Vec<u8>> {
        rmp_serde::to_vec_named(&sorted_entries(attributes))
            .map_err(|e| SessionError::Serialization(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> SessionResult<AttributeMap> {
        if bytes.is_empty() {
            return Ok(AttributeMap::new());
        }
        let entries: Vec<(Key, Value)> = rmp_serde::from_slice(bytes)
            .map_err(|e| SessionError::Deserialization(e.to_string()))?;
        Ok(entries.into_iter().collect())
    }
}

/// JSON encoding, readable with `redis-cli GET`.
///
/// JSON has no spelling for NaN or infinities, so maps holding them fail to
/// encode instead of being written as `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, attributes: &AttributeMap) -> SessionResult<Vec<u8>> {
        for (key, value) in attributes {
            reject_non_finite(key, value)?;
        }
        serde_json::to_vec(&sorted_entries(attributes))
            .map_err(|e| SessionError::Serialization(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> SessionResult<AttributeMap> {
        if bytes.is_empty() {
            return Ok(AttributeMap::new());
        }
        let entries: Vec<(Key, Value)> = serde_json::from_slice(bytes)
            .map_err(|e| SessionError::Deserialization(e.to_string()))?;
        Ok(entries.into_iter().collect())
    }
}

fn reject_non_finite(key: &Key, value: &Value) -> SessionResult<()> {
    match value {
        Value::Float(f) if !f.is_finite() => Err(SessionError::Serialization(format!(
            "attribute '{}' holds non-finite float {}",
            key, f
        ))),
        Value::List(items) => items.iter().try_for_each(|v| reject_non_finite(key, v)),
        Value::Map(map) => map.values().try_for_each(|v| reject_non_finite(key, v)),
        _ => Ok(()),
    }
}

// Sorted so equal maps always produce equal bytes.
fn sorted_entries(attributes: &AttributeMap) -> Vec<(&Key, &Value)> {
    let mut entries: Vec<_> = attributes.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample() -> AttributeMap {
        let mut nested = BTreeMap::new();
        nested.insert(Key::from(1), Value::from("one"));
        nested.insert(Key::from("flag"), Value::from(true));

        let mut map = AttributeMap::new();
        map.insert(Key::from("user_id"), Value::from(123));
        map.insert(Key::from("name"), Value::from("alice"));
        map.insert(Key::from(42), Value::from(2.5));
        map.insert(Key::from(true), Value::Null);
        map.insert(Key::from(vec![0xde, 0xad]), Value::from(vec![0u8, 255]));
        map.insert(
            Key::from("history"),
            Value::from(vec![Value::from("/"), Value::from("/cart")]),
        );
        map.insert(Key::from("prefs"), Value::Map(nested));
        map
    }

    #[test]
    fn test_msgpack_preserves_every_variant() {
        let codec = MessagePackCodec;
        let map = sample();
        let bytes = codec.encode(&map).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), map);
    }

    #[test]
    fn test_json_preserves_non_string_keys() {
        let codec = JsonCodec;
        let map = sample();
        let bytes = codec.encode(&map).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), map);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let codec = MessagePackCodec;
        assert_eq!(codec.encode(&sample()).unwrap(), codec.encode(&sample()).unwrap());
    }

    #[test]
    fn test_empty_payload_decodes_to_empty_map() {
        assert!(MessagePackCodec.decode(b"").unwrap().is_empty());
        assert!(JsonCodec.decode(b"").unwrap().is_empty());
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let err = MessagePackCodec.decode(&[0xc1, 0x00, 0x13]).unwrap_err();
        assert!(matches!(err, SessionError::Deserialization(_)));

        let err = JsonCodec.decode(b"{not json").unwrap_err();
        assert!(matches!(err, SessionError::Deserialization(_)));
    }

    #[test]
    fn test_json_rejects_non_finite_floats() {
        for f in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut map = AttributeMap::new();
            map.insert(Key::from("ratio"), Value::from(f));
            let err = JsonCodec.encode(&map).unwrap_err();
            assert!(matches!(err, SessionError::Serialization(_)));

            let mut nested = BTreeMap::new();
            nested.insert(Key::from("inner"), Value::from(vec![Value::from(1), Value::from(f)]));
            let mut map = AttributeMap::new();
            map.insert(Key::from("stats"), Value::Map(nested));
            let err = JsonCodec.encode(&map).unwrap_err();
            assert!(matches!(err, SessionError::Serialization(_)));
        }
    }

    #[test]
    fn test_msgpack_keeps_non_finite_floats() {
        let codec = MessagePackCodec;
        for f in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut map = AttributeMap::new();
            map.insert(Key::from("ratio"), Value::from(f));
            let decoded = codec.decode(&codec.encode(&map).unwrap()).unwrap();
            let back = decoded.get(&Key::from("ratio")).and_then(Value::as_f64).unwrap();
            assert_eq!(back.to_bits(), f.to_bits());
        }
    }
}
