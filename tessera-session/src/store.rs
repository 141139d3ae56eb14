//! In-memory session state bound to a backend.

use crate::backend::SessionBackend;
use crate::codec::Codec;
use crate::error::SessionResult;
use crate::traits::SessionStore;
use crate::value::{AttributeMap, Key, Value};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One session's attributes for the span of a read/release cycle.
///
/// All map access goes through a single reader/writer lock. The lock only
/// covers the in-memory map: a write that lands after
/// [`release`](SessionStore::release) has taken its snapshot is not persisted.
pub struct Session {
    id: String,
    attributes: RwLock<AttributeMap>,
    max_lifetime: Duration,
    backend: Arc<dyn SessionBackend>,
    codec: Arc<dyn Codec>,
}

impl Session {
    pub(crate) fn new(
        id: impl Into<String>,
        attributes: AttributeMap,
        max_lifetime: Duration,
        backend: Arc<dyn SessionBackend>,
        codec: Arc<dyn Codec>,
    ) -> Self {
        Self {
            id: id.into(),
            attributes: RwLock::new(attributes),
            max_lifetime,
            backend,
            codec,
        }
    }

    /// Lifetime applied on release.
    pub fn max_lifetime(&self) -> Duration {
        self.max_lifetime
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.read().len()
    }

    /// Check if the session holds no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.read().is_empty()
    }

    /// Check if an attribute is set.
    pub fn contains(&self, key: &Key) -> bool {
        self.attributes.read().contains_key(key)
    }

    /// All attribute keys.
    pub fn keys(&self) -> Vec<Key> {
        self.attributes.read().keys().cloned().collect()
    }

    /// Copy of the attribute map.
    pub fn snapshot(&self) -> AttributeMap {
        self.attributes.read().clone()
    }

    /// Store any serializable value under `key`.
    pub fn set_serialized<T: Serialize + ?Sized>(
        &self,
        key: impl Into<Key>,
        value: &T,
    ) -> SessionResult<()> {
        let value = Value::from_serialize(value)?;
        self.set(key.into(), value)
    }

    /// Read back a value stored with [`set_serialized`](Self::set_serialized).
    pub fn get_deserialized<T: DeserializeOwned>(&self, key: &Key) -> SessionResult<Option<T>> {
        self.get(key).map(|v| v.deserialize_into()).transpose()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("attributes", &self.len())
            .field("max_lifetime", &self.max_lifetime)
            .field("codec", &self.codec.name())
            .finish()
    }
}

#[async_trait]
impl SessionStore for Session {
    fn get(&self, key: &Key) -> Option<Value> {
        self.attributes.read().get(key).cloned()
    }

    fn set(&self, key: Key, value: Value) -> SessionResult<()> {
        self.attributes.write().insert(key, value);
        Ok(())
    }

    fn delete(&self, key: &Key) -> SessionResult<()> {
        self.attributes.write().remove(key);
        Ok(())
    }

    fn flush(&self) -> SessionResult<()> {
        *self.attributes.write() = AttributeMap::new();
        Ok(())
    }

    fn session_id(&self) -> &str {
        &self.id
    }

    /// Encode the attributes and store them under the session ID.
    ///
    /// An encoding failure is logged and returned; nothing is written then.
    async fn release(&self) -> SessionResult<()> {
        let encoded = {
            let attributes = self.attributes.read();
            self.codec.encode(&attributes)
        };

        let bytes = match encoded {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(session_id = %self.id, codec = self.codec.name(), error = %e, "Session release abandoned");
                return Err(e);
            }
        };

        self.backend.set(&self.id, &bytes, self.max_lifetime).await?;
        debug!(session_id = %self.id, bytes = bytes.len(), "Session released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MessagePackCodec;
    use crate::error::SessionError;
    use crate::memory::MemoryBackend;

    struct RejectingCodec;

    impl Codec for RejectingCodec {
        fn name(&self) -> &'static str {
            "rejecting"
        }

        fn encode(&self, _: &AttributeMap) -> SessionResult<Vec<u8>> {
            Err(SessionError::Serialization("unsupported value".to_string()))
        }

        fn decode(&self, _: &[u8]) -> SessionResult<AttributeMap> {
            Ok(AttributeMap::new())
        }
    }

    fn session_with(backend: Arc<MemoryBackend>, codec: Arc<dyn Codec>) -> Session {
        Session::new(
            "sid-1",
            AttributeMap::new(),
            Duration::from_secs(60),
            backend,
            codec,
        )
    }

    #[test]
    fn test_set_get_delete_flush() {
        let session = session_with(Arc::new(MemoryBackend::new()), Arc::new(MessagePackCodec));
        let k = Key::from("k");

        session.set(k.clone(), Value::from("v")).unwrap();
        assert_eq!(session.get(&k), Some(Value::from("v")));

        session.delete(&k).unwrap();
        assert_eq!(session.get(&k), None);
        session.delete(&k).unwrap();

        session.set(Key::from("a"), Value::from(1)).unwrap();
        session.set(Key::from(2), Value::from(2)).unwrap();
        session.flush().unwrap();
        assert_eq!(session.get(&Key::from("a")), None);
        assert_eq!(session.get(&Key::from(2)), None);
        assert!(session.is_empty());
    }

    #[test]
    fn test_session_id_is_stable() {
        let session = session_with(Arc::new(MemoryBackend::new()), Arc::new(MessagePackCodec));
        assert_eq!(session.session_id(), "sid-1");
        session.flush().unwrap();
        assert_eq!(session.session_id(), "sid-1");
    }

    #[test]
    fn test_serialized_helpers() {
        let session = session_with(Arc::new(MemoryBackend::new()), Arc::new(MessagePackCodec));
        session.set_serialized("roles", &vec!["admin", "ops"]).unwrap();

        let roles: Option<Vec<String>> = session.get_deserialized(&Key::from("roles")).unwrap();
        assert_eq!(roles, Some(vec!["admin".to_string(), "ops".to_string()]));

        let missing: Option<Vec<String>> = session.get_deserialized(&Key::from("nope")).unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_release_persists_with_lifetime() {
        let backend = Arc::new(MemoryBackend::new());
        let session = session_with(backend.clone(), Arc::new(MessagePackCodec));
        session.set(Key::from("user_id"), Value::from(7)).unwrap();

        session.release().await.unwrap();

        let stored = backend.get("sid-1").await.unwrap().unwrap();
        let decoded = MessagePackCodec.decode(&stored).unwrap();
        assert_eq!(decoded.get(&Key::from("user_id")), Some(&Value::from(7)));
        assert!(backend.ttl("sid-1").is_some());
    }

    #[tokio::test]
    async fn test_release_reports_encode_failure_and_writes_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        let session = session_with(backend.clone(), Arc::new(RejectingCodec));
        session.set(Key::from("k"), Value::from("v")).unwrap();

        let err = session.release().await.unwrap_err();
        assert!(matches!(err, SessionError::Serialization(_)));
        assert!(!backend.exists("sid-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_writers_are_serialized() {
        let session = Arc::new(session_with(
            Arc::new(MemoryBackend::new()),
            Arc::new(MessagePackCodec),
        ));

        let mut handles = Vec::new();
        for i in 0..16i64 {
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                session.set(Key::from(i), Value::from(i)).unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(session.len(), 16);
    }
}
