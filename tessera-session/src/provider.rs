//! Session provider over a key-value backend.

use crate::backend::SessionBackend;
use crate::codec::{Codec, MessagePackCodec};
use crate::error::{SessionError, SessionResult};
use crate::store::Session;
use crate::traits::{ActiveCount, ProviderFactory, SessionProvider, SessionStore};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Registry name of the Redis Sentinel provider.
pub const REDIS_SENTINEL: &str = "redis_sentinel";

/// Session provider storing each session as one key with a native TTL.
///
/// Session identifiers are used verbatim as backend keys. Expiry is left to
/// the backend: [`gc`](SessionProvider::gc) only asks it to
/// [`sweep`](SessionBackend::sweep), which is a no-op on Redis, and
/// [`count`](SessionProvider::count) is [`ActiveCount::Unknown`].
///
/// # Examples
///
/// ```
/// use tessera_session::{Key, KvSessionProvider, MemoryBackend, SessionProvider, SessionStore, Value};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), tessera_session::SessionError> {
/// let provider = KvSessionProvider::new(Arc::new(MemoryBackend::new()), Duration::from_secs(3600));
///
/// let session = provider.read("abc").await?;
/// session.set(Key::from("user_id"), Value::from(42))?;
/// session.release().await?;
///
/// let session = provider.read("abc").await?;
/// assert_eq!(session.get(&Key::from("user_id")), Some(Value::from(42)));
/// # Ok(())
/// # }
/// ```
pub struct KvSessionProvider {
    backend: Arc<dyn SessionBackend>,
    codec: Arc<dyn Codec>,
    max_lifetime: Duration,
}

impl KvSessionProvider {
    /// Create a provider over an already connected backend.
    pub fn new(backend: Arc<dyn SessionBackend>, max_lifetime: Duration) -> Self {
        Self {
            backend,
            codec: Arc::new(MessagePackCodec),
            max_lifetime,
        }
    }

    /// Use a different attribute encoding.
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Connect to Redis through the sentinels named in `save_path` and probe
    /// the primary.
    ///
    /// `save_path` layout:
    /// `sentinels,poolSize,password,dbIndex,masterName,idleTimeout,idleCheckFrequency,maxRetries`,
    /// e.g. `127.0.0.1:26379;127.0.0.2:26379,100,secret,0,mymaster`.
    #[cfg(feature = "redis")]
    pub async fn connect_sentinel(max_lifetime: Duration, save_path: &str) -> SessionResult<Self> {
        let config = tessera_redis::SentinelConfig::parse(save_path)?;
        let client = tessera_redis::FailoverClient::connect(config).await?;
        Ok(Self::new(Arc::new(client), max_lifetime))
    }

    /// Lifetime applied to stored sessions.
    pub fn max_lifetime(&self) -> Duration {
        self.max_lifetime
    }

    /// Check that the backend answers.
    pub async fn ping(&self) -> SessionResult<()> {
        self.backend.ping().await
    }

    /// Load a session as its concrete type.
    pub async fn load(&self, session_id: &str) -> SessionResult<Session> {
        let attributes = match self.backend.get(session_id).await? {
            Some(bytes) => {
                self.codec
                    .decode(&bytes)
                    .map_err(|e| SessionError::CorruptSession {
                        session_id: session_id.to_string(),
                        reason: e.to_string(),
                    })?
            }
            None => Default::default(),
        };

        Ok(Session::new(
            session_id,
            attributes,
            self.max_lifetime,
            self.backend.clone(),
            self.codec.clone(),
        ))
    }
}

#[async_trait]
impl SessionProvider for KvSessionProvider {
    async fn read(&self, session_id: &str) -> SessionResult<Box<dyn SessionStore>> {
        Ok(Box::new(self.load(session_id).await?))
    }

    async fn exists(&self, session_id: &str) -> SessionResult<bool> {
        self.backend.exists(session_id).await
    }

    async fn regenerate(
        &self,
        old_id: &str,
        new_id: &str,
    ) -> SessionResult<Box<dyn SessionStore>> {
        if self.backend.exists(old_id).await? {
            self.backend
                .rename_and_expire(old_id, new_id, self.max_lifetime)
                .await?;
            debug!(old_id, new_id, "Session renamed");
        } else {
            self.backend.set(new_id, &[], self.max_lifetime).await?;
            debug!(old_id, new_id, "Session created for unknown identifier");
        }
        self.read(new_id).await
    }

    async fn destroy(&self, session_id: &str) -> SessionResult<()> {
        self.backend.delete(session_id).await
    }

    async fn gc(&self) {
        match self.backend.sweep().await {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "Expired sessions swept"),
            Err(e) => warn!(error = %e, "Session sweep failed"),
        }
    }

    async fn count(&self) -> ActiveCount {
        ActiveCount::Unknown
    }
}

/// Factory registered as [`REDIS_SENTINEL`].
#[cfg(feature = "redis")]
#[derive(Debug, Default, Clone, Copy)]
pub struct RedisSentinelFactory;

#[cfg(feature = "redis")]
#[async_trait]
impl ProviderFactory for RedisSentinelFactory {
    async fn init(
        &self,
        max_lifetime: Duration,
        save_path: &str,
    ) -> SessionResult<Arc<dyn SessionProvider>> {
        let provider = KvSessionProvider::connect_sentinel(max_lifetime, save_path).await?;
        tracing::info!(
            max_lifetime_secs = max_lifetime.as_secs(),
            "Redis Sentinel session provider ready"
        );
        Ok(Arc::new(provider))
    }
}

/// Factory handing out providers over a shared in-process backend.
///
/// The save path is ignored.
#[derive(Default, Clone)]
pub struct MemoryFactory {
    backend: Arc<crate::memory::MemoryBackend>,
}

impl MemoryFactory {
    /// Create a factory with its own backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProviderFactory for MemoryFactory {
    async fn init(
        &self,
        max_lifetime: Duration,
        _save_path: &str,
    ) -> SessionResult<Arc<dyn SessionProvider>> {
        Ok(Arc::new(KvSessionProvider::new(
            self.backend.clone(),
            max_lifetime,
        )))
    }
}
