//! Key-value primitives the session provider is built on.

use crate::error::SessionResult;
use async_trait::async_trait;
use std::time::Duration;

/// Storage primitives used by the provider.
///
/// Implementations own their retry and timeout policy; the provider never
/// loops on errors it gets back. A zero `ttl` means "no expiration".
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Liveness probe.
    async fn ping(&self) -> SessionResult<()>;

    /// Stored bytes, or `None` when the key does not exist.
    async fn get(&self, key: &str) -> SessionResult<Option<Vec<u8>>>;

    /// Store bytes, replacing any previous value.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> SessionResult<()>;

    /// Remove a key. Missing keys are not an error.
    async fn delete(&self, key: &str) -> SessionResult<()>;

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> SessionResult<bool>;

    /// Atomically rename `from` to `to`.
    ///
    /// Fails with [`SessionError::KeyNotFound`](crate::SessionError::KeyNotFound)
    /// when `from` is absent.
    async fn rename(&self, from: &str, to: &str) -> SessionResult<()>;

    /// Reset the remaining lifetime of a key.
    async fn expire(&self, key: &str, ttl: Duration) -> SessionResult<()>;

    /// Rename then reset the lifetime of the new key.
    ///
    /// The default runs the two steps back to back; backends with
    /// transactions should override it.
    async fn rename_and_expire(&self, from: &str, to: &str, ttl: Duration) -> SessionResult<()> {
        self.rename(from, to).await?;
        self.expire(to, ttl).await
    }

    /// Drop expired keys, returning how many were removed.
    ///
    /// Backends with native expiry keep the default, which does nothing.
    async fn sweep(&self) -> SessionResult<usize> {
        Ok(0)
    }
}

#[cfg(feature = "redis")]
mod redis_backend {
    use super::*;
    use tessera_redis::FailoverClient;

    #[async_trait]
    impl SessionBackend for FailoverClient {
        async fn ping(&self) -> SessionResult<()> {
            Ok(self.health_check().await?)
        }

        async fn get(&self, key: &str) -> SessionResult<Option<Vec<u8>>> {
            Ok(FailoverClient::get(self, key).await?)
        }

        async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> SessionResult<()> {
            Ok(FailoverClient::set(self, key, value, ttl).await?)
        }

        async fn delete(&self, key: &str) -> SessionResult<()> {
            FailoverClient::delete(self, key).await?;
            Ok(())
        }

        async fn exists(&self, key: &str) -> SessionResult<bool> {
            Ok(FailoverClient::exists(self, key).await?)
        }

        async fn rename(&self, from: &str, to: &str) -> SessionResult<()> {
            Ok(FailoverClient::rename(self, from, to).await?)
        }

        async fn expire(&self, key: &str, ttl: Duration) -> SessionResult<()> {
            FailoverClient::expire(self, key, ttl).await?;
            Ok(())
        }

        async fn rename_and_expire(
            &self,
            from: &str,
            to: &str,
            ttl: Duration,
        ) -> SessionResult<()> {
            Ok(FailoverClient::rename_and_expire(self, from, to, ttl).await?)
        }
    }
}
