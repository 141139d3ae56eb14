//! In-process backend.

use crate::backend::SessionBackend;
use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Backend keeping values in process memory with per-key expiry.
///
/// Expiry follows the tokio clock, so paused-time tests can advance it.
/// Useful for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|e| e.is_live(now)).count()
    }

    /// Check if no live keys are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining lifetime of a key; `None` when absent or without expiry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at - now)
    }

    /// Remove every expired entry and return how many were dropped.
    ///
    /// Lookups only purge the key they touch, so sessions that are never
    /// revisited stay resident until this runs.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    fn deadline(ttl: Duration) -> Option<Instant> {
        (!ttl.is_zero()).then(|| Instant::now() + ttl)
    }

    fn purge(entries: &mut HashMap<String, Entry>, key: &str) {
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
    }
}

#[async_trait]
impl SessionBackend for MemoryBackend {
    async fn ping(&self) -> SessionResult<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> SessionResult<Option<Vec<u8>>> {
        let mut entries = self.entries.lock();
        Self::purge(&mut entries, key);
        Ok(entries.get(key).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> SessionResult<()> {
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: Self::deadline(ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> SessionResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> SessionResult<bool> {
        let mut entries = self.entries.lock();
        Self::purge(&mut entries, key);
        Ok(entries.contains_key(key))
    }

    async fn rename(&self, from: &str, to: &str) -> SessionResult<()> {
        let mut entries = self.entries.lock();
        Self::purge(&mut entries, from);
        let entry = entries
            .remove(from)
            .ok_or_else(|| SessionError::KeyNotFound(from.to_string()))?;
        entries.insert(to.to_string(), entry);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> SessionResult<()> {
        let mut entries = self.entries.lock();
        Self::purge(&mut entries, key);
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Self::deadline(ttl);
        }
        Ok(())
    }

    async fn rename_and_expire(&self, from: &str, to: &str, ttl: Duration) -> SessionResult<()> {
        let mut entries = self.entries.lock();
        Self::purge(&mut entries, from);
        let mut entry = entries
            .remove(from)
            .ok_or_else(|| SessionError::KeyNotFound(from.to_string()))?;
        entry.expires_at = Self::deadline(ttl);
        entries.insert(to.to_string(), entry);
        Ok(())
    }

    async fn sweep(&self) -> SessionResult<usize> {
        Ok(self.purge_expired())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("nope").await.unwrap(), None);
        assert!(!backend.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let backend = MemoryBackend::new();
        backend.set("k", b"one", Duration::ZERO).await.unwrap();
        backend.set("k", b"two", Duration::ZERO).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(b"two".to_vec()));
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let backend = MemoryBackend::new();
        backend.set("k", b"v", Duration::ZERO).await.unwrap();
        backend.delete("k").await.unwrap();
        backend.delete("k").await.unwrap();
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_rename_missing_source() {
        let backend = MemoryBackend::new();
        let err = backend.rename("old", "new").await.unwrap_err();
        assert!(matches!(err, SessionError::KeyNotFound(k) if k == "old"));
    }

    #[tokio::test]
    async fn test_rename_replaces_target() {
        let backend = MemoryBackend::new();
        backend.set("old", b"a", Duration::ZERO).await.unwrap();
        backend.set("new", b"b", Duration::ZERO).await.unwrap();
        backend.rename("old", "new").await.unwrap();
        assert_eq!(backend.get("new").await.unwrap(), Some(b"a".to_vec()));
        assert!(!backend.exists("old").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_expire() {
        let backend = MemoryBackend::new();
        backend.set("k", b"v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(backend.ttl("k"), Some(Duration::from_secs(10)));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert!(!backend.exists("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_resets_lifetime() {
        let backend = MemoryBackend::new();
        backend.set("k", b"v", Duration::from_secs(5)).await.unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        backend.expire("k", Duration::from_secs(5)).await.unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(backend.exists("k").await.unwrap());

        backend.expire("k", Duration::ZERO).await.unwrap();
        assert_eq!(backend.ttl("k"), None);
        assert!(backend.exists("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rename_and_expire_applies_ttl() {
        let backend = MemoryBackend::new();
        backend.set("old", b"v", Duration::ZERO).await.unwrap();
        backend
            .rename_and_expire("old", "new", Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(backend.ttl("new"), Some(Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_drops_unvisited_keys() {
        let backend = MemoryBackend::new();
        for i in 0..1000 {
            backend
                .set(&format!("sid-{i}"), b"v", Duration::from_secs(1))
                .await
                .unwrap();
        }
        backend.set("keep", b"v", Duration::ZERO).await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.entries.lock().len(), 1001);

        assert_eq!(backend.sweep().await.unwrap(), 1000);
        assert_eq!(backend.entries.lock().len(), 1);
        assert!(backend.exists("keep").await.unwrap());
        assert_eq!(backend.purge_expired(), 0);
    }
}
