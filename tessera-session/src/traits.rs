//! Capabilities the host session manager depends on.

use crate::error::SessionResult;
use crate::value::{Key, Value};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// In-memory view of one session.
///
/// Mutations stay local until [`release`](SessionStore::release) writes the
/// whole attribute map back to the backend.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get an attribute; `None` when the key is missing.
    fn get(&self, key: &Key) -> Option<Value>;

    /// Set an attribute, replacing any previous value.
    fn set(&self, key: Key, value: Value) -> SessionResult<()>;

    /// Remove an attribute. Missing keys are ignored.
    fn delete(&self, key: &Key) -> SessionResult<()>;

    /// Remove every attribute.
    fn flush(&self) -> SessionResult<()>;

    /// The session identifier.
    fn session_id(&self) -> &str;

    /// Persist the attribute map with the provider's lifetime.
    async fn release(&self) -> SessionResult<()>;
}

/// Number of active sessions as far as a provider can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveCount {
    /// The backend cannot enumerate sessions
    Unknown,
    /// Exact number of live sessions
    Exact(usize),
}

impl ActiveCount {
    /// The count, with `Unknown` reported as 0.
    pub fn as_usize(&self) -> usize {
        match self {
            ActiveCount::Unknown => 0,
            ActiveCount::Exact(n) => *n,
        }
    }
}

/// Session lifecycle over a backend.
///
/// # Concurrency
///
/// Every [`read`](SessionProvider::read) returns an independent copy of the
/// stored attributes. Two concurrent reads of the same identifier therefore
/// race: whichever store is released last overwrites the other's writes.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Load a session. Unknown identifiers yield an empty store.
    async fn read(&self, session_id: &str) -> SessionResult<Box<dyn SessionStore>>;

    /// Check if a session is stored.
    async fn exists(&self, session_id: &str) -> SessionResult<bool>;

    /// Move a session to a new identifier and return it.
    async fn regenerate(&self, old_id: &str, new_id: &str)
    -> SessionResult<Box<dyn SessionStore>>;

    /// Delete a session. Unknown identifiers are not an error.
    async fn destroy(&self, session_id: &str) -> SessionResult<()>;

    /// Remove expired sessions.
    async fn gc(&self);

    /// Number of active sessions.
    async fn count(&self) -> ActiveCount;
}

/// Builds a provider from its configuration string.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    /// Connect and return a ready provider.
    async fn init(
        &self,
        max_lifetime: Duration,
        save_path: &str,
    ) -> SessionResult<Arc<dyn SessionProvider>>;
}

/// Generate a new unique session ID.
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_count_reads_as_zero() {
        assert_eq!(ActiveCount::Unknown.as_usize(), 0);
        assert_eq!(ActiveCount::Exact(3).as_usize(), 3);
        assert_ne!(ActiveCount::Unknown, ActiveCount::Exact(0));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
