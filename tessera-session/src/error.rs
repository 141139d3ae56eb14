//! Error types for session operations.

use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session-specific errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Backend could not be reached within the retry budget
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Rename source key missing
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Stored bytes for a session could not be decoded
    #[error("Corrupt session {session_id}: {reason}")]
    CorruptSession {
        /// Session whose payload failed to decode
        session_id: String,
        /// Decoder message
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigInvalid(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Backend rejected a command
    #[error("Backend error: {0}")]
    Backend(String),

    /// No provider registered under this name
    #[error("Unknown session provider: {0}")]
    UnknownProvider(String),

    /// A provider is already registered under this name
    #[error("Session provider already registered: {0}")]
    DuplicateProvider(String),
}

impl SessionError {
    /// Whether the backend was unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }
}

#[cfg(feature = "redis")]
impl From<tessera_redis::RedisError> for SessionError {
    fn from(err: tessera_redis::RedisError) -> Self {
        use tessera_redis::RedisError;

        match err {
            RedisError::Unavailable(msg) | RedisError::Discovery(msg) | RedisError::Pool(msg) => {
                Self::BackendUnavailable(msg)
            }
            RedisError::Timeout => Self::BackendUnavailable("operation timed out".to_string()),
            RedisError::KeyNotFound(key) => Self::KeyNotFound(key),
            RedisError::Config(msg) => Self::ConfigInvalid(msg),
            other => Self::Backend(other.to_string()),
        }
    }
}

#[cfg(all(test, feature = "redis"))]
mod tests {
    use super::*;
    use tessera_redis::RedisError;

    #[test]
    fn test_redis_error_mapping() {
        assert!(matches!(
            SessionError::from(RedisError::Unavailable("down".into())),
            SessionError::BackendUnavailable(_)
        ));
        assert!(matches!(
            SessionError::from(RedisError::Timeout),
            SessionError::BackendUnavailable(_)
        ));
        assert!(matches!(
            SessionError::from(RedisError::KeyNotFound("sid".into())),
            SessionError::KeyNotFound(k) if k == "sid"
        ));
        assert!(matches!(
            SessionError::from(RedisError::Config("bad".into())),
            SessionError::ConfigInvalid(_)
        ));
        assert!(matches!(
            SessionError::from(RedisError::Command("WRONGTYPE".into())),
            SessionError::Backend(_)
        ));
    }
}
