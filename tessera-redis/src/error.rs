//! Redis error types.

use thiserror::Error;

/// Result type for Redis operations.
pub type Result<T> = std::result::Result<T, RedisError>;

/// Redis errors.
#[derive(Debug, Error)]
pub enum RedisError {
    /// The primary could not be reached within the retry budget.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// A command required a key that does not exist.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Sentinel discovery failed.
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pool error.
    #[error("Pool error: {0}")]
    Pool(String),

    /// Timeout error.
    #[error("Operation timed out")]
    Timeout,

    /// A reply did not have the expected shape.
    #[error("Command error: {0}")]
    Command(String),

    /// Underlying Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl RedisError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Discovery(_) | Self::Pool(_) | Self::Timeout => true,
            Self::Redis(err) => is_transient(err),
            _ => false,
        }
    }

    /// Check if this error means the pool may point at a stale primary.
    pub fn requires_rediscovery(&self) -> bool {
        match self {
            Self::Pool(_) | Self::Timeout => true,
            Self::Redis(err) => is_transient(err) || is_readonly(err),
            _ => false,
        }
    }
}

fn is_transient(err: &redis::RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.is_timeout() || is_readonly(err)
}

/// A demoted primary answers writes with `READONLY`.
fn is_readonly(err: &redis::RedisError) -> bool {
    err.to_string().contains("READONLY")
}

/// `RENAME` on a missing source key answers `ERR no such key`.
pub(crate) fn is_no_such_key(err: &redis::RedisError) -> bool {
    err.to_string().to_ascii_lowercase().contains("no such key")
}

impl<E> From<bb8::RunError<E>> for RedisError
where
    E: std::error::Error + 'static,
{
    fn from(err: bb8::RunError<E>) -> Self {
        match err {
            bb8::RunError::TimedOut => Self::Timeout,
            bb8::RunError::User(e) => Self::Pool(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(RedisError::Timeout.is_retryable());
        assert!(RedisError::Pool("exhausted".into()).is_retryable());
        assert!(RedisError::Discovery("no sentinel".into()).is_retryable());
        assert!(!RedisError::KeyNotFound("sid".into()).is_retryable());
        assert!(!RedisError::Config("bad".into()).is_retryable());
        assert!(!RedisError::Unavailable("gone".into()).is_retryable());
    }

    #[test]
    fn test_io_error_triggers_rediscovery() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = RedisError::from(redis::RedisError::from(io));
        assert!(err.is_retryable());
        assert!(err.requires_rediscovery());
    }

    #[test]
    fn test_key_not_found_is_terminal() {
        let err = RedisError::KeyNotFound("old".into());
        assert!(!err.requires_rediscovery());
        assert_eq!(err.to_string(), "Key not found: old");
    }
}
