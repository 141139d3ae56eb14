//! Session provider configuration.

use crate::error::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which provider to start and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Registry name of the provider
    pub provider: String,
    /// Lifetime of a stored session
    #[serde(with = "secs")]
    pub max_lifetime: Duration,
    /// Provider-specific configuration string
    pub save_path: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: crate::provider::REDIS_SENTINEL.to_string(),
            max_lifetime: Duration::from_secs(3600), // 1 hour
            save_path: "127.0.0.1:26379".to_string(),
        }
    }
}

impl ProviderConfig {
    /// Create a configuration for a named provider.
    ///
    /// # Examples
    ///
    /// ```
    /// use tessera_session::ProviderConfig;
    ///
    /// let config = ProviderConfig::new("redis_sentinel", "127.0.0.1:26379;127.0.0.2:26379,100");
    /// assert_eq!(config.max_lifetime.as_secs(), 3600);
    /// ```
    pub fn new(provider: &str, save_path: &str) -> Self {
        Self {
            provider: provider.to_string(),
            save_path: save_path.to_string(),
            ..Default::default()
        }
    }

    /// Load configuration from `SESSION_PROVIDER`, `SESSION_MAX_LIFETIME`
    /// (seconds) and `SESSION_SAVE_PATH`.
    pub fn from_env() -> SessionResult<Self> {
        let mut config = Self::default();

        if let Ok(provider) = std::env::var("SESSION_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(lifetime) = std::env::var("SESSION_MAX_LIFETIME") {
            let secs = lifetime.parse::<u64>().map_err(|_| {
                SessionError::ConfigInvalid(format!(
                    "SESSION_MAX_LIFETIME must be a number of seconds, got '{}'",
                    lifetime
                ))
            })?;
            config.max_lifetime = Duration::from_secs(secs);
        }

        if let Ok(save_path) = std::env::var("SESSION_SAVE_PATH") {
            config.save_path = save_path;
        }

        Ok(config)
    }

    /// Set the session lifetime.
    pub fn with_max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// Set the provider configuration string.
    pub fn with_save_path(mut self, save_path: &str) -> Self {
        self.save_path = save_path.to_string();
        self
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
