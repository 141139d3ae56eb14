//! Named provider factories.

use crate::config::ProviderConfig;
use crate::error::{SessionError, SessionResult};
use crate::traits::{ProviderFactory, SessionProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Provider factories by name.
///
/// Built once at startup and handed to whatever constructs the session
/// manager.
///
/// ```
/// use tessera_session::{MemoryFactory, ProviderRegistry};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), tessera_session::SessionError> {
/// let mut registry = ProviderRegistry::new();
/// registry.register("memory", MemoryFactory::new())?;
///
/// let provider = registry.init("memory", Duration::from_secs(60), "").await?;
/// assert!(!provider.exists("nobody").await?);
/// # Ok(())
/// # }
/// ```
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    factories: HashMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in providers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        #[cfg(feature = "redis")]
        registry.factories.insert(
            crate::provider::REDIS_SENTINEL.to_string(),
            Arc::new(crate::provider::RedisSentinelFactory),
        );
        registry
            .factories
            .insert("memory".to_string(), Arc::new(crate::provider::MemoryFactory::new()));
        registry
    }

    /// Register a factory. Names can only be taken once.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl ProviderFactory + 'static,
    ) -> SessionResult<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(SessionError::DuplicateProvider(name));
        }
        debug!(provider = %name, "Session provider registered");
        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Look up a factory.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderFactory>> {
        self.factories.get(name).cloned()
    }

    /// Check if a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Initialize the provider registered under `name`.
    pub async fn init(
        &self,
        name: &str,
        max_lifetime: Duration,
        save_path: &str,
    ) -> SessionResult<Arc<dyn SessionProvider>> {
        let factory = self
            .get(name)
            .ok_or_else(|| SessionError::UnknownProvider(name.to_string()))?;
        let provider = factory.init(max_lifetime, save_path).await?;
        info!(provider = %name, "Session provider initialized");
        Ok(provider)
    }

    /// Initialize the provider a [`ProviderConfig`] names.
    pub async fn init_from(&self, config: &ProviderConfig) -> SessionResult<Arc<dyn SessionProvider>> {
        self.init(&config.provider, config.max_lifetime, &config.save_path)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryFactory;

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ProviderRegistry::new();
        registry.register("memory", MemoryFactory::new()).unwrap();
        let err = registry.register("memory", MemoryFactory::new()).unwrap_err();
        assert!(matches!(err, SessionError::DuplicateProvider(n) if n == "memory"));
    }

    #[test]
    fn test_defaults() {
        let registry = ProviderRegistry::with_defaults();
        assert!(registry.contains("memory"));
        #[cfg(feature = "redis")]
        assert_eq!(registry.names(), vec!["memory", "redis_sentinel"]);
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let registry = ProviderRegistry::new();
        let err = registry
            .init("nope", Duration::from_secs(1), "")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::UnknownProvider(_)));
    }

    #[tokio::test]
    async fn test_init_from_config() {
        let registry = ProviderRegistry::with_defaults();
        let config = ProviderConfig::new("memory", "").with_max_lifetime(Duration::from_secs(5));
        let provider = registry.init_from(&config).await.unwrap();
        assert!(!provider.exists("sid").await.unwrap());
    }
}
