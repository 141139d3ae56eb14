//! Integration tests for common Tessera workflows.
//!
//! These tests verify that the facade crate exposes what a host session
//! manager needs.

use std::sync::Arc;
use std::time::Duration;
use tessera::prelude::*;

// =============================================================================
// Registry Tests
// =============================================================================

#[tokio::test]
async fn test_host_registers_custom_provider() {
    struct Fixed(Arc<MemoryBackend>);

    #[async_trait::async_trait]
    impl ProviderFactory for Fixed {
        async fn init(
            &self,
            max_lifetime: Duration,
            _save_path: &str,
        ) -> SessionResult<Arc<dyn SessionProvider>> {
            Ok(Arc::new(KvSessionProvider::new(self.0.clone(), max_lifetime)))
        }
    }

    let backend = Arc::new(MemoryBackend::new());
    let mut registry = ProviderRegistry::with_defaults();
    registry.register("fixed", Fixed(backend.clone())).unwrap();

    let provider = registry
        .init_from(&ProviderConfig::new("fixed", "").with_max_lifetime(Duration::from_secs(30)))
        .await
        .unwrap();

    let session = provider.read("abc").await.unwrap();
    session.set(Key::from("n"), Value::from(1)).unwrap();
    session.release().await.unwrap();

    assert_eq!(backend.len(), 1);
}

// =============================================================================
// Login Flow Tests
// =============================================================================

#[tokio::test]
async fn test_login_rotates_identifier_and_keeps_cart() {
    let provider = KvSessionProvider::new(Arc::new(MemoryBackend::new()), Duration::from_secs(600));

    let anonymous = generate_session_id();
    let session = provider.read(&anonymous).await.unwrap();
    session.set(Key::from("cart"), Value::from(vec![Value::from("sku-1")])).unwrap();
    session.release().await.unwrap();

    let authenticated = generate_session_id();
    let session = provider.regenerate(&anonymous, &authenticated).await.unwrap();
    session.set(Key::from("user_id"), Value::from(7)).unwrap();
    session.release().await.unwrap();

    assert!(!provider.exists(&anonymous).await.unwrap());
    let session = provider.read(&authenticated).await.unwrap();
    assert_eq!(session.get(&Key::from("user_id")), Some(Value::from(7)));
    assert_eq!(
        session.get(&Key::from("cart")),
        Some(Value::from(vec![Value::from("sku-1")]))
    );

    provider.destroy(&authenticated).await.unwrap();
    assert!(!provider.exists(&authenticated).await.unwrap());
}

#[cfg(feature = "redis")]
#[test]
fn test_sentinel_config_is_reexported() {
    let config = SentinelConfig::parse("127.0.0.1:26379").unwrap();
    assert_eq!(config.master_name, "mymaster");
}
