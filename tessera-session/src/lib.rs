//! Session storage for Tessera.
//!
//! A session provider persists per-client attribute maps in a replicated
//! key-value backend and exposes the lifecycle a host session manager needs:
//! read, release, regenerate, destroy and existence checks. Stored sessions
//! expire through the backend's native per-key TTL.
//!
//! # Features
//!
//! - `redis` - Redis Sentinel provider (enabled by default)
//!
//! # Lifecycle
//!
//! ```text
//! absent    --read-->               empty store  --release--> persisted
//! persisted --read-->               loaded store --release--> persisted
//! any       --destroy-->            absent
//! persisted --regenerate(old,new)-> new persisted, old absent
//! absent    --regenerate(old,new)-> new persisted with an empty value
//! ```
//!
//! # Examples
//!
//! ## Redis Sentinel (Default)
//!
//! ```no_run
//! use tessera_session::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SessionError> {
//!     let registry = ProviderRegistry::with_defaults();
//!     let provider = registry
//!         .init(
//!             "redis_sentinel",
//!             Duration::from_secs(3600),
//!             "127.0.0.1:26379;127.0.0.2:26379,100,secret,0,mymaster",
//!         )
//!         .await?;
//!
//!     let session = provider.read("4f1c2a").await?;
//!     session.set(Key::from("user_id"), Value::from(123))?;
//!     session.release().await?;
//!
//!     // Rotate the identifier after login
//!     let session = provider.regenerate("4f1c2a", &generate_session_id()).await?;
//!     assert_eq!(session.get(&Key::from("user_id")), Some(Value::from(123)));
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! Each `read` hands out an independent copy. Two stores read from the same
//! identifier do not see each other's writes, and the one released last
//! replaces the stored value.

pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod memory;
pub mod provider;
pub mod registry;
pub mod store;
pub mod traits;
pub mod value;

pub use backend::SessionBackend;
pub use codec::{Codec, JsonCodec, MessagePackCodec};
pub use config::ProviderConfig;
pub use error::{SessionError, SessionResult};
pub use memory::MemoryBackend;
pub use provider::{KvSessionProvider, MemoryFactory, REDIS_SENTINEL};
pub use registry::ProviderRegistry;
pub use store::Session;
pub use traits::{ActiveCount, ProviderFactory, SessionProvider, SessionStore, generate_session_id};
pub use value::{AttributeMap, Key, Value};

#[cfg(feature = "redis")]
pub use provider::RedisSentinelFactory;

#[cfg(feature = "redis")]
pub use tessera_redis::{FailoverClient, SentinelConfig};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::backend::SessionBackend;
    pub use crate::codec::{Codec, JsonCodec, MessagePackCodec};
    pub use crate::config::ProviderConfig;
    pub use crate::error::{SessionError, SessionResult};
    pub use crate::memory::MemoryBackend;
    pub use crate::provider::{KvSessionProvider, MemoryFactory};
    pub use crate::registry::ProviderRegistry;
    pub use crate::store::Session;
    pub use crate::traits::{
        ActiveCount, ProviderFactory, SessionProvider, SessionStore, generate_session_id,
    };
    pub use crate::value::{AttributeMap, Key, Value};

    #[cfg(feature = "redis")]
    pub use crate::provider::RedisSentinelFactory;
}
