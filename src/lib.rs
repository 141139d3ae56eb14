// Tessera - Redis Sentinel session storage for Rust
//
// This library re-exports the session provider and the failover-aware Redis
// client it is built on.

// Re-export session functionality
pub use tessera_session::*;

// Re-export the Redis client crate
#[cfg(feature = "redis")]
pub use tessera_redis;

/// Common imports for hosts wiring a session manager.
pub mod prelude {
    pub use tessera_session::prelude::*;

    #[cfg(feature = "redis")]
    pub use tessera_redis::{FailoverClient, SentinelConfig};
}
