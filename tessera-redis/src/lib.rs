//! # Tessera Redis
//!
//! Redis client that follows the primary of a Sentinel-monitored set.
//!
//! ## Features
//!
//! - **Sentinel Discovery**: Resolves the writable primary by name
//! - **Connection Pooling**: bb8 pool against the current primary
//! - **Transparent Failover**: Retries with backoff and swaps the pool when the primary moves
//! - **Provider Config Strings**: `sentinels,poolSize,password,db,master,...`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tessera_redis::{FailoverClient, SentinelConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SentinelConfig::parse("10.0.0.1:26379;10.0.0.2:26379,50,secret,0,mymaster")?;
//!     let client = FailoverClient::connect(config).await?;
//!
//!     client.set("greeting", b"hello", Duration::from_secs(60)).await?;
//!     let value = client.get("greeting").await?;
//!     assert_eq!(value.as_deref(), Some(&b"hello"[..]));
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod pool;
mod sentinel;

pub use client::{FailoverClient, PoolStats};
pub use config::{
    DEFAULT_MASTER_NAME, DEFAULT_MAX_RETRIES, DEFAULT_POOL_SIZE, SentinelConfig,
    SentinelConfigBuilder,
};
pub use error::{RedisError, Result};
pub use sentinel::{NodeAddr, SentinelResolver};

// Re-export redis crate for convenience
pub use redis;

/// Prelude for common imports.
///
/// ```
/// use tessera_redis::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::FailoverClient;
    pub use crate::config::{SentinelConfig, SentinelConfigBuilder};
    pub use crate::error::{RedisError, Result};
    pub use crate::sentinel::NodeAddr;
}
