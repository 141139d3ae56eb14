//! Connection pool against the current primary.

use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use tracing::info;

use crate::sentinel::NodeAddr;
use crate::{RedisError, Result, SentinelConfig};

/// Type alias for the connection pool.
pub(crate) type RedisPool = Pool<RedisConnectionManager>;

/// Builder for pools bound to one data node.
pub(crate) struct PrimaryPoolBuilder<'a> {
    config: &'a SentinelConfig,
}

impl<'a> PrimaryPoolBuilder<'a> {
    /// Create a new pool builder.
    pub(crate) fn new(config: &'a SentinelConfig) -> Self {
        Self { config }
    }

    /// Build a pool for `primary` and check it with a PING.
    pub(crate) async fn build(self, primary: &NodeAddr) -> Result<RedisPool> {
        let url = self.config.node_url(&primary.host, primary.port);

        let manager = RedisConnectionManager::new(url)
            .map_err(|e| RedisError::Config(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(self.config.pool_size)
            .min_idle(Some(0))
            .idle_timeout(Some(self.config.idle_timeout))
            .reaper_rate(self.config.idle_check_frequency)
            .connection_timeout(self.config.connection_timeout)
            .build(manager)
            .await
            .map_err(|e| RedisError::Pool(e.to_string()))?;

        // Scoped so the probe connection goes back to the pool before returning
        {
            let mut conn = pool.get().await?;
            let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
        }

        info!(
            pool_size = self.config.pool_size,
            primary = %primary,
            database = self.config.database,
            "Primary connection pool created"
        );

        Ok(pool)
    }
}
