//! Failover-aware client over the current primary.

use std::future::Future;
use std::time::Duration;

use parking_lot::RwLock;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::is_no_such_key;
use crate::pool::{PrimaryPoolBuilder, RedisPool};
use crate::sentinel::{NodeAddr, SentinelResolver};
use crate::{RedisError, Result, SentinelConfig};

#[derive(Clone)]
struct ActivePrimary {
    addr: NodeAddr,
    pool: RedisPool,
}

/// Redis client that follows the primary of a sentinel-monitored set.
///
/// Every command runs inside the configured command timeout and is retried
/// up to `max_retries` times. Connection failures, timeouts and `READONLY`
/// replies trigger a new sentinel lookup; when the primary moved, the pool is
/// rebuilt against the new node. Callers never see raw connections.
pub struct FailoverClient {
    config: SentinelConfig,
    resolver: SentinelResolver,
    active: RwLock<ActivePrimary>,
    rediscovery: Mutex<()>,
}

impl FailoverClient {
    /// Resolve the primary, build the pool and probe it.
    ///
    /// Fails with [`RedisError::Unavailable`] when no primary answers within
    /// the retry budget.
    pub async fn connect(config: SentinelConfig) -> Result<Self> {
        config.validate()?;
        let resolver = SentinelResolver::new(config.clone());

        let mut attempt = 0;
        let active = loop {
            match Self::establish(&config, &resolver).await {
                Ok(active) => break active,
                Err(e) if e.is_retryable() && attempt < config.max_retries => {
                    attempt += 1;
                    warn!(attempt, error = %e, "Primary not reachable yet, retrying");
                    tokio::time::sleep(config.retry_backoff(attempt)).await;
                }
                Err(RedisError::Config(msg)) => return Err(RedisError::Config(msg)),
                Err(e) => {
                    return Err(RedisError::Unavailable(format!(
                        "primary set '{}' unreachable after {} attempt(s): {}",
                        config.master_name,
                        attempt + 1,
                        e
                    )));
                }
            }
        };

        info!(
            master = %config.master_name,
            primary = %active.addr,
            sentinels = config.sentinels.len(),
            "Failover client connected"
        );

        Ok(Self {
            config,
            resolver,
            active: RwLock::new(active),
            rediscovery: Mutex::new(()),
        })
    }

    async fn establish(config: &SentinelConfig, resolver: &SentinelResolver) -> Result<ActivePrimary> {
        let addr = resolver.discover().await?;
        let pool = PrimaryPoolBuilder::new(config).build(&addr).await?;
        Ok(ActivePrimary { addr, pool })
    }

    /// Get the configuration.
    pub fn config(&self) -> &SentinelConfig {
        &self.config
    }

    /// Address of the primary currently in use.
    pub fn current_primary(&self) -> NodeAddr {
        self.active.read().addr.clone()
    }

    /// Get pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        let state = self.active.read().pool.state();
        PoolStats {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }

    /// Check if the primary answers.
    pub async fn health_check(&self) -> Result<()> {
        self.execute("PING", move |mut conn| async move {
            redis::cmd("PING").query_async(&mut conn).await
        })
        .await
    }

    /// Get a value; `None` when the key does not exist.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.execute("GET", move |mut conn| async move {
            redis::cmd("GET").arg(key).query_async(&mut conn).await
        })
        .await
    }

    /// Set a value, expiring after `ttl`. A zero `ttl` stores without expiry.
    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.execute("SET", move |mut conn| async move {
            let mut cmd = redis::cmd("SET");
            cmd.arg(key).arg(value);
            if !ttl.is_zero() {
                cmd.arg("PX").arg(ttl_millis(ttl));
            }
            cmd.query_async(&mut conn).await
        })
        .await
    }

    /// Delete a key. Returns whether it existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let removed: u64 = self
            .execute("DEL", move |mut conn| async move {
                redis::cmd("DEL").arg(key).query_async(&mut conn).await
            })
            .await?;
        Ok(removed > 0)
    }

    /// Check if a key exists.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.execute("EXISTS", move |mut conn| async move {
            redis::cmd("EXISTS").arg(key).query_async(&mut conn).await
        })
        .await
    }

    /// Rename `from` to `to`, replacing `to`.
    ///
    /// Fails with [`RedisError::KeyNotFound`] when `from` does not exist.
    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let (result, retries) = self
            .execute_counted("RENAME", move |mut conn| async move {
                redis::cmd("RENAME").arg(from).arg(to).query_async(&mut conn).await
            })
            .await;
        self.settle_rename(result, retries, from, to).await
    }

    /// Reset the remaining lifetime of a key. A zero `ttl` removes the expiry.
    ///
    /// Returns whether the key exists.
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        if ttl.is_zero() {
            let _: bool = self
                .execute("PERSIST", move |mut conn| async move {
                    redis::cmd("PERSIST").arg(key).query_async(&mut conn).await
                })
                .await?;
            return self.exists(key).await;
        }

        self.execute("PEXPIRE", move |mut conn| async move {
            redis::cmd("PEXPIRE")
                .arg(key)
                .arg(ttl_millis(ttl))
                .query_async(&mut conn)
                .await
        })
        .await
    }

    /// Rename `from` to `to` and reset the lifetime of `to` in one
    /// `MULTI`/`EXEC` transaction.
    pub async fn rename_and_expire(&self, from: &str, to: &str, ttl: Duration) -> Result<()> {
        let (result, retries) = self
            .execute_counted("RENAME+EXPIRE", move |mut conn| {
                let mut pipe = redis::pipe();
                pipe.atomic().cmd("RENAME").arg(from).arg(to).ignore();
                if ttl.is_zero() {
                    pipe.cmd("PERSIST").arg(to).ignore();
                } else {
                    pipe.cmd("PEXPIRE").arg(to).arg(ttl_millis(ttl)).ignore();
                }
                async move { pipe.query_async(&mut conn).await }
            })
            .await;
        self.settle_rename(result, retries, from, to).await
    }

    /// Map a missing source key to [`RedisError::KeyNotFound`].
    ///
    /// When the command was retried, an earlier attempt may have renamed the
    /// key before its reply was lost; an existing target then counts as done.
    async fn settle_rename(&self, result: Result<()>, retries: u32, from: &str, to: &str) -> Result<()> {
        let err = match result {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        let err = not_found_as(err, from);
        if retried_into_missing_key(&err, retries) && self.exists(to).await? {
            debug!(from, to, retries, "Rename already applied by an earlier attempt");
            return Ok(());
        }
        Err(err)
    }

    async fn execute<T, F, Fut>(&self, command: &'static str, op: F) -> Result<T>
    where
        F: Fn(MultiplexedConnection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        self.execute_counted(command, op).await.0
    }

    /// Run `op` under the retry policy, also reporting how many retries ran.
    async fn execute_counted<T, F, Fut>(&self, command: &'static str, op: F) -> (Result<T>, u32)
    where
        F: Fn(MultiplexedConnection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match self.attempt(&op).await {
                Ok(value) => return (Ok(value), attempt),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    debug!(command, attempt, error = %e, "Retrying command");
                    if e.requires_rediscovery()
                        && let Err(err) = self.rediscover().await
                    {
                        warn!(command, error = %err, "Primary rediscovery failed");
                    }
                    tokio::time::sleep(self.config.retry_backoff(attempt)).await;
                }
                Err(e) if e.is_retryable() => {
                    let err = RedisError::Unavailable(format!(
                        "{} failed after {} attempt(s): {}",
                        command,
                        attempt + 1,
                        e
                    ));
                    return (Err(err), attempt);
                }
                Err(e) => return (Err(e), attempt),
            }
        }
    }

    async fn attempt<T, F, Fut>(&self, op: &F) -> Result<T>
    where
        F: Fn(MultiplexedConnection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let pool = self.active.read().pool.clone();
        let conn = pool.get().await?;
        let fut = op((*conn).clone());
        match tokio::time::timeout(self.config.command_timeout, fut).await {
            Ok(result) => result.map_err(RedisError::from),
            Err(_) => Err(RedisError::Timeout),
        }
    }

    async fn rediscover(&self) -> Result<()> {
        let _guard = self.rediscovery.lock().await;

        let addr = self.resolver.discover().await?;
        let current = self.current_primary();
        if addr == current {
            return Ok(());
        }

        let pool = PrimaryPoolBuilder::new(&self.config).build(&addr).await?;
        info!(from = %current, to = %addr, "Primary changed, connection pool replaced");
        *self.active.write() = ActivePrimary { addr, pool };
        Ok(())
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn retried_into_missing_key(err: &RedisError, retries: u32) -> bool {
    retries > 0 && matches!(err, RedisError::KeyNotFound(_))
}

fn not_found_as(err: RedisError, key: &str) -> RedisError {
    match err {
        RedisError::Redis(ref e) if is_no_such_key(e) => RedisError::KeyNotFound(key.to_string()),
        other => other,
    }
}

/// Connection pool statistics.
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Total connections.
    pub connections: u32,
    /// Idle connections.
    pub idle_connections: u32,
}
