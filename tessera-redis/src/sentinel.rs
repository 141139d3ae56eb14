//! Primary discovery through Redis Sentinel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use tracing::{debug, warn};

use crate::{RedisError, Result, SentinelConfig};

/// Address of a data node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddr {
    /// Host name or IP.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl std::fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Resolves the current primary of a named set by asking the sentinels.
///
/// The sentinel that answered last is asked first on the next lookup.
pub struct SentinelResolver {
    config: SentinelConfig,
    preferred: AtomicUsize,
}

impl SentinelResolver {
    /// Create a resolver.
    pub fn new(config: SentinelConfig) -> Self {
        Self {
            config,
            preferred: AtomicUsize::new(0),
        }
    }

    /// Ask the sentinels, in order, for the primary address and check that
    /// the node really is a primary.
    pub async fn discover(&self) -> Result<NodeAddr> {
        let count = self.config.sentinels.len();
        let start = self.preferred.load(Ordering::Relaxed) % count.max(1);
        let mut last_error = None;

        for offset in 0..count {
            let index = (start + offset) % count;
            let sentinel = &self.config.sentinels[index];

            match self.query_sentinel(sentinel).await {
                Ok(addr) => match self.verify_primary(&addr).await {
                    Ok(()) => {
                        self.preferred.store(index, Ordering::Relaxed);
                        debug!(
                            sentinel = %sentinel,
                            master = %self.config.master_name,
                            primary = %addr,
                            "Primary resolved"
                        );
                        return Ok(addr);
                    }
                    Err(e) => {
                        warn!(sentinel = %sentinel, primary = %addr, error = %e, "Reported primary is not writable");
                        last_error = Some(e);
                    }
                },
                Err(e) => {
                    warn!(sentinel = %sentinel, error = %e, "Sentinel lookup failed");
                    last_error = Some(e);
                }
            }
        }

        Err(RedisError::Discovery(format!(
            "no sentinel could resolve primary set '{}': {}",
            self.config.master_name,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no sentinels configured".to_string())
        )))
    }

    async fn query_sentinel(&self, sentinel: &str) -> Result<NodeAddr> {
        let mut conn = self.connect(&self.config.sentinel_url(sentinel)).await?;
        let reply: Option<(String, String)> = with_timeout(
            self.config.command_timeout,
            redis::cmd("SENTINEL")
                .arg("get-master-addr-by-name")
                .arg(&self.config.master_name)
                .query_async(&mut conn),
        )
        .await?;

        let (host, port) = reply.ok_or_else(|| {
            RedisError::Discovery(format!(
                "sentinel {} does not know primary set '{}'",
                sentinel, self.config.master_name
            ))
        })?;
        Ok(NodeAddr {
            port: parse_port(&port)?,
            host,
        })
    }

    async fn verify_primary(&self, addr: &NodeAddr) -> Result<()> {
        let mut conn = self
            .connect(&self.config.node_url(&addr.host, addr.port))
            .await?;
        let info: String = with_timeout(
            self.config.command_timeout,
            redis::cmd("INFO").arg("replication").query_async(&mut conn),
        )
        .await?;

        match replication_role(&info) {
            Some("master") => Ok(()),
            Some(role) => Err(RedisError::Discovery(format!(
                "node {} reports role '{}'",
                addr, role
            ))),
            None => Err(RedisError::Command(format!(
                "INFO replication from {} has no role line",
                addr
            ))),
        }
    }

    async fn connect(&self, url: &str) -> Result<MultiplexedConnection> {
        let client = redis::Client::open(url)
            .map_err(|e| RedisError::Config(e.to_string()))?;
        with_timeout(
            self.config.connection_timeout,
            client.get_multiplexed_async_connection(),
        )
        .await
    }
}

async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: std::future::Future<Output = redis::RedisResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(RedisError::from),
        Err(_) => Err(RedisError::Timeout),
    }
}

fn parse_port(port: &str) -> Result<u16> {
    port.parse().map_err(|_| {
        RedisError::Command(format!(
            "SENTINEL get-master-addr-by-name returned port '{}'",
            port
        ))
    })
}

/// Extract `role:<value>` from an `INFO replication` payload.
pub(crate) fn replication_role(info: &str) -> Option<&str> {
    info.lines()
        .find_map(|line| line.trim().strip_prefix("role:"))
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replication_role_master() {
        let info = "# Replication\r\nrole:master\r\nconnected_slaves:2\r\n";
        assert_eq!(replication_role(info), Some("master"));
    }

    #[test]
    fn test_replication_role_replica() {
        let info = "# Replication\r\nrole:slave\r\nmaster_host:10.0.0.1\r\n";
        assert_eq!(replication_role(info), Some("slave"));
    }

    #[test]
    fn test_replication_role_missing() {
        assert_eq!(replication_role("# Replication\r\n"), None);
    }

    #[test]
    fn test_malformed_port_is_a_command_error() {
        assert_eq!(parse_port("6380").unwrap(), 6380);
        assert!(matches!(parse_port("63x9"), Err(RedisError::Command(_))));
        assert!(matches!(parse_port("70000"), Err(RedisError::Command(_))));
    }

    #[test]
    fn test_node_addr_display() {
        let addr = NodeAddr {
            host: "10.1.2.3".to_string(),
            port: 6379,
        };
        assert_eq!(addr.to_string(), "10.1.2.3:6379");
    }

    #[tokio::test]
    async fn test_discover_fails_without_reachable_sentinel() {
        let config = SentinelConfig::builder()
            .sentinels(vec!["127.0.0.1:1".to_string()])
            .connection_timeout(Duration::from_millis(200))
            .build();
        let resolver = SentinelResolver::new(config);

        let err = resolver.discover().await.unwrap_err();
        assert!(matches!(err, RedisError::Discovery(_)));
    }
}
