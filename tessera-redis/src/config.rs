//! Sentinel connection configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{RedisError, Result};

/// Default connection pool size.
pub const DEFAULT_POOL_SIZE: u32 = 100;

/// Default primary-set name watched by the sentinels.
pub const DEFAULT_MASTER_NAME: &str = "mymaster";

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Sentinel-backed Redis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    /// Sentinel addresses (`host:port`).
    pub sentinels: Vec<String>,
    /// Name of the primary set the sentinels monitor.
    pub master_name: String,
    /// Connection pool size.
    pub pool_size: u32,
    /// Password for the data nodes.
    pub password: Option<String>,
    /// Logical database index.
    pub database: u32,
    /// Close connections idle for longer than this.
    #[serde(with = "secs", default = "default_idle_timeout")]
    pub idle_timeout: Duration,
    /// How often idle connections are reaped.
    #[serde(with = "secs", default = "default_idle_check_frequency")]
    pub idle_check_frequency: Duration,
    /// Retries after the first failed attempt of a command.
    pub max_retries: u32,
    /// Connection timeout.
    #[serde(with = "secs", default = "default_connection_timeout")]
    pub connection_timeout: Duration,
    /// Timeout of a single command attempt.
    #[serde(with = "secs", default = "default_command_timeout")]
    pub command_timeout: Duration,
    /// Backoff before the first retry.
    #[serde(skip, default = "default_min_retry_backoff")]
    pub min_retry_backoff: Duration,
    /// Upper bound of the retry backoff.
    #[serde(skip, default = "default_max_retry_backoff")]
    pub max_retry_backoff: Duration,
    /// Use TLS towards the data nodes.
    #[serde(default)]
    pub tls: bool,
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_idle_check_frequency() -> Duration {
    Duration::from_secs(60)
}

fn default_connection_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_min_retry_backoff() -> Duration {
    Duration::from_millis(8)
}

fn default_max_retry_backoff() -> Duration {
    Duration::from_millis(512)
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            sentinels: vec!["127.0.0.1:26379".to_string()],
            master_name: DEFAULT_MASTER_NAME.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            password: None,
            database: 0,
            idle_timeout: default_idle_timeout(),
            idle_check_frequency: default_idle_check_frequency(),
            max_retries: DEFAULT_MAX_RETRIES,
            connection_timeout: default_connection_timeout(),
            command_timeout: default_command_timeout(),
            min_retry_backoff: default_min_retry_backoff(),
            max_retry_backoff: default_max_retry_backoff(),
            tls: false,
        }
    }
}

impl SentinelConfig {
    /// Create a configuration for the given sentinels and primary set.
    pub fn new(sentinels: Vec<String>, master_name: impl Into<String>) -> Self {
        Self {
            sentinels,
            master_name: master_name.into(),
            ..Default::default()
        }
    }

    /// Create a builder.
    pub fn builder() -> SentinelConfigBuilder {
        SentinelConfigBuilder::new()
    }

    /// Parse a provider save path.
    ///
    /// Layout: `sentinels,poolSize,password,dbIndex,masterName,idleTimeout,idleCheckFrequency,maxRetries`
    /// where sentinels are separated by `;` (a leading run of comma-separated
    /// `host:port` fields is accepted too). Every field after the sentinels is
    /// optional; malformed values fall back to their defaults. Every field,
    /// the password included, is trimmed of surrounding whitespace. Durations
    /// are whole seconds.
    ///
    /// ```
    /// use tessera_redis::SentinelConfig;
    ///
    /// let config = SentinelConfig::parse("10.0.0.1:26379;10.0.0.2:26379,50,s3cret,2,sessions").unwrap();
    /// assert_eq!(config.sentinels.len(), 2);
    /// assert_eq!(config.pool_size, 50);
    /// assert_eq!(config.master_name, "sessions");
    /// ```
    pub fn parse(save_path: &str) -> Result<Self> {
        let fields: Vec<&str> = save_path.split(',').collect();

        let mut sentinels = split_addresses(fields[0]);
        let mut rest = &fields[1..];
        while let Some(field) = rest.first() {
            if !is_address_list(field) {
                break;
            }
            sentinels.extend(split_addresses(field));
            rest = &rest[1..];
        }

        if sentinels.is_empty() {
            return Err(RedisError::Config(
                "at least one sentinel address is required".to_string(),
            ));
        }

        let field = |i: usize| rest.get(i).map(|s| s.trim());
        let mut config = Self {
            sentinels,
            ..Default::default()
        };

        config.pool_size = field(0)
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_POOL_SIZE);
        config.password = field(1)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        config.database = field(2).and_then(|s| s.parse().ok()).unwrap_or(0);
        config.master_name = field(3)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_MASTER_NAME)
            .to_string();
        if let Some(secs) = field(4).and_then(positive_secs) {
            config.idle_timeout = secs;
        }
        if let Some(secs) = field(5).and_then(positive_secs) {
            config.idle_check_frequency = secs;
        }
        if let Some(retries) = field(6).and_then(|s| s.parse::<u32>().ok()).filter(|&n| n > 0) {
            config.max_retries = retries;
        }

        Ok(config)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> SentinelConfigBuilder {
        let mut builder = SentinelConfigBuilder::new();

        if let Ok(addrs) = std::env::var("SENTINEL_ADDRS") {
            builder = builder.sentinels(split_addresses(&addrs.replace(',', ";")));
        }

        if let Ok(name) = std::env::var("SENTINEL_MASTER_NAME") {
            builder = builder.master_name(name);
        }

        if let Ok(pool_size) = std::env::var("REDIS_POOL_SIZE")
            && let Ok(size) = pool_size.parse() {
                builder = builder.pool_size(size);
            }

        if let Ok(db) = std::env::var("REDIS_DATABASE")
            && let Ok(db_num) = db.parse() {
                builder = builder.database(db_num);
            }

        if let Ok(password) = std::env::var("REDIS_PASSWORD") {
            builder = builder.password(password);
        }

        if let Ok(retries) = std::env::var("REDIS_MAX_RETRIES")
            && let Ok(n) = retries.parse() {
                builder = builder.max_retries(n);
            }

        builder
    }

    /// Check the invariants the client relies on.
    pub fn validate(&self) -> Result<()> {
        if self.sentinels.is_empty() {
            return Err(RedisError::Config(
                "at least one sentinel address is required".to_string(),
            ));
        }
        if self.pool_size == 0 {
            return Err(RedisError::Config("pool size must be positive".to_string()));
        }
        if self.master_name.is_empty() {
            return Err(RedisError::Config("master name must not be empty".to_string()));
        }
        Ok(())
    }

    /// URL used to talk to a sentinel.
    pub fn sentinel_url(&self, addr: &str) -> String {
        if addr.contains("://") {
            addr.to_string()
        } else {
            format!("redis://{}", addr)
        }
    }

    /// URL of a data node with auth and database applied.
    pub fn node_url(&self, host: &str, port: u16) -> String {
        let scheme = if self.tls { "rediss" } else { "redis" };
        match &self.password {
            Some(password) => format!(
                "{}://:{}@{}:{}/{}",
                scheme,
                encode_userinfo(password),
                host,
                port,
                self.database
            ),
            None => format!("{}://{}:{}/{}", scheme, host, port, self.database),
        }
    }

    /// Backoff before retry number `attempt` (starting at 1).
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.min_retry_backoff
            .saturating_mul(factor)
            .min(self.max_retry_backoff)
    }
}

fn positive_secs(s: &str) -> Option<Duration> {
    s.parse::<u64>()
        .ok()
        .filter(|&n| n > 0)
        .map(Duration::from_secs)
}

fn split_addresses(field: &str) -> Vec<String> {
    field
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_address_list(field: &str) -> bool {
    let addrs = split_addresses(field);
    !addrs.is_empty() && addrs.iter().all(|a| is_address(a))
}

fn is_address(addr: &str) -> bool {
    match addr.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

fn encode_userinfo(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// Builder for sentinel configuration.
#[derive(Default)]
pub struct SentinelConfigBuilder {
    config: SentinelConfig,
}

impl SentinelConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: SentinelConfig::default(),
        }
    }

    /// Set the sentinel addresses.
    pub fn sentinels(mut self, sentinels: Vec<String>) -> Self {
        self.config.sentinels = sentinels;
        self
    }

    /// Set the primary-set name.
    pub fn master_name(mut self, name: impl Into<String>) -> Self {
        self.config.master_name = name.into();
        self
    }

    /// Set the pool size.
    pub fn pool_size(mut self, size: u32) -> Self {
        self.config.pool_size = size;
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Set the database number.
    pub fn database(mut self, db: u32) -> Self {
        self.config.database = db;
        self
    }

    /// Set the idle connection timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Set the idle reaper interval.
    pub fn idle_check_frequency(mut self, frequency: Duration) -> Self {
        self.config.idle_check_frequency = frequency;
        self
    }

    /// Set the retry budget.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the connection timeout.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Set the per-attempt command timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    /// Set the retry backoff bounds.
    pub fn retry_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.config.min_retry_backoff = min;
        self.config.max_retry_backoff = max;
        self
    }

    /// Enable TLS.
    pub fn tls(mut self, enabled: bool) -> Self {
        self.config.tls = enabled;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> SentinelConfig {
        self.config
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
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
