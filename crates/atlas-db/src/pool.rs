//! Database connection pool management.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use atlas_core::{defaults, Error, PoolStats, Result};

/// Pool configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    /// Acquire timeout. Store-operation timeouts are the pool's job.
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    /// `None` keeps connections until they fail.
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: defaults::DB_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(defaults::DB_CONNECT_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(defaults::DB_IDLE_TIMEOUT_SECS),
            max_lifetime: Some(Duration::from_secs(defaults::DB_MAX_LIFETIME_SECS)),
        }
    }
}

impl PoolConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DB_MAX_CONNECTIONS` | `10` | Pool size ceiling (at least 1) |
    /// | `DB_CONNECT_TIMEOUT_SECS` | `30` | Acquire timeout |
    /// | `DB_IDLE_TIMEOUT_SECS` | `600` | Idle connection timeout |
    /// | `DB_MAX_LIFETIME_SECS` | `1800` | Connection lifetime, `0` for unlimited |
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secs = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let mut config = Self::default();
        if let Some(n) = lookup("DB_MAX_CONNECTIONS").and_then(|v| v.trim().parse::<u32>().ok()) {
            config.max_connections = n.max(1);
        }
        if let Some(s) = secs("DB_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout = Duration::from_secs(s);
        }
        if let Some(s) = secs("DB_IDLE_TIMEOUT_SECS") {
            config.idle_timeout = Duration::from_secs(s);
        }
        if let Some(s) = secs("DB_MAX_LIFETIME_SECS") {
            config.max_lifetime = (s > 0).then(|| Duration::from_secs(s));
        }
        config
    }
}

/// Open a PostgreSQL connection pool.
pub async fn connect_pool(database_url: &str, config: &PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    info!(
        subsystem = "db",
        component = "pool",
        op = "create",
        max_connections = config.max_connections,
        connect_timeout_secs = config.connect_timeout.as_secs(),
        idle_timeout_secs = config.idle_timeout.as_secs(),
        "Creating database connection pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection pool established"
    );
    Ok(pool)
}

/// Every open connection is checked out.
fn is_exhausted(stats: &PoolStats) -> bool {
    stats.idle == 0 && stats.size > 0
}

/// Current pool size and idle count, logged at debug; warns on exhaustion.
pub fn pool_stats(pool: &PgPool) -> PoolStats {
    let stats = PoolStats {
        size: pool.size(),
        idle: pool.num_idle(),
    };

    debug!(
        subsystem = "db",
        component = "pool",
        op = "metrics",
        pool_size = stats.size,
        pool_idle = stats.idle,
        "Pool health check"
    );
    if is_exhausted(&stats) {
        warn!(
            subsystem = "db",
            component = "pool",
            pool_size = stats.size,
            "Connection pool has no idle connections, potential exhaustion"
        );
    }
    stats
}
