//! Bounded Redis connection pool
//!
//! One multiplexed connection is shared by every caller; a semaphore bounds
//! how many commands are in flight. The connection is opened lazily on first
//! checkout and re-opened after connection-level failures.
//!
//! Checkout waits at most `checkout_timeout` and gives up as soon as the
//! caller's cancellation token fires. The permit lives in the returned
//! [`PooledConnection`] and is released when it drops, on every path.
//!
//! # Example
//!
//! ```rust,no_run
//! use kuba_graphite::expr::EvalContext;
//! use kuba_graphite::redis::{RedisConfig, RedisPool};
//!
//! # async fn example() -> kuba_graphite::error::Result<()> {
//! let pool = RedisPool::new(RedisConfig::with_url("redis://localhost:6379").pool_size(4))?;
//! let ctx = EvalContext::new();
//! let pong: String = pool
//!     .execute(&ctx, |mut conn| async move {
//!         redis::cmd("PING").query_async(&mut conn).await
//!     })
//!     .await?;
//! assert_eq!(pong, "PONG");
//! # Ok(())
//! # }
//! ```

use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::expr::EvalContext;

use super::util::{safe_redis_error, sanitize_url};

// ============================================================================
// Configuration
// ============================================================================

/// Pool configuration, loadable from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Server URL (`redis://` or `rediss://`)
    #[serde(default = "default_url")]
    pub url: String,

    /// Maximum commands in flight
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Timeout for opening the connection, milliseconds
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// Timeout for one command, milliseconds
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// Longest wait for a free permit, milliseconds
    #[serde(default = "default_checkout_timeout_ms")]
    pub checkout_timeout_ms: u64,

    /// Retry policy for failed commands
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Use TLS (`rediss://`)
    #[serde(default)]
    pub tls_enabled: bool,
}

fn default_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_pool_size() -> u32 {
    16
}

fn default_connection_timeout_ms() -> u64 {
    5_000
}

fn default_command_timeout_ms() -> u64 {
    1_000
}

fn default_checkout_timeout_ms() -> u64 {
    500
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            pool_size: default_pool_size(),
            connection_timeout_ms: default_connection_timeout_ms(),
            command_timeout_ms: default_command_timeout_ms(),
            checkout_timeout_ms: default_checkout_timeout_ms(),
            retry: RetryPolicy::default(),
            tls_enabled: false,
        }
    }
}

impl RedisConfig {
    /// Default config pointing at `url`
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the pool size
    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the command timeout
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the checkout timeout
    pub fn checkout_timeout(mut self, timeout: Duration) -> Self {
        self.checkout_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the retry policy
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Timeout for opening the connection
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// Timeout for one command
    pub fn command_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Longest wait for a permit
    pub fn checkout_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.checkout_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.url.is_empty() {
            return Err("Redis URL cannot be empty".to_string());
        }
        if self.pool_size == 0 || self.pool_size > 1000 {
            return Err(format!(
                "pool size must be within 1..=1000, got {}",
                self.pool_size
            ));
        }
        if self.command_timeout_ms == 0 || self.checkout_timeout_ms == 0 {
            return Err("timeouts must be greater than 0".to_string());
        }

        #[cfg(not(feature = "redis-tls"))]
        if self.tls_enabled {
            return Err("TLS is enabled but the 'redis-tls' feature is not compiled".to_string());
        }

        let tls_scheme = self.url.starts_with("rediss://");
        if self.tls_enabled != tls_scheme {
            return Err(format!(
                "URL scheme of {} does not match tls_enabled = {}",
                sanitize_url(&self.url),
                self.tls_enabled
            ));
        }
        Ok(())
    }
}

/// Exponential backoff with optional jitter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First delay, milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Delay cap, milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Backoff multiplier
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Add up to 25% random jitter
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_delay_ms() -> u64 {
    50
}

fn default_max_delay_ms() -> u64 {
    1_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl RetryPolicy {
    /// No retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay_ms as f64);
        let delay = if self.jitter {
            capped * (1.0 + rand::random::<f64>() * 0.25)
        } else {
            capped
        };
        Duration::from_millis(delay as u64)
    }

    /// True while another attempt is allowed
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Pool counters
#[derive(Debug, Default)]
pub struct PoolMetrics {
    connections_created: AtomicU64,
    connection_failures: AtomicU64,
    commands_executed: AtomicU64,
    command_failures: AtomicU64,
    checkout_timeouts: AtomicU64,
    retries: AtomicU64,
    total_latency_us: AtomicU64,
}

/// Point-in-time copy of [`PoolMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PoolMetricsSnapshot {
    /// Connections opened
    pub connections_created: u64,
    /// Failed connection attempts
    pub connection_failures: u64,
    /// Successful commands
    pub commands_executed: u64,
    /// Failed commands (including timeouts)
    pub command_failures: u64,
    /// Checkouts that timed out waiting for a permit
    pub checkout_timeouts: u64,
    /// Retries issued
    pub retries: u64,
    /// Mean latency of successful commands, microseconds
    pub average_latency_us: f64,
}

impl PoolMetrics {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_command(&self, latency: Duration) {
        Self::bump(&self.commands_executed);
        self.total_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    /// Snapshot the counters
    pub fn snapshot(&self) -> PoolMetricsSnapshot {
        let executed = self.commands_executed.load(Ordering::Relaxed);
        let total = self.total_latency_us.load(Ordering::Relaxed);
        PoolMetricsSnapshot {
            connections_created: self.connections_created.load(Ordering::Relaxed),
            connection_failures: self.connection_failures.load(Ordering::Relaxed),
            commands_executed: executed,
            command_failures: self.command_failures.load(Ordering::Relaxed),
            checkout_timeouts: self.checkout_timeouts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            average_latency_us: if executed == 0 {
                0.0
            } else {
                total as f64 / executed as f64
            },
        }
    }
}

// ============================================================================
// Pool
// ============================================================================

/// Redis pool shared by function calls
pub struct RedisPool {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    config: RedisConfig,
    metrics: PoolMetrics,
    permits: Arc<Semaphore>,
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPool")
            .field("url", &sanitize_url(&self.config.url))
            .field("pool_size", &self.config.pool_size)
            .field("available", &self.permits.available_permits())
            .finish()
    }
}

impl RedisPool {
    /// Create a pool; no connection is opened until the first checkout
    pub fn new(config: RedisConfig) -> Result<Self> {
        config.validate().map_err(Error::Configuration)?;
        let client = Client::open(config.url.as_str())
            .map_err(|e| Error::Configuration(safe_redis_error(&config.url, &e)))?;
        let permits = Arc::new(Semaphore::new(config.pool_size as usize));
        debug!(url = %sanitize_url(&config.url), pool_size = config.pool_size, "redis pool created");
        Ok(Self {
            client,
            connection: RwLock::new(None),
            config,
            metrics: PoolMetrics::default(),
            permits,
        })
    }

    /// Pool configuration
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Counter snapshot
    pub fn metrics(&self) -> PoolMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Permits currently free
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// `limit` shortened to what is left of the caller's deadline
    fn bounded(ctx: &EvalContext, limit: Duration) -> Duration {
        ctx.remaining().map_or(limit, |left| left.min(limit))
    }

    async fn connect(&self, ctx: &EvalContext) -> Result<MultiplexedConnection> {
        let start = Instant::now();
        let conn = tokio::time::timeout(
            Self::bounded(ctx, self.config.connection_timeout()),
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| {
            PoolMetrics::bump(&self.metrics.connection_failures);
            Error::Timeout(format!("connecting to {}", sanitize_url(&self.config.url)))
        })?
        .map_err(|e| {
            PoolMetrics::bump(&self.metrics.connection_failures);
            Error::Backend(safe_redis_error(&self.config.url, &e))
        })?;

        *self.connection.write().await = Some(conn.clone());
        PoolMetrics::bump(&self.metrics.connections_created);
        debug!(elapsed = ?start.elapsed(), "redis connection established");
        Ok(conn)
    }

    async fn reset(&self) {
        *self.connection.write().await = None;
    }

    async fn acquire(&self, ctx: &EvalContext) -> Result<OwnedSemaphorePermit> {
        let limit = Self::bounded(ctx, self.config.checkout_timeout_duration());
        let wait = tokio::time::timeout(limit, self.permits.clone().acquire_owned());
        tokio::select! {
            biased;
            _ = ctx.cancellation_token().cancelled() => {
                Err(Error::Cancelled("waiting for a redis connection".to_string()))
            },
            r = wait => match r {
                Ok(Ok(permit)) => Ok(permit),
                Ok(Err(_)) => Err(Error::Backend("redis pool closed".to_string())),
                Err(_) => {
                    PoolMetrics::bump(&self.metrics.checkout_timeouts);
                    Err(Error::Timeout("waiting for a redis connection".to_string()))
                },
            },
        }
    }

    /// Check out a connection, waiting for a permit
    pub async fn get(&self, ctx: &EvalContext) -> Result<PooledConnection> {
        let permit = self.acquire(ctx).await?;
        let existing = self.connection.read().await.clone();
        let conn = match existing {
            Some(c) => c,
            None => self.connect(ctx).await?,
        };
        Ok(PooledConnection {
            conn,
            _permit: permit,
        })
    }

    /// Run a command with timeout, retry and cancellation
    pub async fn execute<F, Fut, T>(&self, ctx: &EvalContext, f: F) -> Result<T>
    where
        F: Fn(MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, RedisError>>,
    {
        let mut attempt = 0;
        loop {
            let conn = self.get(ctx).await?;
            let start = Instant::now();
            let command = tokio::time::timeout(
                Self::bounded(ctx, self.config.command_timeout_duration()),
                f(conn.conn.clone()),
            );

            let outcome = tokio::select! {
                biased;
                _ = ctx.cancellation_token().cancelled() => {
                    return Err(Error::Cancelled("redis command".to_string()));
                },
                r = command => r,
            };
            drop(conn);

            let err = match outcome {
                Ok(Ok(value)) => {
                    self.metrics.record_command(start.elapsed());
                    return Ok(value);
                },
                Ok(Err(e)) => {
                    PoolMetrics::bump(&self.metrics.command_failures);
                    if is_connection_error(&e) {
                        self.reset().await;
                    }
                    if !is_retriable(&e) {
                        return Err(Error::Backend(safe_redis_error(&self.config.url, &e)));
                    }
                    Error::Backend(safe_redis_error(&self.config.url, &e))
                },
                Err(_) => {
                    PoolMetrics::bump(&self.metrics.command_failures);
                    Error::Timeout(format!(
                        "redis command exceeded {:?}",
                        self.config.command_timeout_duration()
                    ))
                },
            };

            if !self.config.retry.should_retry(attempt) {
                return Err(err);
            }
            let delay = self.config.retry.delay_for_attempt(attempt);
            if ctx.remaining().is_some_and(|left| left <= delay) {
                return Err(Error::Timeout(format!(
                    "deadline reached before redis retry: {}",
                    err
                )));
            }
            PoolMetrics::bump(&self.metrics.retries);
            warn!(attempt = attempt + 1, ?delay, error = %err, "redis command failed, retrying");
            tokio::select! {
                _ = ctx.cancellation_token().cancelled() => {
                    return Err(Error::Cancelled("redis command".to_string()));
                },
                _ = tokio::time::sleep(delay) => {},
            }
            attempt += 1;
        }
    }
}

/// A checked-out connection; the permit is released on drop
pub struct PooledConnection {
    conn: MultiplexedConnection,
    _permit: OwnedSemaphorePermit,
}

impl std::ops::Deref for PooledConnection {
    type Target = MultiplexedConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl std::ops::DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

fn is_retriable(e: &RedisError) -> bool {
    e.is_connection_dropped()
        || e.is_timeout()
        || e.is_io_error()
        || matches!(e.kind(), redis::ErrorKind::BusyLoadingError)
}

fn is_connection_error(e: &RedisError) -> bool {
    e.is_connection_dropped() || e.is_io_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_default_config() {
        let config = RedisConfig::default();
        assert_eq!(config.pool_size, 16);
        assert_eq!(config.command_timeout_duration(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(RedisConfig::with_url("").validate().is_err());
        assert!(RedisConfig::default().pool_size(0).validate().is_err());
        assert!(RedisConfig::with_url("rediss://secure:6380").validate().is_err());
        let config = RedisConfig {
            checkout_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let config: RedisConfig = toml::from_str(
            r#"
url = "redis://cache:6379/1"
pool_size = 4

[retry]
max_retries = 0
"#,
        )
        .unwrap();
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.checkout_timeout_ms, 500);
    }

    #[test]
    fn test_retry_delay() {
        let policy = RetryPolicy {
            jitter: false,
            ..Default::default()
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(50));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(1_000));
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
        assert!(!RetryPolicy::none().should_retry(0));
    }

    #[test]
    fn test_jitter_bounded() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let d = policy.delay_for_attempt(0);
            assert!(d >= Duration::from_millis(50) && d <= Duration::from_millis(63));
        }
    }

    #[tokio::test]
    async fn test_checkout_honours_cancellation() {
        let pool = RedisPool::new(RedisConfig::default().pool_size(1)).unwrap();
        // hold the only permit
        let _held = pool.permits.clone().acquire_owned().await.unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let ctx = EvalContext::new().with_cancellation(token);
        assert!(matches!(pool.get(&ctx).await, Err(Error::Cancelled(_))));
    }

    #[tokio::test]
    async fn test_checkout_times_out() {
        let pool = RedisPool::new(
            RedisConfig::default()
                .pool_size(1)
                .checkout_timeout(Duration::from_millis(10)),
        )
        .unwrap();
        let _held = pool.permits.clone().acquire_owned().await.unwrap();

        let result = pool.get(&EvalContext::new()).await;
        assert!(matches!(result, Err(Error::Timeout(_))));
        assert_eq!(pool.metrics().checkout_timeouts, 1);
        drop(_held);
        assert_eq!(pool.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_connect_honours_deadline() {
        // accepts and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let pool = RedisPool::new(RedisConfig::with_url(format!("redis://{}", addr))).unwrap();
        let ctx = EvalContext::new().with_timeout(Duration::from_millis(100));
        let start = Instant::now();
        let result: Result<String> = pool
            .execute(&ctx, |mut conn| async move {
                redis::cmd("PING").query_async(&mut conn).await
            })
            .await;

        assert!(matches!(result, Err(Error::Timeout(_))), "{:?}", result);
        assert!(start.elapsed() < Duration::from_secs(1), "took {:?}", start.elapsed());
        assert_eq!(pool.available_permits(), 16);
        server.abort();
    }

    #[test]
    fn test_bounded_by_deadline() {
        let limit = Duration::from_secs(5);
        assert_eq!(RedisPool::bounded(&EvalContext::new(), limit), limit);

        let ctx = EvalContext::new().with_timeout(Duration::from_millis(50));
        assert!(RedisPool::bounded(&ctx, limit) <= Duration::from_millis(50));
    }
}
