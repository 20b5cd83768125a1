//! Redis access for functions that resolve data outside the metric store
//!
//! Only `aliasByRedis` talks to Redis. It shares one [`RedisPool`] built from
//! its own config file; every call goes through [`RedisPool::execute`], which
//! bounds concurrency, applies timeouts and honours evaluation cancellation.

pub mod connection;
pub mod util;

pub use connection::{PoolMetricsSnapshot, PooledConnection, RedisConfig, RedisPool, RetryPolicy};
