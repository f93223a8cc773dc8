use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Tuning for the internal circuit breaker that gates every broker-touching
/// call. Mirrors `gobreaker.Settings` in the original implementation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Number of requests allowed through while half-open.
    pub max_requests: u32,
    /// Window after which the closed-state failure count resets to zero.
    pub clear_interval: Duration,
    /// Cooldown an open breaker waits before moving to half-open.
    pub closed_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { max_requests: 10, clear_interval: Duration::from_secs(10), closed_timeout: Duration::from_secs(10) }
    }
}

/// Configuration for a `Client`. `queue_size`, `max_workers` and
/// `reconnect_interval` tune the core pipeline; `breaker` tunes the circuit
/// breaker shared by every broker-touching call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Capacity of the internal republish queue.
    pub queue_size: usize,
    /// Worker cap applied independently to each pipeline stage and to the
    /// channel dispenser.
    pub max_workers: usize,
    /// Sleep between failed reconnect attempts.
    pub reconnect_interval: Duration,
    pub breaker: BreakerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { queue_size: 100, max_workers: 30, reconnect_interval: Duration::from_secs(2), breaker: BreakerConfig::default() }
    }
}

impl ClientConfig {
    /// Loads configuration from the environment, falling back to defaults
    /// for anything unset or unparsable. Unlike the connection credentials
    /// passed explicitly to `Client::new`, these knobs are optional.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let queue_size = parse_env_or("AMQP_QUEUE_SIZE", defaults.queue_size)?;
        let max_workers = parse_env_or("AMQP_MAX_WORKERS", defaults.max_workers)?.max(1);
        let reconnect_interval =
            Duration::from_secs(parse_env_or("AMQP_RECONNECT_INTERVAL_SECS", defaults.reconnect_interval.as_secs())?);

        let breaker = BreakerConfig {
            max_requests: parse_env_or("AMQP_BREAKER_MAX_REQUESTS", defaults.breaker.max_requests)?,
            clear_interval: Duration::from_secs(parse_env_or("AMQP_BREAKER_CLEAR_INTERVAL_SECS", defaults.breaker.clear_interval.as_secs())?),
            closed_timeout: Duration::from_secs(parse_env_or("AMQP_BREAKER_CLOSED_TIMEOUT_SECS", defaults.breaker.closed_timeout.as_secs())?),
        };

        Ok(Self { queue_size, max_workers, reconnect_interval, breaker })
    }
}

/// Parses an environment variable of type `T`, falling back to `default`
/// when the variable is unset or fails to parse.
fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw.parse::<T>().map_err(|_| anyhow::anyhow!("invalid value for {key}")).context(format!("parsing {key}")).or(Ok(default)),
        Err(_) => Ok(default),
    }
}
