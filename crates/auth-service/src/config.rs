//! Auth service configuration.
//!
//! Configuration is loaded from environment variables. Unlike optional
//! tuning knobs elsewhere, a value that is present but unparsable is
//! rejected rather than silently replaced by its default.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default capacity of the inbound signal queue.
pub const DEFAULT_QUEUE_SIZE: usize = 1024;

/// Default cap on authentication attempts running at once.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 128;

/// Default expired-entry GC interval in seconds (15 minutes).
pub const DEFAULT_EXPIRED_GC_INTERVAL_SECONDS: u64 = 900;

/// Default port of the mutual authentication listener on every node.
pub const DEFAULT_MUTUAL_LISTENER_PORT: u16 = 4250;

/// Default timeout for establishing a mutual authentication handshake.
pub const DEFAULT_MUTUAL_CONNECT_TIMEOUT_SECONDS: u64 = 5;

/// Default auth map capacity.
pub const DEFAULT_MAP_MAX_ENTRIES: usize = authmap::DEFAULT_MAX_ENTRIES;

/// Configuration for the mutual-certificate handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutualAuthConfig {
    /// Port the peer node's mutual auth listener accepts handshakes on.
    pub listener_port: u16,
    /// Upper bound for one handshake, connection setup included.
    pub connect_timeout: Duration,
}

impl Default for MutualAuthConfig {
    fn default() -> Self {
        Self {
            listener_port: DEFAULT_MUTUAL_LISTENER_PORT,
            connect_timeout: Duration::from_secs(DEFAULT_MUTUAL_CONNECT_TIMEOUT_SECONDS),
        }
    }
}

/// Auth service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Capacity of the inbound "authentication required" signal queue.
    pub queue_size: usize,
    /// Interval of the expired-entry sweep.
    pub expired_gc_interval: Duration,
    /// Maximum number of auth map entries.
    pub map_max_entries: usize,
    /// Maximum authentication attempts in flight; further signals wait in
    /// the queue.
    pub max_concurrent_requests: usize,
    /// Mutual-certificate handler settings.
    pub mutual: MutualAuthConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            queue_size: DEFAULT_QUEUE_SIZE,
            expired_gc_interval: Duration::from_secs(DEFAULT_EXPIRED_GC_INTERVAL_SECONDS),
            map_max_entries: DEFAULT_MAP_MAX_ENTRIES,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            mutual: MutualAuthConfig::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl AuthConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable is set to an invalid value.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let queue_size = parse_positive(vars, "MESH_AUTH_QUEUE_SIZE", DEFAULT_QUEUE_SIZE)?;

        let expired_gc_interval = Duration::from_secs(parse_positive(
            vars,
            "MESH_AUTH_EXPIRED_GC_INTERVAL_SECONDS",
            DEFAULT_EXPIRED_GC_INTERVAL_SECONDS,
        )?);

        let map_max_entries =
            parse_positive(vars, "MESH_AUTH_MAP_MAX_ENTRIES", DEFAULT_MAP_MAX_ENTRIES)?;

        let max_concurrent_requests = parse_positive(
            vars,
            "MESH_AUTH_MAX_CONCURRENT_REQUESTS",
            DEFAULT_MAX_CONCURRENT_REQUESTS,
        )?;

        let listener_port = parse_var(
            vars,
            "MESH_AUTH_MUTUAL_LISTENER_PORT",
            DEFAULT_MUTUAL_LISTENER_PORT,
        )?;

        let connect_timeout = Duration::from_secs(parse_positive(
            vars,
            "MESH_AUTH_MUTUAL_CONNECT_TIMEOUT_SECONDS",
            DEFAULT_MUTUAL_CONNECT_TIMEOUT_SECONDS,
        )?);

        Ok(AuthConfig {
            queue_size,
            expired_gc_interval,
            map_max_entries,
            max_concurrent_requests,
            mutual: MutualAuthConfig {
                listener_port,
                connect_timeout,
            },
        })
    }
}

fn parse_var<T>(vars: &HashMap<String, String>, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match vars.get(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                name: name.to_string(),
                reason: format!("'{raw}': {e}"),
            }),
    }
}

fn parse_positive<T>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let value = parse_var(vars, name, default)?;
    if value == T::default() {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}
