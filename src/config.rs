//! Relay configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).
//!
//! | Variable                         | Default        |
//! |----------------------------------|----------------|
//! | `LISTEN_ADDR`                    | `0.0.0.0:9988` |
//! | `OUTBOUND_QUEUE_CAPACITY`        | `256`          |
//! | `UNICAST_TIMEOUT_MS`             | `5000` (`0` waits forever) |
//! | `SYNTHESIZE_LEAVE_ON_DISCONNECT` | `false`        |
//! | `MAX_MESSAGE_BYTES`              | `65536`        |
//! | `PING_INTERVAL_SECS`             | `54`           |
//! | `WRITE_TIMEOUT_SECS`             | `10`           |
//! | `ASSETS_DIR`                     | `assets`       |
//! | `LOG_FORMAT`                     | `text`         |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::RegistryConfig;
use crate::error::RelayError;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Top-level relay configuration.
///
/// Loaded once at startup via [`RelayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address to bind the HTTP server to.
    pub listen_addr: SocketAddr,

    /// Slots in each participant's outbound queue. A fan-out that finds
    /// the queue full evicts the participant.
    pub outbound_queue_capacity: usize,

    /// Bound on a unicast delivery waiting for queue room. `None` waits
    /// forever and lets one stalled peer block the registry.
    pub unicast_timeout: Option<Duration>,

    /// Announce a `Leave` on behalf of connections that close without one.
    pub synthesize_leave_on_disconnect: bool,

    /// Largest inbound WebSocket message accepted, in bytes.
    pub max_message_bytes: usize,

    /// Interval between keepalive pings sent by each connection.
    pub ping_interval: Duration,

    /// Time allowed for a single frame write before the connection is dropped.
    pub write_timeout: Duration,

    /// Directory served as static files for every path not otherwise routed.
    pub assets_dir: PathBuf,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 9988)),
            outbound_queue_capacity: 256,
            unicast_timeout: Some(Duration::from_millis(5000)),
            synthesize_leave_on_disconnect: false,
            max_message_bytes: 64 * 1024,
            ping_interval: Duration::from_secs(54),
            write_timeout: Duration::from_secs(10),
            assets_dir: PathBuf::from("assets"),
            log_format: LogFormat::Text,
        }
    }
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to the defaults of [`RelayConfig::default`] when a
    /// variable is not set or cannot be parsed.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as a
    /// [`SocketAddr`], or if a capacity or interval is zero.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr: SocketAddr = match std::env::var("LISTEN_ADDR") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.listen_addr,
        };

        let unicast_timeout = match parse_env::<u64>("UNICAST_TIMEOUT_MS", 5000) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        let config = Self {
            listen_addr,
            outbound_queue_capacity: parse_env(
                "OUTBOUND_QUEUE_CAPACITY",
                defaults.outbound_queue_capacity,
            ),
            unicast_timeout,
            synthesize_leave_on_disconnect: parse_env_bool(
                "SYNTHESIZE_LEAVE_ON_DISCONNECT",
                defaults.synthesize_leave_on_disconnect,
            ),
            max_message_bytes: parse_env("MAX_MESSAGE_BYTES", defaults.max_message_bytes),
            ping_interval: Duration::from_secs(parse_env("PING_INTERVAL_SECS", 54)),
            write_timeout: Duration::from_secs(parse_env("WRITE_TIMEOUT_SECS", 10)),
            assets_dir: std::env::var("ASSETS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.assets_dir),
            log_format: match std::env::var("LOG_FORMAT").ok().as_deref() {
                Some("json") | Some("JSON") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that cannot be expressed in the types.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidConfig`] naming the first bad setting.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.outbound_queue_capacity == 0 {
            return Err(RelayError::InvalidConfig(
                "OUTBOUND_QUEUE_CAPACITY must be at least 1".to_string(),
            ));
        }
        if self.max_message_bytes == 0 {
            return Err(RelayError::InvalidConfig(
                "MAX_MESSAGE_BYTES must be at least 1".to_string(),
            ));
        }
        if self.ping_interval.is_zero() || self.write_timeout.is_zero() {
            return Err(RelayError::InvalidConfig(
                "PING_INTERVAL_SECS and WRITE_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The subset of settings the registry actor needs.
    #[must_use]
    pub fn registry(&self) -> RegistryConfig {
        RegistryConfig {
            unicast_timeout: self.unicast_timeout,
            synthesize_leave_on_disconnect: self.synthesize_leave_on_disconnect,
        }
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("TRUE") | Some("1") => true,
        Some("false") | Some("FALSE") | Some("0") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr.port(), 9988);
        assert_eq!(config.unicast_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let config = RelayConfig {
            outbound_queue_capacity: 0,
            ..RelayConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RelayError::InvalidConfig(_))
        ));
    }

    #[test]
    fn registry_config_carries_delivery_settings() {
        let config = RelayConfig {
            unicast_timeout: None,
            synthesize_leave_on_disconnect: true,
            ..RelayConfig::default()
        };
        let registry = config.registry();
        assert_eq!(registry.unicast_timeout, None);
        assert!(registry.synthesize_leave_on_disconnect);
    }

    #[test]
    fn unset_variables_fall_back_to_default() {
        assert_eq!(parse_env("SIGNAL_RELAY_TEST_UNSET_NUMBER", 17usize), 17);
        assert!(parse_env_bool("SIGNAL_RELAY_TEST_UNSET_FLAG", true));
    }
}
