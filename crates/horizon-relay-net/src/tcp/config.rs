//! Configuration types for the TCP sender and listener.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::NetworkError;

/// Default reconnect interval in milliseconds.
pub const DEFAULT_RETRY_INTERVAL_MS: i64 = 5_000;
/// Default connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: i64 = 5_000;
/// Default read buffer size in bytes.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8192;

/// Endpoint and timing configuration for a [`Sender`](super::Sender).
///
/// Intervals are kept in signed milliseconds, the same shape they have in
/// persisted settings. [`validate`](Self::validate) rejects values the
/// sender cannot run with; the sender validates on construction and keeps
/// its own copy afterwards.
///
/// # Example
///
/// ```
/// use horizon_relay_net::tcp::ConnectionConfig;
///
/// let config = ConnectionConfig::new("10.0.0.5", 7000)
///     .retry_interval_ms(2_000)
///     .alive_check(10_000, "PING");
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.address(), "10.0.0.5:7000");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// Host name or IP address of the remote endpoint.
    pub server_address: String,
    /// Remote port, 1..=65535.
    pub server_port: u16,
    /// Fixed delay between reconnect attempts. Must be positive.
    pub retry_interval_ms: i64,
    /// Heartbeat interval. Zero or negative disables the heartbeat.
    pub alive_check_interval_ms: i64,
    /// Payload written on every heartbeat.
    pub alive_message: String,
    /// Upper bound for a single connect attempt. Zero or negative means none.
    pub connect_timeout_ms: i64,
    /// Size of the buffer used for each read.
    pub read_buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1".to_string(),
            server_port: 0,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            alive_check_interval_ms: 0,
            alive_message: String::new(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl ConnectionConfig {
    /// Create a configuration for `server_address:server_port` with default timing.
    pub fn new(server_address: impl Into<String>, server_port: u16) -> Self {
        Self {
            server_address: server_address.into(),
            server_port,
            ..Self::default()
        }
    }

    /// Set the reconnect interval in milliseconds.
    pub fn retry_interval_ms(mut self, ms: i64) -> Self {
        self.retry_interval_ms = ms;
        self
    }

    /// Enable the heartbeat with the given interval and payload.
    pub fn alive_check(mut self, interval_ms: i64, message: impl Into<String>) -> Self {
        self.alive_check_interval_ms = interval_ms;
        self.alive_message = message.into();
        self
    }

    /// Disable the heartbeat.
    pub fn no_alive_check(mut self) -> Self {
        self.alive_check_interval_ms = 0;
        self
    }

    /// Set the connect timeout in milliseconds.
    pub fn connect_timeout_ms(mut self, ms: i64) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Set the read buffer size.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Get the address string (host:port).
    pub fn address(&self) -> String {
        format!("{}:{}", self.server_address, self.server_port)
    }

    /// The reconnect interval. Zero if the configured value is not positive.
    pub fn retry_interval(&self) -> Duration {
        positive_millis(self.retry_interval_ms).unwrap_or(Duration::ZERO)
    }

    /// The heartbeat interval, or `None` when the heartbeat is disabled.
    pub fn alive_check_interval(&self) -> Option<Duration> {
        positive_millis(self.alive_check_interval_ms)
    }

    /// Whether a heartbeat is configured.
    pub fn alive_check_enabled(&self) -> bool {
        self.alive_check_interval().is_some()
    }

    /// The connect timeout, or `None` when attempts are unbounded.
    pub fn connect_timeout(&self) -> Option<Duration> {
        positive_millis(self.connect_timeout_ms)
    }

    /// Check that a sender can run with this configuration.
    pub fn validate(&self) -> Result<()> {
        if self.retry_interval_ms <= 0 {
            return Err(NetworkError::InvalidConfig(format!(
                "retry interval must be positive, got {} ms",
                self.retry_interval_ms
            )));
        }
        if self.server_address.trim().is_empty() {
            return Err(NetworkError::InvalidConfig("server address is empty".into()));
        }
        if self.server_port == 0 {
            return Err(NetworkError::InvalidConfig(
                "server port must be in 1..=65535".into(),
            ));
        }
        if self.read_buffer_size == 0 {
            return Err(NetworkError::InvalidConfig(
                "read buffer size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

fn positive_millis(ms: i64) -> Option<Duration> {
    u64::try_from(ms)
        .ok()
        .filter(|&ms| ms > 0)
        .map(Duration::from_millis)
}

/// Configuration for a [`Listener`](super::Listener).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListenerConfig {
    /// The address to bind to.
    pub bind_address: String,
    /// The port to listen on. `0` lets the OS pick one.
    pub port: u16,
    /// Size of the per-connection read buffer.
    pub read_buffer_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 0,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl ListenerConfig {
    /// Create a listener configuration.
    pub fn new(bind_address: impl Into<String>, port: u16) -> Self {
        Self {
            bind_address: bind_address.into(),
            port,
            ..Self::default()
        }
    }

    /// Listen on all interfaces.
    pub fn any_address(port: u16) -> Self {
        Self::new("0.0.0.0", port)
    }

    /// Set the per-connection read buffer size.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Get the bind address string (address:port).
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Check that a listener can run with this configuration.
    pub fn validate(&self) -> Result<()> {
        if self.read_buffer_size == 0 {
            return Err(NetworkError::InvalidConfig(
                "read buffer size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_defaults() {
        let config = ConnectionConfig::new("localhost", 8080);

        assert_eq!(config.address(), "localhost:8080");
        assert_eq!(config.retry_interval(), Duration::from_millis(5_000));
        assert_eq!(config.connect_timeout(), Some(Duration::from_millis(5_000)));
        assert_eq!(config.alive_check_interval(), None);
        assert!(!config.alive_check_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_positive_retry_interval_rejected() {
        for ms in [0, -1, -250, i64::MIN] {
            let config = ConnectionConfig::new("localhost", 8080).retry_interval_ms(ms);
            assert!(
                matches!(config.validate(), Err(NetworkError::InvalidConfig(_))),
                "retry interval {ms} should be rejected"
            );
            assert_eq!(config.retry_interval(), Duration::ZERO);
        }
    }

    #[test]
    fn test_alive_check_disabled_by_non_positive_interval() {
        let config = ConnectionConfig::new("localhost", 8080).alive_check(-5, "PING");
        assert_eq!(config.alive_check_interval(), None);
        assert!(config.validate().is_ok());

        let config = config.alive_check(250, "PING");
        assert_eq!(config.alive_check_interval(), Some(Duration::from_millis(250)));
        assert_eq!(config.alive_message, "PING");

        let config = config.no_alive_check();
        assert!(!config.alive_check_enabled());
    }

    #[test]
    fn test_port_and_buffer_validation() {
        assert!(ConnectionConfig::new("localhost", 0).validate().is_err());
        assert!(ConnectionConfig::new("", 80).validate().is_err());
        assert!(
            ConnectionConfig::new("localhost", 80)
                .read_buffer_size(0)
                .validate()
                .is_err()
        );
        assert!(ListenerConfig::any_address(0).read_buffer_size(0).validate().is_err());
    }

    #[test]
    fn test_connect_timeout_can_be_disabled() {
        let config = ConnectionConfig::new("localhost", 80).connect_timeout_ms(0);
        assert_eq!(config.connect_timeout(), None);
    }

    #[test]
    fn test_listener_config_builder() {
        let config = ListenerConfig::new("127.0.0.1", 9000).read_buffer_size(1024);

        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
        assert_eq!(config.read_buffer_size, 1024);
        assert_eq!(ListenerConfig::any_address(5000).bind_address, "0.0.0.0");
        assert!(config.validate().is_ok());
    }
}
