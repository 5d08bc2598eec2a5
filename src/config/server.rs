//! Listener and outbound connection configuration

use crate::helper::DEFAULT_CONNECT_TIMEOUT_SECS;
use crate::socks::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Default listen address, loopback only
fn default_listen() -> String {
    format!("127.0.0.1:{}", DEFAULT_PORT)
}

/// Default outbound connect timeout in seconds
fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_nodelay() -> bool {
    true
}

/// Default keepalive seconds
fn default_keepalive_secs() -> u64 {
    20
}

/// Default keepalive interval
fn default_keepalive_interval() -> u64 {
    8
}

/// Default log level
fn default_log_level() -> String {
    "info".to_string()
}

/// SOCKS5 server configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to accept SOCKS clients on (e.g., "127.0.0.1:1081")
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Outbound TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Enable TCP_NODELAY
    #[serde(default = "default_nodelay")]
    pub nodelay: bool,

    /// TCP keepalive timeout in seconds
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// TCP keepalive interval in seconds
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval: u64,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen: default_listen(),
            connect_timeout: default_connect_timeout(),
            nodelay: default_nodelay(),
            keepalive_secs: default_keepalive_secs(),
            keepalive_interval: default_keepalive_interval(),
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// Parsed listen address
    pub fn listen_addr(&self) -> Result<SocketAddr, String> {
        self.listen
            .parse()
            .map_err(|e| format!("Invalid listen address '{}': {}", self.listen, e))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.listen_addr()?;
        if self.connect_timeout == 0 {
            return Err("connect_timeout must be at least 1 second".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.listen, "127.0.0.1:1081");
        assert_eq!(config.connect_timeout, 10);
        assert!(config.nodelay);
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_listen_addr() {
        let config = ServerConfig {
            listen: "[::1]:9050".to_string(),
            ..Default::default()
        };
        assert_eq!(config.listen_addr().unwrap(), "[::1]:9050".parse().unwrap());
    }

    #[test]
    fn test_validate_bad_listen() {
        let config = ServerConfig {
            listen: "localhost".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = ServerConfig {
            connect_timeout: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
