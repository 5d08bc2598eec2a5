//! Configuration module for MangleSocks
//!
//! This module provides configuration types and parsing for the proxy.

mod server;
mod udp;

pub use server::ServerConfig;
pub use udp::{DecoySettings, UdpConfig, DEFAULT_INTERCEPTOR};

use crate::error::ProxyError;
use crate::interceptor;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Listener and outbound connection settings
    #[serde(default)]
    pub server: ServerConfig,

    /// UDP relay settings
    #[serde(default)]
    pub udp: UdpConfig,
}

impl Config {
    /// Validate every section
    pub fn validate(&self) -> std::result::Result<(), ProxyError> {
        self.server.validate().map_err(ProxyError::Config)?;
        if interceptor::find(&self.udp.interceptor).is_none() {
            return Err(ProxyError::Config(format!(
                "Unknown UDP interceptor '{}' (available: {})",
                self.udp.interceptor,
                interceptor::names().collect::<Vec<_>>().join(", ")
            )));
        }
        self.udp.decoy.validate().map_err(ProxyError::Config)?;
        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    parse_config(&content)
}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let config_str = r#"
[server]
listen = "0.0.0.0:1080"
connect_timeout = 5
nodelay = false
keepalive_secs = 30
keepalive_interval = 10
log_level = "debug"

[udp]
interceptor = "random-session-prefix"

[udp.decoy]
count_min = 2
count_max = 4
delay_ms_min = 0
delay_ms_max = 10
bytes_min = 64
bytes_max = 128
"#;

        let config = parse_config(config_str).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:1080");
        assert_eq!(config.server.connect_timeout, 5);
        assert!(!config.server.nodelay);
        assert_eq!(config.udp.interceptor, "random-session-prefix");
        assert_eq!(config.udp.decoy.count(), 2..=4);
        assert_eq!(config.udp.decoy.bytes(), 64..=128);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_decoy_section_keeps_defaults() {
        let config = parse_config("[udp.decoy]\ncount_min = 1\n").unwrap();
        assert_eq!(config.udp.decoy.count_min, 1);
        assert_eq!(config.udp.decoy.count_max, 23);
        assert_eq!(config.udp.decoy.bytes_min, 481);
    }

    #[test]
    fn test_validate_unknown_interceptor() {
        let config = parse_config("[udp]\ninterceptor = \"bogus\"\n").unwrap();
        match config.validate() {
            Err(ProxyError::Config(msg)) => {
                assert!(msg.contains("bogus"));
                assert!(msg.contains("passthrough"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_bad_decoy_range() {
        let config = parse_config("[udp.decoy]\nbytes_min = 2000\nbytes_max = 1000\n").unwrap();
        assert!(matches!(config.validate(), Err(ProxyError::Config(_))));
    }

    #[test]
    fn test_parse_invalid_toml() {
        assert!(parse_config("[server\nlisten = ").is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nlisten = \"127.0.0.1:9999\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9999");
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/manglesocks.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
