//! # Network Configuration
//!
//! Loaded once at startup from TOML.
//!
//! ```toml
//! role = "server"
//! port = 7777
//! max_connections = 64
//! tick_rate = 60
//! broadcast_to_origin = false
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sphinx_shared::{DEFAULT_PORT, MAX_CONNECTIONS, TICK_RATE};

use crate::error::{NetError, NetResult};

/// Which end of the connection this process is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetRole {
    /// Authoritative host. Assigns netIds and broadcasts state.
    #[default]
    Server,
    /// Observer. Receives state and sends provisional updates.
    Client,
}

/// Network settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetConfig {
    /// Server or client.
    pub role: NetRole,
    /// Listen (server) or connect (client) port.
    pub port: u16,
    /// Maximum simultaneous client connections. Server only.
    pub max_connections: usize,
    /// Updates per second.
    pub tick_rate: u32,
    /// Echo accepted client updates back to the client that sent them.
    pub broadcast_to_origin: bool,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            role: NetRole::Server,
            port: DEFAULT_PORT,
            max_connections: MAX_CONNECTIONS,
            tick_rate: TICK_RATE,
            broadcast_to_origin: false,
        }
    }
}

impl NetConfig {
    /// Default client settings.
    #[must_use]
    pub fn client() -> Self {
        Self {
            role: NetRole::Client,
            ..Self::default()
        }
    }

    /// Parses and validates TOML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidConfig`] on a parse error or an out-of-range value.
    pub fn from_toml_str(text: &str) -> NetResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| NetError::InvalidConfig(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidConfig`] if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> NetResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| NetError::InvalidConfig(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidConfig`] naming the first bad value.
    pub fn validate(&self) -> NetResult<()> {
        if self.tick_rate == 0 {
            return Err(NetError::InvalidConfig("tick_rate must be at least 1".into()));
        }
        if self.max_connections == 0 {
            return Err(NetError::InvalidConfig("max_connections must be at least 1".into()));
        }
        Ok(())
    }

    /// Time between ticks.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_shared_constants() {
        let config = NetConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.tick_rate, TICK_RATE);
        assert!(!config.broadcast_to_origin);
        assert_eq!(NetConfig::client().role, NetRole::Client);
    }

    #[test]
    fn test_partial_toml() {
        let config = NetConfig::from_toml_str("role = \"client\"\nport = 9000\n").unwrap();
        assert_eq!(config.role, NetRole::Client);
        assert_eq!(config.port, 9000);
        assert_eq!(config.max_connections, MAX_CONNECTIONS);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            NetConfig::from_toml_str("tick_rate = 0"),
            Err(NetError::InvalidConfig(_))
        ));
        assert!(matches!(
            NetConfig::from_toml_str("role = \"observer\""),
            Err(NetError::InvalidConfig(_))
        ));
        assert!(matches!(
            NetConfig::from_toml_str("unknown_key = 1"),
            Err(NetError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_tick_interval() {
        let config = NetConfig {
            tick_rate: 20,
            ..NetConfig::default()
        };
        assert_eq!(config.tick_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            NetConfig::load("/nonexistent/sphinx.toml"),
            Err(NetError::InvalidConfig(_))
        ));
    }
}
