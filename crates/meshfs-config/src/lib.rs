//! Configuration of a MeshFS service process.
//!
//! Loaded once from a TOML file at startup. The effective configuration is
//! also mirrored to the DIR as key/value pairs, which is what
//! [`ServiceConfig::to_parameter_map`] produces.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Static configuration of a service process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Identifier of this service instance.
    pub uuid: String,

    /// Hostname to advertise. Empty means "derive from the network layer".
    #[serde(default)]
    pub hostname: String,

    /// Explicit listen address. Takes effect when `hostname` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_address: Option<IpAddr>,

    /// Port the service listens on.
    pub port: u16,

    /// Whether client connections use TLS.
    #[serde(default)]
    pub use_tls: bool,

    /// GRID mode: TLS handshake for authentication only, plain data path.
    #[serde(default)]
    pub grid_tls: bool,

    /// Whether the host has multiple advertisable networks.
    #[serde(default)]
    pub multihoming: bool,

    /// Whether USR2 triggers an address-mapping renewal.
    #[serde(default)]
    pub renewal_signal: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            uuid: String::new(),
            hostname: String::new(),
            listen_address: None,
            port: 32640,
            use_tls: false,
            grid_tls: false,
            multihoming: false,
            renewal_signal: false,
        }
    }
}

impl ServiceConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ServiceConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.uuid.is_empty() {
            return Err(ConfigError::Invalid {
                field: "uuid",
                reason: "must not be empty".into(),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid {
                field: "port",
                reason: "must be non-zero".into(),
            });
        }
        if self.grid_tls && !self.use_tls {
            return Err(ConfigError::Invalid {
                field: "grid_tls",
                reason: "requires use_tls".into(),
            });
        }
        Ok(())
    }

    /// Flatten the effective configuration into the key/value pairs that are
    /// published to the DIR.
    pub fn to_parameter_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("uuid".to_string(), self.uuid.clone());
        map.insert("hostname".to_string(), self.hostname.clone());
        if let Some(addr) = self.listen_address {
            map.insert("listen_address".to_string(), addr.to_string());
        }
        map.insert("port".to_string(), self.port.to_string());
        map.insert("use_tls".to_string(), self.use_tls.to_string());
        map.insert("grid_tls".to_string(), self.grid_tls.to_string());
        map.insert("multihoming".to_string(), self.multihoming.to_string());
        map.insert(
            "renewal_signal".to_string(),
            self.renewal_signal.to_string(),
        );
        map
    }
}
