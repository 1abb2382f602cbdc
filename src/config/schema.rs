//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Serve the diagnostic HTML page instead of the generic 502 message.
    pub development_mode: bool,

    /// Name of the backend application, shown in 502 responses.
    pub backend_name: String,

    /// Listener configuration.
    pub listener: ListenerConfig,

    /// The backend every request is forwarded to.
    pub backend: BackendConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            development_mode: false,
            backend_name: "Backend".to_string(),
            listener: ListenerConfig::default(),
            backend: BackendConfig::default(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend address (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Timeout configuration for the upstream transport.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert!(!config.development_mode);
        assert_eq!(config.backend_name, "Backend");
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.backend.address, "127.0.0.1:3000");
        assert_eq!(config.timeouts.request_secs, 30);
        assert_eq!(config.observability.log_format, "pretty");
    }

    #[test]
    fn test_partial_document() {
        let config: ProxyConfig = toml::from_str(
            r#"
            development_mode = true
            backend_name = "Rails"

            [backend]
            address = "127.0.0.1:8080"

            [timeouts]
            connect_secs = 2
            "#,
        )
        .unwrap();
        assert!(config.development_mode);
        assert_eq!(config.backend_name, "Rails");
        assert_eq!(config.backend.address, "127.0.0.1:8080");
        assert_eq!(config.timeouts.connect_secs, 2);
        assert_eq!(config.timeouts.request_secs, 30);
    }
}
