//! Startup orchestration.
//!
//! # Responsibilities
//! - Compile the diagnostic page template
//! - Build the HTTP server and its upstream transport
//! - Bind the listener last, so traffic arrives only when everything is ready
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal

use std::sync::Arc;

use axum::http::uri::InvalidUri;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ProxyConfig;
use crate::error::TemplateError;
use crate::gateway::DiagnosticRenderer;
use crate::http::HttpServer;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("diagnostic page template is invalid: {0}")]
    Template(#[from] TemplateError),

    #[error("invalid backend address: {0}")]
    Backend(#[from] InvalidUri),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Prepare the server and bind its listener.
pub async fn start(config: ProxyConfig) -> Result<(HttpServer, TcpListener), StartupError> {
    start_with_renderer(config, DiagnosticRenderer::shared()?).await
}

/// [`start`] with an explicit diagnostic renderer.
pub async fn start_with_renderer(
    config: ProxyConfig,
    renderer: Arc<DiagnosticRenderer>,
) -> Result<(HttpServer, TcpListener), StartupError> {
    let address = config.listener.bind_address.clone();
    let server = HttpServer::new(config, renderer)?;

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    Ok((server, listener))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_binds_ephemeral_port() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "127.0.0.1:0".into();
        let (server, listener) = start(config).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
        assert_eq!(server.config().listener.bind_address, "127.0.0.1:0");
    }

    #[tokio::test]
    async fn test_start_rejects_bad_backend() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "127.0.0.1:0".into();
        config.backend.address = "not a host".into();
        assert!(matches!(start(config).await, Err(StartupError::Backend(_))));
    }
}
