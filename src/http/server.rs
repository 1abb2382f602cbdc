//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler
//! - Wire up middleware (tracing, request ID)
//! - Compose the upstream transport (timeout, bad-gateway translation)
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{uri::InvalidUri, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::{timeout::Timeout, ServiceBuilder, ServiceExt};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::gateway::{BadGateway, BadGatewayLayer, DiagnosticRenderer, ResponseSynthesizer};
use crate::http::upstream::Upstream;

/// The full upstream transport as seen by the proxy handler.
pub type GatewayTransport = BadGateway<Timeout<Upstream>>;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub transport: GatewayTransport,
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig, renderer: Arc<DiagnosticRenderer>) -> Result<Self, InvalidUri> {
        let upstream = Upstream::new(&config.backend, &config.timeouts)?;
        let synthesizer = ResponseSynthesizer::new(config.development_mode, config.backend_name.clone(), renderer);

        let transport = ServiceBuilder::new()
            .layer(BadGatewayLayer::new(synthesizer))
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .service(upstream);

        let router = Self::build_router(AppState { transport });
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backend = %self.config.backend.address,
            development_mode = self.config.development_mode,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Forward every request through the gateway transport.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    match state.transport.oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(err) => {
            // Only reachable if the transport refused the request before
            // sending it; upstream failures come back as 502 responses.
            tracing::error!(error = %err, "Upstream transport unavailable");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}
