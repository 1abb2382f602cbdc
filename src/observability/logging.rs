//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Carry request context into error records
//! - Tag gateway failures with a category for alert grouping
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via config and environment

use std::fmt;

use axum::http::{Method, Request, Uri, Version};
use serde_json::{Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::error::GatewayError;

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Structured fields attached to a log record.
pub type Fields = Map<String, Value>;

/// Alerting category of a logged error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The upstream did not answer.
    BadGateway,
}

impl ErrorCategory {
    /// Name of the category as it appears in log records.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::BadGateway => "badgateway",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifying context of a proxied request.
///
/// Captured before the request is handed to the upstream, since the request
/// itself is consumed by the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub request_id: Option<String>,
}

impl RequestContext {
    /// Capture the identifying parts of `request`.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            version: request.version(),
            request_id,
        }
    }
}

/// Sink for request-scoped error records.
pub trait RequestLogger: Send + Sync + 'static {
    fn log_error(&self, context: &RequestContext, fields: &Fields, error: &GatewayError);
}

/// Field recorded by the gateway for every failed round trip.
pub const DURATION_MS: &str = "duration_ms";

/// [`RequestLogger`] that emits through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl RequestLogger for TracingLogger {
    fn log_error(&self, context: &RequestContext, fields: &Fields, error: &GatewayError) {
        let duration_ms = fields.get(DURATION_MS).and_then(serde_json::Value::as_u64);
        let extra = DisplayFields {
            fields,
            skip: DURATION_MS,
        };

        if extra.is_empty() {
            tracing::error!(
                category = %error.category(),
                request_id = context.request_id.as_deref().unwrap_or("unknown"),
                method = %context.method,
                uri = %context.uri,
                version = ?context.version,
                duration_ms,
                error = %error,
                "Upstream round trip failed"
            );
        } else {
            tracing::error!(
                category = %error.category(),
                request_id = context.request_id.as_deref().unwrap_or("unknown"),
                method = %context.method,
                uri = %context.uri,
                version = ?context.version,
                duration_ms,
                fields = %extra,
                error = %error,
                "Upstream round trip failed"
            );
        }
    }
}

/// `key=value` rendering of [`Fields`] for text logs, minus the entry that is
/// already its own log field.
struct DisplayFields<'a> {
    fields: &'a Fields,
    skip: &'static str,
}

impl DisplayFields<'_> {
    fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        let skip = self.skip;
        self.fields.iter().filter(move |(key, _)| key.as_str() != skip)
    }

    fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }
}

impl fmt::Display for DisplayFields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "badgateway_proxy={level},tower_http={level}",
            level = config.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}


#[cfg(test)]
pub(crate) mod testing {
    //! In-memory log capture for tests.

    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing::Subscriber;

    /// Shared buffer the test subscriber writes formatted records into.
    #[derive(Clone, Default)]
    pub(crate) struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Plain-text `fmt` subscriber writing into this buffer.
        pub(crate) fn subscriber(&self) -> impl Subscriber + Send + Sync + 'static {
            let buffer = self.clone();
            tracing_subscriber::fmt()
                .with_ansi(false)
                .with_max_level(tracing::Level::INFO)
                .with_writer(move || buffer.clone())
                .finish()
        }

        pub(crate) fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_owned)
                .collect()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
