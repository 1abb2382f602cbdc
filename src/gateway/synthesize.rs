//! Construction of the 502 response handed back in place of a failed round trip.

use std::sync::Arc;

use axum::http::{header, HeaderValue, Response, StatusCode};
use bytes::Bytes;
use http_body_util::Full;

use crate::gateway::diagnostic::{DiagnosticContext, DiagnosticRenderer};
use crate::observability::RequestContext;

pub const TEXT_PLAIN: &str = "text/plain";
pub const TEXT_HTML: &str = "text/html";

/// Builds `502 Bad Gateway` responses.
#[derive(Debug)]
pub struct ResponseSynthesizer {
    development_mode: bool,
    backend_name: String,
    not_responding: Bytes,
    renderer: Arc<DiagnosticRenderer>,
}

impl ResponseSynthesizer {
    /// Synthesizer naming `backend_name` in every body; `development_mode`
    /// selects the diagnostic page over the fixed message.
    pub fn new(development_mode: bool, backend_name: impl Into<String>, renderer: Arc<DiagnosticRenderer>) -> Self {
        let backend_name = backend_name.into();
        let not_responding = Bytes::from(format!("{} is not responding", backend_name));
        Self {
            development_mode,
            backend_name,
            not_responding,
            renderer,
        }
    }

    /// Response for a request whose round trip failed with `error`.
    ///
    /// Outside development mode the body never depends on `error`.
    pub fn synthesize(&self, context: &RequestContext, error: &str) -> Response<Full<Bytes>> {
        let (body, content_type) = if self.development_mode {
            self.diagnostic_body(error)
        } else {
            (self.not_responding.clone(), TEXT_PLAIN)
        };

        let mut response = Response::new(Full::new(body));
        *response.status_mut() = StatusCode::BAD_GATEWAY;
        *response.version_mut() = context.version;
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        response.extensions_mut().insert(context.clone());
        response
    }

    fn diagnostic_body(&self, error: &str) -> (Bytes, &'static str) {
        let rendered = DiagnosticContext::now(&self.backend_name, error)
            .and_then(|context| self.renderer.render(&context));

        match rendered {
            Ok(html) => (Bytes::from(html), TEXT_HTML),
            Err(e) => {
                tracing::debug!(error = %e, "Diagnostic page unavailable, sending raw error");
                (Bytes::from(error.to_owned()), TEXT_PLAIN)
            }
        }
    }
}
