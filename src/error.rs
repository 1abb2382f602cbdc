//! Error types shared across the gateway.

use std::error::Error as StdError;
use std::fmt::Write as _;

use thiserror::Error;
use tower::BoxError;

use crate::observability::logging::ErrorCategory;

/// An upstream round trip that did not produce a response.
///
/// Only ever handed to the logger; callers of the gateway see a synthesized
/// response instead.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The inner transport failed before a response arrived.
    #[error("badgateway: failed to receive response: {}", error_chain(&**.0))]
    BadGateway(#[source] BoxError),
}

impl GatewayError {
    /// Category used to group these events in alerting.
    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::BadGateway(_) => ErrorCategory::BadGateway,
        }
    }
}

/// Errors raised while compiling a page template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template {name}: unclosed action starting at byte {offset}")]
    Unclosed { name: String, offset: usize },

    #[error("template {name}: empty action at byte {offset}")]
    EmptyAction { name: String, offset: usize },

    #[error("template {name}: unsupported action {action:?} at byte {offset}")]
    UnsupportedAction {
        name: String,
        action: String,
        offset: usize,
    },
}

/// Errors raised while rendering the diagnostic page.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template refers to a field the data does not provide.
    #[error("template {template}: can't evaluate field {field}")]
    UnknownField { template: String, field: String },

    /// The timestamp could not be formatted.
    #[error("timestamp formatting failed: {0}")]
    Time(#[from] time::error::Format),

    #[error("write failed: {0}")]
    Write(#[from] std::fmt::Error),
}

/// Render an error together with all of its sources, joined by `": "`.
///
/// hyper and tower keep the useful part of a failure (e.g. "Connection
/// refused") in the source chain rather than in the top-level message.
pub fn error_chain(error: &(dyn StdError + Send + Sync + 'static)) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.ends_with(&text) {
            let _ = write!(out, ": {}", text);
        }
        source = cause.source();
    }
    out
}
