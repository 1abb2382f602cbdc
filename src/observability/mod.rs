//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway failures and request spans produce:
//!     → logging.rs (structured log events, request context, error category)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Alerting grouped by error category
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through all subsystems
//! - The gateway logs through a trait so tests can capture records

pub mod logging;

pub use logging::{
    init_logging, ErrorCategory, Fields, DURATION_MS, RequestContext, RequestLogger, TracingLogger,
};
