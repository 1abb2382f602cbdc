//! Upstream failure translation.
//!
//! # Data Flow
//! ```text
//! request
//!     → transport.rs (BadGateway: time the call, delegate to the upstream)
//!     → upstream succeeded: response returned unchanged
//!     → upstream failed:
//!         → logger (one record, category "badgateway", duration_ms)
//!         → synthesize.rs (502, plain text or diagnostic page)
//!         → diagnostic.rs (development mode only; falls back to plain text)
//! ```

pub mod diagnostic;
pub mod synthesize;
pub mod transport;

pub use diagnostic::{local_offset, DiagnosticContext, DiagnosticRenderer, Template, RELOAD_SECONDS};
pub use synthesize::ResponseSynthesizer;
pub use transport::{BadGateway, BadGatewayLayer, GatewayBody};
