//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → gateway::BadGateway (failure translation)
//!     → tower::timeout
//!     → upstream.rs (URI rewrite, pooled client)
//!     → Backend
//! ```

pub mod server;
pub mod upstream;

pub use server::{AppState, GatewayTransport, HttpServer};
pub use upstream::Upstream;
