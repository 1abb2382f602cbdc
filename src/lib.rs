//! Reverse proxy that answers backend failures with `502 Bad Gateway`.

pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use gateway::{BadGateway, BadGatewayLayer};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
