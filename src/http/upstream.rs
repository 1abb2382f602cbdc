//! Upstream transport to the backend application.
//!
//! # Responsibilities
//! - Rewrite the request URI to point at the backend
//! - Own connection pooling and the connect timeout
//!
//! # Design Decisions
//! - Plain `hyper-util` client exposed as a `tower::Service`, so the gateway
//!   decorator and `tower::timeout` compose around it
//! - Failures are returned untouched; translating them is the gateway's job

use std::str::FromStr;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::{Authority, InvalidUri, PathAndQuery, Scheme};
use axum::http::{Request, Response, Uri, Version};
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client, Error, ResponseFuture};
use hyper_util::rt::TokioExecutor;
use tower::Service;

use crate::config::{BackendConfig, TimeoutConfig};

/// HTTP client bound to one backend address.
#[derive(Clone, Debug)]
pub struct Upstream {
    client: Client<HttpConnector, Body>,
    authority: Authority,
}

impl Upstream {
    /// Client for `backend.address` with the configured connect timeout.
    pub fn new(backend: &BackendConfig, timeouts: &TimeoutConfig) -> Result<Self, InvalidUri> {
        let authority = Authority::from_str(&backend.address)?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self { client, authority })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    fn rewrite_uri(&self, uri: &Uri) -> Uri {
        let mut parts = uri.clone().into_parts();
        parts.scheme = Some(Scheme::HTTP);
        parts.authority = Some(self.authority.clone());
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        Uri::from_parts(parts).unwrap_or_else(|_| uri.clone())
    }
}

impl Service<Request<Body>> for Upstream {
    type Response = Response<Incoming>;
    type Error = Error;
    type Future = ResponseFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        *request.uri_mut() = self.rewrite_uri(request.uri());
        // The backend connection speaks HTTP/1.1 regardless of the client side.
        if request.version() == Version::HTTP_2 {
            *request.version_mut() = Version::HTTP_11;
        }

        tracing::debug!(uri = %request.uri(), method = %request.method(), "Forwarding to backend");
        self.client.request(request)
    }
}
