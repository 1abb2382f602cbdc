//! Bad-gateway transport decorator.
//!
//! # Responsibilities
//! - Wrap an upstream transport (`tower::Service`) without changing its contract
//! - Time each round trip
//! - Turn upstream failures into logged, synthesized 502 responses
//!
//! # Design Decisions
//! - Successful responses pass through untouched
//! - Once the upstream has been called the future always resolves to `Ok`
//! - No retries or timeouts here; those belong to the wrapped transport

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::http::{Request, Response};
use bytes::Bytes;
use http_body_util::{Either, Full};
use tower::{BoxError, Layer, Service};

use crate::error::{error_chain, GatewayError};
use crate::gateway::synthesize::ResponseSynthesizer;
use crate::observability::{Fields, RequestContext, RequestLogger, TracingLogger, DURATION_MS};

/// Response body of the gateway: the upstream's own body, or a synthesized one.
pub type GatewayBody<B> = Either<B, Full<Bytes>>;

/// Layer applying [`BadGateway`] to an upstream transport.
#[derive(Clone)]
pub struct BadGatewayLayer {
    synthesizer: Arc<ResponseSynthesizer>,
    logger: Arc<dyn RequestLogger>,
}

impl BadGatewayLayer {
    /// Layer answering failures with `synthesizer`, logging through `tracing`.
    pub fn new(synthesizer: ResponseSynthesizer) -> Self {
        Self {
            synthesizer: Arc::new(synthesizer),
            logger: Arc::new(TracingLogger),
        }
    }

    /// Replace the default `tracing` logger.
    pub fn with_logger(mut self, logger: Arc<dyn RequestLogger>) -> Self {
        self.logger = logger;
        self
    }
}

impl<S> Layer<S> for BadGatewayLayer {
    type Service = BadGateway<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BadGateway {
            inner,
            synthesizer: self.synthesizer.clone(),
            logger: self.logger.clone(),
        }
    }
}

/// Transport that answers upstream failures with `502 Bad Gateway`.
#[derive(Clone)]
pub struct BadGateway<S> {
    inner: S,
    synthesizer: Arc<ResponseSynthesizer>,
    logger: Arc<dyn RequestLogger>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for BadGateway<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Error: Into<BoxError> + Send + 'static,
    S::Future: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<GatewayBody<ResBody>>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let context = RequestContext::from_request(&request);
        let synthesizer = self.synthesizer.clone();
        let logger = self.logger.clone();

        let start = Instant::now();
        let upstream = self.inner.call(request);

        Box::pin(async move {
            let err: BoxError = match upstream.await {
                Ok(response) => return Ok(response.map(Either::Left)),
                Err(err) => err.into(),
            };

            let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            let message = error_chain(&*err);

            let mut fields = Fields::new();
            fields.insert(DURATION_MS.into(), duration_ms.into());
            logger.log_error(&context, &fields, &GatewayError::BadGateway(err));

            Ok(synthesizer.synthesize(&context, &message).map(Either::Right))
        })
    }
}
