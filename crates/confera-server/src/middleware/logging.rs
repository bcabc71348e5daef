//! Un span por request, con el resultado registrado al terminar.

use std::task::{Context, Poll};
use std::time::Instant;

use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
};
use tower::{Layer, Service};
use tracing::{Instrument, Span, field};

use super::request_id::RequestId;

#[derive(Clone, Default)]
pub struct LoggingLayer;

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingMiddleware { inner }
    }
}

/// Must run inside [`RequestIdLayer`](super::RequestIdLayer) to pick up the id.
#[derive(Clone)]
pub struct LoggingMiddleware<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for LoggingMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map_or("-", |id| id.0.as_str());

        let span = tracing::info_span!(
            "http_request",
            request_id = %request_id,
            method = %request.method(),
            path = %request.uri().path(),
            status = field::Empty,
            latency_ms = field::Empty,
        );

        let started = Instant::now();
        let future = self.inner.call(request);

        Box::pin(
            async move {
                tracing::debug!("Request started");
                let response = future.await?;

                let status = response.status();
                let span = Span::current();
                span.record("status", status.as_u16());
                span.record("latency_ms", started.elapsed().as_millis() as u64);

                log_outcome(status);
                Ok(response)
            }
            .instrument(span),
        )
    }
}

fn log_outcome(status: StatusCode) {
    match status {
        StatusCode::TOO_MANY_REQUESTS => tracing::warn!("Request throttled"),
        s if s.is_server_error() => tracing::warn!("Request failed"),
        _ => tracing::info!("Request completed"),
    }
}
