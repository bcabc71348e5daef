//! Correlation id per request (`x-request-id`).

use std::task::{Context, Poll};

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Request, Response},
};
use tower::{Layer, Service};
use uuid::Uuid;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Incoming ids longer than this are replaced.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Request id, available to handlers as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    /// Keeps a usable incoming id, otherwise mints a UUID v4.
    fn resolve(headers: &HeaderMap) -> (Self, HeaderValue) {
        let incoming = headers
            .get(&REQUEST_ID_HEADER)
            .filter(|value| !value.is_empty() && value.len() <= MAX_REQUEST_ID_LEN)
            .and_then(|value| Some((value.to_str().ok()?.to_owned(), value.clone())));

        match incoming {
            Some((id, value)) => (Self(id), value),
            None => {
                let id = Uuid::new_v4().to_string();
                // Un UUID siempre es un header valido
                let value = HeaderValue::from_str(&id).unwrap_or(HeaderValue::from_static("invalid"));
                (Self(id), value)
            },
        }
    }
}

#[derive(Clone, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdMiddleware { inner }
    }
}

/// Tags the request (header + extension) and echoes the id on the response.
#[derive(Clone)]
pub struct RequestIdMiddleware<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RequestIdMiddleware<S>
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

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let (id, value) = RequestId::resolve(request.headers());

        request
            .headers_mut()
            .insert(REQUEST_ID_HEADER.clone(), value.clone());
        request.extensions_mut().insert(id);

        let future = self.inner.call(request);

        Box::pin(async move {
            let mut response = future.await?;
            response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
            Ok(response)
        })
    }
}
