//! Middleware de rate limiting por identidad.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    Json,
    body::Body,
    http::{HeaderName, HeaderValue, Request, Response, StatusCode, header},
    response::IntoResponse,
};
use confera_core::{ConfigError, Fingerprint};
use serde::{Deserialize, Serialize};
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::metrics::{
    MetricsSink, NoopSink, RATE_LIMIT_REQUESTS, RATE_LIMIT_TOKENS_REMAINING, SharedSink,
};
use crate::ratelimit::{Admission, RateLimiter};

/// Bucket shared by every request without a resolvable identity.
pub const DEFAULT_IDENTITY: &str = "anonymous";

pub static RATE_LIMIT_LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub static RATE_LIMIT_REMAINING_HEADER: HeaderName =
    HeaderName::from_static("x-ratelimit-remaining");
pub static RATE_LIMIT_RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Resolves the caller identity used as bucket key.
///
/// Identities are often credentials; they are only logged as a
/// [`Fingerprint`].
pub trait IdentityExtractor: Send + Sync {
    /// Returns `None` when the request carries no usable identity.
    fn identity(&self, request: &Request<Body>) -> Option<String>;
}

/// Takes the identity from the first header that carries a non-empty value.
///
/// For `x-forwarded-for` only the first hop is used.
#[derive(Debug, Clone)]
pub struct HeaderIdentity {
    headers: Vec<HeaderName>,
}

impl HeaderIdentity {
    pub fn new(headers: impl IntoIterator<Item = HeaderName>) -> Self {
        Self {
            headers: headers.into_iter().collect(),
        }
    }

    /// Builds the extractor from configured header names.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ConfigError> {
        let headers = names
            .iter()
            .map(|name| {
                HeaderName::try_from(name.as_ref().trim().to_ascii_lowercase()).map_err(|e| {
                    ConfigError::validation("rate_limit.identity_headers", e.to_string())
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { headers })
    }
}

impl Default for HeaderIdentity {
    fn default() -> Self {
        Self::new([
            HeaderName::from_static("x-api-key"),
            header::AUTHORIZATION,
            HeaderName::from_static("x-forwarded-for"),
        ])
    }
}

impl IdentityExtractor for HeaderIdentity {
    fn identity(&self, request: &Request<Body>) -> Option<String> {
        self.headers.iter().find_map(|name| {
            let raw = request.headers().get(name)?.to_str().ok()?;
            let value = if name.as_str() == "x-forwarded-for" {
                raw.split(',').next().unwrap_or_default()
            } else {
                raw
            };
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        })
    }
}

/// Cuerpo de la respuesta 429.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TooManyRequests {
    pub error: String,
    pub message: String,
    pub status: u16,
    #[serde(skip)]
    pub retry_after: Option<Duration>,
}

impl TooManyRequests {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: "Too Many Requests".to_string(),
            message: message.into(),
            status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

impl IntoResponse for TooManyRequests {
    fn into_response(self) -> axum::response::Response {
        let retry_after = self.retry_after;
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(self)).into_response();

        if let Some(wait) = retry_after {
            // Minimo 1 segundo
            let secs = ceil_secs(wait).max(1);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Layer that throttles requests per caller identity.
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<RateLimiter>,
    extractor: Arc<dyn IdentityExtractor>,
    sink: SharedSink,
    annotate_headers: bool,
}

impl RateLimitLayer {
    /// Header based identity, no metrics, annotation on.
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self {
            limiter,
            extractor: Arc::new(HeaderIdentity::default()),
            sink: Arc::new(NoopSink),
            annotate_headers: true,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn IdentityExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Adds `x-ratelimit-*` headers to every response.
    pub fn annotate_headers(mut self, enabled: bool) -> Self {
        self.annotate_headers = enabled;
        self
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware {
            inner,
            layer: self.clone(),
        }
    }
}

/// Middleware that consults the limiter before calling the inner service.
#[derive(Clone)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    layer: RateLimitLayer,
}

impl<S> Service<Request<Body>> for RateLimitMiddleware<S>
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
        let identity = self
            .layer
            .extractor
            .identity(&request)
            .unwrap_or_else(|| DEFAULT_IDENTITY.to_string());

        let admission = self.layer.limiter.check(&identity);
        self.report(&admission);

        let annotate = self.layer.annotate_headers;

        if !admission.allowed {
            warn!(
                caller = %Fingerprint::of(&identity),
                path = %request.uri().path(),
                "Rate limit exceeded"
            );

            let mut rejection = TooManyRequests::new(self.layer.limiter.config().message.clone());
            if let Some(wait) = admission.retry_after {
                rejection = rejection.with_retry_after(wait);
            }
            let mut response = rejection.into_response();
            if annotate {
                annotate_response(&mut response, &admission);
            }
            return Box::pin(async move { Ok(response) });
        }

        debug!(
            caller = %Fingerprint::of(&identity),
            remaining = admission.remaining,
            "Request admitted"
        );

        let mut inner = self.inner.clone();

        Box::pin(async move {
            let mut response = inner.call(request).await?;
            if annotate {
                annotate_response(&mut response, &admission);
            }
            Ok(response)
        })
    }
}

impl<S> RateLimitMiddleware<S> {
    fn report(&self, admission: &Admission) {
        let outcome = if admission.allowed { "allowed" } else { "denied" };
        self.layer
            .sink
            .increment_counter(RATE_LIMIT_REQUESTS, &[("outcome", outcome)]);
        self.layer.sink.set_gauge(
            RATE_LIMIT_TOKENS_REMAINING,
            &[],
            f64::from(admission.remaining),
        );
    }
}

fn annotate_response(response: &mut Response<Body>, admission: &Admission) {
    let headers = response.headers_mut();
    headers.insert(
        RATE_LIMIT_LIMIT_HEADER.clone(),
        HeaderValue::from(admission.limit),
    );
    headers.insert(
        RATE_LIMIT_REMAINING_HEADER.clone(),
        HeaderValue::from(admission.remaining),
    );
    headers.insert(
        RATE_LIMIT_RESET_HEADER.clone(),
        HeaderValue::from(ceil_secs(admission.reset_after)),
    );
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri("/rooms");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_header_identity_order() {
        let extractor = HeaderIdentity::default();

        let both = request_with(&[("authorization", "Bearer t1"), ("x-api-key", "key-1")]);
        assert_eq!(extractor.identity(&both), Some("key-1".to_string()));

        let auth_only = request_with(&[("authorization", "Bearer t1")]);
        assert_eq!(extractor.identity(&auth_only), Some("Bearer t1".to_string()));
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let extractor = HeaderIdentity::default();
        let request = request_with(&[("x-forwarded-for", " 203.0.113.7 , 10.0.0.1")]);

        assert_eq!(extractor.identity(&request), Some("203.0.113.7".to_string()));
    }

    #[test]
    fn test_blank_values_are_absent() {
        let extractor = HeaderIdentity::default();
        let request = request_with(&[("x-api-key", "   ")]);

        assert_eq!(extractor.identity(&request), None);
        assert_eq!(extractor.identity(&request_with(&[])), None);
    }

    #[test]
    fn test_from_names_normalizes_case() {
        let extractor = HeaderIdentity::from_names(&["X-Tenant-Id"]).unwrap();
        let request = request_with(&[("x-tenant-id", "acme")]);

        assert_eq!(extractor.identity(&request), Some("acme".to_string()));
    }

    #[test]
    fn test_from_names_rejects_invalid_header() {
        let result = HeaderIdentity::from_names(&["bad header"]);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_too_many_requests_body() {
        let body = TooManyRequests::new("slow down");
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "error": "Too Many Requests",
                "message": "slow down",
                "status": 429
            })
        );
    }

    #[test]
    fn test_too_many_requests_response_headers() {
        let response = TooManyRequests::new("slow down")
            .with_retry_after(Duration::from_millis(1200))
            .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }

    #[derive(Clone)]
    struct Captured(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_logs_carry_fingerprint_not_credential() {
        let token = "Bearer sk_live_4f9a2c71d0";
        let limiter = RateLimiter::new(crate::ratelimit::RateLimitConfig::new(
            1,
            Duration::from_secs(60),
        ))
        .unwrap();
        let inner = tower::service_fn(|_req: Request<Body>| async {
            Ok::<_, std::convert::Infallible>(Response::new(Body::empty()))
        });
        let mut service = RateLimitLayer::new(Arc::new(limiter)).layer(inner);

        let output = Captured(Arc::new(parking_lot::Mutex::new(Vec::new())));
        let writer = output.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            // admitted, then denied
            let _ = service.call(request_with(&[("authorization", token)]));
            let _ = service.call(request_with(&[("authorization", token)]));
        });

        let logs = String::from_utf8(output.0.lock().clone()).unwrap();
        assert!(logs.contains("Request admitted"));
        assert!(logs.contains("Rate limit exceeded"));
        assert!(logs.contains(Fingerprint::of(token).as_str()));
        assert!(!logs.contains("sk_live_4f9a2c71d0"));
    }

    #[test]
    fn test_ceil_secs() {
        assert_eq!(ceil_secs(Duration::ZERO), 0);
        assert_eq!(ceil_secs(Duration::from_millis(1)), 1);
        assert_eq!(ceil_secs(Duration::from_secs(3)), 3);
    }
}
