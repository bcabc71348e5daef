//! Middleware stack para el servidor HTTP.
//!
//! Este modulo contiene los middleware de Tower que se aplican a todas las requests:
//! - `RequestIdLayer`: Genera/propaga X-Request-Id
//! - `LoggingLayer`: Logging estructurado de requests
//! - `RateLimitLayer`: Admission control por identidad, responde 429

mod logging;
pub mod rate_limit;
mod request_id;

pub use logging::{LoggingLayer, LoggingMiddleware};
pub use rate_limit::{
    DEFAULT_IDENTITY, HeaderIdentity, IdentityExtractor, RateLimitLayer, RateLimitMiddleware,
    TooManyRequests,
};
pub use request_id::{REQUEST_ID_HEADER, RequestId, RequestIdLayer, RequestIdMiddleware};
