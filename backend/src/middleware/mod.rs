//! HTTP middleware: request tracing and rate limiting

mod rate_limiter;
mod tracing;

pub use self::tracing::{request_tracing, REQUEST_ID_HEADER};
pub use rate_limiter::RateLimiter;
