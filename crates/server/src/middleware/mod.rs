//! HTTP middleware and extractors.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS
//! 5. Rate limiting (governor), per route group

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{AuthRejection, OptionalUser, RequireUser};
pub use rate_limit::{api_rate_limiter, write_rate_limiter};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
