//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions) - added in `main`
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//!
//! Buyer authentication is an extractor ([`OptionalBuyer`]) rather than a
//! layer, because only the checkout route reads it.

pub mod auth;
pub mod request_id;

pub use auth::OptionalBuyer;
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
