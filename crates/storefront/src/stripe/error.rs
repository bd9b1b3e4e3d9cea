//! Stripe-related errors.

use thiserror::Error;

/// Errors that can occur when talking to the Stripe API.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe answered with an error object.
    #[error("API error: {status} - {message}")]
    Api {
        status: u16,
        /// Stripe's error `type`, e.g. `invalid_request_error`.
        error_type: Option<String>,
        message: String,
    },

    /// Request could not be built from the given input.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}
