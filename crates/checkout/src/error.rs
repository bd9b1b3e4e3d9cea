//! Checkout client errors.

use thiserror::Error;

/// Errors that can occur when submitting shipping details.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The storefront URL is not usable.
    #[error("invalid storefront URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The storefront refused the submission.
    #[error("storefront error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),
}
