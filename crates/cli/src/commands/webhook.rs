//! Signed test deliveries for the Stripe webhook.
//!
//! # Usage
//!
//! ```bash
//! # Print a Stripe-Signature header for a payload
//! elec-cli webhook sign --payload-file event.json
//!
//! # Sign and POST it to a running storefront
//! elec-cli webhook sign --payload-file event.json --deliver http://127.0.0.1:3000/webhooks/stripe
//! ```
//!
//! # Environment Variables
//!
//! - `STRIPE_WEBHOOK_SECRET` - Endpoint secret, unless `--secret` is given

use std::path::Path;

use secrecy::SecretString;
use thiserror::Error;

use elecommerce_storefront::stripe::SIGNATURE_HEADER;
use elecommerce_storefront::stripe::signature;

/// Errors that can occur while signing or delivering a payload.
#[derive(Debug, Error)]
pub enum WebhookCommandError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Failed to read payload: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storefront answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

fn secret(explicit: Option<String>) -> Result<SecretString, WebhookCommandError> {
    explicit
        .or_else(|| std::env::var("STRIPE_WEBHOOK_SECRET").ok())
        .filter(|s| !s.trim().is_empty())
        .map(SecretString::from)
        .ok_or(WebhookCommandError::MissingEnvVar("STRIPE_WEBHOOK_SECRET"))
}

/// Sign a payload file and either print the header or deliver it.
///
/// # Errors
///
/// Returns error if no secret is available, the file cannot be read, or the
/// delivery fails or is refused.
pub async fn sign(
    secret_arg: Option<String>,
    payload_file: &Path,
    timestamp: Option<i64>,
    deliver: Option<&str>,
) -> Result<(), WebhookCommandError> {
    dotenvy::dotenv().ok();
    let secret = secret(secret_arg)?;
    let payload = std::fs::read(payload_file)?;
    let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let header = signature::sign(&secret, timestamp, &payload);

    let Some(url) = deliver else {
        #[allow(clippy::print_stdout)]
        {
            println!("{SIGNATURE_HEADER}: {header}");
        }
        return Ok(());
    };

    tracing::info!(%url, bytes = payload.len(), "Delivering signed webhook");
    let response = reqwest::Client::new()
        .post(url)
        .header(SIGNATURE_HEADER, header)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(payload)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(WebhookCommandError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    tracing::info!(status = status.as_u16(), %body, "Webhook accepted");
    Ok(())
}
