//! Stripe webhook signatures.
//!
//! Stripe signs each delivery with the endpoint secret and sends the result
//! in the `Stripe-Signature` header:
//!
//! ```text
//! Stripe-Signature: t=1700000000,v1=5257a869...,v1=...
//! ```
//!
//! Each `v1` value is `hex(HMAC-SHA256(secret, "<t>.<raw body>"))`. Several
//! `v1` entries appear while a secret is being rolled; any one matching is
//! enough.

use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum age (and clock skew) of a signed payload, in seconds.
pub const TOLERANCE_SECS: i64 = 300;

/// Why a webhook signature was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingHeader,

    #[error("malformed signature header: {0}")]
    MalformedHeader(&'static str),

    #[error("timestamp {timestamp} outside tolerance (now {now})")]
    TimestampOutOfTolerance { timestamp: i64, now: i64 },

    #[error("no signature matches the payload")]
    Mismatch,
}

/// Parsed `Stripe-Signature` header.
struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<SignatureHeader, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| SignatureError::MalformedHeader("invalid timestamp"))?,
                );
            }
            // Undecodable entries can never match; skip them.
            "v1" => signatures.extend(hex::decode(value).ok()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader("missing timestamp"))?;
    if signatures.is_empty() {
        return Err(SignatureError::MalformedHeader("no v1 signature"));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn mac_for(secret: &SecretString, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

/// Verify a webhook delivery against the current time.
///
/// # Errors
///
/// Returns a [`SignatureError`] if the header is malformed, no signature
/// matches, or the timestamp is more than [`TOLERANCE_SECS`] away from now.
pub fn verify(secret: &SecretString, header: &str, payload: &[u8]) -> Result<(), SignatureError> {
    verify_at(secret, header, payload, Utc::now().timestamp())
}

/// Verify a webhook delivery as of `now` (Unix seconds).
///
/// # Errors
///
/// See [`verify`].
pub fn verify_at(
    secret: &SecretString,
    header: &str,
    payload: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let parsed = parse_header(header)?;
    let mac = mac_for(secret, parsed.timestamp, payload);

    // verify_slice compares in constant time.
    let matched = parsed
        .signatures
        .iter()
        .any(|sig| mac.clone().verify_slice(sig).is_ok());
    if !matched {
        return Err(SignatureError::Mismatch);
    }

    if (now - parsed.timestamp).abs() > TOLERANCE_SECS {
        return Err(SignatureError::TimestampOutOfTolerance {
            timestamp: parsed.timestamp,
            now,
        });
    }

    Ok(())
}

/// Produce a `Stripe-Signature` header value for a payload.
///
/// Used to send test deliveries to a storefront running in verified mode.
#[must_use]
pub fn sign(secret: &SecretString, timestamp: i64, payload: &[u8]) -> String {
    let signature = hex::encode(mac_for(secret, timestamp, payload).finalize().into_bytes());
    format!("t={timestamp},v1={signature}")
}
