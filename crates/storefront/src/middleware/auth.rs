//! Buyer authentication extractor.
//!
//! Checkout accepts guests, so the `Authorization` header is optional. When
//! present it carries the buyer's session token, with or without a
//! `Bearer ` prefix.

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use tracing::debug;

use crate::db::CheckoutStore;
use crate::error::{AppError, set_sentry_user};
use crate::models::BuyerUser;
use crate::state::AppState;
use crate::stripe::PaymentGateway;

/// Extractor that resolves the buyer behind an optional `Authorization`
/// header.
///
/// A missing or blank header means a guest. A token that does not resolve to
/// a buyer is rejected with 401 rather than silently downgraded to guest, so
/// an expired session cannot submit with guest rules by accident.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(OptionalBuyer(buyer): OptionalBuyer) -> impl IntoResponse {
///     match buyer {
///         Some(b) => format!("Hello, buyer {}!", b.id),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
pub struct OptionalBuyer(pub Option<BuyerUser>);

impl<S: CheckoutStore, G: PaymentGateway> FromRequestParts<AppState<S, G>> for OptionalBuyer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S, G>,
    ) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Self(None));
        };

        let raw = value
            .to_str()
            .map_err(|_| AppError::Unauthorized("malformed authorization header".to_string()))?
            .trim();
        let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
        if token.is_empty() {
            return Ok(Self(None));
        }

        let buyer = state
            .store()
            .buyer_by_token(token)
            .await?
            .ok_or_else(|| AppError::Unauthorized("invalid or expired session".to_string()))?;

        set_sentry_user(&buyer.id);
        debug!(buyer_id = %buyer.id, "Buyer authenticated");
        Ok(Self(Some(buyer)))
    }
}
