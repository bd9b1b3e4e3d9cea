//! Checkout route handlers.

use axum::{Json, extract::State, http::HeaderMap};
use elecommerce_core::{UpdatePaymentIntentRequest, UpdatePaymentIntentResponse};
use tracing::instrument;

use crate::db::CheckoutStore;
use crate::error::Result;
use crate::middleware::OptionalBuyer;
use crate::services::IDEMPOTENCY_KEY_HEADER;
use crate::state::AppState;
use crate::stripe::PaymentGateway;

/// POST /order/payment-intent - Write shipping details onto the cart's
/// payment intent.
///
/// The cart ID travels in the `idempotency-key` header; the buyer, if any,
/// in `Authorization`.
#[instrument(skip_all)]
pub async fn update_payment_intent<S: CheckoutStore, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    OptionalBuyer(buyer): OptionalBuyer,
    headers: HeaderMap,
    Json(request): Json<UpdatePaymentIntentRequest>,
) -> Result<Json<UpdatePaymentIntentResponse>> {
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    let response = state
        .checkout()
        .update_shipping(idempotency_key, buyer.as_ref(), request)
        .await?;

    Ok(Json(response))
}
