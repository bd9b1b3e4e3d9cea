//! Stripe webhook endpoint.
//!
//! Stripe retries any delivery that is not answered with a 2xx, for up to
//! three days. Responses therefore follow [`WebhookError`]:
//!
//! - signature or payload rejected: 400, nothing written
//! - store failure: 500, so Stripe retries (safe thanks to the event
//!   replay guard)
//! - permanent data problem (unknown buyer or order, missing metadata):
//!   reported to Sentry and acknowledged with 200, since a retry cannot fix it

use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use elecommerce_core::MessageResponse;
use serde::Serialize;
use tracing::{debug, error, instrument, warn};

use crate::db::CheckoutStore;
use crate::error::AppError;
use crate::middleware::RequestId;
use crate::services::WebhookError;
use crate::state::AppState;
use crate::stripe::{PaymentGateway, SIGNATURE_HEADER};

/// Body of a successful acknowledgement.
#[derive(Debug, Serialize)]
struct Ack {
    received: bool,
}

/// POST /webhooks/stripe - Handle a Stripe event delivery.
#[instrument(skip_all, fields(request_id = %request_id.0))]
pub async fn stripe_webhook<S: CheckoutStore, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.webhook().handle(signature, &body).await {
        Ok(outcome) => {
            debug!(?outcome, "Webhook delivery handled");
            ack()
        }
        Err(WebhookError::Store(e)) => AppError::Database(e).into_response(),
        Err(e) if e.is_rejection() => {
            warn!(error = %e, "Webhook delivery rejected");
            (StatusCode::BAD_REQUEST, Json(MessageResponse::new(e.to_string()))).into_response()
        }
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            error!(
                error = %e,
                sentry_event_id = %event_id,
                "Webhook delivery cannot be applied"
            );
            ack()
        }
    }
}

fn ack() -> Response {
    (StatusCode::OK, Json(Ack { received: true })).into_response()
}
