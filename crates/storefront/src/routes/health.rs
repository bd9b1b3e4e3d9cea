//! Health check endpoints.

use axum::{extract::State, http::StatusCode};
use tracing::warn;

use crate::db::CheckoutStore;
use crate::state::AppState;
use crate::stripe::PaymentGateway;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
pub async fn readiness<S: CheckoutStore, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
