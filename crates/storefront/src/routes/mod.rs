//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (store ping)
//!
//! # Checkout
//! POST /order/payment-intent   - Write shipping onto the cart's payment intent
//! GET  /ws/checkout/{cart_id}  - Push channel for the checkout page
//!
//! # Webhooks
//! POST /webhooks/stripe        - Stripe event deliveries
//! ```
//!
//! Handlers are generic over the store and payment gateway; see
//! [`AppState`].

pub mod checkout;
pub mod health;
pub mod webhook;
pub mod ws;

use axum::{
    Router,
    routing::{get, post},
};

use crate::db::CheckoutStore;
use crate::state::AppState;
use crate::stripe::PaymentGateway;

/// Create all routes for the storefront.
pub fn routes<S: CheckoutStore, G: PaymentGateway>() -> Router<AppState<S, G>> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness::<S, G>))
        .route("/webhooks/stripe", post(webhook::stripe_webhook::<S, G>))
        .route(
            "/order/payment-intent",
            post(checkout::update_payment_intent::<S, G>),
        )
        .route("/ws/checkout/{cart_id}", get(ws::checkout_socket::<S, G>))
}
