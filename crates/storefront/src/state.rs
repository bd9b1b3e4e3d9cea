//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::WebhookTrust;
use crate::db::{CheckoutStore, PgCheckoutStore};
use crate::services::{CheckoutService, NotificationHub, WebhookService};
use crate::stripe::{PaymentGateway, StripeClient};

/// State of the production server.
pub type ProductionState = AppState<PgCheckoutStore, StripeClient>;

/// Application state shared across all handlers.
///
/// Generic over the store and the payment gateway so the same router runs
/// against `PostgreSQL` and Stripe in production and in-process fakes in
/// tests. Cheaply cloneable via `Arc`.
pub struct AppState<S, G> {
    inner: Arc<AppStateInner<S, G>>,
}

struct AppStateInner<S, G> {
    store: S,
    hub: NotificationHub,
    checkout: CheckoutService<S, G>,
    webhook: WebhookService<S>,
}

impl<S, G> Clone for AppState<S, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: CheckoutStore, G: PaymentGateway> AppState<S, G> {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `store` - Checkout persistence
    /// * `gateway` - Payment provider used to update payment intents
    /// * `trust` - Whether webhook signatures are verified
    #[must_use]
    pub fn new(store: S, gateway: G, trust: WebhookTrust) -> Self {
        let hub = NotificationHub::new();
        let checkout = CheckoutService::new(store.clone(), gateway);
        let webhook = WebhookService::new(trust, store.clone(), hub.clone());

        Self {
            inner: Arc::new(AppStateInner {
                store,
                hub,
                checkout,
                webhook,
            }),
        }
    }

    /// Get a reference to the checkout store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Get a reference to the push notification hub.
    #[must_use]
    pub fn hub(&self) -> &NotificationHub {
        &self.inner.hub
    }

    /// Get a reference to the checkout service.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutService<S, G> {
        &self.inner.checkout
    }

    /// Get a reference to the webhook service.
    #[must_use]
    pub fn webhook(&self) -> &WebhookService<S> {
        &self.inner.webhook
    }
}
