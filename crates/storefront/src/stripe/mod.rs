//! Stripe integration.
//!
//! - [`client`] - REST client used to update payment intents
//! - [`signature`] - Webhook signature verification
//! - [`types`] - Event and payment intent shapes
//! - [`recording`] - In-process gateway for tests and local runs
//!
//! Checkout talks to Stripe through the [`PaymentGateway`] trait so the
//! route can be exercised without network access.

pub mod client;
mod error;
pub mod recording;
pub mod signature;
pub mod types;

use std::future::Future;

use elecommerce_core::PaymentIntentMetadata;

pub use client::StripeClient;
pub use error::StripeError;
pub use recording::RecordingGateway;
pub use signature::{SIGNATURE_HEADER, SignatureError};
pub use types::{Event, PAYMENT_INTENT_SUCCEEDED, PaymentIntent, Shipping};

/// Shipping and metadata written onto a pending payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntentUpdate {
    pub shipping: Shipping,
    pub metadata: PaymentIntentMetadata,
}

impl PaymentIntentUpdate {
    /// Encode as Stripe form fields.
    #[must_use]
    pub fn to_form(&self) -> Vec<(String, String)> {
        let address = &self.shipping.address;
        let mut form = vec![
            ("shipping[name]".to_owned(), self.shipping.name.clone()),
            ("shipping[address][line1]".to_owned(), address.line1.clone()),
            (
                "shipping[address][line2]".to_owned(),
                address.line2.clone().unwrap_or_default(),
            ),
            ("shipping[address][city]".to_owned(), address.city.clone()),
            ("shipping[address][state]".to_owned(), address.state.clone()),
            (
                "shipping[address][postal_code]".to_owned(),
                address.postal_code.clone(),
            ),
        ];
        if let Some(country) = &address.country {
            form.push(("shipping[address][country]".to_owned(), country.clone()));
        }
        if let Some(phone) = &self.shipping.phone {
            form.push(("shipping[phone]".to_owned(), phone.clone()));
        }
        form.extend(
            self.metadata
                .to_pairs()
                .into_iter()
                .map(|(key, value)| (format!("metadata[{key}]"), value)),
        );
        form
    }
}

/// Payment provider operations needed by checkout.
pub trait PaymentGateway: Clone + Send + Sync + 'static {
    /// Replace shipping and metadata on a payment intent.
    ///
    /// `idempotency_key` is forwarded so retries of the same update are not
    /// applied twice.
    fn update_payment_intent(
        &self,
        payment_intent_id: &str,
        update: &PaymentIntentUpdate,
        idempotency_key: &str,
    ) -> impl Future<Output = Result<PaymentIntent, StripeError>> + Send;
}
