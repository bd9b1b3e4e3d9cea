//! A [`PaymentGateway`] that records updates instead of calling Stripe.

use std::sync::{Arc, Mutex};

use super::{PaymentGateway, PaymentIntent, PaymentIntentUpdate, StripeError};

/// One update received by a [`RecordingGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpdate {
    pub payment_intent_id: String,
    pub update: PaymentIntentUpdate,
    pub idempotency_key: String,
}

/// Gateway that answers every update successfully and remembers it.
///
/// Cloning shares the recorded history.
#[derive(Debug, Clone, Default)]
pub struct RecordingGateway {
    updates: Arc<Mutex<Vec<RecordedUpdate>>>,
}

impl RecordingGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates received so far, oldest first.
    #[must_use]
    pub fn updates(&self) -> Vec<RecordedUpdate> {
        self.updates
            .lock()
            .map(|updates| updates.clone())
            .unwrap_or_default()
    }
}

impl PaymentGateway for RecordingGateway {
    async fn update_payment_intent(
        &self,
        payment_intent_id: &str,
        update: &PaymentIntentUpdate,
        idempotency_key: &str,
    ) -> Result<PaymentIntent, StripeError> {
        self.updates
            .lock()
            .map_err(|_| StripeError::InvalidRequest("recording lock poisoned".to_owned()))?
            .push(RecordedUpdate {
                payment_intent_id: payment_intent_id.to_owned(),
                update: update.clone(),
                idempotency_key: idempotency_key.to_owned(),
            });

        Ok(PaymentIntent {
            id: payment_intent_id.to_owned(),
            customer: None,
            amount: 0,
            currency: "usd".to_owned(),
            client_secret: Some(format!("{payment_intent_id}_secret_recorded")),
            shipping: Some(update.shipping.clone()),
            metadata: update
                .metadata
                .to_pairs()
                .into_iter()
                .map(|(key, value)| (key.to_owned(), value))
                .collect(),
        })
    }
}
