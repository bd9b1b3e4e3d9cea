//! HTTP client for `POST /order/payment-intent`.

use reqwest::StatusCode;
use secrecy::ExposeSecret;
use tracing::{debug, instrument, warn};
use url::Url;

use elecommerce_core::{MessageResponse, UpdatePaymentIntentResponse};

use crate::error::CheckoutError;
use crate::form::{AuthState, CheckoutSession, ShippingForm};

const PAYMENT_INTENT_PATH: &str = "order/payment-intent";
const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Result of a shipping submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The session expired mid-checkout; nothing was sent.
    Skipped,
    /// The cart has no items. The caller resets its cart count and leaves
    /// the checkout page.
    CartEmpty,
    /// The payment intent now carries the shipping details.
    Updated(UpdatePaymentIntentResponse),
}

/// Storefront checkout client.
///
/// Guests go through a client with a cookie jar so the storefront's cookies
/// travel with the request; logged-in buyers authenticate with their token
/// only.
#[derive(Debug, Clone)]
pub struct CheckoutClient {
    endpoint: Url,
    authenticated: reqwest::Client,
    guest: reqwest::Client,
}

impl CheckoutClient {
    /// Create a client for the storefront at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns error if the URL does not parse or an HTTP client fails to
    /// build.
    pub fn new(base_url: &str) -> Result<Self, CheckoutError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            endpoint: base.join(PAYMENT_INTENT_PATH)?,
            authenticated: reqwest::Client::builder().build()?,
            guest: reqwest::Client::builder().cookie_store(true).build()?,
        })
    }

    /// Send the shipping step for `session`'s cart.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, the storefront answers with an
    /// error other than the empty-cart message, or the answer is not
    /// understood.
    #[instrument(skip(self, form), fields(cart_id = %session.cart_id))]
    pub async fn submit_shipping(
        &self,
        session: &CheckoutSession,
        form: &ShippingForm,
    ) -> Result<SubmitOutcome, CheckoutError> {
        if session.session_expired() {
            debug!("Session expired during checkout, skipping submission");
            return Ok(SubmitOutcome::Skipped);
        }

        let body = form.to_request(session.is_logged_in());
        let request = match &session.auth {
            AuthState::LoggedIn { token } => self
                .authenticated
                .post(self.endpoint.clone())
                .header(reqwest::header::AUTHORIZATION, token.expose_secret()),
            AuthState::Guest { .. } => self.guest.post(self.endpoint.clone()),
        };

        let response = request
            .header(IDEMPOTENCY_KEY_HEADER, session.cart_id.to_string())
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if let Ok(message) = serde_json::from_slice::<MessageResponse>(&bytes) {
            if message.is_cart_empty() {
                debug!("Storefront reports an empty cart");
                return Ok(SubmitOutcome::CartEmpty);
            }
            if !status.is_success() {
                return Err(api_error(status, message.message));
            }
        }

        if !status.is_success() {
            return Err(api_error(
                status,
                String::from_utf8_lossy(&bytes).into_owned(),
            ));
        }

        let updated: UpdatePaymentIntentResponse =
            serde_json::from_slice(&bytes).map_err(|e| CheckoutError::Parse(e.to_string()))?;
        debug!(payment_intent_id = %updated.payment_intent_id, "Shipping submitted");
        Ok(SubmitOutcome::Updated(updated))
    }
}

fn api_error(status: StatusCode, message: String) -> CheckoutError {
    warn!(status = status.as_u16(), %message, "Checkout submission refused");
    CheckoutError::Api {
        status: status.as_u16(),
        message,
    }
}
