//! Stripe REST API client.
//!
//! Stripe takes form-encoded bodies with bracketed keys for nested fields
//! (`shipping[address][line1]=...`) and answers with JSON.

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::error::StripeError;
use super::types::{ErrorEnvelope, PaymentIntent};
use super::{PaymentGateway, PaymentIntentUpdate};
use crate::config::StripeConfig;

/// Stripe API client authenticated with the account's secret key.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a new Stripe API client.
    ///
    /// # Errors
    ///
    /// Returns error if the secret key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth_value = HeaderValue::from_str(&auth_value)
            .map_err(|e| StripeError::InvalidRequest(format!("Invalid secret key format: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert("Authorization", auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// POST a form to the API and decode the JSON answer.
    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, StripeError> {
        let url = format!("{}/{path}", self.api_base);

        let mut request = self.client.post(&url).form(form);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (error_type, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => (
                    envelope.error.error_type,
                    envelope.error.message.unwrap_or_default(),
                ),
                Err(_) => (None, body),
            };
            warn!(status = status.as_u16(), ?error_type, "Stripe API error");
            return Err(StripeError::Api {
                status: status.as_u16(),
                error_type,
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| StripeError::Parse(e.to_string()))
    }
}

/// Stripe object IDs are `prefix_alphanumeric`; anything else would escape
/// the URL path.
fn validate_object_id(id: &str) -> Result<(), StripeError> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StripeError::InvalidRequest(format!("invalid object id: {id:?}")));
    }
    Ok(())
}

impl PaymentGateway for StripeClient {
    #[instrument(skip(self, update, idempotency_key))]
    async fn update_payment_intent(
        &self,
        payment_intent_id: &str,
        update: &PaymentIntentUpdate,
        idempotency_key: &str,
    ) -> Result<PaymentIntent, StripeError> {
        validate_object_id(payment_intent_id)?;

        let intent: PaymentIntent = self
            .post_form(
                &format!("payment_intents/{payment_intent_id}"),
                &update.to_form(),
                Some(idempotency_key),
            )
            .await?;

        debug!(payment_intent_id = %intent.id, "Payment intent updated");
        Ok(intent)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::{Form, Path, State};
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use elecommerce_core::{PaymentIntentMetadata, ShippingAddress};
    use secrecy::SecretString;

    use super::*;
    use crate::config::WebhookTrust;
    use crate::stripe::Shipping;

    #[derive(Clone, Default)]
    struct Captured {
        requests: Arc<Mutex<Vec<(String, Vec<(String, String)>, Option<String>, Option<String>)>>>,
    }

    async fn fake_update(
        State(captured): State<Captured>,
        Path(id): Path<String>,
        headers: AxumHeaders,
        Form(form): Form<Vec<(String, String)>>,
    ) -> axum::response::Response {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        captured.requests.lock().unwrap().push((
            id.clone(),
            form,
            header("authorization"),
            header("idempotency-key"),
        ));

        if id == "pi_missing" {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "error": {
                        "type": "invalid_request_error",
                        "message": "No such payment_intent: 'pi_missing'"
                    }
                })),
            )
                .into_response();
        }

        Json(serde_json::json!({
            "id": id,
            "object": "payment_intent",
            "amount": 1500,
            "currency": "usd",
            "client_secret": format!("{id}_secret_abc"),
            "metadata": {}
        }))
        .into_response()
    }

    async fn spawn_fake_stripe() -> (String, Captured) {
        let captured = Captured::default();
        let app = Router::new()
            .route("/v1/payment_intents/{id}", post(fake_update))
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/v1"), captured)
    }

    fn client(api_base: String) -> StripeClient {
        StripeClient::new(&StripeConfig {
            secret_key: SecretString::from("sk_test_51abcdefghijklmnop"),
            api_base,
            webhook_trust: WebhookTrust::Unverified,
        })
        .unwrap()
    }

    fn update() -> PaymentIntentUpdate {
        PaymentIntentUpdate {
            shipping: Shipping {
                name: "Ada, Lovelace".into(),
                phone: Some("5551234567".into()),
                address: ShippingAddress {
                    line1: "1 Main St".into(),
                    line2: None,
                    city: "Springfield".into(),
                    state: "IL".into(),
                    postal_code: "62701".into(),
                    country: None,
                },
            },
            metadata: PaymentIntentMetadata {
                save_shipping: true,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_update_sends_form_auth_and_idempotency_key() {
        let (base, captured) = spawn_fake_stripe().await;
        let intent = client(base)
            .update_payment_intent("pi_123", &update(), "42-abcd")
            .await
            .unwrap();

        assert_eq!(intent.id, "pi_123");
        assert_eq!(intent.client_secret.as_deref(), Some("pi_123_secret_abc"));

        let requests = captured.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (id, form, auth, idempotency_key) = &requests[0];
        assert_eq!(id, "pi_123");
        assert_eq!(auth.as_deref(), Some("Bearer sk_test_51abcdefghijklmnop"));
        assert_eq!(idempotency_key.as_deref(), Some("42-abcd"));
        assert!(form.contains(&("shipping[name]".into(), "Ada, Lovelace".into())));
        assert!(form.contains(&("shipping[address][line1]".into(), "1 Main St".into())));
        assert!(form.contains(&("metadata[saveShipping]".into(), "true".into())));
    }

    #[tokio::test]
    async fn test_api_error_is_decoded() {
        let (base, _) = spawn_fake_stripe().await;
        let err = client(base)
            .update_payment_intent("pi_missing", &update(), "k")
            .await
            .unwrap_err();

        match err {
            StripeError::Api {
                status,
                error_type,
                message,
            } => {
                assert_eq!(status, 404);
                assert_eq!(error_type.as_deref(), Some("invalid_request_error"));
                assert!(message.contains("pi_missing"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_path_like_ids_are_refused() {
        let err = client("http://127.0.0.1:9/v1".into())
            .update_payment_intent("../customers", &update(), "k")
            .await
            .unwrap_err();
        assert!(matches!(err, StripeError::InvalidRequest(_)));
    }
}
