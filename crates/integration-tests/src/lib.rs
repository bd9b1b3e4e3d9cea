//! Integration tests for Elecommerce.
//!
//! The tests run the real storefront router on an ephemeral port, backed by
//! the in-memory store and a recording payment gateway, and talk to it with
//! the real checkout client, a websocket client and signed webhook
//! deliveries.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p elecommerce-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `checkout_client` - Shipping submission against the storefront
//! - `payment_flow` - Socket, submission, webhook and push notification together

use chrono::Utc;
use elecommerce_core::{BuyerId, CartId, CurrencyCode, Order, OrderId, Price};
use elecommerce_storefront::config::WebhookTrust;
use elecommerce_storefront::db::MemoryStore;
use elecommerce_storefront::models::Cart;
use elecommerce_storefront::state::AppState;
use elecommerce_storefront::stripe::recording::RecordedUpdate;
use elecommerce_storefront::stripe::{PAYMENT_INTENT_SUCCEEDED, RecordingGateway, SIGNATURE_HEADER};
use elecommerce_storefront::stripe::signature;
use secrecy::SecretString;

/// Endpoint secret the test server verifies webhooks with.
pub const WEBHOOK_SECRET: &str = "whsec_integration_test";

/// A storefront running in-process.
pub struct TestServer {
    pub base_url: String,
    pub store: MemoryStore,
    pub gateway: RecordingGateway,
    http: reqwest::Client,
}

impl TestServer {
    /// Start a storefront that verifies webhook signatures.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot bind.
    pub async fn start() -> Self {
        let store = MemoryStore::new();
        let gateway = RecordingGateway::new();
        let trust = WebhookTrust::Verified(SecretString::from(WEBHOOK_SECRET));
        let state = AppState::new(store.clone(), gateway.clone(), trust);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        tokio::spawn(async move {
            axum::serve(listener, elecommerce_storefront::app(state))
                .await
                .expect("test server");
        });

        Self {
            base_url: format!("http://{addr}"),
            store,
            gateway,
            http: reqwest::Client::new(),
        }
    }

    /// URL of the push channel for a cart.
    #[must_use]
    pub fn socket_url(&self, cart_id: CartId) -> String {
        format!(
            "{}/ws/checkout/{cart_id}",
            self.base_url.replacen("http://", "ws://", 1)
        )
    }

    /// Seed a pending order and a cart pointing at `payment_intent_id`.
    ///
    /// # Panics
    ///
    /// Panics if the store rejects the rows.
    #[must_use]
    pub fn seed_checkout(
        &self,
        buyer_id: Option<BuyerId>,
        item_count: i32,
        payment_intent_id: &str,
    ) -> (Order, Cart) {
        let order = self
            .store
            .insert_order(buyer_id, Price::from_minor_units(4200, CurrencyCode::USD))
            .expect("insert order");
        let cart = self
            .store
            .insert_cart(buyer_id, order.id, item_count, Some(payment_intent_id))
            .expect("insert cart");
        (order, cart)
    }

    /// Current state of an order.
    ///
    /// # Panics
    ///
    /// Panics if the order does not exist.
    #[must_use]
    pub fn order(&self, order_id: OrderId) -> Order {
        self.store
            .order(order_id)
            .expect("store readable")
            .expect("order exists")
    }

    /// POST a webhook body with the given signature header value.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn post_webhook(&self, body: Vec<u8>, signature_header: &str) -> reqwest::Response {
        self.http
            .post(format!("{}/webhooks/stripe", self.base_url))
            .header(SIGNATURE_HEADER, signature_header)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .expect("webhook delivery")
    }

    /// POST a webhook body signed with [`WEBHOOK_SECRET`].
    pub async fn deliver_webhook(&self, body: Vec<u8>) -> reqwest::Response {
        let header = signature::sign(
            &SecretString::from(WEBHOOK_SECRET),
            Utc::now().timestamp(),
            &body,
        );
        self.post_webhook(body, &header).await
    }
}

/// The `payment_intent.succeeded` event Stripe would send after the
/// recorded update, as a raw body.
///
/// # Panics
///
/// Panics if the event cannot be encoded.
#[must_use]
pub fn succeeded_event(event_id: &str, customer: Option<&str>, recorded: &RecordedUpdate) -> Vec<u8> {
    let metadata: serde_json::Map<String, serde_json::Value> = recorded
        .update
        .metadata
        .to_pairs()
        .into_iter()
        .map(|(key, value)| (key.to_owned(), serde_json::Value::String(value)))
        .collect();

    serde_json::to_vec(&serde_json::json!({
        "id": event_id,
        "type": PAYMENT_INTENT_SUCCEEDED,
        "created": Utc::now().timestamp(),
        "data": {
            "object": {
                "id": recorded.payment_intent_id,
                "customer": customer,
                "amount": 4200,
                "currency": "usd",
                "shipping": recorded.update.shipping,
                "metadata": metadata
            }
        }
    }))
    .expect("encode event")
}
