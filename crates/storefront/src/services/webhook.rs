//! Stripe webhook processing.
//!
//! A `payment_intent.succeeded` delivery finalizes the order the payment
//! intent was created for:
//!
//! 1. Verify the signature (verified mode only) and parse the event.
//! 2. Skip events already processed (Stripe delivers at least once).
//! 3. For logged-in buyers, move the last-used flag and optionally save the
//!    shipping address to their account.
//! 4. Attach shipping to the order and mark it paid.
//! 5. Record the event and push `completeOrder` to the checkout page.
//!
//! Failures are returned as [`WebhookError`]; the route decides the HTTP
//! status from [`WebhookError::is_permanent`].

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use elecommerce_core::{Order, OrderId, OrderShipping, PaymentIntentMetadata, PushMessage};

use super::notifier::NotificationHub;
use crate::config::WebhookTrust;
use crate::db::{CheckoutStore, RepositoryError};
use crate::error::add_breadcrumb;
use crate::models::{BuyerUser, NewShippingAddress};
use crate::stripe::signature::{self, SignatureError};
use crate::stripe::{Event, PAYMENT_INTENT_SUCCEEDED, PaymentIntent};

/// Errors from handling a webhook delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The delivery is not authentic.
    #[error("signature rejected: {0}")]
    Signature(#[from] SignatureError),

    /// The body is not a Stripe event we can read.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The payment intent's customer has no buyer account.
    #[error("no buyer for customer {0}")]
    BuyerNotFound(String),

    /// The payment intent carries no shipping details.
    #[error("payment intent {0} has no shipping details")]
    MissingShipping(String),

    /// The payment intent's metadata does not name an order.
    #[error("payment intent {0} has no order reference")]
    MissingOrderReference(String),

    /// The order named by the metadata does not exist.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// The store failed; the delivery may succeed if retried.
    #[error("store error: {0}")]
    Store(#[from] RepositoryError),
}

impl WebhookError {
    /// The delivery was refused before anything was read or written.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Signature(_) | Self::InvalidPayload(_))
    }

    /// Retrying the same delivery cannot succeed.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::BuyerNotFound(_)
                | Self::MissingShipping(_)
                | Self::MissingOrderReference(_)
                | Self::OrderNotFound(_)
        )
    }
}

/// What happened to a delivery that was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The order was finalized.
    Processed { order_id: OrderId },
    /// The event was handled by an earlier delivery.
    Duplicate,
    /// The event type is not one checkout reacts to.
    Ignored { event_type: String },
}

/// Handles Stripe webhook deliveries.
#[derive(Debug, Clone)]
pub struct WebhookService<S> {
    trust: WebhookTrust,
    store: S,
    hub: NotificationHub,
}

impl<S: CheckoutStore> WebhookService<S> {
    #[must_use]
    pub const fn new(trust: WebhookTrust, store: S, hub: NotificationHub) -> Self {
        Self { trust, store, hub }
    }

    /// Handle one delivery.
    ///
    /// `signature_header` is the `Stripe-Signature` header, if present; `body` is
    /// the raw request body exactly as received.
    ///
    /// # Errors
    ///
    /// See [`WebhookError`]. Nothing is written when the signature or
    /// payload is rejected.
    #[instrument(skip_all, fields(event_id, event_type))]
    pub async fn handle(
        &self,
        signature_header: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookOutcome, WebhookError> {
        if let WebhookTrust::Verified(secret) = &self.trust {
            let header = signature_header.ok_or(SignatureError::MissingHeader)?;
            signature::verify(secret, header, body)?;
        }

        let event: Event = serde_json::from_slice(body)
            .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

        let span = tracing::Span::current();
        span.record("event_id", event.id.as_str());
        span.record("event_type", event.event_type.as_str());

        if event.event_type != PAYMENT_INTENT_SUCCEEDED {
            debug!("Ignoring webhook event");
            return Ok(WebhookOutcome::Ignored {
                event_type: event.event_type,
            });
        }

        if self.store.is_event_processed(&event.id).await? {
            info!("Webhook event already processed");
            return Ok(WebhookOutcome::Duplicate);
        }

        let intent = event
            .payment_intent()
            .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
        add_breadcrumb(
            "webhook",
            "Payment intent succeeded",
            Some(&[
                ("event_id", event.id.as_str()),
                ("payment_intent_id", intent.id.as_str()),
            ]),
        );

        let metadata = intent.checkout_metadata();
        let order = self.payment_succeeded(&intent, &metadata).await?;
        self.store
            .mark_event_processed(&event.id, &event.event_type)
            .await?;

        let order_id = order.id;
        self.notify(&metadata, order).await;

        info!(%order_id, "Order finalized");
        Ok(WebhookOutcome::Processed { order_id })
    }

    async fn payment_succeeded(
        &self,
        intent: &PaymentIntent,
        metadata: &PaymentIntentMetadata,
    ) -> Result<Order, WebhookError> {
        let shipping = intent
            .shipping
            .as_ref()
            .ok_or_else(|| WebhookError::MissingShipping(intent.id.clone()))?;
        let order_id = metadata
            .order_id
            .ok_or_else(|| WebhookError::MissingOrderReference(intent.id.clone()))?;
        let formatted = shipping.address.formatted();

        if let Some(customer) = intent.customer.as_deref() {
            let buyer = self
                .store
                .buyer_by_customer(customer)
                .await?
                .ok_or_else(|| WebhookError::BuyerNotFound(customer.to_owned()))?;
            self.update_saved_addresses(&buyer, metadata, &shipping.name, &formatted)
                .await?;
        }

        let order_shipping = OrderShipping {
            name: shipping.name.clone(),
            address: formatted,
        };
        self.store
            .finalize_order(order_id, &order_shipping)
            .await?
            .ok_or(WebhookError::OrderNotFound(order_id))
    }

    /// Keep at most one flagged address: clear the old flag, then either
    /// save the new address flagged or flag the address the buyer picked.
    async fn update_saved_addresses(
        &self,
        buyer: &BuyerUser,
        metadata: &PaymentIntentMetadata,
        name: &str,
        formatted: &str,
    ) -> Result<(), WebhookError> {
        let previous = self.store.last_used_address(buyer.id).await?;

        if let Some(previous) = previous
            && (metadata.save_shipping || metadata.last_used_shipping != Some(previous.id))
        {
            self.store
                .set_last_used(buyer.id, previous.id, false)
                .await?;
            debug!(address_id = %previous.id, "Cleared last used address");
        }

        if metadata.save_shipping {
            let saved = self
                .store
                .create_address(NewShippingAddress {
                    buyer_id: buyer.id,
                    name: name.to_owned(),
                    address: formatted.to_owned(),
                    last_used: true,
                })
                .await?;
            info!(buyer_id = %buyer.id, address_id = %saved.id, "Saved shipping address");
        } else if let Some(address_id) = metadata.last_used_shipping {
            let flagged = self
                .store
                .set_last_used(buyer.id, address_id, true)
                .await?;
            if flagged.is_none() {
                warn!(buyer_id = %buyer.id, %address_id, "Last used address not found for buyer");
            }
        }

        Ok(())
    }

    async fn notify(&self, metadata: &PaymentIntentMetadata, order: Order) {
        let Some(socket_id) = &metadata.socket_id else {
            debug!("No checkout socket to notify");
            return;
        };
        let message = PushMessage::CompleteOrder {
            order: Box::new(order),
        };
        if !self.hub.emit(socket_id, message).await {
            debug!(%socket_id, "Checkout page no longer connected");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use elecommerce_core::{AddressId, CurrencyCode, FinancialStatus, Price, SocketId};
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;
    use crate::db::MemoryStore;
    use crate::db::memory::FlakyStore;
    use crate::stripe::signature::sign;

    const A2_FORMATTED: &str = "2 New Rd, Apt 9, Portland, OR, 97201";

    struct Fixture {
        store: MemoryStore,
        hub: NotificationHub,
        service: WebhookService<MemoryStore>,
        order: Order,
    }

    fn fixture(trust: WebhookTrust) -> Fixture {
        let store = MemoryStore::new();
        let hub = NotificationHub::new();
        let order = store
            .insert_order(None, Price::new(Decimal::new(4200, 2), CurrencyCode::USD))
            .unwrap();
        let service = WebhookService::new(trust, store.clone(), hub.clone());
        Fixture {
            store,
            hub,
            service,
            order,
        }
    }

    fn event(
        event_id: &str,
        customer: Option<&str>,
        order_id: OrderId,
        metadata: serde_json::Value,
    ) -> Vec<u8> {
        let mut metadata = metadata;
        metadata["orderId"] = json!(order_id.to_string());
        metadata["socketId"] = json!("sock-1");

        serde_json::to_vec(&json!({
            "id": event_id,
            "type": "payment_intent.succeeded",
            "data": {
                "object": {
                    "id": "pi_1",
                    "customer": customer,
                    "amount": 4200,
                    "currency": "usd",
                    "shipping": {
                        "name": "Ada, Lovelace",
                        "address": {
                            "line1": "2 New Rd",
                            "line2": "Apt 9",
                            "city": "Portland",
                            "state": "OR",
                            "postal_code": "97201"
                        }
                    },
                    "metadata": metadata
                }
            }
        }))
        .unwrap()
    }

    async fn saved_address(store: &MemoryStore, buyer: &BuyerUser, last_used: bool) -> AddressId {
        store
            .create_address(NewShippingAddress {
                buyer_id: buyer.id,
                name: "Ada, Lovelace".into(),
                address: "1 Old St, Salem, OR, 97301".into(),
                last_used,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_logged_in_save_moves_flag_to_new_address() {
        let f = fixture(WebhookTrust::Unverified);
        let buyer = f.store.insert_buyer(Some("cus_b"), None).unwrap();
        let a1 = saved_address(&f.store, &buyer, true).await;
        let mut rx = f.hub.register(SocketId::new("sock-1")).await;

        let body = event("evt_1", Some("cus_b"), f.order.id, json!({"saveShipping": "true"}));
        let outcome = f.service.handle(None, &body).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Processed { order_id: f.order.id });

        let addresses = f.store.addresses(buyer.id).unwrap();
        assert_eq!(addresses.len(), 2);
        assert_eq!(addresses[0].id, a1);
        assert!(!addresses[0].last_used);
        assert!(addresses[1].last_used);
        assert_eq!(addresses[1].address, A2_FORMATTED);
        assert_eq!(addresses[1].name, "Ada, Lovelace");

        let order = f.store.order(f.order.id).unwrap().unwrap();
        assert_eq!(order.status, FinancialStatus::Paid);
        assert_eq!(order.shipping.unwrap().address, A2_FORMATTED);

        match rx.recv().await.unwrap() {
            PushMessage::CompleteOrder { order } => assert_eq!(order.id, f.order.id),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_logged_in_picks_saved_address_without_saving() {
        let f = fixture(WebhookTrust::Unverified);
        let buyer = f.store.insert_buyer(Some("cus_b"), None).unwrap();
        let a1 = saved_address(&f.store, &buyer, true).await;
        let a2 = saved_address(&f.store, &buyer, false).await;

        let body = event(
            "evt_1",
            Some("cus_b"),
            f.order.id,
            json!({"saveShipping": "false", "lastUsedShipping": a2.to_string()}),
        );
        f.service.handle(None, &body).await.unwrap();

        let addresses = f.store.addresses(buyer.id).unwrap();
        assert_eq!(addresses.len(), 2);
        let flagged: Vec<_> = addresses.iter().filter(|a| a.last_used).map(|a| a.id).collect();
        assert_eq!(flagged, vec![a2]);
        assert_ne!(flagged[0], a1);
    }

    #[tokio::test]
    async fn test_logged_in_same_address_keeps_flag() {
        let f = fixture(WebhookTrust::Unverified);
        let buyer = f.store.insert_buyer(Some("cus_b"), None).unwrap();
        let a1 = saved_address(&f.store, &buyer, true).await;

        let body = event(
            "evt_1",
            Some("cus_b"),
            f.order.id,
            json!({"lastUsedShipping": a1.to_string()}),
        );
        f.service.handle(None, &body).await.unwrap();

        let addresses = f.store.addresses(buyer.id).unwrap();
        assert_eq!(addresses.len(), 1);
        assert!(addresses[0].last_used);
    }

    #[tokio::test]
    async fn test_save_with_current_address_selected_keeps_single_flag() {
        let f = fixture(WebhookTrust::Unverified);
        let buyer = f.store.insert_buyer(Some("cus_b"), None).unwrap();
        let a1 = saved_address(&f.store, &buyer, true).await;

        let body = event(
            "evt_1",
            Some("cus_b"),
            f.order.id,
            json!({"saveShipping": "true", "lastUsedShipping": a1.to_string()}),
        );
        f.service.handle(None, &body).await.unwrap();

        let addresses = f.store.addresses(buyer.id).unwrap();
        assert_eq!(addresses.iter().filter(|a| a.last_used).count(), 1);
        assert!(addresses[1].last_used);
    }

    #[tokio::test]
    async fn test_unknown_last_used_address_is_tolerated() {
        let f = fixture(WebhookTrust::Unverified);
        let buyer = f.store.insert_buyer(Some("cus_b"), None).unwrap();
        let other = f.store.insert_buyer(Some("cus_o"), None).unwrap();
        let foreign = saved_address(&f.store, &other, false).await;

        let body = event(
            "evt_1",
            Some("cus_b"),
            f.order.id,
            json!({"lastUsedShipping": foreign.to_string()}),
        );
        let outcome = f.service.handle(None, &body).await.unwrap();

        assert!(matches!(outcome, WebhookOutcome::Processed { .. }));
        assert!(f.store.addresses(buyer.id).unwrap().is_empty());
        assert!(!f.store.addresses(other.id).unwrap()[0].last_used);
    }

    #[tokio::test]
    async fn test_guest_only_updates_order() {
        let f = fixture(WebhookTrust::Unverified);

        let body = event("evt_g", None, f.order.id, json!({"saveShipping": "true"}));
        f.service.handle(None, &body).await.unwrap();

        assert_eq!(f.store.address_count().unwrap(), 0);
        let order = f.store.order(f.order.id).unwrap().unwrap();
        assert_eq!(
            order.shipping,
            Some(OrderShipping {
                name: "Ada, Lovelace".into(),
                address: A2_FORMATTED.into(),
            })
        );
    }

    #[tokio::test]
    async fn test_bad_signature_mutates_nothing() {
        let f = fixture(WebhookTrust::Verified(SecretString::from("whsec_real")));
        let body = event("evt_1", None, f.order.id, json!({}));
        let forged = sign(&SecretString::from("whsec_forged"), Utc::now().timestamp(), &body);

        let err = f.service.handle(Some(&forged), &body).await.unwrap_err();
        assert!(matches!(err, WebhookError::Signature(SignatureError::Mismatch)));
        assert!(err.is_rejection());

        let err = f.service.handle(None, &body).await.unwrap_err();
        assert!(matches!(err, WebhookError::Signature(SignatureError::MissingHeader)));

        let order = f.store.order(f.order.id).unwrap().unwrap();
        assert_eq!(order.status, FinancialStatus::Pending);
        assert_eq!(order.shipping, None);
        assert!(!f.store.is_event_processed("evt_1").await.unwrap());
    }

    #[tokio::test]
    async fn test_valid_signature_is_accepted() {
        let secret = SecretString::from("whsec_real");
        let f = fixture(WebhookTrust::Verified(secret.clone()));
        let body = event("evt_1", None, f.order.id, json!({}));
        let header = sign(&secret, Utc::now().timestamp(), &body);

        let outcome = f.service.handle(Some(&header), &body).await.unwrap();
        assert!(matches!(outcome, WebhookOutcome::Processed { .. }));
    }

    #[tokio::test]
    async fn test_replayed_event_is_not_applied_twice() {
        let f = fixture(WebhookTrust::Unverified);
        let buyer = f.store.insert_buyer(Some("cus_b"), None).unwrap();
        let mut rx = f.hub.register(SocketId::new("sock-1")).await;

        let body = event("evt_r", Some("cus_b"), f.order.id, json!({"saveShipping": "true"}));
        f.service.handle(None, &body).await.unwrap();
        let outcome = f.service.handle(None, &body).await.unwrap();

        assert_eq!(outcome, WebhookOutcome::Duplicate);
        assert_eq!(f.store.addresses(buyer.id).unwrap().len(), 1);
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_other_event_types_are_ignored() {
        let f = fixture(WebhookTrust::Unverified);
        let body = br#"{"id":"evt_x","type":"charge.refunded","data":{"object":{}}}"#;

        let outcome = f.service.handle(None, body).await.unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored {
                event_type: "charge.refunded".into()
            }
        );
    }

    #[tokio::test]
    async fn test_permanent_failures() {
        let f = fixture(WebhookTrust::Unverified);

        let body = event("evt_1", Some("cus_unknown"), f.order.id, json!({}));
        let err = f.service.handle(None, &body).await.unwrap_err();
        assert!(matches!(err, WebhookError::BuyerNotFound(_)));
        assert!(err.is_permanent());

        let body = event("evt_2", None, OrderId::new(9999), json!({}));
        let err = f.service.handle(None, &body).await.unwrap_err();
        assert!(matches!(err, WebhookError::OrderNotFound(id) if id == OrderId::new(9999)));
        assert!(err.is_permanent());
        assert!(!f.store.is_event_processed("evt_2").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_failure_leaves_event_unrecorded() {
        let f = fixture(WebhookTrust::Unverified);
        let store = FlakyStore::new(f.store.clone());
        let service = WebhookService::new(WebhookTrust::Unverified, store.clone(), f.hub.clone());
        let mut rx = f.hub.register(SocketId::new("sock-1")).await;
        let body = event("evt_t", None, f.order.id, json!({}));

        store.fail_finalize(true);
        let err = service.handle(None, &body).await.unwrap_err();
        assert!(matches!(err, WebhookError::Store(_)));
        assert!(!err.is_permanent());
        assert!(!err.is_rejection());
        assert!(!f.store.is_event_processed("evt_t").await.unwrap());
        assert!(rx.try_recv().is_err());

        store.fail_finalize(false);
        let outcome = service.handle(None, &body).await.unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Processed {
                order_id: f.order.id
            }
        );
        assert!(f.store.is_event_processed("evt_t").await.unwrap());
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_invalid_json_is_rejected() {
        let f = fixture(WebhookTrust::Unverified);
        let err = f.service.handle(None, b"not json").await.unwrap_err();
        assert!(matches!(err, WebhookError::InvalidPayload(_)));
        assert!(err.is_rejection());
        assert!(!err.is_permanent());
    }
}
