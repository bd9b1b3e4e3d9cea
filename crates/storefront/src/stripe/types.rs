//! Stripe object shapes used by checkout.
//!
//! Only the fields the storefront reads are modelled; everything else in
//! Stripe's payloads is ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use elecommerce_core::{PaymentIntentMetadata, ShippingAddress};

/// Event type fired when a payment intent is paid.
pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";

/// A webhook event envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
    /// Unix timestamp of event creation.
    #[serde(default)]
    pub created: i64,
}

/// The object an event is about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl Event {
    /// Interpret the event's object as a payment intent.
    ///
    /// # Errors
    ///
    /// Returns an error if the object does not have a payment intent's shape.
    pub fn payment_intent(&self) -> Result<PaymentIntent, serde_json::Error> {
        PaymentIntent::deserialize(&self.data.object)
    }
}

/// A Stripe payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Customer ID; present when a logged-in buyer started checkout.
    #[serde(default)]
    pub customer: Option<String>,
    /// Amount in minor units.
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub shipping: Option<Shipping>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    /// Typed view of the storefront's metadata keys.
    #[must_use]
    pub fn checkout_metadata(&self) -> PaymentIntentMetadata {
        PaymentIntentMetadata::from_map(&self.metadata)
    }
}

/// Shipping details on a payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Shipping {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: ShippingAddress,
}

/// Error body returned by the Stripe API.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use elecommerce_core::{AddressId, OrderId};

    use super::*;

    #[test]
    fn test_parse_payment_intent_succeeded_event() {
        let json = serde_json::json!({
            "id": "evt_1",
            "object": "event",
            "type": "payment_intent.succeeded",
            "created": 1_700_000_000,
            "data": {
                "object": {
                    "id": "pi_1",
                    "object": "payment_intent",
                    "amount": 2500,
                    "currency": "usd",
                    "customer": "cus_9",
                    "shipping": {
                        "name": "Ada, Lovelace",
                        "phone": "5551234567",
                        "address": {
                            "line1": "1 Main St",
                            "line2": null,
                            "city": "Springfield",
                            "state": "IL",
                            "postal_code": "62701",
                            "country": "US"
                        }
                    },
                    "metadata": {
                        "saveShipping": "true",
                        "lastUsedShipping": "7",
                        "orderId": "3"
                    }
                }
            }
        });

        let event: Event = serde_json::from_value(json).unwrap();
        assert_eq!(event.event_type, PAYMENT_INTENT_SUCCEEDED);

        let intent = event.payment_intent().unwrap();
        assert_eq!(intent.customer.as_deref(), Some("cus_9"));
        let shipping = intent.shipping.as_ref().unwrap();
        assert_eq!(shipping.name, "Ada, Lovelace");
        assert_eq!(
            shipping.address.formatted(),
            "1 Main St, Springfield, IL, 62701"
        );

        let metadata = intent.checkout_metadata();
        assert!(metadata.save_shipping);
        assert_eq!(metadata.last_used_shipping, Some(AddressId::new(7)));
        assert_eq!(metadata.order_id, Some(OrderId::new(3)));
    }

    #[test]
    fn test_guest_intent_without_customer_or_metadata() {
        let event: Event = serde_json::from_value(serde_json::json!({
            "id": "evt_2",
            "type": "payment_intent.succeeded",
            "data": {"object": {"id": "pi_2", "customer": null}}
        }))
        .unwrap();

        let intent = event.payment_intent().unwrap();
        assert_eq!(intent.customer, None);
        assert_eq!(intent.shipping, None);
        assert!(!intent.checkout_metadata().save_shipping);
    }

    #[test]
    fn test_non_intent_object_is_rejected() {
        let event: Event = serde_json::from_value(serde_json::json!({
            "id": "evt_3",
            "type": "payment_intent.succeeded",
            "data": {"object": ["not", "an", "intent"]}
        }))
        .unwrap();

        assert!(event.payment_intent().is_err());
    }
}
