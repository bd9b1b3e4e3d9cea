//! Wire types for the shipping step of checkout.
//!
//! The checkout client posts an [`UpdatePaymentIntentRequest`] to
//! `POST /order/payment-intent`; the storefront writes the result into the
//! Stripe payment intent as shipping details plus [`PaymentIntentMetadata`],
//! which the webhook reads back once the payment succeeds.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::address::ShippingAddress;
use super::id::{AddressId, CartId, OrderId, SocketId};

/// Message returned by the storefront when the cart behind a checkout is empty.
///
/// The client matches on this exact text to reset its cart badge and leave
/// the checkout page.
pub const CART_EMPTY_MESSAGE: &str = "Please add an item to cart to checkout.";

/// Address fields as entered on the checkout form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutAddress {
    /// Recipient name, `"<first>, <last>"`.
    pub name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    /// Digits only.
    #[serde(default)]
    pub phone: String,
}

impl CheckoutAddress {
    /// Convert into the provider's address shape.
    #[must_use]
    pub fn to_shipping_address(&self) -> ShippingAddress {
        ShippingAddress {
            line1: self.line1.clone(),
            line2: Some(self.line2.clone()).filter(|l| !l.trim().is_empty()),
            city: self.city.clone(),
            state: self.state.clone(),
            postal_code: self.postal_code.clone(),
            country: None,
        }
    }
}

/// Body of `POST /order/payment-intent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentIntentRequest {
    pub address: CheckoutAddress,
    /// Whether the webhook should save this address to the buyer's account.
    #[serde(default)]
    pub save_shipping: bool,
    /// ID of the saved address the buyer picked, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_shipping: Option<String>,
}

/// Successful response of `POST /order/payment-intent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentIntentResponse {
    /// Stripe payment intent ID.
    pub payment_intent_id: String,
    /// Client secret for confirming the payment in the browser.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub save_shipping: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_shipping: Option<String>,
}

/// JSON body used for error and informational responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Whether this is the storefront's empty-cart answer.
    #[must_use]
    pub fn is_cart_empty(&self) -> bool {
        self.message == CART_EMPTY_MESSAGE
    }
}

/// Metadata the storefront keeps on a payment intent.
///
/// Stripe metadata is a flat string map, so every value is stringified on
/// the way out and parsed on the way back in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentIntentMetadata {
    pub save_shipping: bool,
    pub last_used_shipping: Option<AddressId>,
    pub order_id: Option<OrderId>,
    pub socket_id: Option<SocketId>,
    pub cart_id: Option<CartId>,
}

impl PaymentIntentMetadata {
    pub const SAVE_SHIPPING: &'static str = "saveShipping";
    pub const LAST_USED_SHIPPING: &'static str = "lastUsedShipping";
    pub const ORDER_ID: &'static str = "orderId";
    pub const SOCKET_ID: &'static str = "socketId";
    pub const CART_ID: &'static str = "cartId";

    /// Read metadata from a Stripe metadata map.
    ///
    /// Only the exact string `"true"` enables `save_shipping`. Unparseable
    /// IDs are treated as absent.
    #[must_use]
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let non_empty = |key: &str| {
            map.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        Self {
            save_shipping: map.get(Self::SAVE_SHIPPING).is_some_and(|v| v == "true"),
            last_used_shipping: non_empty(Self::LAST_USED_SHIPPING).and_then(|v| v.parse().ok()),
            order_id: non_empty(Self::ORDER_ID).and_then(|v| v.parse().ok()),
            socket_id: non_empty(Self::SOCKET_ID).map(SocketId::new),
            cart_id: non_empty(Self::CART_ID).and_then(|v| v.parse().ok()),
        }
    }

    /// Flatten into key/value pairs for a Stripe update.
    ///
    /// Absent values are sent as empty strings, which Stripe treats as
    /// "unset this key".
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let opt = |v: Option<String>| v.unwrap_or_default();
        vec![
            (Self::SAVE_SHIPPING, self.save_shipping.to_string()),
            (
                Self::LAST_USED_SHIPPING,
                opt(self.last_used_shipping.map(|id| id.to_string())),
            ),
            (Self::ORDER_ID, opt(self.order_id.map(|id| id.to_string()))),
            (
                Self::SOCKET_ID,
                opt(self.socket_id.as_ref().map(ToString::to_string)),
            ),
            (Self::CART_ID, opt(self.cart_id.map(|id| id.to_string()))),
        ]
    }
}
