//! Buyer domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use elecommerce_core::{AddressId, BuyerId};

/// A registered buyer account.
///
/// Registration happens elsewhere; checkout only looks buyers up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyerUser {
    /// Unique buyer ID.
    pub id: BuyerId,
    /// Stripe customer attached when the buyer's first payment intent was
    /// created. Used to recognise logged-in checkouts in webhooks.
    pub stripe_customer_id: Option<String>,
    /// When the buyer registered.
    pub created_at: DateTime<Utc>,
}

/// A shipping address saved on a buyer's account.
///
/// At most one address per buyer has `last_used` set; the database enforces
/// this with a partial unique index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerShippingAddress {
    pub id: AddressId,
    pub buyer_id: BuyerId,
    /// Display name of the recipient.
    pub name: String,
    /// Single-line formatted address.
    pub address: String,
    /// Whether this address pre-fills the next checkout.
    pub last_used: bool,
    pub created_at: DateTime<Utc>,
}

/// Parameters for saving a new shipping address.
#[derive(Debug, Clone)]
pub struct NewShippingAddress {
    pub buyer_id: BuyerId,
    pub name: String,
    pub address: String,
    pub last_used: bool,
}
