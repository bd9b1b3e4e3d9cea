//! Order record as shared with the checkout page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{BuyerId, OrderId};
use super::price::Price;
use super::status::FinancialStatus;

/// Shipping details finalized on an order once payment succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderShipping {
    pub name: String,
    /// Single-line address, see [`crate::format_address`].
    pub address: String,
}

/// A purchase record.
///
/// Created when checkout starts; the Stripe webhook attaches
/// [`OrderShipping`] and marks it paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    /// `None` for guest checkouts.
    pub buyer_id: Option<BuyerId>,
    pub total: Price,
    pub status: FinancialStatus,
    pub shipping: Option<OrderShipping>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
