//! Cart domain type.

use elecommerce_core::{BuyerId, CartId, OrderId, SocketId};

/// A cart in checkout.
///
/// The cart ID doubles as the idempotency key the checkout page sends with
/// every shipping update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    pub id: CartId,
    /// Owning buyer; `None` for guest carts.
    pub buyer_id: Option<BuyerId>,
    pub item_count: i32,
    /// The order this cart turns into once paid.
    pub order_id: OrderId,
    /// Stripe payment intent created when checkout started.
    pub payment_intent_id: Option<String>,
    /// Push channel of the checkout page currently viewing this cart.
    pub socket_id: Option<SocketId>,
}

impl Cart {
    /// Whether there is anything to check out.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.item_count <= 0
    }

    /// Whether the caller may act on the cart.
    ///
    /// Guest carts are open to whoever holds the cart ID; buyer carts only
    /// to that buyer.
    #[must_use]
    pub fn is_accessible_by(&self, buyer: Option<BuyerId>) -> bool {
        self.buyer_id.is_none_or(|owner| Some(owner) == buyer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart(buyer_id: Option<BuyerId>, item_count: i32) -> Cart {
        Cart {
            id: CartId::new(1),
            buyer_id,
            item_count,
            order_id: OrderId::new(1),
            payment_intent_id: None,
            socket_id: None,
        }
    }

    #[test]
    fn test_is_empty() {
        assert!(cart(None, 0).is_empty());
        assert!(!cart(None, 2).is_empty());
    }

    #[test]
    fn test_access() {
        let buyer = BuyerId::new(4);
        assert!(cart(None, 1).is_accessible_by(None));
        assert!(cart(None, 1).is_accessible_by(Some(buyer)));
        assert!(cart(Some(buyer), 1).is_accessible_by(Some(buyer)));
        assert!(!cart(Some(buyer), 1).is_accessible_by(None));
        assert!(!cart(Some(buyer), 1).is_accessible_by(Some(BuyerId::new(5))));
    }
}
