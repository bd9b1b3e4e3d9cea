//! In-process implementation of [`CheckoutStore`].
//!
//! Mirrors the `PostgreSQL` constraints that matter to checkout, including
//! the one-last-used-address-per-buyer rule, so tests exercise the same
//! failure modes as production. Also exposes seeding helpers.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use elecommerce_core::{
    AddressId, BuyerId, CartId, FinancialStatus, Order, OrderId, OrderShipping, Price, SocketId,
};

use super::{CheckoutStore, RepositoryError};
use crate::models::{BuyerShippingAddress, BuyerUser, Cart, NewShippingAddress};

#[derive(Default)]
struct MemoryData {
    next_id: i32,
    buyers: HashMap<BuyerId, BuyerUser>,
    tokens: HashMap<String, BuyerId>,
    addresses: HashMap<AddressId, BuyerShippingAddress>,
    orders: HashMap<OrderId, Order>,
    carts: HashMap<CartId, Cart>,
    processed_events: HashSet<String>,
}

impl MemoryData {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    /// Another address of this buyer already holds the flag.
    fn last_used_taken(&self, buyer_id: BuyerId, except: Option<AddressId>) -> bool {
        self.addresses
            .values()
            .any(|a| a.buyer_id == buyer_id && a.last_used && Some(a.id) != except)
    }
}

/// Checkout store kept entirely in memory.
///
/// Cloning shares the underlying data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<MemoryData>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryData>, RepositoryError> {
        self.data
            .lock()
            .map_err(|_| RepositoryError::DataCorruption("memory store lock poisoned".to_owned()))
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Register a buyer with an optional Stripe customer and session token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the token is already in use.
    pub fn insert_buyer(
        &self,
        stripe_customer_id: Option<&str>,
        session_token: Option<&str>,
    ) -> Result<BuyerUser, RepositoryError> {
        let mut data = self.lock()?;
        if let Some(token) = session_token
            && data.tokens.contains_key(token)
        {
            return Err(RepositoryError::Conflict("session token in use".to_owned()));
        }

        let buyer = BuyerUser {
            id: BuyerId::new(data.next_id()),
            stripe_customer_id: stripe_customer_id.map(String::from),
            created_at: Utc::now(),
        };
        if let Some(token) = session_token {
            data.tokens.insert(token.to_owned(), buyer.id);
        }
        data.buyers.insert(buyer.id, buyer.clone());
        Ok(buyer)
    }

    /// Create a pending order without shipping details.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store lock is poisoned.
    pub fn insert_order(
        &self,
        buyer_id: Option<BuyerId>,
        total: Price,
    ) -> Result<Order, RepositoryError> {
        let mut data = self.lock()?;
        let now = Utc::now();
        let order = Order {
            id: OrderId::new(data.next_id()),
            buyer_id,
            total,
            status: FinancialStatus::Pending,
            shipping: None,
            created_at: now,
            updated_at: now,
        };
        data.orders.insert(order.id, order.clone());
        Ok(order)
    }

    /// Create a cart in checkout for an existing order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub fn insert_cart(
        &self,
        buyer_id: Option<BuyerId>,
        order_id: OrderId,
        item_count: i32,
        payment_intent_id: Option<&str>,
    ) -> Result<Cart, RepositoryError> {
        let mut data = self.lock()?;
        if !data.orders.contains_key(&order_id) {
            return Err(RepositoryError::NotFound);
        }
        let cart = Cart {
            id: CartId::new(data.next_id()),
            buyer_id,
            item_count,
            order_id,
            payment_intent_id: payment_intent_id.map(String::from),
            socket_id: None,
        };
        data.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// All addresses saved for a buyer, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store lock is poisoned.
    pub fn addresses(&self, buyer_id: BuyerId) -> Result<Vec<BuyerShippingAddress>, RepositoryError> {
        let data = self.lock()?;
        let mut addresses: Vec<_> = data
            .addresses
            .values()
            .filter(|a| a.buyer_id == buyer_id)
            .cloned()
            .collect();
        addresses.sort_by_key(|a| a.id.as_i32());
        Ok(addresses)
    }

    /// Number of saved addresses across all buyers.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store lock is poisoned.
    pub fn address_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.lock()?.addresses.len())
    }

    /// Look up an order.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store lock is poisoned.
    pub fn order(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.lock()?.orders.get(&order_id).cloned())
    }
}

impl CheckoutStore for MemoryStore {
    async fn buyer_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<BuyerUser>, RepositoryError> {
        let data = self.lock()?;
        Ok(data
            .buyers
            .values()
            .find(|b| b.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn buyer_by_token(&self, token: &str) -> Result<Option<BuyerUser>, RepositoryError> {
        let data = self.lock()?;
        Ok(data
            .tokens
            .get(token)
            .and_then(|id| data.buyers.get(id))
            .cloned())
    }

    async fn last_used_address(
        &self,
        buyer_id: BuyerId,
    ) -> Result<Option<BuyerShippingAddress>, RepositoryError> {
        let data = self.lock()?;
        Ok(data
            .addresses
            .values()
            .find(|a| a.buyer_id == buyer_id && a.last_used)
            .cloned())
    }

    async fn set_last_used(
        &self,
        buyer_id: BuyerId,
        address_id: AddressId,
        last_used: bool,
    ) -> Result<Option<BuyerShippingAddress>, RepositoryError> {
        let mut data = self.lock()?;
        let owned = data
            .addresses
            .get(&address_id)
            .is_some_and(|a| a.buyer_id == buyer_id);
        if !owned {
            return Ok(None);
        }
        if last_used && data.last_used_taken(buyer_id, Some(address_id)) {
            return Err(RepositoryError::Conflict(
                "buyer already has a last used address".to_owned(),
            ));
        }

        Ok(data.addresses.get_mut(&address_id).map(|address| {
            address.last_used = last_used;
            address.clone()
        }))
    }

    async fn create_address(
        &self,
        address: NewShippingAddress,
    ) -> Result<BuyerShippingAddress, RepositoryError> {
        let mut data = self.lock()?;
        if address.last_used && data.last_used_taken(address.buyer_id, None) {
            return Err(RepositoryError::Conflict(
                "buyer already has a last used address".to_owned(),
            ));
        }

        let saved = BuyerShippingAddress {
            id: AddressId::new(data.next_id()),
            buyer_id: address.buyer_id,
            name: address.name,
            address: address.address,
            last_used: address.last_used,
            created_at: Utc::now(),
        };
        data.addresses.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn finalize_order(
        &self,
        order_id: OrderId,
        shipping: &OrderShipping,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut data = self.lock()?;
        Ok(data.orders.get_mut(&order_id).map(|order| {
            order.shipping = Some(shipping.clone());
            order.status = FinancialStatus::Paid;
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn cart(&self, cart_id: CartId) -> Result<Option<Cart>, RepositoryError> {
        Ok(self.lock()?.carts.get(&cart_id).cloned())
    }

    async fn attach_socket(
        &self,
        cart_id: CartId,
        socket_id: &SocketId,
    ) -> Result<bool, RepositoryError> {
        let mut data = self.lock()?;
        Ok(data
            .carts
            .get_mut(&cart_id)
            .map(|cart| cart.socket_id = Some(socket_id.clone()))
            .is_some())
    }

    async fn is_event_processed(&self, event_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.lock()?.processed_events.contains(event_id))
    }

    async fn mark_event_processed(
        &self,
        event_id: &str,
        _event_type: &str,
    ) -> Result<(), RepositoryError> {
        self.lock()?.processed_events.insert(event_id.to_owned());
        Ok(())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.lock().map(|_| ())
    }
}

/// A [`MemoryStore`] whose `finalize_order` can be made to fail, for
/// exercising the transient-failure path of the webhook.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct FlakyStore {
    pub(crate) inner: MemoryStore,
    fail_finalize: Arc<std::sync::atomic::AtomicBool>,
}

#[cfg(test)]
impl FlakyStore {
    pub(crate) fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_finalize: Arc::default(),
        }
    }

    pub(crate) fn fail_finalize(&self, fail: bool) {
        self.fail_finalize
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl CheckoutStore for FlakyStore {
    async fn buyer_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<BuyerUser>, RepositoryError> {
        self.inner.buyer_by_customer(customer_id).await
    }

    async fn buyer_by_token(&self, token: &str) -> Result<Option<BuyerUser>, RepositoryError> {
        self.inner.buyer_by_token(token).await
    }

    async fn last_used_address(
        &self,
        buyer_id: BuyerId,
    ) -> Result<Option<BuyerShippingAddress>, RepositoryError> {
        self.inner.last_used_address(buyer_id).await
    }

    async fn set_last_used(
        &self,
        buyer_id: BuyerId,
        address_id: AddressId,
        last_used: bool,
    ) -> Result<Option<BuyerShippingAddress>, RepositoryError> {
        self.inner.set_last_used(buyer_id, address_id, last_used).await
    }

    async fn create_address(
        &self,
        address: NewShippingAddress,
    ) -> Result<BuyerShippingAddress, RepositoryError> {
        self.inner.create_address(address).await
    }

    async fn finalize_order(
        &self,
        order_id: OrderId,
        shipping: &OrderShipping,
    ) -> Result<Option<Order>, RepositoryError> {
        if self
            .fail_finalize
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(RepositoryError::DataCorruption(
                "connection reset".to_owned(),
            ));
        }
        self.inner.finalize_order(order_id, shipping).await
    }

    async fn cart(&self, cart_id: CartId) -> Result<Option<Cart>, RepositoryError> {
        self.inner.cart(cart_id).await
    }

    async fn attach_socket(
        &self,
        cart_id: CartId,
        socket_id: &SocketId,
    ) -> Result<bool, RepositoryError> {
        self.inner.attach_socket(cart_id, socket_id).await
    }

    async fn is_event_processed(&self, event_id: &str) -> Result<bool, RepositoryError> {
        self.inner.is_event_processed(event_id).await
    }

    async fn mark_event_processed(
        &self,
        event_id: &str,
        event_type: &str,
    ) -> Result<(), RepositoryError> {
        self.inner.mark_event_processed(event_id, event_type).await
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.inner.ping().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use elecommerce_core::CurrencyCode;
    use rust_decimal::Decimal;

    use super::*;

    fn new_address(buyer_id: BuyerId, last_used: bool) -> NewShippingAddress {
        NewShippingAddress {
            buyer_id,
            name: "Ada, Lovelace".into(),
            address: "1 Main St, Springfield, IL, 62701".into(),
            last_used,
        }
    }

    #[tokio::test]
    async fn test_buyer_lookup_by_customer_and_token() {
        let store = MemoryStore::new();
        let buyer = store.insert_buyer(Some("cus_1"), Some("tok_1")).unwrap();

        assert_eq!(store.buyer_by_customer("cus_1").await.unwrap(), Some(buyer.clone()));
        assert_eq!(store.buyer_by_token("tok_1").await.unwrap(), Some(buyer));
        assert_eq!(store.buyer_by_customer("cus_2").await.unwrap(), None);
        assert_eq!(store.buyer_by_token("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_second_last_used_address_conflicts() {
        let store = MemoryStore::new();
        let buyer = store.insert_buyer(None, None).unwrap();
        let first = store.create_address(new_address(buyer.id, true)).await.unwrap();

        let err = store.create_address(new_address(buyer.id, true)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let second = store.create_address(new_address(buyer.id, false)).await.unwrap();
        let err = store.set_last_used(buyer.id, second.id, true).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        store.set_last_used(buyer.id, first.id, false).await.unwrap();
        let flagged = store.set_last_used(buyer.id, second.id, true).await.unwrap();
        assert!(flagged.unwrap().last_used);
    }

    #[tokio::test]
    async fn test_set_last_used_is_scoped_to_buyer() {
        let store = MemoryStore::new();
        let owner = store.insert_buyer(None, None).unwrap();
        let other = store.insert_buyer(None, None).unwrap();
        let address = store.create_address(new_address(owner.id, false)).await.unwrap();

        assert_eq!(store.set_last_used(other.id, address.id, true).await.unwrap(), None);
        assert!(!store.addresses(owner.id).unwrap()[0].last_used);
    }

    #[tokio::test]
    async fn test_finalize_order_sets_shipping_and_paid() {
        let store = MemoryStore::new();
        let order = store
            .insert_order(None, Price::new(Decimal::new(1000, 2), CurrencyCode::USD))
            .unwrap();
        let shipping = OrderShipping {
            name: "Guest, Person".into(),
            address: "2 Side St, Austin, TX, 73301".into(),
        };

        let updated = store.finalize_order(order.id, &shipping).await.unwrap().unwrap();
        assert_eq!(updated.status, FinancialStatus::Paid);
        assert_eq!(updated.shipping, Some(shipping));
        assert_eq!(store.finalize_order(OrderId::new(999), &updated.shipping.unwrap()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_processed_events_are_remembered() {
        let store = MemoryStore::new();
        assert!(!store.is_event_processed("evt_1").await.unwrap());
        store.mark_event_processed("evt_1", "payment_intent.succeeded").await.unwrap();
        store.mark_event_processed("evt_1", "payment_intent.succeeded").await.unwrap();
        assert!(store.is_event_processed("evt_1").await.unwrap());
    }

    #[tokio::test]
    async fn test_attach_socket_requires_cart() {
        let store = MemoryStore::new();
        let order = store.insert_order(None, Price::new(Decimal::ONE, CurrencyCode::USD)).unwrap();
        let cart = store.insert_cart(None, order.id, 1, Some("pi_1")).unwrap();
        let socket = SocketId::new("s1");

        assert!(store.attach_socket(cart.id, &socket).await.unwrap());
        assert!(!store.attach_socket(CartId::new(404), &socket).await.unwrap());
        assert_eq!(store.cart(cart.id).await.unwrap().unwrap().socket_id, Some(socket));
    }
}
