//! Persistence for the checkout flow.
//!
//! # Database: `elecommerce` (schema `storefront`)
//!
//! ## Tables
//!
//! - `buyer_user` - Registered buyers and their Stripe customer IDs
//! - `buyer_shipping_address` - Saved addresses; partial unique index keeps
//!   at most one `last_used` address per buyer
//! - `order` - Orders awaiting or holding final shipping details
//! - `cart` - Carts in checkout, linked to their payment intent and push channel
//! - `processed_webhook_event` - Stripe event IDs already handled
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p elecommerce-cli -- migrate
//! ```
//!
//! # Stores
//!
//! Handlers and services talk to a [`CheckoutStore`]. [`PgCheckoutStore`] is
//! the production implementation; [`MemoryStore`] keeps everything in process
//! for tests and for running the storefront without `PostgreSQL`.

pub mod memory;
pub mod postgres;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use elecommerce_core::{AddressId, BuyerId, CartId, Order, OrderId, OrderShipping, SocketId};

use crate::models::{BuyerShippingAddress, BuyerUser, Cart, NewShippingAddress};

pub use memory::MemoryStore;
pub use postgres::PgCheckoutStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., a second last-used address).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Storage operations needed by checkout and the Stripe webhook.
///
/// Every method is a single statement against the backing store. Address
/// lookups and updates are always scoped to a buyer.
pub trait CheckoutStore: Clone + Send + Sync + 'static {
    /// Find the buyer a Stripe customer belongs to.
    fn buyer_by_customer(
        &self,
        customer_id: &str,
    ) -> impl Future<Output = Result<Option<BuyerUser>, RepositoryError>> + Send;

    /// Resolve an `Authorization` credential to a buyer.
    fn buyer_by_token(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Option<BuyerUser>, RepositoryError>> + Send;

    /// The buyer's address currently flagged as last used, if any.
    fn last_used_address(
        &self,
        buyer_id: BuyerId,
    ) -> impl Future<Output = Result<Option<BuyerShippingAddress>, RepositoryError>> + Send;

    /// Set or clear the last-used flag on one of the buyer's addresses.
    ///
    /// Returns `None` if the address does not exist or belongs to someone
    /// else. Setting the flag while another address holds it fails with
    /// [`RepositoryError::Conflict`].
    fn set_last_used(
        &self,
        buyer_id: BuyerId,
        address_id: AddressId,
        last_used: bool,
    ) -> impl Future<Output = Result<Option<BuyerShippingAddress>, RepositoryError>> + Send;

    /// Save a new address for a buyer.
    ///
    /// Fails with [`RepositoryError::Conflict`] if `last_used` is set while
    /// another address holds the flag.
    fn create_address(
        &self,
        address: NewShippingAddress,
    ) -> impl Future<Output = Result<BuyerShippingAddress, RepositoryError>> + Send;

    /// Attach final shipping details to an order and mark it paid.
    ///
    /// Returns the updated order, or `None` if it does not exist.
    fn finalize_order(
        &self,
        order_id: OrderId,
        shipping: &OrderShipping,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// Look up a cart.
    fn cart(
        &self,
        cart_id: CartId,
    ) -> impl Future<Output = Result<Option<Cart>, RepositoryError>> + Send;

    /// Record the push channel of the page viewing a cart.
    ///
    /// Returns `false` if the cart does not exist.
    fn attach_socket(
        &self,
        cart_id: CartId,
        socket_id: &SocketId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Whether a Stripe event has already been handled.
    fn is_event_processed(
        &self,
        event_id: &str,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Remember that a Stripe event has been handled. Idempotent.
    fn mark_event_processed(
        &self,
        event_id: &str,
        event_type: &str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Check that the store is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
