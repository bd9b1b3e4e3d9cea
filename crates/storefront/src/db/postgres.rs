//! `PostgreSQL` implementation of [`CheckoutStore`].
//!
//! Queries are checked at runtime (`query_as` + `FromRow`) so the crate
//! builds without a live database.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument};

use elecommerce_core::{
    AddressId, BuyerId, CartId, CurrencyCode, FinancialStatus, Order, OrderId, OrderShipping,
    Price, SocketId,
};

use super::{CheckoutStore, RepositoryError};
use crate::models::{BuyerShippingAddress, BuyerUser, Cart, NewShippingAddress};

/// Columns selected for a buyer.
const BUYER_COLUMNS: &str = "id, stripe_customer_id, created_at";

/// Columns selected for a saved address.
const ADDRESS_COLUMNS: &str = "id, buyer_id, name, address, last_used, created_at";

/// Columns selected for an order.
const ORDER_COLUMNS: &str = "id, buyer_id, total_amount, currency, status, \
     shipping_name, shipping_address, created_at, updated_at";

/// Checkout store backed by the `storefront` schema.
#[derive(Debug, Clone)]
pub struct PgCheckoutStore {
    pool: PgPool,
}

impl PgCheckoutStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct BuyerRow {
    id: BuyerId,
    stripe_customer_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<BuyerRow> for BuyerUser {
    fn from(r: BuyerRow) -> Self {
        Self {
            id: r.id,
            stripe_customer_id: r.stripe_customer_id,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    buyer_id: BuyerId,
    name: String,
    address: String,
    last_used: bool,
    created_at: DateTime<Utc>,
}

impl From<AddressRow> for BuyerShippingAddress {
    fn from(r: AddressRow) -> Self {
        Self {
            id: r.id,
            buyer_id: r.buyer_id,
            name: r.name,
            address: r.address,
            last_used: r.last_used,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    buyer_id: Option<BuyerId>,
    total_amount: Decimal,
    currency: String,
    status: FinancialStatus,
    shipping_name: Option<String>,
    shipping_address: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        let currency = r
            .currency
            .parse::<CurrencyCode>()
            .map_err(RepositoryError::DataCorruption)?;

        let shipping = match (r.shipping_name, r.shipping_address) {
            (Some(name), Some(address)) => Some(OrderShipping { name, address }),
            _ => None,
        };

        Ok(Self {
            id: r.id,
            buyer_id: r.buyer_id,
            total: Price::new(r.total_amount, currency),
            status: r.status,
            shipping,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: CartId,
    buyer_id: Option<BuyerId>,
    item_count: i32,
    order_id: OrderId,
    payment_intent_id: Option<String>,
    socket_id: Option<String>,
}

impl From<CartRow> for Cart {
    fn from(r: CartRow) -> Self {
        Self {
            id: r.id,
            buyer_id: r.buyer_id,
            item_count: r.item_count,
            order_id: r.order_id,
            payment_intent_id: r.payment_intent_id,
            socket_id: r.socket_id.map(SocketId::new),
        }
    }
}

/// Turn a unique violation into [`RepositoryError::Conflict`].
fn map_unique_violation(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(what.to_owned());
    }
    RepositoryError::Database(e)
}

impl CheckoutStore for PgCheckoutStore {
    #[instrument(skip(self))]
    async fn buyer_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<BuyerUser>, RepositoryError> {
        let row: Option<BuyerRow> = sqlx::query_as(&format!(
            "SELECT {BUYER_COLUMNS} FROM storefront.buyer_user WHERE stripe_customer_id = $1"
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(BuyerUser::from))
    }

    #[instrument(skip(self, token))]
    async fn buyer_by_token(&self, token: &str) -> Result<Option<BuyerUser>, RepositoryError> {
        let row: Option<BuyerRow> = sqlx::query_as(&format!(
            r"
            SELECT {BUYER_COLUMNS} FROM storefront.buyer_user
            WHERE session_token = $1
              AND (session_expires_at IS NULL OR session_expires_at > now())
            "
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(BuyerUser::from))
    }

    #[instrument(skip(self))]
    async fn last_used_address(
        &self,
        buyer_id: BuyerId,
    ) -> Result<Option<BuyerShippingAddress>, RepositoryError> {
        let row: Option<AddressRow> = sqlx::query_as(&format!(
            r"
            SELECT {ADDRESS_COLUMNS} FROM storefront.buyer_shipping_address
            WHERE buyer_id = $1 AND last_used
            "
        ))
        .bind(buyer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(BuyerShippingAddress::from))
    }

    #[instrument(skip(self))]
    async fn set_last_used(
        &self,
        buyer_id: BuyerId,
        address_id: AddressId,
        last_used: bool,
    ) -> Result<Option<BuyerShippingAddress>, RepositoryError> {
        let row: Option<AddressRow> = sqlx::query_as(&format!(
            r"
            UPDATE storefront.buyer_shipping_address
            SET last_used = $3
            WHERE id = $2 AND buyer_id = $1
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(buyer_id)
        .bind(address_id)
        .bind(last_used)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "buyer already has a last used address"))?;

        debug!(found = row.is_some(), "Updated last used flag");
        Ok(row.map(BuyerShippingAddress::from))
    }

    #[instrument(skip(self, address), fields(buyer_id = %address.buyer_id))]
    async fn create_address(
        &self,
        address: NewShippingAddress,
    ) -> Result<BuyerShippingAddress, RepositoryError> {
        let row: AddressRow = sqlx::query_as(&format!(
            r"
            INSERT INTO storefront.buyer_shipping_address (buyer_id, name, address, last_used)
            VALUES ($1, $2, $3, $4)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(address.buyer_id)
        .bind(&address.name)
        .bind(&address.address)
        .bind(address.last_used)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "buyer already has a last used address"))?;

        debug!(address_id = %row.id, "Saved shipping address");
        Ok(row.into())
    }

    #[instrument(skip(self, shipping))]
    async fn finalize_order(
        &self,
        order_id: OrderId,
        shipping: &OrderShipping,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r#"
            UPDATE storefront."order"
            SET shipping_name = $2,
                shipping_address = $3,
                status = $4,
                updated_at = now()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(&shipping.name)
        .bind(&shipping.address)
        .bind(FinancialStatus::Paid)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn cart(&self, cart_id: CartId) -> Result<Option<Cart>, RepositoryError> {
        let row: Option<CartRow> = sqlx::query_as(
            r"
            SELECT id, buyer_id, item_count, order_id, payment_intent_id, socket_id
            FROM storefront.cart
            WHERE id = $1
            ",
        )
        .bind(cart_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Cart::from))
    }

    #[instrument(skip(self))]
    async fn attach_socket(
        &self,
        cart_id: CartId,
        socket_id: &SocketId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.cart
            SET socket_id = $2, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(cart_id)
        .bind(socket_id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_event_processed(&self, event_id: &str) -> Result<bool, RepositoryError> {
        let row: (bool,) = sqlx::query_as(
            r"
            SELECT EXISTS(
                SELECT 1 FROM storefront.processed_webhook_event WHERE event_id = $1
            )
            ",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn mark_event_processed(
        &self,
        event_id: &str,
        event_type: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.processed_webhook_event (event_id, event_type)
            VALUES ($1, $2)
            ON CONFLICT (event_id) DO NOTHING
            ",
        )
        .bind(event_id)
        .bind(event_type)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
