//! Shipping updates on a cart's payment intent.
//!
//! The checkout page sends the address on every change. The storefront
//! writes it onto the cart's Stripe payment intent together with the
//! metadata the webhook needs later (`saveShipping`, `lastUsedShipping`,
//! `orderId`, `socketId`, `cartId`).
//!
//! # Deduplication
//!
//! The cart ID arrives in the `idempotency-key` header. Responses are cached
//! for 24 hours under the cart ID plus a fingerprint of the full Stripe
//! update (shipping and metadata), so a resubmission that would write the
//! same data is answered without calling Stripe. A reconnected checkout
//! page changes the socket ID and therefore the fingerprint. The same pair
//! is forwarded to Stripe as its `Idempotency-Key`.

use std::time::Duration;

use moka::future::Cache;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use elecommerce_core::{
    AddressId, CartId, PaymentIntentMetadata, UpdatePaymentIntentRequest,
    UpdatePaymentIntentResponse,
};

use crate::db::CheckoutStore;
use crate::error::{AppError, Result};
use crate::models::BuyerUser;
use crate::stripe::{PaymentGateway, PaymentIntentUpdate, Shipping};

/// Header carrying the cart ID.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// How long a response is replayed for an identical submission.
const DEDUP_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on remembered submissions.
const DEDUP_CAPACITY: u64 = 10_000;

/// Updates payment intents from checkout form submissions.
#[derive(Clone)]
pub struct CheckoutService<S, G> {
    store: S,
    gateway: G,
    responses: Cache<String, UpdatePaymentIntentResponse>,
}

impl<S, G> std::fmt::Debug for CheckoutService<S, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutService")
            .field("cached_responses", &self.responses.entry_count())
            .finish_non_exhaustive()
    }
}

impl<S: CheckoutStore, G: PaymentGateway> CheckoutService<S, G> {
    #[must_use]
    pub fn new(store: S, gateway: G) -> Self {
        let responses = Cache::builder()
            .max_capacity(DEDUP_CAPACITY)
            .time_to_live(DEDUP_TTL)
            .build();

        Self {
            store,
            gateway,
            responses,
        }
    }

    /// Write the submitted shipping details onto the cart's payment intent.
    ///
    /// Guests never save addresses: `saveShipping` is forced off and
    /// `lastUsedShipping` dropped whatever the body says.
    ///
    /// # Errors
    ///
    /// - `BadRequest` if the idempotency key is missing or malformed, the
    ///   picked address ID is not a number, or checkout has not started
    /// - `CartEmpty` if the cart does not exist or has no items
    /// - `Forbidden` if the cart belongs to another buyer
    /// - `Stripe` if the payment intent update fails
    #[instrument(skip(self, buyer, request), fields(buyer_id = ?buyer.map(|b| b.id)))]
    pub async fn update_shipping(
        &self,
        idempotency_key: Option<&str>,
        buyer: Option<&BuyerUser>,
        request: UpdatePaymentIntentRequest,
    ) -> Result<UpdatePaymentIntentResponse> {
        let cart_id = parse_cart_id(idempotency_key)?;
        let cart = self
            .store
            .cart(cart_id)
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or(AppError::CartEmpty)?;

        let buyer_id = buyer.map(|b| b.id);
        if !cart.is_accessible_by(buyer_id) {
            return Err(AppError::Forbidden(format!(
                "cart {cart_id} belongs to another buyer"
            )));
        }

        let (request, last_used_shipping) = normalize(request, buyer.is_some())?;
        let payment_intent_id = cart.payment_intent_id.clone().ok_or_else(|| {
            AppError::BadRequest(format!("checkout has not started for cart {cart_id}"))
        })?;

        let address = &request.address;
        let update = PaymentIntentUpdate {
            shipping: Shipping {
                name: address.name.clone(),
                phone: Some(address.phone.clone()).filter(|p| !p.is_empty()),
                address: address.to_shipping_address(),
            },
            metadata: PaymentIntentMetadata {
                save_shipping: request.save_shipping,
                last_used_shipping,
                order_id: Some(cart.order_id),
                socket_id: cart.socket_id.clone(),
                cart_id: Some(cart.id),
            },
        };

        let fingerprint = fingerprint(&payment_intent_id, &update)?;
        let cache_key = format!("{cart_id}:{fingerprint}");
        if let Some(cached) = self.responses.get(&cache_key).await {
            debug!(%cart_id, "Identical submission, returning cached response");
            return Ok(cached);
        }

        let intent = self
            .gateway
            .update_payment_intent(
                &payment_intent_id,
                &update,
                &format!("{cart_id}-{fingerprint}"),
            )
            .await?;

        let response = UpdatePaymentIntentResponse {
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
            save_shipping: request.save_shipping,
            last_used_shipping: request.last_used_shipping,
        };
        self.responses.insert(cache_key, response.clone()).await;

        info!(%cart_id, save_shipping = response.save_shipping, "Payment intent shipping updated");
        Ok(response)
    }
}

fn parse_cart_id(idempotency_key: Option<&str>) -> Result<CartId> {
    let key = idempotency_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("missing {IDEMPOTENCY_KEY_HEADER} header")))?;

    key.parse()
        .map_err(|_| AppError::BadRequest(format!("invalid {IDEMPOTENCY_KEY_HEADER} header")))
}

/// Apply guest rules and validate the picked address ID.
fn normalize(
    mut request: UpdatePaymentIntentRequest,
    logged_in: bool,
) -> Result<(UpdatePaymentIntentRequest, Option<AddressId>)> {
    if !logged_in {
        request.save_shipping = false;
        request.last_used_shipping = None;
        return Ok((request, None));
    }

    let last_used = request
        .last_used_shipping
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::parse::<AddressId>)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    request.last_used_shipping = last_used.map(|id| id.to_string());
    Ok((request, last_used))
}

/// Hex SHA-256 of everything sent to Stripe: the target intent, shipping
/// and metadata (including the cart's current socket and order).
fn fingerprint(payment_intent_id: &str, update: &PaymentIntentUpdate) -> Result<String> {
    let bytes = serde_json::to_vec(&(payment_intent_id, update.to_form()))
        .map_err(|e| AppError::Internal(format!("failed to encode update: {e}")))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
