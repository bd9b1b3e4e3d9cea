//! Submit the shipping step of a checkout from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # As a guest
//! elec-cli checkout submit --cart-id 12 --first-name Ada --last-name Lovelace \
//!     --line1 "1 Main St" --city Springfield --state IL --postal-code 62701 \
//!     --phone "(555) 123-4567"
//!
//! # As a logged-in buyer, saving the address
//! elec-cli checkout submit --cart-id 12 --token "$SESSION_TOKEN" --save ...
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_URL` - Storefront base URL, unless `--url` is given
//!   (default `http://127.0.0.1:3000`)

use elecommerce_checkout::{
    CheckoutClient, CheckoutError, CheckoutSession, ShippingForm, SubmitOutcome,
};
use elecommerce_core::CartId;

const DEFAULT_STOREFRONT_URL: &str = "http://127.0.0.1:3000";

/// Who is submitting.
#[derive(Debug)]
pub enum Submitter {
    Guest,
    Buyer(String),
    /// A buyer whose session has expired.
    Expired,
}

/// Submit `form` for `cart_id` and report the outcome.
///
/// # Errors
///
/// Returns error if the storefront cannot be reached or refuses the
/// submission.
pub async fn submit(
    url: Option<String>,
    cart_id: CartId,
    submitter: Submitter,
    form: &ShippingForm,
) -> Result<(), CheckoutError> {
    dotenvy::dotenv().ok();
    let url = url
        .or_else(|| std::env::var("STOREFRONT_URL").ok())
        .unwrap_or_else(|| DEFAULT_STOREFRONT_URL.to_string());

    let session = match submitter {
        Submitter::Guest => CheckoutSession::guest(cart_id),
        Submitter::Buyer(token) => CheckoutSession::logged_in(cart_id, token),
        Submitter::Expired => CheckoutSession::expired(cart_id),
    };

    let client = CheckoutClient::new(&url)?;
    match client.submit_shipping(&session, form).await? {
        SubmitOutcome::Skipped => tracing::warn!("Session expired, nothing submitted"),
        SubmitOutcome::CartEmpty => tracing::warn!(%cart_id, "Cart is empty"),
        SubmitOutcome::Updated(response) => tracing::info!(
            payment_intent_id = %response.payment_intent_id,
            save_shipping = response.save_shipping,
            last_used_shipping = ?response.last_used_shipping,
            "Payment intent updated"
        ),
    }
    Ok(())
}
