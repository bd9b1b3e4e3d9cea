//! Elecommerce Checkout - client side of the shipping step.
//!
//! On every change of the checkout form the page sends the shipping address
//! to the storefront, which writes it onto the cart's payment intent. This
//! crate is that sender:
//!
//! - [`ShippingForm`] - what the buyer typed or picked
//! - [`CheckoutSession`] - which cart, and whether the buyer is logged in
//! - [`CheckoutClient::submit_shipping`] - build and send the request
//!
//! # Example
//!
//! ```rust,no_run
//! use elecommerce_checkout::{CheckoutClient, CheckoutSession, ShippingForm, SubmitOutcome};
//! use elecommerce_core::CartId;
//!
//! # async fn run() -> Result<(), elecommerce_checkout::CheckoutError> {
//! let client = CheckoutClient::new("http://127.0.0.1:3000")?;
//! let session = CheckoutSession::guest(CartId::new(12));
//! let form = ShippingForm {
//!     first_name: "Ada".into(),
//!     last_name: "Lovelace".into(),
//!     line1: "1 Main St".into(),
//!     city: "Springfield".into(),
//!     state: "IL".into(),
//!     postal_code: "62701".into(),
//!     phone: "(555) 123-4567".into(),
//!     ..ShippingForm::default()
//! };
//!
//! match client.submit_shipping(&session, &form).await? {
//!     SubmitOutcome::Updated(response) => println!("updated {}", response.payment_intent_id),
//!     SubmitOutcome::CartEmpty => println!("cart is empty"),
//!     SubmitOutcome::Skipped => println!("session expired"),
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

mod client;
mod error;
mod form;

pub use client::{CheckoutClient, SubmitOutcome};
pub use error::CheckoutError;
pub use form::{AuthState, CheckoutSession, ShippingForm};
