//! Domain models for the storefront.
//!
//! These types represent validated domain objects separate from database row
//! types. Orders live in `elecommerce_core` because they are also pushed to
//! the checkout page.

pub mod buyer;
pub mod cart;

pub use buyer::{BuyerShippingAddress, BuyerUser, NewShippingAddress};
pub use cart::Cart;
