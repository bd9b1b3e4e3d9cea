//! Core types for Elecommerce.
//!
//! This module provides type-safe wrappers for the checkout domain.

pub mod address;
pub mod checkout;
pub mod id;
pub mod order;
pub mod price;
pub mod push;
pub mod status;

pub use address::{ShippingAddress, format_address};
pub use checkout::{
    CART_EMPTY_MESSAGE, CheckoutAddress, MessageResponse, PaymentIntentMetadata,
    UpdatePaymentIntentRequest, UpdatePaymentIntentResponse,
};
pub use id::*;
pub use order::{Order, OrderShipping};
pub use price::{CurrencyCode, Price};
pub use push::PushMessage;
pub use status::*;
