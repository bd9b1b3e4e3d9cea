//! Elecommerce Core - Shared checkout types.
//!
//! This crate provides the types exchanged between the Elecommerce components:
//! - `storefront` - Backend serving the checkout API, Stripe webhook and push channel
//! - `checkout` - Client that submits shipping details during checkout
//! - `cli` - Command-line tools for migrations and local testing
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, prices, statuses, addresses, orders and wire formats

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
