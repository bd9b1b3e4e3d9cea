//! Business logic services for storefront.
//!
//! # Services
//!
//! - `checkout` - Writes checkout shipping details onto payment intents
//! - `webhook` - Finalizes orders from Stripe `payment_intent.succeeded` events
//! - `notifier` - Pushes order updates to connected checkout pages

pub mod checkout;
pub mod notifier;
pub mod webhook;

pub use checkout::{CheckoutService, IDEMPOTENCY_KEY_HEADER};
pub use notifier::NotificationHub;
pub use webhook::{WebhookError, WebhookOutcome, WebhookService};
