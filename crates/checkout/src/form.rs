//! What the checkout page knows when it submits shipping.

use std::fmt;

use secrecy::SecretString;

use elecommerce_core::{AddressId, CartId, CheckoutAddress, UpdatePaymentIntentRequest};

/// Whether the buyer is logged in.
#[derive(Clone)]
pub enum AuthState {
    /// A live session; the token is sent as the `Authorization` header.
    LoggedIn { token: SecretString },
    /// No session. `previously_logged_in` marks a session that expired
    /// while the checkout page was open.
    Guest { previously_logged_in: bool },
}

impl fmt::Debug for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggedIn { .. } => f.write_str("LoggedIn"),
            Self::Guest {
                previously_logged_in,
            } => f
                .debug_struct("Guest")
                .field("previously_logged_in", previously_logged_in)
                .finish(),
        }
    }
}

/// A checkout in progress.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub cart_id: CartId,
    pub auth: AuthState,
}

impl CheckoutSession {
    #[must_use]
    pub const fn guest(cart_id: CartId) -> Self {
        Self {
            cart_id,
            auth: AuthState::Guest {
                previously_logged_in: false,
            },
        }
    }

    #[must_use]
    pub fn logged_in(cart_id: CartId, token: impl Into<String>) -> Self {
        Self {
            cart_id,
            auth: AuthState::LoggedIn {
                token: SecretString::from(token.into()),
            },
        }
    }

    /// A buyer whose session ran out mid-checkout.
    #[must_use]
    pub const fn expired(cart_id: CartId) -> Self {
        Self {
            cart_id,
            auth: AuthState::Guest {
                previously_logged_in: true,
            },
        }
    }

    #[must_use]
    pub const fn session_expired(&self) -> bool {
        matches!(
            self.auth,
            AuthState::Guest {
                previously_logged_in: true
            }
        )
    }

    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        matches!(self.auth, AuthState::LoggedIn { .. })
    }
}

/// The shipping step of the checkout form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingForm {
    pub first_name: String,
    pub last_name: String,
    pub line1: String,
    pub line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    /// As typed; formatting characters are stripped on submit.
    pub phone: String,
    /// The "save this address" checkbox.
    pub save_shipping: bool,
    /// Saved address picked from the buyer's address book.
    pub selected_address: Option<AddressId>,
}

impl ShippingForm {
    /// Recipient name as stored on the payment intent: `"<first>, <last>"`.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.first_name, self.last_name)
    }

    #[must_use]
    pub fn phone_digits(&self) -> String {
        self.phone.chars().filter(char::is_ascii_digit).collect()
    }

    /// Build the request body.
    ///
    /// Guests never ask for the address to be saved and never reference a
    /// saved address.
    #[must_use]
    pub fn to_request(&self, logged_in: bool) -> UpdatePaymentIntentRequest {
        let address = CheckoutAddress {
            name: self.display_name(),
            line1: self.line1.clone(),
            line2: self.line2.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            postal_code: self.postal_code.clone(),
            phone: self.phone_digits(),
        };

        if logged_in {
            UpdatePaymentIntentRequest {
                address,
                save_shipping: self.save_shipping,
                last_used_shipping: self.selected_address.map(|id| id.to_string()),
            }
        } else {
            UpdatePaymentIntentRequest {
                address,
                save_shipping: false,
                last_used_shipping: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> ShippingForm {
        ShippingForm {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            line1: "1 Main St".into(),
            line2: "Apt 2".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            postal_code: "62701".into(),
            phone: "+1 (555) 123-4567".into(),
            save_shipping: true,
            selected_address: Some(AddressId::new(7)),
        }
    }

    #[test]
    fn test_name_and_phone_formatting() {
        let form = form();
        assert_eq!(form.display_name(), "Ada, Lovelace");
        assert_eq!(form.phone_digits(), "15551234567");
    }

    #[test]
    fn test_logged_in_request_keeps_choices() {
        let request = form().to_request(true);
        assert!(request.save_shipping);
        assert_eq!(request.last_used_shipping.as_deref(), Some("7"));
        assert_eq!(request.address.name, "Ada, Lovelace");
        assert_eq!(request.address.line2, "Apt 2");
    }

    #[test]
    fn test_guest_request_never_saves() {
        let request = form().to_request(false);
        assert!(!request.save_shipping);
        assert_eq!(request.last_used_shipping, None);
        assert_eq!(request.address.phone, "15551234567");
    }

    #[test]
    fn test_session_states() {
        let cart = CartId::new(1);
        assert!(!CheckoutSession::guest(cart).session_expired());
        assert!(CheckoutSession::expired(cart).session_expired());
        assert!(CheckoutSession::logged_in(cart, "tok").is_logged_in());
        assert_eq!(
            format!("{:?}", CheckoutSession::logged_in(cart, "tok").auth),
            "LoggedIn"
        );
    }
}
