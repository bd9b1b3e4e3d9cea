//! Shipping address as reported by the payment provider.

use serde::{Deserialize, Deserializer, Serialize};

/// A postal address attached to a payment intent's shipping details.
///
/// Field names follow Stripe's `address` object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShippingAddress {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub state: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub postal_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Stripe sends `null` for address parts the customer left out.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ShippingAddress {
    /// Render this address as the single-line string stored on orders and
    /// saved addresses.
    #[must_use]
    pub fn formatted(&self) -> String {
        format_address(self)
    }
}

/// Format an address as `line1, line2, city, state, postal_code`.
///
/// An absent or blank `line2` is left out rather than rendered as an empty
/// segment.
///
/// ```
/// use elecommerce_core::{ShippingAddress, format_address};
///
/// let address = ShippingAddress {
///     line1: "1 Infinite Loop".into(),
///     line2: Some("Suite 5".into()),
///     city: "Cupertino".into(),
///     state: "CA".into(),
///     postal_code: "95014".into(),
///     country: None,
/// };
/// assert_eq!(
///     format_address(&address),
///     "1 Infinite Loop, Suite 5, Cupertino, CA, 95014"
/// );
/// ```
#[must_use]
pub fn format_address(address: &ShippingAddress) -> String {
    let line2 = address
        .line2
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty());

    [
        Some(address.line1.as_str()),
        line2,
        Some(address.city.as_str()),
        Some(address.state.as_str()),
        Some(address.postal_code.as_str()),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(line2: Option<&str>) -> ShippingAddress {
        ShippingAddress {
            line1: "12 Harbour St".into(),
            line2: line2.map(String::from),
            city: "Portland".into(),
            state: "OR".into(),
            postal_code: "97201".into(),
            country: Some("US".into()),
        }
    }

    #[test]
    fn test_format_with_line2() {
        assert_eq!(
            address(Some("Apt 4")).formatted(),
            "12 Harbour St, Apt 4, Portland, OR, 97201"
        );
    }

    #[test]
    fn test_format_without_line2() {
        assert_eq!(address(None).formatted(), "12 Harbour St, Portland, OR, 97201");
    }

    #[test]
    fn test_format_blank_line2_is_skipped() {
        assert_eq!(
            address(Some("  ")).formatted(),
            "12 Harbour St, Portland, OR, 97201"
        );
    }

    #[test]
    fn test_deserialize_null_city() {
        let json = r#"{"line1":"1 A St","city":null,"state":"Y","postal_code":"1"}"#;
        let parsed: ShippingAddress = serde_json::from_str(json).unwrap_or_default();
        assert_eq!(parsed.line1, "1 A St");
        assert_eq!(parsed.city, "");
    }

    #[test]
    fn test_deserialize_stripe_null_line2() {
        let json = r#"{"line1":"1 A St","line2":null,"city":"X","state":"Y","postal_code":"1","country":"US"}"#;
        let parsed: ShippingAddress = serde_json::from_str(json).unwrap_or_default();
        assert_eq!(parsed.line1, "1 A St");
        assert_eq!(parsed.line2, None);
        assert_eq!(parsed.formatted(), "1 A St, X, Y, 1");
    }
}
