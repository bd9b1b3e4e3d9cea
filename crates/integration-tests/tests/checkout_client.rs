//! Shipping submission from the checkout client to a live storefront.

#![allow(clippy::unwrap_used)]

use elecommerce_checkout::{
    CheckoutClient, CheckoutError, CheckoutSession, ShippingForm, SubmitOutcome,
};
use elecommerce_core::{AddressId, CartId};
use elecommerce_integration_tests::TestServer;

fn form() -> ShippingForm {
    ShippingForm {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        line1: "1 Main St".into(),
        line2: "Apt 2".into(),
        city: "Springfield".into(),
        state: "IL".into(),
        postal_code: "62701".into(),
        phone: "(555) 123-4567".into(),
        save_shipping: true,
        selected_address: Some(AddressId::new(4)),
    }
}

// =============================================================================
// Guests
// =============================================================================

#[tokio::test]
async fn test_guest_submission_never_saves() {
    let server = TestServer::start().await;
    let (order, cart) = server.seed_checkout(None, 2, "pi_guest");
    let client = CheckoutClient::new(&server.base_url).unwrap();

    let outcome = client
        .submit_shipping(&CheckoutSession::guest(cart.id), &form())
        .await
        .unwrap();

    let SubmitOutcome::Updated(response) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(response.payment_intent_id, "pi_guest");
    assert_eq!(response.client_secret.as_deref(), Some("pi_guest_secret_recorded"));
    assert!(!response.save_shipping);
    assert_eq!(response.last_used_shipping, None);

    let updates = server.gateway.updates();
    assert_eq!(updates.len(), 1);
    let recorded = &updates[0];
    assert_eq!(recorded.payment_intent_id, "pi_guest");
    assert!(recorded.idempotency_key.starts_with(&format!("{}-", cart.id)));
    assert!(!recorded.update.metadata.save_shipping);
    assert_eq!(recorded.update.metadata.last_used_shipping, None);
    assert_eq!(recorded.update.metadata.order_id, Some(order.id));
    assert_eq!(recorded.update.metadata.cart_id, Some(cart.id));
    assert_eq!(recorded.update.shipping.name, "Ada, Lovelace");
    assert_eq!(recorded.update.shipping.phone.as_deref(), Some("5551234567"));
    assert_eq!(recorded.update.shipping.address.line2.as_deref(), Some("Apt 2"));
}

#[tokio::test]
async fn test_identical_resubmission_updates_provider_once() {
    let server = TestServer::start().await;
    let (_, cart) = server.seed_checkout(None, 1, "pi_dedup");
    let client = CheckoutClient::new(&server.base_url).unwrap();
    let session = CheckoutSession::guest(cart.id);

    let first = client.submit_shipping(&session, &form()).await.unwrap();
    let second = client.submit_shipping(&session, &form()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(server.gateway.updates().len(), 1);

    let changed = ShippingForm {
        line1: "9 Elm St".into(),
        ..form()
    };
    client.submit_shipping(&session, &changed).await.unwrap();
    assert_eq!(server.gateway.updates().len(), 2);
}

// =============================================================================
// Logged-in buyers
// =============================================================================

#[tokio::test]
async fn test_logged_in_submission_carries_choices() {
    let server = TestServer::start().await;
    let buyer = server
        .store
        .insert_buyer(Some("cus_ada"), Some("tok_ada"))
        .unwrap();
    let (_, cart) = server.seed_checkout(Some(buyer.id), 1, "pi_ada");
    let client = CheckoutClient::new(&server.base_url).unwrap();

    let outcome = client
        .submit_shipping(&CheckoutSession::logged_in(cart.id, "tok_ada"), &form())
        .await
        .unwrap();

    let SubmitOutcome::Updated(response) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert!(response.save_shipping);
    assert_eq!(response.last_used_shipping.as_deref(), Some("4"));

    let recorded = &server.gateway.updates()[0];
    assert!(recorded.update.metadata.save_shipping);
    assert_eq!(
        recorded.update.metadata.last_used_shipping,
        Some(AddressId::new(4))
    );
}

#[tokio::test]
async fn test_unknown_token_is_unauthorized() {
    let server = TestServer::start().await;
    let (_, cart) = server.seed_checkout(None, 1, "pi_tok");
    let client = CheckoutClient::new(&server.base_url).unwrap();

    let err = client
        .submit_shipping(&CheckoutSession::logged_in(cart.id, "tok_nobody"), &form())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Api { status: 401, .. }));
    assert!(server.gateway.updates().is_empty());
}

#[tokio::test]
async fn test_cart_of_another_buyer_is_forbidden() {
    let server = TestServer::start().await;
    let owner = server.store.insert_buyer(Some("cus_owner"), None).unwrap();
    server
        .store
        .insert_buyer(Some("cus_other"), Some("tok_other"))
        .unwrap();
    let (_, cart) = server.seed_checkout(Some(owner.id), 1, "pi_owned");
    let client = CheckoutClient::new(&server.base_url).unwrap();

    let as_other = client
        .submit_shipping(&CheckoutSession::logged_in(cart.id, "tok_other"), &form())
        .await
        .unwrap_err();
    assert!(matches!(as_other, CheckoutError::Api { status: 403, .. }));

    let as_guest = client
        .submit_shipping(&CheckoutSession::guest(cart.id), &form())
        .await
        .unwrap_err();
    assert!(matches!(as_guest, CheckoutError::Api { status: 403, .. }));
}

#[tokio::test]
async fn test_expired_session_is_skipped() {
    let server = TestServer::start().await;
    let (_, cart) = server.seed_checkout(None, 1, "pi_expired");
    let client = CheckoutClient::new(&server.base_url).unwrap();

    let outcome = client
        .submit_shipping(&CheckoutSession::expired(cart.id), &form())
        .await
        .unwrap();

    assert_eq!(outcome, SubmitOutcome::Skipped);
    assert!(server.gateway.updates().is_empty());
}

// =============================================================================
// Empty carts
// =============================================================================

#[tokio::test]
async fn test_empty_and_missing_carts() {
    let server = TestServer::start().await;
    let (_, empty) = server.seed_checkout(None, 0, "pi_empty");
    let client = CheckoutClient::new(&server.base_url).unwrap();

    let outcome = client
        .submit_shipping(&CheckoutSession::guest(empty.id), &form())
        .await
        .unwrap();
    assert_eq!(outcome, SubmitOutcome::CartEmpty);

    let outcome = client
        .submit_shipping(&CheckoutSession::guest(CartId::new(9_999)), &form())
        .await
        .unwrap();
    assert_eq!(outcome, SubmitOutcome::CartEmpty);

    assert!(server.gateway.updates().is_empty());
}
