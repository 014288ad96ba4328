use actix_web::{test, web, App};
use async_trait::async_trait;
use chrono::{Months, Utc};
use mockall::mock;
use prepcore_server::checkout::webhook::sign_payload;
use prepcore_server::checkout::{CheckoutRequest, HostedCheckout, PaymentProvider, WebhookAck};
use prepcore_server::error::{AppError, CheckoutError};
use prepcore_server::{configure_routes, AppState, MemoryStore, UserStore};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

mod common;
use common::{seed_user, test_settings};

mock! {
    pub Provider {}

    #[async_trait]
    impl PaymentProvider for Provider {
        async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<HostedCheckout, CheckoutError>;
    }
}

const WEBHOOK_SECRET: &str = "whsec_test_secret";

fn state_with(provider: MockProvider) -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (AppState::from_parts(test_settings(), store.clone(), Arc::new(provider)), store)
}

fn completed_event(user_id: &str, package: &str, price: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": "evt_123",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_test_1",
            "metadata": { "userId": user_id, "packageName": package, "packagePrice": price }
        }}
    }))
    .unwrap()
}

#[tokio::test]
async fn test_one_year_checkout() {
    let mut provider = MockProvider::new();
    provider
        .expect_create_checkout_session()
        .withf(|req| {
            req.package_name == "1 Year"
                && req.package_price == 15
                && req.unit_amount == 1500
                && req.currency == "usd"
                && req.product_name == "1 Year Package"
                && req.description.contains("entire year")
                && req.success_url == "http://localhost:5173/payment-completed?packageName=1+Year"
                && req.cancel_url == "http://localhost:5173/payment-cancelled"
        })
        .times(1)
        .returning(|_| {
            Ok(HostedCheckout {
                id: "cs_test_1".into(),
                url: Some("https://checkout.stripe.com/c/pay/cs_test_1".into()),
            })
        });
    let (state, _) = state_with(provider);

    let user_id = Uuid::new_v4();
    let link = state.checkout.create_checkout_session("1 Year", user_id).await.unwrap();
    assert_eq!(link.url, "https://checkout.stripe.com/c/pay/cs_test_1");
    assert_eq!(link.package.price, 15);
    assert!(link.package.description.starts_with("This package lasts for an entire year"));
}

#[tokio::test]
async fn test_unknown_package_never_reaches_provider() {
    let mut provider = MockProvider::new();
    provider.expect_create_checkout_session().never();
    let (state, _) = state_with(provider);

    let err = state
        .checkout
        .create_checkout_session("bogus", Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CheckoutError(CheckoutError::UnknownPackage(_))));
}

#[tokio::test]
async fn test_missing_redirect_url_is_provider_error() {
    let mut provider = MockProvider::new();
    provider
        .expect_create_checkout_session()
        .returning(|_| Ok(HostedCheckout { id: "cs_test_2".into(), url: None }));
    let (state, _) = state_with(provider);

    let err = state
        .checkout
        .create_checkout_session("1 Month", Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CheckoutError(CheckoutError::PaymentProviderError(_))));
}

#[tokio::test]
async fn test_invalid_signature_never_mutates() {
    let (state, store) = state_with(MockProvider::new());
    let user_id = seed_user(&store, "buyer@example.com", 0).await;
    let body = completed_event(&user_id.to_string(), "1 Year", "15");

    let forged = sign_payload(&body, "whsec_wrong", Utc::now().timestamp());
    let err = state.checkout.handle_webhook(&body, Some(&forged)).unwrap_err();
    assert!(matches!(err, AppError::CheckoutError(CheckoutError::InvalidWebhookSignature(_))));

    let err = state.checkout.handle_webhook(&body, None).unwrap_err();
    assert!(matches!(err, AppError::CheckoutError(CheckoutError::InvalidWebhookSignature(_))));

    tokio::task::yield_now().await;
    let stored = store.get_user_by_id(user_id).await.unwrap().unwrap();
    assert!(!stored.is_premium);
    assert!(stored.package_name.is_none());
}

#[tokio::test]
async fn test_four_month_webhook_sets_exact_expiry() {
    let (state, store) = state_with(MockProvider::new());
    let user_id = seed_user(&store, "buyer@example.com", 0).await;
    let body = completed_event(&user_id.to_string(), "4 Months", "10");
    let now = Utc::now();
    let signature = sign_payload(&body, WEBHOOK_SECRET, now.timestamp());

    let ack = state
        .checkout
        .handle_webhook_at(&body, Some(&signature), now)
        .unwrap();
    match ack {
        WebhookAck::Scheduled(handle) => handle.await.unwrap(),
        other => panic!("expected scheduled update, got {:?}", other),
    }

    let stored = store.get_user_by_id(user_id).await.unwrap().unwrap();
    assert!(stored.is_premium);
    assert_eq!(stored.package_name.as_deref(), Some("4 Months"));
    assert_eq!(stored.package_price, Some(10));
    let purchase_at = stored.purchase_at.unwrap();
    assert_eq!(stored.expires_at.unwrap(), purchase_at.checked_add_months(Months::new(4)).unwrap());
}

#[tokio::test]
async fn test_other_event_types_are_ignored() {
    let (state, store) = state_with(MockProvider::new());
    let user_id = seed_user(&store, "buyer@example.com", 0).await;
    let body = serde_json::to_vec(&json!({
        "id": "evt_456",
        "type": "payment_intent.created",
        "data": { "object": { "metadata": { "userId": user_id.to_string() } } }
    }))
    .unwrap();
    let signature = sign_payload(&body, WEBHOOK_SECRET, Utc::now().timestamp());

    let ack = state.checkout.handle_webhook(&body, Some(&signature)).unwrap();
    assert!(matches!(ack, WebhookAck::Ignored { ref event_type } if event_type == "payment_intent.created"));
    assert!(!store.get_user_by_id(user_id).await.unwrap().unwrap().is_premium);
}

#[tokio::test]
async fn test_failed_upgrade_is_dead_lettered() {
    let (state, _) = state_with(MockProvider::new());
    let body = completed_event(&Uuid::new_v4().to_string(), "1 Month", "5");
    let signature = sign_payload(&body, WEBHOOK_SECRET, Utc::now().timestamp());

    match state.checkout.handle_webhook(&body, Some(&signature)).unwrap() {
        WebhookAck::Scheduled(handle) => handle.await.unwrap(),
        other => panic!("expected scheduled update, got {:?}", other),
    }

    let entries = state.checkout.dead_letters().entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].event_id.as_deref(), Some("evt_123"));
    assert_eq!(entries[0].reason, "user not found");
}

#[actix_web::test]
async fn test_webhook_endpoint() {
    let (state, store) = state_with(MockProvider::new());
    let user_id = seed_user(&store, "buyer@example.com", 0).await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure_routes)
    ).await;

    let body = completed_event(&user_id.to_string(), "1 Month", "5");

    let rejected = test::TestRequest::post()
        .uri("/stripe-checkout-webhook")
        .insert_header(("Stripe-Signature", "t=1,v1=deadbeef"))
        .set_payload(body.clone())
        .send_request(&app)
        .await;
    assert_eq!(rejected.status(), 400);

    let signature = sign_payload(&body, WEBHOOK_SECRET, Utc::now().timestamp());
    let accepted = test::TestRequest::post()
        .uri("/stripe-checkout-webhook")
        .insert_header(("Stripe-Signature", signature))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body)
        .send_request(&app)
        .await;
    assert_eq!(accepted.status(), 200);
    let text = test::read_body(accepted).await;
    assert_eq!(&text[..], b"Event received");

    // The upgrade runs detached; give it a moment to land.
    let mut upgraded = false;
    for _ in 0..50 {
        if store.get_user_by_id(user_id).await.unwrap().unwrap().is_premium {
            upgraded = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(upgraded);
}

#[actix_web::test]
async fn test_checkout_endpoint_requires_session() {
    let mut provider = MockProvider::new();
    provider.expect_create_checkout_session().never();
    let (state, _) = state_with(provider);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure_routes)
    ).await;

    let resp = test::TestRequest::post()
        .uri("/create-checkout-session")
        .set_json(json!({ "packageName": "1 Year" }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn test_checkout_endpoint_with_session() {
    let mut provider = MockProvider::new();
    provider
        .expect_create_checkout_session()
        .times(1)
        .returning(|_| {
            Ok(HostedCheckout {
                id: "cs_test_3".into(),
                url: Some("https://checkout.stripe.com/c/pay/cs_test_3".into()),
            })
        });
    let (state, _) = state_with(provider);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure_routes)
    ).await;

    let register = test::TestRequest::post()
        .uri("/create-user")
        .set_json(json!({ "name": "Buyer", "email": "b@example.com", "password": "pw" }))
        .send_request(&app)
        .await;
    let cookie = common::session_cookie(&register).unwrap();

    let bogus = test::TestRequest::post()
        .uri("/create-checkout-session")
        .cookie(cookie.clone())
        .set_json(json!({ "packageName": "bogus" }))
        .send_request(&app)
        .await;
    assert_eq!(bogus.status(), 400);

    let resp = test::TestRequest::post()
        .uri("/create-checkout-session")
        .cookie(cookie)
        .set_json(json!({ "packageName": "1 Year" }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["url"], "https://checkout.stripe.com/c/pay/cs_test_3");
}
