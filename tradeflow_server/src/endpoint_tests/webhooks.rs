use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use serde_json::{json, Value};
use tf_common::Secret;
use tradeflow_engine::{
    db_types::{Money, NewPayment, Order, OrderStatus, PaymentStatus, Role},
    events::EventProducers,
    traits::PaymentManagement,
    GatewayError,
    GatewayPaymentUpdate,
    PaymentWebhookApi,
    SqliteDatabase,
};

use super::{
    helpers::{bearer, reload, seed_order_awaiting_payment, send_request, setup_db, ADMIN_ID, CLIENT_ID, OTHER_CLIENT_ID},
    mocks::MockGateway,
};
use crate::{
    helpers::calculate_hmac,
    middleware::{HmacMiddlewareFactory, MOYASAR_SIGNATURE_HEADER},
    routes::PaymentWebhookRoute,
};

const WEBHOOK_SECRET: &str = "whsec_endpoint_tests";
const PAYMENT_ID: &str = "pay_7f3a";

fn configure(db: SqliteDatabase, gateway: MockGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let api = PaymentWebhookApi::new(db, gateway, EventProducers::default());
        let scope = web::scope("/webhooks")
            .wrap(HmacMiddlewareFactory::new(MOYASAR_SIGNATURE_HEADER, Secret::new(WEBHOOK_SECRET.to_string())))
            .service(PaymentWebhookRoute::<SqliteDatabase, MockGateway>::new());
        cfg.app_data(web::Data::new(api)).service(scope);
    }
}

/// A gateway that must not be called.
fn silent_gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_fetch_payment().never();
    gateway
}

async fn order_with_payment(db: &SqliteDatabase) -> Order {
    let order = seed_order_awaiting_payment(db).await;
    db.insert_payment(NewPayment::new(order.id, PAYMENT_ID, order.amount)).await.expect("Error registering payment");
    order
}

fn paid_event(payment_id: &str) -> String {
    json!({
        "id": "evt_1",
        "type": "payment_paid",
        "data": { "id": payment_id, "status": "paid", "amount": 33000, "currency": "SAR" }
    })
    .to_string()
}

fn push(body: &str, signature: &str) -> TestRequest {
    TestRequest::post()
        .uri("/webhooks/payments")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((MOYASAR_SIGNATURE_HEADER, signature.to_string()))
        .set_payload(body.to_string())
}

fn sync_request(payment_id: &str) -> TestRequest {
    TestRequest::post().uri("/webhooks/payments").set_json(json!({ "payment_id": payment_id }))
}

async fn payment_status(db: &SqliteDatabase) -> PaymentStatus {
    db.fetch_payment_by_external_id(PAYMENT_ID).await.unwrap().unwrap().status
}

#[actix_web::test]
async fn signed_push_confirms_the_order() {
    let db = setup_db().await;
    let order = order_with_payment(&db).await;
    let body = paid_event(PAYMENT_ID);
    let signature = calculate_hmac(WEBHOOK_SECRET, body.as_bytes());
    let (status, res) = send_request(push(&body, &signature), configure(db.clone(), silent_gateway())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res, r#"{"success":true,"source":"webhook"}"#);
    assert_eq!(payment_status(&db).await, PaymentStatus::Paid);
    let order = reload(&db, &order).await;
    assert_eq!(order.status, OrderStatus::PaymentConfirmed);
    assert_eq!(order.payment_reference.as_deref(), Some(PAYMENT_ID));

    // The gateway delivers the same event again
    let (status, res) = send_request(push(&body, &signature), configure(db.clone(), silent_gateway())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(res, r#"{"success":true,"source":"webhook"}"#);
    assert_eq!(reload(&db, &order).await.updated_at, order.updated_at);
}

#[actix_web::test]
async fn bad_signature_is_unauthorized() {
    let db = setup_db().await;
    let order = order_with_payment(&db).await;
    let body = paid_event(PAYMENT_ID);
    let signature = calculate_hmac("not-the-secret", body.as_bytes());
    let (status, res) = send_request(push(&body, &signature), configure(db.clone(), silent_gateway())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let res: Value = serde_json::from_str(&res).unwrap();
    assert_eq!(res["success"], false);
    assert_eq!(payment_status(&db).await, PaymentStatus::Pending);
    assert_eq!(reload(&db, &order).await.status, OrderStatus::PendingPayment);
}

#[actix_web::test]
async fn signed_body_cannot_be_swapped() {
    let db = setup_db().await;
    order_with_payment(&db).await;
    let signature = calculate_hmac(WEBHOOK_SECRET, paid_event("pay_other").as_bytes());
    let (status, _) =
        send_request(push(&paid_event(PAYMENT_ID), &signature), configure(db.clone(), silent_gateway())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(payment_status(&db).await, PaymentStatus::Pending);
}

#[actix_web::test]
async fn push_for_unknown_payment_fails() {
    let db = setup_db().await;
    let body = paid_event("pay_nobody_registered");
    let signature = calculate_hmac(WEBHOOK_SECRET, body.as_bytes());
    let (status, res) = send_request(push(&body, &signature), configure(db, silent_gateway())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let res: Value = serde_json::from_str(&res).unwrap();
    assert_eq!(res["success"], false);
    assert!(res["error"].as_str().unwrap().contains("pay_nobody_registered"));
}

#[actix_web::test]
async fn sync_needs_a_bearer_token() {
    let db = setup_db().await;
    order_with_payment(&db).await;
    let (status, res) = send_request(sync_request(PAYMENT_ID), configure(db, silent_gateway())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let res: Value = serde_json::from_str(&res).unwrap();
    assert_eq!(res["success"], false);
}

#[actix_web::test]
async fn clients_cannot_sync_other_clients_payments() {
    let db = setup_db().await;
    order_with_payment(&db).await;
    let req = sync_request(PAYMENT_ID).insert_header(bearer(OTHER_CLIENT_ID, Role::Client));
    let (status, _) = send_request(req, configure(db.clone(), silent_gateway())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let req = sync_request(PAYMENT_ID).insert_header(bearer(OTHER_CLIENT_ID, Role::Supplier));
    let (status, _) = send_request(req, configure(db.clone(), silent_gateway())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(payment_status(&db).await, PaymentStatus::Pending);
}

#[actix_web::test]
async fn gateway_outage_is_reported() {
    let db = setup_db().await;
    let order = order_with_payment(&db).await;
    let mut gateway = MockGateway::new();
    gateway.expect_fetch_payment().times(1).returning(|_| Err(GatewayError::Unavailable("connection reset".into())));
    let req = sync_request(PAYMENT_ID).insert_header(bearer(ADMIN_ID, Role::Admin));
    let (status, res) = send_request(req, configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let res: Value = serde_json::from_str(&res).unwrap();
    assert_eq!(res["success"], false);
    assert_eq!(reload(&db, &order).await.status, OrderStatus::PendingPayment);
}

#[actix_web::test]
async fn owner_sync_applies_the_gateway_state() {
    let db = setup_db().await;
    let order = order_with_payment(&db).await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_fetch_payment()
        .withf(|id: &str| id == PAYMENT_ID)
        .times(1)
        .returning(|id| {
            let mut update = GatewayPaymentUpdate::new(id, "paid");
            update.amount = Some(Money::from(33_000));
            Ok(update)
        });
    let req = TestRequest::post()
        .uri("/webhooks/payments")
        .insert_header(bearer(CLIENT_ID, Role::Client))
        .set_json(json!({ "id": PAYMENT_ID }));
    let (status, res) = send_request(req, configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::OK);
    let res: Value = serde_json::from_str(&res).unwrap();
    assert_eq!(res["success"], true);
    assert_eq!(res["source"], "sync");
    assert_eq!(res["payment"]["external_payment_id"], PAYMENT_ID);
    assert_eq!(res["payment"]["status"], "PAID");
    assert_eq!(reload(&db, &order).await.status, OrderStatus::PaymentConfirmed);
}

#[actix_web::test]
async fn sync_by_payment_id_body() {
    let db = setup_db().await;
    let order = order_with_payment(&db).await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_fetch_payment()
        .withf(|id: &str| id == PAYMENT_ID)
        .times(1)
        .returning(|id| Ok(GatewayPaymentUpdate::new(id, "paid")));
    let req = TestRequest::post()
        .uri("/webhooks/payments")
        .insert_header(bearer(CLIENT_ID, Role::Client))
        .set_json(json!({ "mode": "sync_by_payment_id", "paymentId": PAYMENT_ID }));
    let (status, res) = send_request(req, configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::OK);
    let res: Value = serde_json::from_str(&res).unwrap();
    assert_eq!(res["success"], true);
    assert_eq!(res["source"], "sync");
    assert_eq!(res["payment"]["external_payment_id"], PAYMENT_ID);
    assert_eq!(payment_status(&db).await, PaymentStatus::Paid);
    assert_eq!(reload(&db, &order).await.status, OrderStatus::PaymentConfirmed);
}

#[actix_web::test]
async fn unknown_webhook_mode_is_rejected() {
    let db = setup_db().await;
    let order = order_with_payment(&db).await;
    let req = TestRequest::post()
        .uri("/webhooks/payments")
        .insert_header(bearer(CLIENT_ID, Role::Client))
        .set_json(json!({ "mode": "refund_by_payment_id", "paymentId": PAYMENT_ID }));
    let (status, res) = send_request(req, configure(db.clone(), silent_gateway())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(res.contains("Unsupported webhook mode 'refund_by_payment_id'"));
    assert_eq!(payment_status(&db).await, PaymentStatus::Pending);
    assert_eq!(reload(&db, &order).await.status, OrderStatus::PendingPayment);
}
