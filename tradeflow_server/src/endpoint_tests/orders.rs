use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use serde_json::{json, Value};
use tradeflow_engine::{
    auto_quote::AutoQuoteConfig,
    db_types::{OrderStatus, QuoteStatus, Role},
    traits::QuoteManagement,
    AutoQuoteApi,
    OrderFlowApi,
    SqliteDatabase,
};

use super::helpers::{
    bearer,
    reload,
    seed_order,
    seed_quote,
    send_request,
    setup_db,
    ADMIN_ID,
    CLIENT_ID,
    OTHER_CLIENT_ID,
    SUPPLIER_ID,
};
use crate::routes::{
    AcceptQuoteRoute,
    ChangeOrderStatusRoute,
    OrderTransitionsRoute,
    RegisterPaymentRoute,
    RunAutoQuotesRoute,
};

fn configure(db: SqliteDatabase) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let api_scope = web::scope("/api")
            .service(OrderTransitionsRoute::<SqliteDatabase>::new())
            .service(ChangeOrderStatusRoute::<SqliteDatabase>::new())
            .service(AcceptQuoteRoute::<SqliteDatabase>::new())
            .service(RegisterPaymentRoute::<SqliteDatabase>::new())
            .service(RunAutoQuotesRoute::<SqliteDatabase>::new());
        cfg.app_data(web::Data::new(OrderFlowApi::new(db.clone())))
            .app_data(web::Data::new(AutoQuoteApi::new(db)))
            .app_data(web::Data::new(AutoQuoteConfig::default()))
            .service(api_scope);
    }
}

#[actix_web::test]
async fn transitions_need_a_token() {
    let db = setup_db().await;
    let (order, _) = seed_order(&db).await;
    let req = TestRequest::get().uri(&format!("/api/orders/{}/transitions", order.id.value()));
    let (status, body) = send_request(req, configure(db)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("No bearer token"));
}

#[actix_web::test]
async fn transitions_reject_forged_tokens() {
    let db = setup_db().await;
    let (order, _) = seed_order(&db).await;
    let (name, mut value) = bearer(CLIENT_ID, Role::Client);
    value.replace_range(value.len() - 6.., "AAAAAA");
    let req = TestRequest::get().uri(&format!("/api/orders/{}/transitions", order.id.value())).insert_header((name, value));
    let (status, _) = send_request(req, configure(db)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn transitions_for_the_client() {
    let db = setup_db().await;
    let (order, _) = seed_order(&db).await;
    let req = TestRequest::get()
        .uri(&format!("/api/orders/{}/transitions", order.id.value()))
        .insert_header(bearer(CLIENT_ID, Role::Client));
    let (status, body) = send_request(req, configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], "PENDING_ADMIN_CONFIRMATION");
    assert_eq!(body["allowed"], json!(["CONFIRMED", "PENDING_PAYMENT", "CANCELLED"]));

    // Someone else's order
    let req = TestRequest::get()
        .uri(&format!("/api/orders/{}/transitions", order.id.value()))
        .insert_header(bearer(OTHER_CLIENT_ID, Role::Client));
    let (status, _) = send_request(req, configure(db)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn only_admins_change_status() {
    let db = setup_db().await;
    let (order, _) = seed_order(&db).await;
    let path = format!("/api/orders/{}/status", order.id.value());
    let req = TestRequest::patch()
        .uri(&path)
        .insert_header(bearer(SUPPLIER_ID, Role::Supplier))
        .set_json(json!({ "status": "CONFIRMED" }));
    let (status, _) = send_request(req, configure(db.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let req = TestRequest::patch()
        .uri(&path)
        .insert_header(bearer(CLIENT_ID, Role::Client))
        .set_json(json!({ "status": "CONFIRMED" }));
    let (status, _) = send_request(req, configure(db.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(reload(&db, &order).await.status, OrderStatus::PendingAdminConfirmation);
}

#[actix_web::test]
async fn status_changes_follow_the_state_machine() {
    let db = setup_db().await;
    let (order, _) = seed_order(&db).await;
    let path = format!("/api/orders/{}/status", order.id.value());
    let req = TestRequest::patch()
        .uri(&path)
        .insert_header(bearer(ADMIN_ID, Role::Admin))
        .set_json(json!({ "status": "DELIVERED" }));
    let (status, body) = send_request(req, configure(db.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("cannot move from PENDING_ADMIN_CONFIRMATION to DELIVERED"));
    assert_eq!(reload(&db, &order).await.status, OrderStatus::PendingAdminConfirmation);

    let req = TestRequest::patch()
        .uri(&path)
        .insert_header(bearer(ADMIN_ID, Role::Admin))
        .set_json(json!({ "status": "CONFIRMED" }));
    let (status, body) = send_request(req, configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], "CONFIRMED");

    let req = TestRequest::patch()
        .uri(&path)
        .insert_header(bearer(ADMIN_ID, Role::Admin))
        .set_json(json!({ "status": "NOT_A_STATUS" }));
    let (status, _) = send_request(req, configure(db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn client_accepts_a_quote() {
    let db = setup_db().await;
    let (quote, _) = seed_quote(&db).await;
    let path = format!("/api/quotes/{}/accept", quote.id);
    let req = TestRequest::post().uri(&path).insert_header(bearer(ADMIN_ID, Role::Admin));
    let (status, _) = send_request(req, configure(db.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = TestRequest::post().uri(&path).insert_header(bearer(CLIENT_ID, Role::Client));
    let (status, body) = send_request(req, configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["order"]["status"], "PENDING_ADMIN_CONFIRMATION");
    assert_eq!(body["order"]["amount"], 33000);
    assert_eq!(body["order"]["client_id"], CLIENT_ID);
    let quote = db.fetch_quote(quote.id).await.unwrap().unwrap();
    assert_eq!(quote.status, QuoteStatus::Accepted);

    // A quote can only be accepted once
    let req = TestRequest::post().uri(&path).insert_header(bearer(CLIENT_ID, Role::Client));
    let (status, _) = send_request(req, configure(db)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn payments_are_registered_once_the_order_awaits_payment() {
    let db = setup_db().await;
    let (order, _) = seed_order(&db).await;
    let path = format!("/api/orders/{}/payments", order.id.value());
    let req = TestRequest::post()
        .uri(&path)
        .insert_header(bearer(CLIENT_ID, Role::Client))
        .set_json(json!({ "payment_id": "pay_early" }));
    let (status, _) = send_request(req, configure(db.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = TestRequest::patch()
        .uri(&format!("/api/orders/{}/status", order.id.value()))
        .insert_header(bearer(ADMIN_ID, Role::Admin))
        .set_json(json!({ "status": "PENDING_PAYMENT" }));
    let (status, _) = send_request(req, configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let req = TestRequest::post()
        .uri(&path)
        .insert_header(bearer(CLIENT_ID, Role::Client))
        .set_json(json!({ "payment_id": "pay_on_time" }));
    let (status, body) = send_request(req, configure(db.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["external_payment_id"], "pay_on_time");
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["amount"], 33000);

    let req = TestRequest::post()
        .uri(&path)
        .insert_header(bearer(CLIENT_ID, Role::Client))
        .set_json(json!({ "payment_id": "pay_on_time" }));
    let (status, _) = send_request(req, configure(db)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn auto_quote_runs_are_admin_only() {
    let db = setup_db().await;
    let req = TestRequest::post().uri("/api/auto_quotes/run").insert_header(bearer(CLIENT_ID, Role::Client));
    let (status, _) = send_request(req, configure(db.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Auto-quoting is disabled by default, so the run does nothing
    let req = TestRequest::post().uri("/api/auto_quotes/run").insert_header(bearer(ADMIN_ID, Role::Admin));
    let (status, body) = send_request(req, configure(db)).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body, json!({ "rfqs_processed": 0, "quotes_created": 0, "rfqs_skipped": 0 }));
}
