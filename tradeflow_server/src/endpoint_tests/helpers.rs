use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::{Duration, Utc};
use log::debug;
use tradeflow_engine::{
    db_types::{
        Money,
        NewProduct,
        NewQuote,
        NewQuoteItem,
        NewRfq,
        NewRfqItem,
        Order,
        OrderStatus,
        Product,
        Quote,
        QuoteStatus,
        QuoteType,
        Role,
    },
    test_utils::{prepare_test_env, random_db_path},
    traits::{CatalogManagement, OrderManagement, QuoteManagement},
    SqliteDatabase,
};

use crate::{
    auth::{JwtClaims, TokenIssuer, TokenVerifier},
    config::{AuthConfig, ServerOptions},
};

pub const CLIENT_ID: i64 = 100;
pub const OTHER_CLIENT_ID: i64 = 101;
pub const SUPPLIER_ID: i64 = 200;
pub const ADMIN_ID: i64 = 1;

// Signs the tokens used in these tests. DO NOT re-use this secret anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig::new("endpoint-tests-only-8b1f0c52e1")
}

pub fn issue_token(user_id: i64, role: Role) -> String {
    let claims = JwtClaims { sub: user_id, role, exp: (Utc::now() + Duration::days(1)).timestamp() as u64 };
    TokenIssuer::new(&get_auth_config()).issue_token(&claims).expect("Failed to sign token")
}

pub fn bearer(user_id: i64, role: Role) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", issue_token(user_id, role)))
}

/// Sends `req` to an app built by `configure` and returns the status code and body. Errors raised by middleware are
/// rendered the same way the server would render them.
pub async fn send_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new()
        .app_data(web::Data::new(TokenVerifier::new(&get_auth_config())))
        .app_data(web::Data::new(ServerOptions::default()))
        .configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = res.into_body().try_into_bytes().unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

pub async fn setup_db() -> SqliteDatabase {
    prepare_test_env(&random_db_path()).await
}

pub async fn seed_product(db: &SqliteDatabase) -> Product {
    let product = NewProduct::new("Widget", SUPPLIER_ID, Money::from(10_000)).with_category("hardware").with_stock(50);
    db.insert_product(product).await.expect("Error inserting product")
}

/// An RFQ for 3 widgets, with a custom quote that has been sent to the client.
pub async fn seed_quote(db: &SqliteDatabase) -> (Quote, Product) {
    let widget = seed_product(db).await;
    let rfq = NewRfq {
        client_id: CLIENT_ID,
        items: vec![NewRfqItem::new(widget.id, 3)],
        created_at: Some(Utc::now() - Duration::minutes(5)),
    };
    let rfq = db.insert_rfq(rfq).await.expect("Error inserting RFQ");
    let quote = NewQuote {
        rfq_id: rfq.id,
        supplier_id: SUPPLIER_ID,
        supplier_price: Money::from(30_000),
        margin_percent: 10.0,
        final_price: Money::from(33_000),
        lead_time: "3 days".into(),
        quote_type: QuoteType::Custom,
        status: QuoteStatus::SentToClient,
        items: vec![NewQuoteItem {
            product_id: widget.id,
            quantity: 3,
            supplier_unit_price: Money::from(10_000),
            margin_percent: 10.0,
            unit_price: Money::from(11_000),
            line_total: Money::from(33_000),
            is_alternative: false,
        }],
    };
    let quote = db.insert_quote(quote).await.expect("Error inserting quote");
    (quote, widget)
}

/// An accepted quote. The order is in `PENDING_ADMIN_CONFIRMATION`.
pub async fn seed_order(db: &SqliteDatabase) -> (Order, Product) {
    let (quote, widget) = seed_quote(db).await;
    let accepted = db.accept_quote(quote.id, CLIENT_ID).await.expect("Error accepting quote");
    (accepted.order, widget)
}

pub async fn seed_order_awaiting_payment(db: &SqliteDatabase) -> Order {
    let (order, _) = seed_order(db).await;
    db.update_order_status(order.id, OrderStatus::PendingAdminConfirmation, OrderStatus::PendingPayment)
        .await
        .expect("Error moving order to PENDING_PAYMENT")
}

pub async fn reload(db: &SqliteDatabase, order: &Order) -> Order {
    db.fetch_order(order.id).await.expect("Error fetching order").expect("Order missing")
}
