#![allow(dead_code)]
//! Fixtures shared by the integration tests.
use chrono::{Duration, Utc};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tradeflow_engine::{
    db_types::{
        Actor,
        Availability,
        Money,
        NewProduct,
        NewQuote,
        NewQuoteItem,
        NewRfq,
        NewRfqItem,
        Order,
        Product,
        QuoteStatus,
        QuoteType,
    },
    test_utils::{prepare_test_env, random_db_path},
    traits::{CatalogManagement, OrderManagement, QuoteManagement},
    SqliteDatabase,
};

pub const CLIENT_ID: i64 = 100;
pub const SUPPLIER_ID: i64 = 200;
pub const ADMIN_ID: i64 = 1;

pub fn client() -> Actor {
    Actor::client(CLIENT_ID).with_ip("192.168.1.20")
}

pub fn admin() -> Actor {
    Actor::admin(ADMIN_ID)
}

pub async fn setup() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await
}

pub async fn tear_down(mut db: SqliteDatabase) {
    let url = db.url().to_string();
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    let _ = Sqlite::drop_database(&url).await;
}

/// Two stocked products from the same supplier.
pub async fn seed_products(db: &SqliteDatabase) -> (Product, Product) {
    let widget = NewProduct::new("Widget", SUPPLIER_ID, Money::from(10_000)).with_category("hardware").with_stock(50);
    let gadget = NewProduct::new("Gadget", SUPPLIER_ID, Money::from(5_000))
        .with_category("hardware")
        .with_availability(Availability::InStock)
        .with_stock(20);
    let widget = db.insert_product(widget).await.expect("Error inserting product");
    let gadget = db.insert_product(gadget).await.expect("Error inserting product");
    (widget, gadget)
}

/// Creates an RFQ for 5 widgets and 2 gadgets, a custom quote for it, and accepts the quote on behalf of the
/// client. Returns the new order (in `PENDING_ADMIN_CONFIRMATION`) and the two products.
pub async fn seed_order(db: &SqliteDatabase) -> (Order, Product, Product) {
    let (widget, gadget) = seed_products(db).await;
    let rfq = NewRfq {
        client_id: CLIENT_ID,
        items: vec![NewRfqItem::new(widget.id, 5), NewRfqItem::new(gadget.id, 2)],
        created_at: Some(Utc::now() - Duration::hours(1)),
    };
    let rfq = db.insert_rfq(rfq).await.expect("Error inserting RFQ");
    let items = vec![
        NewQuoteItem {
            product_id: widget.id,
            quantity: 5,
            supplier_unit_price: Money::from(10_000),
            margin_percent: 10.0,
            unit_price: Money::from(11_000),
            line_total: Money::from(55_000),
            is_alternative: false,
        },
        NewQuoteItem {
            product_id: gadget.id,
            quantity: 2,
            supplier_unit_price: Money::from(5_000),
            margin_percent: 10.0,
            unit_price: Money::from(5_500),
            line_total: Money::from(11_000),
            is_alternative: false,
        },
    ];
    let quote = NewQuote {
        rfq_id: rfq.id,
        supplier_id: SUPPLIER_ID,
        supplier_price: Money::from(60_000),
        margin_percent: 10.0,
        final_price: Money::from(66_000),
        lead_time: "3 days".into(),
        quote_type: QuoteType::Custom,
        status: QuoteStatus::SentToClient,
        items,
    };
    let quote = db.insert_quote(quote).await.expect("Error inserting quote");
    let accepted = db.accept_quote(quote.id, CLIENT_ID).await.expect("Error accepting quote");
    (accepted.order, widget, gadget)
}

pub async fn stock_of(db: &SqliteDatabase, product_id: i64) -> Option<i64> {
    db.fetch_product(product_id).await.expect("Error fetching product").expect("Product missing").stock
}

pub async fn reload(db: &SqliteDatabase, order: &Order) -> Order {
    db.fetch_order(order.id).await.expect("Error fetching order").expect("Order missing")
}
