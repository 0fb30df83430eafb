use chrono::{Duration, Utc};
use futures_util::future::join;
use tradeflow_engine::{
    auto_quote::AutoQuoteConfig,
    db_types::{Availability, Money, NewProduct, NewRfq, NewRfqItem, QuoteStatus, QuoteType, Rfq, RfqStatus},
    traits::{CatalogManagement, QuoteManagement},
    AutoQuoteApi,
    SqliteDatabase,
};

mod support;
use support::*;

fn config() -> AutoQuoteConfig {
    AutoQuoteConfig { enabled: true, delay_minutes: 30, include_limited_stock: false, lead_time_days: Some(5) }
}

async fn open_rfq(db: &SqliteDatabase, items: Vec<NewRfqItem>, age: Duration) -> Rfq {
    let rfq = NewRfq { client_id: CLIENT_ID, items, created_at: Some(Utc::now() - age) };
    db.insert_rfq(rfq).await.expect("Error inserting RFQ")
}

async fn fetch_rfq(db: &SqliteDatabase, rfq: &Rfq) -> Rfq {
    db.fetch_rfq(rfq.id).await.unwrap().expect("RFQ missing")
}

#[tokio::test]
async fn due_rfqs_are_quoted_once() {
    let db = setup().await;
    let (widget, gadget) = seed_products(&db).await;
    db.set_margin(None, 10.0).await.unwrap();
    db.set_margin(Some("hardware"), 15.0).await.unwrap();
    let due = open_rfq(&db, vec![NewRfqItem::new(widget.id, 5), NewRfqItem::new(gadget.id, 2)], Duration::hours(2)).await;
    let fresh = open_rfq(&db, vec![NewRfqItem::new(widget.id, 1)], Duration::minutes(5)).await;

    let api = AutoQuoteApi::new(db.clone());
    let summary = api.run(&config(), Utc::now()).await.unwrap();
    assert_eq!(summary.rfqs_processed, 1);
    assert_eq!(summary.quotes_created, 1);
    assert_eq!(summary.rfqs_skipped, 0);

    let quotes = db.quotes_for_rfq(due.id).await.unwrap();
    assert_eq!(quotes.len(), 1);
    let quote = &quotes[0];
    assert_eq!(quote.quote_type, QuoteType::Auto);
    assert_eq!(quote.status, QuoteStatus::SentToClient);
    assert_eq!(quote.supplier_id, SUPPLIER_ID);
    assert_eq!(quote.lead_time, "5 days");
    assert_eq!(quote.margin_percent, 15.0);
    assert_eq!(quote.supplier_price, Money::from(60_000));
    // 5 × 115.00 + 2 × 57.50
    assert_eq!(quote.final_price, Money::from(69_000));
    assert_eq!(quote.items.len(), 2);
    assert_eq!(quote.items[0].unit_price, Money::from(11_500));

    let due = fetch_rfq(&db, &due).await;
    assert_eq!(due.status, RfqStatus::Quoted);
    assert!(due.auto_quote_triggered);
    let fresh = fetch_rfq(&db, &fresh).await;
    assert_eq!(fresh.status, RfqStatus::Open);
    assert!(!fresh.auto_quote_triggered);

    let summary = api.run(&config(), Utc::now()).await.unwrap();
    assert_eq!(summary.rfqs_processed, 0);
    assert_eq!(db.quotes_for_rfq(due.id).await.unwrap().len(), 1);

    // An hour later the fresh RFQ is due too
    let summary = api.run(&config(), Utc::now() + Duration::hours(1)).await.unwrap();
    assert_eq!(summary.rfqs_processed, 1);
    assert_eq!(db.quotes_for_rfq(fresh.id).await.unwrap().len(), 1);
    tear_down(db).await;
}

#[tokio::test]
async fn concurrent_runs_do_not_double_quote() {
    let db = setup().await;
    let (widget, _) = seed_products(&db).await;
    db.set_margin(None, 10.0).await.unwrap();
    let rfq = open_rfq(&db, vec![NewRfqItem::new(widget.id, 3)], Duration::hours(1)).await;
    let first = AutoQuoteApi::new(db.clone());
    let second = AutoQuoteApi::new(db.clone());
    let config = config();
    let now = Utc::now();
    let (a, b) = join(first.run(&config, now), second.run(&config, now)).await;
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.rfqs_processed + b.rfqs_processed, 1);
    assert_eq!(a.quotes_created + b.quotes_created, 1);
    assert_eq!(db.quotes_for_rfq(rfq.id).await.unwrap().len(), 1);
    tear_down(db).await;
}

#[tokio::test]
async fn unquotable_rfqs_are_still_marked() {
    let db = setup().await;
    let sold_out = NewProduct::new("Sold out", SUPPLIER_ID, Money::from(1_000)).with_availability(Availability::OutOfStock);
    let sold_out = db.insert_product(sold_out).await.unwrap();
    let rfq = open_rfq(&db, vec![NewRfqItem::new(sold_out.id, 1)], Duration::hours(1)).await;
    let api = AutoQuoteApi::new(db.clone());
    let summary = api.run(&config(), Utc::now()).await.unwrap();
    assert_eq!(summary.rfqs_processed, 1);
    assert_eq!(summary.quotes_created, 0);
    let rfq = fetch_rfq(&db, &rfq).await;
    assert!(rfq.auto_quote_triggered);
    assert_eq!(rfq.status, RfqStatus::Open);
    assert!(db.quotes_for_rfq(rfq.id).await.unwrap().is_empty());
    tear_down(db).await;
}

#[tokio::test]
async fn disabled_runs_do_nothing() {
    let db = setup().await;
    let (widget, _) = seed_products(&db).await;
    let rfq = open_rfq(&db, vec![NewRfqItem::new(widget.id, 1)], Duration::days(1)).await;
    let api = AutoQuoteApi::new(db.clone());
    let config = AutoQuoteConfig { enabled: false, ..config() };
    let summary = api.run(&config, Utc::now()).await.unwrap();
    assert_eq!(summary, Default::default());
    assert!(!fetch_rfq(&db, &rfq).await.auto_quote_triggered);
    tear_down(db).await;
}
