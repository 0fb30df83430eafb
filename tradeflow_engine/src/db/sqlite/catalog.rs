use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db::traits::{StockDecrement, StoreError},
    db_types::{LineItem, MarginSetting, NewProduct, NewRfq, Product, Rfq, RfqItem, RfqStatus},
};

const PRODUCT_COLUMNS: &str = "id, name, supplier_id, category, supplier_price, availability, stock";
const RFQ_COLUMNS: &str = "id, client_id, status, auto_quote_triggered, created_at";

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, StoreError> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "INSERT INTO products (name, supplier_id, category, supplier_price, availability, stock) VALUES ($1, $2, $3, \
         $4, $5, $6) RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(product.name)
    .bind(product.supplier_id)
    .bind(product.category)
    .bind(product.supplier_price)
    .bind(product.availability.as_str().to_string())
    .bind(product.stock)
    .fetch_one(conn)
    .await?;
    Ok(product)
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, StoreError> {
    let product = sqlx::query_as::<_, Product>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
        .bind(product_id)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

pub async fn fetch_products(conn: &mut SqliteConnection) -> Result<Vec<Product>, StoreError> {
    let products = sqlx::query_as::<_, Product>(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id"))
        .fetch_all(conn)
        .await?;
    Ok(products)
}

/// Takes the given quantities out of stock. Stock never goes below zero, and products without a tracked stock level
/// are left alone.
pub async fn decrement_stock(
    items: &[LineItem],
    conn: &mut SqliteConnection,
) -> Result<Vec<StockDecrement>, StoreError> {
    let mut decrements = Vec::with_capacity(items.len());
    for item in items {
        let result = sqlx::query(
            "UPDATE products SET stock = MAX(stock - $1, 0), updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND stock \
             IS NOT NULL",
        )
        .bind(item.quantity)
        .bind(item.product_id)
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() == 0 {
            debug!("🗃️ Product {} has no tracked stock. Nothing to decrement.", item.product_id);
            continue;
        }
        trace!("🗃️ Took {} of product {} out of stock", item.quantity, item.product_id);
        decrements.push(StockDecrement { product_id: item.product_id, quantity: item.quantity });
    }
    Ok(decrements)
}

pub async fn set_margin(
    category: Option<&str>,
    margin_percent: f64,
    conn: &mut SqliteConnection,
) -> Result<MarginSetting, StoreError> {
    let updated = sqlx::query_as::<_, MarginSetting>(
        "UPDATE margin_settings SET margin_percent = $1, updated_at = CURRENT_TIMESTAMP WHERE category IS $2 \
         RETURNING id, category, margin_percent",
    )
    .bind(margin_percent)
    .bind(category)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(setting) = updated {
        return Ok(setting);
    }
    let setting = sqlx::query_as::<_, MarginSetting>(
        "INSERT INTO margin_settings (category, margin_percent) VALUES ($1, $2) RETURNING id, category, \
         margin_percent",
    )
    .bind(category)
    .bind(margin_percent)
    .fetch_one(conn)
    .await?;
    Ok(setting)
}

pub async fn fetch_margin_settings(conn: &mut SqliteConnection) -> Result<Vec<MarginSetting>, StoreError> {
    let settings =
        sqlx::query_as::<_, MarginSetting>("SELECT id, category, margin_percent FROM margin_settings ORDER BY id")
            .fetch_all(conn)
            .await?;
    Ok(settings)
}

/// Inserts an RFQ and its items. This is not atomic. Run it inside a transaction and pass `&mut *tx` as the connection.
pub async fn insert_rfq(rfq: NewRfq, conn: &mut SqliteConnection) -> Result<Rfq, StoreError> {
    let created_at = rfq.created_at.unwrap_or_else(Utc::now);
    let mut record = sqlx::query_as::<_, Rfq>(&format!(
        "INSERT INTO rfqs (client_id, status, created_at) VALUES ($1, $2, $3) RETURNING {RFQ_COLUMNS}"
    ))
    .bind(rfq.client_id)
    .bind(RfqStatus::Open)
    .bind(created_at)
    .fetch_one(&mut *conn)
    .await?;
    for item in rfq.items {
        let item = sqlx::query_as::<_, RfqItem>(
            "INSERT INTO rfq_items (rfq_id, product_id, quantity, notes, flexibility) VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, rfq_id, product_id, quantity, notes, flexibility",
        )
        .bind(record.id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.notes)
        .bind(item.flexibility)
        .fetch_one(&mut *conn)
        .await?;
        record.items.push(item);
    }
    debug!("🗃️ RFQ #{} saved with {} items", record.id, record.items.len());
    Ok(record)
}

async fn fetch_rfq_items(rfq_id: i64, conn: &mut SqliteConnection) -> Result<Vec<RfqItem>, StoreError> {
    let items = sqlx::query_as::<_, RfqItem>(
        "SELECT id, rfq_id, product_id, quantity, notes, flexibility FROM rfq_items WHERE rfq_id = $1 ORDER BY id",
    )
    .bind(rfq_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

pub async fn fetch_rfq(rfq_id: i64, conn: &mut SqliteConnection) -> Result<Option<Rfq>, StoreError> {
    let rfq = sqlx::query_as::<_, Rfq>(&format!("SELECT {RFQ_COLUMNS} FROM rfqs WHERE id = $1"))
        .bind(rfq_id)
        .fetch_optional(&mut *conn)
        .await?;
    match rfq {
        Some(mut rfq) => {
            rfq.items = fetch_rfq_items(rfq.id, conn).await?;
            Ok(Some(rfq))
        },
        None => Ok(None),
    }
}

pub async fn fetch_open_rfqs(conn: &mut SqliteConnection) -> Result<Vec<Rfq>, StoreError> {
    let mut rfqs = sqlx::query_as::<_, Rfq>(&format!(
        "SELECT {RFQ_COLUMNS} FROM rfqs WHERE status = $1 AND auto_quote_triggered = 0 ORDER BY id"
    ))
    .bind(RfqStatus::Open)
    .fetch_all(&mut *conn)
    .await?;
    for rfq in rfqs.iter_mut() {
        rfq.items = fetch_rfq_items(rfq.id, &mut *conn).await?;
    }
    Ok(rfqs)
}

/// Flips `auto_quote_triggered` from false to true. Returns false if another runner got there first.
pub async fn claim_auto_quote(rfq_id: i64, conn: &mut SqliteConnection) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "UPDATE rfqs SET auto_quote_triggered = 1, updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND \
         auto_quote_triggered = 0",
    )
    .bind(rfq_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn update_rfq_status(rfq_id: i64, status: RfqStatus, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    sqlx::query("UPDATE rfqs SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(status)
        .bind(rfq_id)
        .execute(conn)
        .await?;
    Ok(())
}
