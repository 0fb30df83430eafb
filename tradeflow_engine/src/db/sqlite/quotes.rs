use log::*;
use sqlx::SqliteConnection;

use crate::{
    db::traits::StoreError,
    db_types::{NewQuote, Quote, QuoteItem, QuoteStatus},
};

const QUOTE_COLUMNS: &str = "id, rfq_id, supplier_id, supplier_price, margin_percent, final_price, lead_time, \
                             quote_type, status, created_at";
const QUOTE_ITEM_COLUMNS: &str =
    "id, quote_id, product_id, quantity, supplier_unit_price, margin_percent, unit_price, line_total, is_alternative";

/// Inserts a quote and its items. This is not atomic. Run it inside a transaction and pass `&mut *tx` as the
/// connection.
pub async fn insert_quote(quote: NewQuote, conn: &mut SqliteConnection) -> Result<Quote, StoreError> {
    let mut record = sqlx::query_as::<_, Quote>(&format!(
        r#"
            INSERT INTO quotes (
                rfq_id,
                supplier_id,
                supplier_price,
                margin_percent,
                final_price,
                lead_time,
                quote_type,
                status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {QUOTE_COLUMNS}
        "#
    ))
    .bind(quote.rfq_id)
    .bind(quote.supplier_id)
    .bind(quote.supplier_price)
    .bind(quote.margin_percent)
    .bind(quote.final_price)
    .bind(quote.lead_time)
    .bind(quote.quote_type)
    .bind(quote.status)
    .fetch_one(&mut *conn)
    .await?;
    for item in quote.items {
        let item = sqlx::query_as::<_, QuoteItem>(&format!(
            r#"
                INSERT INTO quote_items (
                    quote_id,
                    product_id,
                    quantity,
                    supplier_unit_price,
                    margin_percent,
                    unit_price,
                    line_total,
                    is_alternative
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING {QUOTE_ITEM_COLUMNS}
            "#
        ))
        .bind(record.id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.supplier_unit_price)
        .bind(item.margin_percent)
        .bind(item.unit_price)
        .bind(item.line_total)
        .bind(item.is_alternative)
        .fetch_one(&mut *conn)
        .await?;
        record.items.push(item);
    }
    debug!(
        "🗃️ {} quote #{} saved for RFQ #{} ({} items, {})",
        record.quote_type,
        record.id,
        record.rfq_id,
        record.items.len(),
        record.final_price
    );
    Ok(record)
}

async fn fetch_quote_items(quote_id: i64, conn: &mut SqliteConnection) -> Result<Vec<QuoteItem>, StoreError> {
    let items = sqlx::query_as::<_, QuoteItem>(&format!(
        "SELECT {QUOTE_ITEM_COLUMNS} FROM quote_items WHERE quote_id = $1 ORDER BY id"
    ))
    .bind(quote_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

pub async fn fetch_quote(quote_id: i64, conn: &mut SqliteConnection) -> Result<Option<Quote>, StoreError> {
    let quote = sqlx::query_as::<_, Quote>(&format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = $1"))
        .bind(quote_id)
        .fetch_optional(&mut *conn)
        .await?;
    match quote {
        Some(mut quote) => {
            quote.items = fetch_quote_items(quote.id, conn).await?;
            Ok(Some(quote))
        },
        None => Ok(None),
    }
}

pub async fn quotes_for_rfq(rfq_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Quote>, StoreError> {
    let mut quotes =
        sqlx::query_as::<_, Quote>(&format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE rfq_id = $1 ORDER BY id"))
            .bind(rfq_id)
            .fetch_all(&mut *conn)
            .await?;
    for quote in quotes.iter_mut() {
        quote.items = fetch_quote_items(quote.id, &mut *conn).await?;
    }
    Ok(quotes)
}

/// Conditionally moves a quote from `expected` to `next`.
pub async fn update_quote_status_if(
    quote_id: i64,
    expected: QuoteStatus,
    next: QuoteStatus,
    conn: &mut SqliteConnection,
) -> Result<bool, StoreError> {
    let result = sqlx::query("UPDATE quotes SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status = $3")
        .bind(next)
        .bind(quote_id)
        .bind(expected)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Rejects every other open quote for the RFQ.
pub async fn reject_competing_quotes(
    rfq_id: i64,
    accepted_quote_id: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, StoreError> {
    let result = sqlx::query(
        "UPDATE quotes SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE rfq_id = $2 AND id != $3 AND status IN \
         ($4, $5)",
    )
    .bind(QuoteStatus::Rejected)
    .bind(rfq_id)
    .bind(accepted_quote_id)
    .bind(QuoteStatus::PendingAdmin)
    .bind(QuoteStatus::SentToClient)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
