use chrono::NaiveDate;
use log::*;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db::traits::StoreError,
    db_types::{Invoice, InvoiceStatus, NewInvoice, NewPayment, OrderId, PaymentRecord, PaymentStatus, PaymentUpdate},
};

const PAYMENT_COLUMNS: &str = "id, order_id, external_payment_id, amount, status, authorized_at, paid_at, failed_at, \
                               failure_reason, refunded_at, created_at, updated_at";
// Schemas that predate the per-status timestamp columns only have these.
const BASIC_PAYMENT_COLUMNS: &str = "id, order_id, external_payment_id, amount, status, created_at, updated_at";
const INVOICE_COLUMNS: &str = "id, order_id, invoice_number, amount, status, due_date, paid_date, created_at";

pub async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<PaymentRecord, StoreError> {
    match insert_payment_returning(&payment, PAYMENT_COLUMNS, conn).await {
        Err(StoreError::SchemaCompatibility { missing }) => {
            warn!("🗃️ Payments table has no {missing} column. Registering the payment without timestamps.");
            insert_payment_returning(&payment, BASIC_PAYMENT_COLUMNS, conn).await
        },
        result => result,
    }
}

async fn insert_payment_returning(
    payment: &NewPayment,
    columns: &str,
    conn: &mut SqliteConnection,
) -> Result<PaymentRecord, StoreError> {
    let result = sqlx::query_as::<_, PaymentRecord>(&format!(
        "INSERT INTO payments (order_id, external_payment_id, amount, status) VALUES ($1, $2, $3, $4) RETURNING \
         {columns}"
    ))
    .bind(payment.order_id)
    .bind(payment.external_payment_id.as_str())
    .bind(payment.amount)
    .bind(PaymentStatus::Pending)
    .fetch_one(conn)
    .await;
    match result {
        Ok(record) => Ok(record),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(StoreError::DuplicatePayment(payment.external_payment_id.clone()))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_payment_by_external_id(
    external_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRecord>, StoreError> {
    match select_payment(PaymentKey::ExternalId(external_id), PAYMENT_COLUMNS, conn).await {
        Err(StoreError::SchemaCompatibility { missing }) => {
            debug!("🗃️ Payments table has no {missing} column. Loading payment {external_id} without timestamps.");
            select_payment(PaymentKey::ExternalId(external_id), BASIC_PAYMENT_COLUMNS, conn).await
        },
        result => result,
    }
}

pub async fn fetch_payment(payment_id: i64, conn: &mut SqliteConnection) -> Result<PaymentRecord, StoreError> {
    let payment = match select_payment(PaymentKey::Id(payment_id), PAYMENT_COLUMNS, conn).await {
        Err(StoreError::SchemaCompatibility { missing }) => {
            debug!("🗃️ Payments table has no {missing} column. Loading payment #{payment_id} without timestamps.");
            select_payment(PaymentKey::Id(payment_id), BASIC_PAYMENT_COLUMNS, conn).await?
        },
        result => result?,
    };
    payment.ok_or_else(|| StoreError::PaymentNotFound(format!("#{payment_id}")))
}

#[derive(Clone, Copy)]
enum PaymentKey<'a> {
    Id(i64),
    ExternalId(&'a str),
}

async fn select_payment(
    key: PaymentKey<'_>,
    columns: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRecord>, StoreError> {
    let sql = match key {
        PaymentKey::Id(_) => format!("SELECT {columns} FROM payments WHERE id = $1"),
        PaymentKey::ExternalId(_) => format!("SELECT {columns} FROM payments WHERE external_payment_id = $1"),
    };
    let query = sqlx::query_as::<_, PaymentRecord>(&sql);
    let query = match key {
        PaymentKey::Id(id) => query.bind(id),
        PaymentKey::ExternalId(external_id) => query.bind(external_id),
    };
    Ok(query.fetch_optional(conn).await?)
}

/// Updates the status, the timestamp column that belongs to it and, for failures, the reason.
pub async fn update_payment(
    payment_id: i64,
    update: &PaymentUpdate,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE payments SET status = ");
    builder.push_bind(update.status);
    builder.push(", updated_at = CURRENT_TIMESTAMP");
    if let Some(column) = update.timestamp_column() {
        builder.push(format!(", {column} = "));
        builder.push_bind(update.timestamp);
    }
    if update.status == PaymentStatus::Failed {
        builder.push(", failure_reason = ");
        builder.push_bind(update.failure_reason.clone());
    }
    builder.push(" WHERE id = ");
    builder.push_bind(payment_id);
    trace!("🗃️ Payment update: {}", builder.sql());
    builder.build().execute(conn).await?;
    Ok(())
}

pub async fn update_payment_status(
    payment_id: i64,
    status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE payments SET status = $1 WHERE id = $2").bind(status).bind(payment_id).execute(conn).await?;
    Ok(())
}

pub async fn insert_invoice(invoice: NewInvoice, conn: &mut SqliteConnection) -> Result<Invoice, StoreError> {
    let invoice = sqlx::query_as::<_, Invoice>(&format!(
        "INSERT INTO invoices (order_id, invoice_number, amount, status, due_date) VALUES ($1, $2, $3, $4, $5) \
         RETURNING {INVOICE_COLUMNS}"
    ))
    .bind(invoice.order_id)
    .bind(invoice.invoice_number)
    .bind(invoice.amount)
    .bind(invoice.status)
    .bind(invoice.due_date)
    .fetch_one(conn)
    .await?;
    Ok(invoice)
}

pub async fn fetch_invoice_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Invoice>, StoreError> {
    let invoice = sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices WHERE order_id = $1 ORDER BY id DESC LIMIT 1"
    ))
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(invoice)
}

/// Moves the order's `SENT` or `OVERDUE` invoice to `PAID`. Returns the invoice if it was moved.
pub async fn mark_invoice_paid(
    order_id: OrderId,
    paid_date: NaiveDate,
    conn: &mut SqliteConnection,
) -> Result<Option<Invoice>, StoreError> {
    let result = sqlx::query(
        "UPDATE invoices SET status = $1, paid_date = $2 WHERE order_id = $3 AND status IN ($4, $5)",
    )
    .bind(InvoiceStatus::Paid)
    .bind(paid_date)
    .bind(order_id)
    .bind(InvoiceStatus::Sent)
    .bind(InvoiceStatus::Overdue)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }
    fetch_invoice_for_order(order_id, conn).await
}
