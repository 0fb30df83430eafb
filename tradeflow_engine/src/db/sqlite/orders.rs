use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db::traits::StoreError,
    db_types::{LineItem, Money, Order, OrderId, OrderItem, OrderStatus, Quote},
};

pub(crate) const ORDER_COLUMNS: &str = "id, status, amount, client_id, supplier_id, quote_id, system_po_generated, \
                                        client_po_uploaded, admin_verified, admin_verified_by, admin_verified_at, \
                                        payment_reference, payment_confirmed_at, payment_submitted_at, created_at, \
                                        updated_at";

pub async fn fetch_order(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, StoreError> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Like [`fetch_order`], but a missing order is an error.
pub async fn fetch_existing_order(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Order, StoreError> {
    fetch_order(order_id, conn).await?.ok_or(StoreError::OrderNotFound(order_id))
}

pub async fn fetch_order_items(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, StoreError> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT id, order_id, product_id, quantity, unit_price, line_total FROM order_items WHERE order_id = $1 ORDER \
         BY id",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

/// Creates an order for an accepted quote, copying the quote's (non-alternative) items onto the order.
/// This is not atomic. Run it inside a transaction and pass `&mut *tx` as the connection.
pub async fn insert_order_for_quote(
    quote: &Quote,
    client_id: i64,
    conn: &mut SqliteConnection,
) -> Result<OrderId, StoreError> {
    let items = quote.items.iter().filter(|i| !i.is_alternative).collect::<Vec<_>>();
    let amount = items.iter().map(|i| i.line_total).sum::<Money>();
    let (id,): (OrderId,) = sqlx::query_as(
        "INSERT INTO orders (status, amount, client_id, supplier_id, quote_id) VALUES ($1, $2, $3, $4, $5) RETURNING \
         id",
    )
    .bind(OrderStatus::PendingAdminConfirmation)
    .bind(amount)
    .bind(client_id)
    .bind(quote.supplier_id)
    .bind(quote.id)
    .fetch_one(&mut *conn)
    .await?;
    for item in items {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, quantity, unit_price, line_total) VALUES ($1, $2, $3, $4, \
             $5)",
        )
        .bind(id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.line_total)
        .execute(&mut *conn)
        .await?;
    }
    debug!("🗃️ Order {id} created for quote #{} ({amount})", quote.id);
    Ok(id)
}

/// Conditionally moves an order from `expected` to `next`. Returns `false` if the order's status was not `expected`.
pub async fn update_status_if(
    order_id: OrderId,
    expected: OrderStatus,
    next: OrderStatus,
    conn: &mut SqliteConnection,
) -> Result<bool, StoreError> {
    let result = sqlx::query("UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status = $3")
        .bind(next)
        .bind(order_id)
        .bind(expected)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Moves the order to `PENDING_PAYMENT` and records who verified it, provided its status is still `expected`.
pub async fn mark_admin_verified(
    order_id: OrderId,
    expected: OrderStatus,
    verifier_id: i64,
    verified_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                status = $1,
                admin_verified = 1,
                admin_verified_by = $2,
                admin_verified_at = $3,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $4 AND status = $5
        "#,
    )
    .bind(OrderStatus::PendingPayment)
    .bind(verifier_id)
    .bind(verified_at)
    .bind(order_id)
    .bind(expected)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_client_po_uploaded(
    order_id: OrderId,
    uploaded: bool,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE orders SET client_po_uploaded = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(uploaded)
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Flips `system_po_generated` from false to true. Only one caller can ever win this.
pub async fn claim_system_po(order_id: OrderId, conn: &mut SqliteConnection) -> Result<bool, StoreError> {
    let result = sqlx::query("UPDATE orders SET system_po_generated = 1 WHERE id = $1 AND system_po_generated = 0")
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn release_system_po(order_id: OrderId, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    sqlx::query("UPDATE orders SET system_po_generated = 0 WHERE id = $1").bind(order_id).execute(conn).await?;
    Ok(())
}

pub async fn set_payment_submitted(
    order_id: OrderId,
    submitted_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE orders SET payment_submitted_at = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(submitted_at)
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Moves the order to `PAYMENT_CONFIRMED` if, and only if, it is waiting for a payment.
pub async fn confirm_payment(
    order_id: OrderId,
    payment_reference: &str,
    confirmed_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                status = $1,
                payment_reference = $2,
                payment_confirmed_at = $3,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $4 AND status IN ($5, $6)
        "#,
    )
    .bind(OrderStatus::PaymentConfirmed)
    .bind(payment_reference)
    .bind(confirmed_at)
    .bind(order_id)
    .bind(OrderStatus::PendingPayment)
    .bind(OrderStatus::AwaitingConfirmation)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// The products and quantities the order consumes. Falls back from the order's items to the accepted quote's items,
/// and from there to the items of the RFQ the quote answered.
pub async fn resolve_line_items(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Vec<LineItem>, StoreError> {
    let items = sqlx::query_as::<_, LineItem>(
        "SELECT product_id, quantity FROM order_items WHERE order_id = $1 ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;
    if !items.is_empty() {
        return Ok(items);
    }
    let items = sqlx::query_as::<_, LineItem>(
        r#"
            SELECT qi.product_id, qi.quantity FROM quote_items qi
            JOIN orders o ON o.quote_id = qi.quote_id
            WHERE o.id = $1 AND qi.is_alternative = 0
            ORDER BY qi.id
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;
    if !items.is_empty() {
        trace!("🗃️ Order {order_id} has no items. Using the items of its quote.");
        return Ok(items);
    }
    let items = sqlx::query_as::<_, LineItem>(
        r#"
            SELECT ri.product_id, ri.quantity FROM rfq_items ri
            JOIN quotes q ON q.rfq_id = ri.rfq_id
            JOIN orders o ON o.quote_id = q.id
            WHERE o.id = $1
            ORDER BY ri.id
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    if items.is_empty() {
        warn!("🗃️ Order {order_id} has no line items anywhere. No stock will be taken.");
    } else {
        trace!("🗃️ Order {order_id} has no items. Using the items of its RFQ.");
    }
    Ok(items)
}
