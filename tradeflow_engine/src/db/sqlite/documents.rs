use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db::traits::StoreError,
    db_types::{DocumentType, OrderDocument, OrderId},
};

const DOCUMENT_COLUMNS: &str = "id, order_id, document_type, file_ref, uploaded_by, verified_by, verified_at, \
                                rejected_at, rejection_reason, created_at";

pub async fn insert_document(
    order_id: OrderId,
    document_type: DocumentType,
    file_ref: &str,
    uploaded_by: i64,
    conn: &mut SqliteConnection,
) -> Result<OrderDocument, StoreError> {
    let document = sqlx::query_as::<_, OrderDocument>(&format!(
        "INSERT INTO order_documents (order_id, document_type, file_ref, uploaded_by) VALUES ($1, $2, $3, $4) \
         RETURNING {DOCUMENT_COLUMNS}"
    ))
    .bind(order_id)
    .bind(document_type)
    .bind(file_ref)
    .bind(uploaded_by)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ {document_type} document #{} stored for order {order_id}", document.id);
    Ok(document)
}

/// Inserts a document that is verified from the outset, as system POs are.
pub async fn insert_verified_document(
    order_id: OrderId,
    document_type: DocumentType,
    file_ref: &str,
    verifier_id: i64,
    verified_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<OrderDocument, StoreError> {
    let document = sqlx::query_as::<_, OrderDocument>(&format!(
        "INSERT INTO order_documents (order_id, document_type, file_ref, uploaded_by, verified_by, verified_at) \
         VALUES ($1, $2, $3, $4, $4, $5) RETURNING {DOCUMENT_COLUMNS}"
    ))
    .bind(order_id)
    .bind(document_type)
    .bind(file_ref)
    .bind(verifier_id)
    .bind(verified_at)
    .fetch_one(conn)
    .await?;
    Ok(document)
}

pub async fn fetch_document(document_id: i64, conn: &mut SqliteConnection) -> Result<Option<OrderDocument>, StoreError> {
    let document =
        sqlx::query_as::<_, OrderDocument>(&format!("SELECT {DOCUMENT_COLUMNS} FROM order_documents WHERE id = $1"))
            .bind(document_id)
            .fetch_optional(conn)
            .await?;
    Ok(document)
}

pub async fn documents_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderDocument>, StoreError> {
    let documents = sqlx::query_as::<_, OrderDocument>(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM order_documents WHERE order_id = $1 ORDER BY id"
    ))
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(documents)
}

/// Marks the document as verified, unless it already is (or has been rejected). Returns true if this call did it.
pub async fn mark_verified_if_unverified(
    document_id: i64,
    verifier_id: i64,
    verified_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "UPDATE order_documents SET verified_by = $1, verified_at = $2 WHERE id = $3 AND verified_at IS NULL AND \
         rejected_at IS NULL",
    )
    .bind(verifier_id)
    .bind(verified_at)
    .bind(document_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Undoes [`mark_verified_if_unverified`] for a verification that could not be completed.
pub async fn clear_verification(document_id: i64, verifier_id: i64, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    sqlx::query("UPDATE order_documents SET verified_by = NULL, verified_at = NULL WHERE id = $1 AND verified_by = $2")
        .bind(document_id)
        .bind(verifier_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn reject_if_open(
    document_id: i64,
    reason: &str,
    rejected_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderDocument>, StoreError> {
    let document = sqlx::query_as::<_, OrderDocument>(&format!(
        "UPDATE order_documents SET rejected_at = $1, rejection_reason = $2 WHERE id = $3 AND verified_at IS NULL AND \
         rejected_at IS NULL RETURNING {DOCUMENT_COLUMNS}"
    ))
    .bind(rejected_at)
    .bind(reason)
    .bind(document_id)
    .fetch_optional(conn)
    .await?;
    Ok(document)
}
