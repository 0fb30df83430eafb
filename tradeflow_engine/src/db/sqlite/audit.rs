use sqlx::{types::Json, SqliteConnection};

use crate::{
    db::traits::StoreError,
    db_types::{NewPoAuditEntry, OrderId, PoAuditEntry},
};

const AUDIT_COLUMNS: &str = "id, order_id, document_id, actor_user_id, actor_role, action, metadata, created_at";

pub async fn append_entry(entry: NewPoAuditEntry, conn: &mut SqliteConnection) -> Result<PoAuditEntry, StoreError> {
    let record = sqlx::query_as::<_, PoAuditEntry>(&format!(
        r#"
            INSERT INTO po_audit_logs (
                order_id,
                document_id,
                actor_user_id,
                actor_role,
                action,
                metadata
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {AUDIT_COLUMNS}
        "#
    ))
    .bind(entry.order_id)
    .bind(entry.document_id)
    .bind(entry.actor_user_id)
    .bind(entry.actor_role)
    .bind(entry.action)
    .bind(Json(entry.metadata))
    .fetch_one(conn)
    .await?;
    Ok(record)
}

pub async fn entries_for_order(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Vec<PoAuditEntry>, StoreError> {
    let entries = sqlx::query_as::<_, PoAuditEntry>(&format!(
        "SELECT {AUDIT_COLUMNS} FROM po_audit_logs WHERE order_id = $1 ORDER BY created_at, id"
    ))
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(entries)
}
