use crate::{
    db::traits::StoreError,
    db_types::{NewPoAuditEntry, OrderId, PoAuditEntry},
};

/// The append-only PO audit trail. Entries are never updated or deleted.
#[allow(async_fn_in_trait)]
pub trait AuditLog {
    async fn append_audit_entry(&self, entry: NewPoAuditEntry) -> Result<PoAuditEntry, StoreError>;

    /// All entries for the order, oldest first.
    async fn audit_trail(&self, order_id: OrderId) -> Result<Vec<PoAuditEntry>, StoreError>;
}
