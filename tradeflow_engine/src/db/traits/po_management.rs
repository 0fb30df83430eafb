use crate::{
    db::traits::StoreError,
    db_types::{Actor, OrderDocument, OrderId},
};

/// Storage of purchase order documents.
#[allow(async_fn_in_trait)]
pub trait PoManagement {
    /// Records a client PO for the order and sets its `client_po_uploaded` flag. When the uploader is the client
    /// (`move_to_pending_admin`), the order is also moved to `PENDING_ADMIN_CONFIRMATION`.
    async fn insert_client_po(
        &self,
        order_id: OrderId,
        file_ref: &str,
        uploader: &Actor,
        move_to_pending_admin: bool,
    ) -> Result<OrderDocument, StoreError>;

    async fn fetch_document(&self, document_id: i64) -> Result<Option<OrderDocument>, StoreError>;

    async fn documents_for_order(&self, order_id: OrderId) -> Result<Vec<OrderDocument>, StoreError>;

    /// Marks an unverified, unrejected document as rejected and clears the order's `client_po_uploaded` flag.
    /// Returns `None` if the document was verified or rejected in the meantime.
    async fn reject_document(&self, document_id: i64, reason: &str) -> Result<Option<OrderDocument>, StoreError>;
}
