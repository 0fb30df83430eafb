use std::fmt::Debug;

use log::*;

use crate::{
    db::traits::AuditLog,
    db_types::{OrderId, PoAuditEntry},
    tf_api::errors::AuditApiError,
};

pub struct AuditApi<B> {
    db: B,
}

impl<B> Debug for AuditApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuditApi")
    }
}

impl<B> AuditApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> AuditApi<B>
where B: AuditLog
{
    /// The order's PO audit entries, oldest first. Deployments without an audit table get an empty list.
    pub async fn audit_trail(&self, order_id: OrderId) -> Result<Vec<PoAuditEntry>, AuditApiError> {
        match self.db.audit_trail(order_id).await {
            Ok(entries) => Ok(entries),
            Err(e) if e.is_schema_error() => {
                warn!("🔄️ The PO audit trail is not available: {e}. Returning an empty trail.");
                Ok(vec![])
            },
            Err(e) => Err(e.into()),
        }
    }
}
