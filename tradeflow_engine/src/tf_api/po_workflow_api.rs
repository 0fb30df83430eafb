//! The PO verification workflow.
//!
//! An order created from an accepted quote has to be backed by a purchase order before the client can pay. Either
//! the client uploads their own PO and an admin verifies it, or an admin generates a system PO. Both paths end in
//! the same place: stock is taken for the order's line items exactly once, and the order moves to
//! `PENDING_PAYMENT` with `admin_verified` set.
//!
//! The "exactly once" part is the job of the [`VerificationBackend`]. This API adds authorisation, file storage,
//! auditing and events around it. Audit writes are best-effort: a failed audit write is logged and never changes the
//! outcome of the operation it describes.
use std::fmt::{Debug, Write};

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db::traits::{StoreError, VerificationBackend, VerificationOutcome},
    db_types::{Actor, DocumentType, NewPoAuditEntry, Order, OrderDocument, OrderId, OrderStatus, PoAction, Role},
    events::{EventProducers, OrderConfirmedEvent},
    storage::DocumentStorage,
    tf_api::{errors::PoWorkflowError, order_flow_api::can_access, PoStore},
};

pub const DEFAULT_URL_TTL_MINUTES: i64 = 15;

const OUTCOME_VERIFIED: &str = "VERIFIED";
const OUTCOME_NOOP: &str = "ALREADY_VERIFIED";
const OUTCOME_FAILED: &str = "FAILED";

pub struct PoWorkflowApi<B, V, S> {
    db: B,
    verifier: V,
    storage: S,
    producers: EventProducers,
    url_ttl: Duration,
}

impl<B, V, S> Debug for PoWorkflowApi<B, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PoWorkflowApi")
    }
}

impl<B, V, S> PoWorkflowApi<B, V, S> {
    pub fn new(db: B, verifier: V, storage: S, producers: EventProducers) -> Self {
        Self { db, verifier, storage, producers, url_ttl: Duration::minutes(DEFAULT_URL_TTL_MINUTES) }
    }

    /// How long signed document URLs stay valid.
    pub fn with_url_ttl(mut self, ttl: Duration) -> Self {
        self.url_ttl = ttl;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

impl<B, V, S> PoWorkflowApi<B, V, S>
where
    B: PoStore,
    V: VerificationBackend,
    S: DocumentStorage,
{
    /// Stores a client PO for the order.
    ///
    /// Everything that can be checked up front is checked before the file is stored. When a client uploads, the
    /// order goes (back) to `PENDING_ADMIN_CONFIRMATION`. When an admin uploads on the client's behalf, the status
    /// is left alone.
    pub async fn upload_client_po(
        &self,
        order_id: OrderId,
        file_name: &str,
        content: &[u8],
        actor: &Actor,
    ) -> Result<OrderDocument, PoWorkflowError> {
        if actor.role == Role::Supplier {
            return Err(PoWorkflowError::Forbidden("Suppliers cannot upload client POs".into()));
        }
        let order = self.fetch_order(order_id).await?;
        if !can_access(&order, actor) {
            warn!("🔄️ User {} tried to upload a PO for order {order_id}, which is not theirs", actor.user_id);
            return Err(PoWorkflowError::Forbidden(format!("Order {order_id} does not belong to you")));
        }
        let acting_as_client = !actor.is_admin();
        let target = OrderStatus::PendingAdminConfirmation;
        if acting_as_client && !order.status.can_transition_to(target) {
            return Err(StoreError::InvalidTransition { order_id, from: order.status, to: target }.into());
        }
        let file_ref = self.storage.store(order_id, file_name, content).await?;
        let document = match self.db.insert_client_po(order_id, &file_ref, actor, acting_as_client).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!("🔄️ Could not record the PO for order {order_id}: {e}. Removing the stored file.");
                self.remove_file(&file_ref).await;
                return Err(e.into());
            },
        };
        info!("🔄️ Client PO #{} uploaded for order {order_id} by {} {}", document.id, actor.role, actor.user_id);
        let entry = NewPoAuditEntry::new(order_id, actor, PoAction::ClientPoUploaded)
            .with_document(document.id)
            .with_meta("role", actor.role.as_str())
            .with_meta("file_name", file_name);
        self.audit(entry).await;
        Ok(document)
    }

    /// An admin verifies a client PO. Calling this again for a verified document is a no-op, however many times and
    /// however concurrently it happens.
    pub async fn verify_client_po(
        &self,
        document_id: i64,
        actor: &Actor,
    ) -> Result<VerificationOutcome, PoWorkflowError> {
        if !actor.is_admin() {
            return Err(PoWorkflowError::Forbidden("Only admins can verify POs".into()));
        }
        match self.verifier.verify_client_po(document_id, actor).await {
            Ok(outcome) => {
                self.record_outcome(&outcome, actor, PoAction::PoVerified).await;
                if let VerificationOutcome::Verified { order, .. } = &outcome {
                    let entry = NewPoAuditEntry::new(order.id, actor, PoAction::ClientPoConfirmed)
                        .with_document(document_id)
                        .with_meta("status", order.status.as_str());
                    self.audit(entry).await;
                }
                self.publish(&outcome).await;
                Ok(outcome)
            },
            Err(e) => {
                warn!("🔄️ Verification of document #{document_id} failed: {e}");
                match self.db.fetch_document(document_id).await {
                    Ok(Some(doc)) => {
                        let entry = NewPoAuditEntry::new(doc.order_id, actor, PoAction::PoVerified)
                            .with_document(document_id)
                            .with_meta("outcome", OUTCOME_FAILED)
                            .with_meta("error", e.to_string());
                        self.audit(entry).await;
                    },
                    Ok(None) => debug!("🔄️ Document #{document_id} does not exist. Nothing to audit."),
                    Err(lookup_err) => warn!("🔄️ Could not look up document #{document_id} for the audit log: {lookup_err}"),
                }
                Err(e.into())
            },
        }
    }

    /// An admin confirms the order without a client PO. A system PO is rendered, stored and recorded as a verified
    /// document. Only the first call for an order has any effect.
    pub async fn generate_system_po(
        &self,
        order_id: OrderId,
        actor: &Actor,
    ) -> Result<VerificationOutcome, PoWorkflowError> {
        if !actor.is_admin() {
            return Err(PoWorkflowError::Forbidden("Only admins can generate system POs".into()));
        }
        let order = self.fetch_order(order_id).await?;
        if order.system_po_generated {
            debug!("🔄️ Order {order_id} already has a system PO");
            let outcome = VerificationOutcome::AlreadyVerified { order_id, document_id: None };
            self.record_outcome(&outcome, actor, PoAction::PoGenerated).await;
            return Ok(outcome);
        }
        let target = OrderStatus::PendingPayment;
        if !order.status.can_transition_to(target) {
            return Err(StoreError::InvalidTransition { order_id, from: order.status, to: target }.into());
        }
        let content = self.render_system_po(&order).await?;
        let file_name = format!("system_po_{}.txt", order_id.value());
        let file_ref = self.storage.store(order_id, &file_name, content.as_bytes()).await?;
        match self.verifier.confirm_with_system_po(order_id, &file_ref, actor).await {
            Ok(outcome) => {
                if outcome.is_noop() {
                    self.remove_file(&file_ref).await;
                }
                self.record_outcome(&outcome, actor, PoAction::PoGenerated).await;
                self.publish(&outcome).await;
                Ok(outcome)
            },
            Err(e) => {
                warn!("🔄️ Could not confirm order {order_id} with a system PO: {e}");
                self.remove_file(&file_ref).await;
                let entry = NewPoAuditEntry::new(order_id, actor, PoAction::PoGenerated)
                    .with_meta("outcome", OUTCOME_FAILED)
                    .with_meta("error", e.to_string());
                self.audit(entry).await;
                Err(e.into())
            },
        }
    }

    /// An admin rejects a client PO that has not been verified.
    pub async fn reject_client_po(
        &self,
        document_id: i64,
        reason: &str,
        actor: &Actor,
    ) -> Result<OrderDocument, PoWorkflowError> {
        if !actor.is_admin() {
            return Err(PoWorkflowError::Forbidden("Only admins can reject POs".into()));
        }
        let document = self.db.fetch_document(document_id).await?.ok_or(StoreError::DocumentNotFound(document_id))?;
        if document.document_type != DocumentType::ClientPo {
            return Err(StoreError::InvalidRequest(format!("Document #{document_id} is not a client PO")).into());
        }
        if document.is_verified() {
            return Err(StoreError::InvalidRequest(format!("Document #{document_id} has already been verified")).into());
        }
        let rejected = self.db.reject_document(document_id, reason).await?.ok_or_else(|| {
            StoreError::InvalidRequest(format!("Document #{document_id} was verified or rejected in the meantime"))
        })?;
        info!("🔄️ Client PO #{document_id} for order {} rejected by admin {}", rejected.order_id, actor.user_id);
        let entry = NewPoAuditEntry::new(rejected.order_id, actor, PoAction::PoRejected)
            .with_document(document_id)
            .with_meta("reason", reason);
        self.audit(entry).await;
        Ok(rejected)
    }

    /// A time-limited URL for a stored document.
    pub async fn document_url(&self, document_id: i64, actor: &Actor) -> Result<String, PoWorkflowError> {
        let document = self.db.fetch_document(document_id).await?.ok_or(StoreError::DocumentNotFound(document_id))?;
        let order = self.fetch_order(document.order_id).await?;
        if !can_access(&order, actor) {
            return Err(PoWorkflowError::Forbidden(format!("Document #{document_id} does not belong to you")));
        }
        Ok(self.storage.signed_url(&document.file_ref, self.url_ttl)?)
    }

    async fn fetch_order(&self, order_id: OrderId) -> Result<Order, PoWorkflowError> {
        Ok(self.db.fetch_order(order_id).await?.ok_or(StoreError::OrderNotFound(order_id))?)
    }

    async fn render_system_po(&self, order: &Order) -> Result<String, PoWorkflowError> {
        let items = self.db.fetch_order_items(order.id).await?;
        let mut doc = String::new();
        // Writing to a String cannot fail
        let _ = writeln!(doc, "PURCHASE ORDER {}", order.id);
        let _ = writeln!(doc, "Issued: {}", Utc::now().format("%Y-%m-%d %H:%M UTC"));
        let _ = writeln!(doc, "Client: {}", order.client_id);
        if let Some(supplier) = order.supplier_id {
            let _ = writeln!(doc, "Supplier: {supplier}");
        }
        if let Some(quote) = order.quote_id {
            let _ = writeln!(doc, "Quote: #{quote}");
        }
        let _ = writeln!(doc);
        if items.is_empty() {
            for item in self.db.resolve_line_items(order.id).await? {
                let _ = writeln!(doc, "Product {:>6}  x{:<5}", item.product_id, item.quantity);
            }
        } else {
            for item in &items {
                let _ = writeln!(
                    doc,
                    "Product {:>6}  x{:<5} @ {}  = {}",
                    item.product_id, item.quantity, item.unit_price, item.line_total
                );
            }
        }
        let _ = writeln!(doc);
        let _ = writeln!(doc, "Total: {}", order.amount);
        Ok(doc)
    }

    async fn record_outcome(&self, outcome: &VerificationOutcome, actor: &Actor, action: PoAction) {
        let entry = match outcome {
            VerificationOutcome::Verified { order, document_id, decrements } => {
                NewPoAuditEntry::new(order.id, actor, action)
                    .with_document(*document_id)
                    .with_meta("outcome", OUTCOME_VERIFIED)
                    .with_meta("stock_decrements", decrements.len())
            },
            VerificationOutcome::AlreadyVerified { order_id, document_id } => {
                let entry = NewPoAuditEntry::new(*order_id, actor, action).with_meta("outcome", OUTCOME_NOOP);
                match document_id {
                    Some(id) => entry.with_document(*id),
                    None => entry,
                }
            },
        };
        self.audit(entry).await;
    }

    async fn publish(&self, outcome: &VerificationOutcome) {
        if let VerificationOutcome::Verified { order, document_id, decrements } = outcome {
            debug!("🔄️ Notifying order confirmed hook subscribers");
            let event = OrderConfirmedEvent::new(order.clone(), *document_id, decrements.clone());
            self.producers.publish_order_confirmed(event).await;
        }
    }

    async fn audit(&self, entry: NewPoAuditEntry) {
        let order_id = entry.order_id;
        let action = entry.action;
        if let Err(e) = self.db.append_audit_entry(entry).await {
            warn!("🔄️ Could not write the {action} audit entry for order {order_id}: {e}");
        }
    }

    async fn remove_file(&self, file_ref: &str) {
        if let Err(e) = self.storage.remove(file_ref).await {
            warn!("🔄️ Could not remove {file_ref}: {e}");
        }
    }
}
