//! The two SQLite implementations of [`VerificationBackend`].
//!
//! [`AtomicVerifier`] runs the whole "verify and confirm" step in one `BEGIN IMMEDIATE` transaction. The write lock is
//! taken up front, so concurrent verifications of the same document queue up behind each other, and every one after
//! the first sees the document as verified and does nothing.
//!
//! [`OptimisticVerifier`] claims the document with a conditional write, then takes stock and moves the order in a
//! short transaction whose last write is conditional on the order status it read. A lost race on the order row is
//! reported as [`StoreError::ConcurrencyConflict`] after the stock changes are rolled back and the document flag has
//! been reset.
use chrono::{DateTime, Utc};
use log::*;
use sqlx::{pool::PoolConnection, Connection, Sqlite, SqliteConnection, SqlitePool};

use super::{catalog, documents, orders};
use crate::{
    db::traits::{StockDecrement, StoreError, VerificationBackend, VerificationMode, VerificationOutcome},
    db_types::{Actor, DocumentType, Order, OrderDocument, OrderId, OrderStatus},
};

const TARGET_STATUS: OrderStatus = OrderStatus::PendingPayment;

#[derive(Clone)]
pub enum SqliteVerifier {
    Atomic(AtomicVerifier),
    Optimistic(OptimisticVerifier),
}

impl SqliteVerifier {
    pub fn new(pool: SqlitePool, mode: VerificationMode) -> Self {
        match mode {
            VerificationMode::Atomic => Self::Atomic(AtomicVerifier::new(pool)),
            VerificationMode::Optimistic => Self::Optimistic(OptimisticVerifier::new(pool)),
        }
    }

    pub fn mode(&self) -> VerificationMode {
        match self {
            SqliteVerifier::Atomic(_) => VerificationMode::Atomic,
            SqliteVerifier::Optimistic(_) => VerificationMode::Optimistic,
        }
    }
}

impl VerificationBackend for SqliteVerifier {
    async fn verify_client_po(&self, document_id: i64, verifier: &Actor) -> Result<VerificationOutcome, StoreError> {
        match self {
            SqliteVerifier::Atomic(v) => v.verify_client_po(document_id, verifier).await,
            SqliteVerifier::Optimistic(v) => v.verify_client_po(document_id, verifier).await,
        }
    }

    async fn confirm_with_system_po(
        &self,
        order_id: OrderId,
        file_ref: &str,
        admin: &Actor,
    ) -> Result<VerificationOutcome, StoreError> {
        match self {
            SqliteVerifier::Atomic(v) => v.confirm_with_system_po(order_id, file_ref, admin).await,
            SqliteVerifier::Optimistic(v) => v.confirm_with_system_po(order_id, file_ref, admin).await,
        }
    }
}

fn check_transition(order: &Order) -> Result<(), StoreError> {
    if order.status.can_transition_to(TARGET_STATUS) {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition { order_id: order.id, from: order.status, to: TARGET_STATUS })
    }
}

fn check_client_po(document: &OrderDocument) -> Result<(), StoreError> {
    if document.document_type != DocumentType::ClientPo {
        return Err(StoreError::InvalidRequest(format!("Document #{} is not a client PO", document.id)));
    }
    if document.is_rejected() {
        return Err(StoreError::InvalidRequest(format!("Document #{} has been rejected", document.id)));
    }
    Ok(())
}

/// Takes the order's line items out of stock and moves the order to `PENDING_PAYMENT`. Stock is only ever taken once
/// per order: an order that an admin has already verified (and that a client has since re-submitted a PO for) is
/// moved back to `PENDING_PAYMENT` without touching stock.
///
/// The order row is written last. Callers run this inside a transaction, so a failure leaves stock and order as they
/// were.
async fn confirm_order(
    order: Order,
    verifier: &Actor,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(Order, Vec<StockDecrement>), StoreError> {
    let decrements = if order.admin_verified {
        info!("🗃️ Order {} has already been verified by an admin. Stock is left untouched.", order.id);
        vec![]
    } else {
        let items = orders::resolve_line_items(order.id, &mut *conn).await?;
        catalog::decrement_stock(&items, &mut *conn).await?
    };
    let moved = if order.admin_verified {
        order.status == TARGET_STATUS ||
            orders::update_status_if(order.id, order.status, TARGET_STATUS, &mut *conn).await?
    } else {
        orders::mark_admin_verified(order.id, order.status, verifier.user_id, now, &mut *conn).await?
    };
    if !moved {
        return Err(StoreError::ConcurrencyConflict(order.id));
    }
    let order = orders::fetch_existing_order(order.id, conn).await?;
    Ok((order, decrements))
}

//--------------------------------------     AtomicVerifier      -------------------------------------------------------
#[derive(Clone)]
pub struct AtomicVerifier {
    pool: SqlitePool,
}

impl AtomicVerifier {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Runs `f` inside a `BEGIN IMMEDIATE` transaction, committing on success and rolling back on error.
    async fn immediate<T, F>(&self, f: F) -> Result<T, StoreError>
    where F: for<'c> FnOnce(&'c mut SqliteConnection) -> futures_util::future::BoxFuture<'c, Result<T, StoreError>> {
        let mut conn: PoolConnection<Sqlite> = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        match f(&mut *conn).await {
            Ok(value) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(value)
            },
            Err(e) => {
                if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    error!("🗃️ Could not roll back verification transaction: {rollback_err}. Closing the connection.");
                    let _ = conn.detach();
                }
                Err(e)
            },
        }
    }
}

impl VerificationBackend for AtomicVerifier {
    async fn verify_client_po(&self, document_id: i64, verifier: &Actor) -> Result<VerificationOutcome, StoreError> {
        let verifier = verifier.clone();
        self.immediate(move |conn| {
            Box::pin(async move {
                let document = documents::fetch_document(document_id, &mut *conn)
                    .await?
                    .ok_or(StoreError::DocumentNotFound(document_id))?;
                check_client_po(&document)?;
                if document.is_verified() {
                    debug!("🗃️ Document #{document_id} is already verified. Nothing to do.");
                    return Ok(VerificationOutcome::AlreadyVerified {
                        order_id: document.order_id,
                        document_id: Some(document_id),
                    });
                }
                let order = orders::fetch_existing_order(document.order_id, &mut *conn).await?;
                check_transition(&order)?;
                let now = Utc::now();
                documents::mark_verified_if_unverified(document_id, verifier.user_id, now, &mut *conn).await?;
                let (order, decrements) = confirm_order(order, &verifier, now, conn).await?;
                info!("🗃️ Document #{document_id} verified. Order {} is now {}", order.id, order.status);
                Ok(VerificationOutcome::Verified { order, document_id, decrements })
            })
        })
        .await
    }

    async fn confirm_with_system_po(
        &self,
        order_id: OrderId,
        file_ref: &str,
        admin: &Actor,
    ) -> Result<VerificationOutcome, StoreError> {
        let admin = admin.clone();
        let file_ref = file_ref.to_string();
        self.immediate(move |conn| {
            Box::pin(async move {
                let order = orders::fetch_existing_order(order_id, &mut *conn).await?;
                if !orders::claim_system_po(order_id, &mut *conn).await? {
                    debug!("🗃️ A system PO already exists for order {order_id}. Nothing to do.");
                    return Ok(VerificationOutcome::AlreadyVerified { order_id, document_id: None });
                }
                check_transition(&order)?;
                let now = Utc::now();
                let document = documents::insert_verified_document(
                    order_id,
                    DocumentType::SystemPo,
                    &file_ref,
                    admin.user_id,
                    now,
                    &mut *conn,
                )
                .await?;
                let (order, decrements) = confirm_order(order, &admin, now, conn).await?;
                info!("🗃️ System PO #{} generated. Order {} is now {}", document.id, order.id, order.status);
                Ok(VerificationOutcome::Verified { order, document_id: document.id, decrements })
            })
        })
        .await
    }
}

//--------------------------------------   OptimisticVerifier    -------------------------------------------------------
#[derive(Clone)]
pub struct OptimisticVerifier {
    pool: SqlitePool,
}

impl OptimisticVerifier {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl VerificationBackend for OptimisticVerifier {
    async fn verify_client_po(&self, document_id: i64, verifier: &Actor) -> Result<VerificationOutcome, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let document =
            documents::fetch_document(document_id, &mut conn).await?.ok_or(StoreError::DocumentNotFound(document_id))?;
        check_client_po(&document)?;
        let order = orders::fetch_existing_order(document.order_id, &mut conn).await?;
        let already = VerificationOutcome::AlreadyVerified { order_id: order.id, document_id: Some(document_id) };
        if document.is_verified() {
            return Ok(already);
        }
        check_transition(&order)?;
        let now = Utc::now();
        if !documents::mark_verified_if_unverified(document_id, verifier.user_id, now, &mut conn).await? {
            debug!("🗃️ Document #{document_id} was verified by someone else in the meantime");
            return Ok(already);
        }
        let result = async {
            let mut tx = conn.begin().await?;
            let confirmed = confirm_order(order, verifier, now, &mut tx).await?;
            tx.commit().await?;
            Ok::<_, StoreError>(confirmed)
        }
        .await;
        match result {
            Ok((order, decrements)) => Ok(VerificationOutcome::Verified { order, document_id, decrements }),
            Err(e) => {
                warn!("🗃️ Could not confirm order for document #{document_id}: {e}. Resetting the document.");
                documents::clear_verification(document_id, verifier.user_id, &mut conn).await?;
                Err(e)
            },
        }
    }

    async fn confirm_with_system_po(
        &self,
        order_id: OrderId,
        file_ref: &str,
        admin: &Actor,
    ) -> Result<VerificationOutcome, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_existing_order(order_id, &mut conn).await?;
        if order.system_po_generated {
            return Ok(VerificationOutcome::AlreadyVerified { order_id, document_id: None });
        }
        check_transition(&order)?;
        if !orders::claim_system_po(order_id, &mut conn).await? {
            return Ok(VerificationOutcome::AlreadyVerified { order_id, document_id: None });
        }
        let now = Utc::now();
        let result = async {
            let mut tx = conn.begin().await?;
            let document = documents::insert_verified_document(
                order_id,
                DocumentType::SystemPo,
                file_ref,
                admin.user_id,
                now,
                &mut tx,
            )
            .await?;
            let (order, decrements) = confirm_order(order, admin, now, &mut tx).await?;
            tx.commit().await?;
            Ok::<_, StoreError>(VerificationOutcome::Verified { order, document_id: document.id, decrements })
        }
        .await;
        if let Err(e) = &result {
            warn!("🗃️ Could not confirm order {order_id} with a system PO: {e}. Releasing the claim.");
            orders::release_system_po(order_id, &mut conn).await?;
        }
        result
    }
}
