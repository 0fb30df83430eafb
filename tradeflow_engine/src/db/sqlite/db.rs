use std::fmt::Debug;

use chrono::{DateTime, NaiveDate, Utc};
use log::*;
use sqlx::SqlitePool;

use super::{audit, catalog, db_url, documents, new_pool, orders, payments, quotes, verification::SqliteVerifier};
use crate::{
    db::traits::{
        AcceptedQuote,
        AuditLog,
        AutoQuoteCommit,
        CatalogManagement,
        OrderManagement,
        PaymentManagement,
        PoManagement,
        QuoteManagement,
        StoreError,
        VerificationMode,
    },
    db_types::{
        Actor,
        DocumentType,
        Invoice,
        LineItem,
        MarginSetting,
        NewInvoice,
        NewPayment,
        NewPoAuditEntry,
        NewProduct,
        NewQuote,
        NewRfq,
        Order,
        OrderDocument,
        OrderId,
        OrderItem,
        OrderStatus,
        PaymentRecord,
        PaymentStatus,
        PaymentUpdate,
        PoAuditEntry,
        Product,
        Quote,
        QuoteStatus,
        Rfq,
        RfqStatus,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `TFL_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, StoreError> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }

    /// The verification backend for `mode`, sharing this database's connection pool.
    pub fn verifier(&self, mode: VerificationMode) -> SqliteVerifier {
        info!("🗃️ Using the {mode} verification backend");
        SqliteVerifier::new(self.pool.clone(), mode)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await
    }

    async fn fetch_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_items(order_id, &mut conn).await
    }

    async fn resolve_line_items(&self, order_id: OrderId) -> Result<Vec<LineItem>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::resolve_line_items(order_id, &mut conn).await
    }

    async fn accept_quote(&self, quote_id: i64, client_id: i64) -> Result<AcceptedQuote, StoreError> {
        let mut tx = self.pool.begin().await?;
        let quote = quotes::fetch_quote(quote_id, &mut tx).await?.ok_or(StoreError::QuoteNotFound(quote_id))?;
        if !quotes::update_quote_status_if(quote_id, QuoteStatus::SentToClient, QuoteStatus::Accepted, &mut tx).await? {
            return Err(StoreError::InvalidRequest(format!(
                "Quote #{quote_id} is {} and cannot be accepted",
                quote.status
            )));
        }
        let rejected = quotes::reject_competing_quotes(quote.rfq_id, quote_id, &mut tx).await?;
        catalog::update_rfq_status(quote.rfq_id, RfqStatus::Closed, &mut tx).await?;
        let order_id = orders::insert_order_for_quote(&quote, client_id, &mut tx).await?;
        let order = orders::fetch_existing_order(order_id, &mut tx).await?;
        let quote = quotes::fetch_quote(quote_id, &mut tx).await?.ok_or(StoreError::QuoteNotFound(quote_id))?;
        tx.commit().await?;
        debug!("🗃️ Quote #{quote_id} accepted. {rejected} competing quote(s) rejected. Order {order_id} created.");
        Ok(AcceptedQuote { order, quote })
    }

    async fn update_order_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_existing_order(order_id, &mut conn).await?;
        if order.status != expected {
            return Err(StoreError::ConcurrencyConflict(order_id));
        }
        if expected == next {
            return Ok(order);
        }
        if !expected.can_transition_to(next) {
            return Err(StoreError::InvalidTransition { order_id, from: expected, to: next });
        }
        if !orders::update_status_if(order_id, expected, next, &mut conn).await? {
            return Err(StoreError::ConcurrencyConflict(order_id));
        }
        debug!("🗃️ Order {order_id} moved from {expected} to {next}");
        orders::fetch_existing_order(order_id, &mut conn).await
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        let mut conn = self.pool.acquire().await?;
        catalog::insert_product(product, &mut conn).await
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_product(product_id, &mut conn).await
    }

    async fn fetch_products(&self) -> Result<Vec<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_products(&mut conn).await
    }

    async fn set_margin(&self, category: Option<&str>, margin_percent: f64) -> Result<MarginSetting, StoreError> {
        let mut tx = self.pool.begin().await?;
        let setting = catalog::set_margin(category, margin_percent, &mut tx).await?;
        tx.commit().await?;
        Ok(setting)
    }

    async fn fetch_margin_settings(&self) -> Result<Vec<MarginSetting>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_margin_settings(&mut conn).await
    }

    async fn insert_rfq(&self, rfq: NewRfq) -> Result<Rfq, StoreError> {
        let mut tx = self.pool.begin().await?;
        let rfq = catalog::insert_rfq(rfq, &mut tx).await?;
        tx.commit().await?;
        Ok(rfq)
    }

    async fn fetch_rfq(&self, rfq_id: i64) -> Result<Option<Rfq>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_rfq(rfq_id, &mut conn).await
    }

    async fn fetch_open_rfqs(&self) -> Result<Vec<Rfq>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_open_rfqs(&mut conn).await
    }
}

impl QuoteManagement for SqliteDatabase {
    async fn insert_quote(&self, quote: NewQuote) -> Result<Quote, StoreError> {
        let mut tx = self.pool.begin().await?;
        let quote = quotes::insert_quote(quote, &mut tx).await?;
        tx.commit().await?;
        Ok(quote)
    }

    async fn fetch_quote(&self, quote_id: i64) -> Result<Option<Quote>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        quotes::fetch_quote(quote_id, &mut conn).await
    }

    async fn quotes_for_rfq(&self, rfq_id: i64) -> Result<Vec<Quote>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        quotes::quotes_for_rfq(rfq_id, &mut conn).await
    }

    async fn commit_auto_quotes(&self, rfq_id: i64, new_quotes: Vec<NewQuote>) -> Result<AutoQuoteCommit, StoreError> {
        let mut tx = self.pool.begin().await?;
        if !catalog::claim_auto_quote(rfq_id, &mut tx).await? {
            debug!("🗃️ RFQ #{rfq_id} has already been auto-quoted");
            return Ok(AutoQuoteCommit::AlreadyTriggered);
        }
        let mut saved = Vec::with_capacity(new_quotes.len());
        for quote in new_quotes {
            saved.push(quotes::insert_quote(quote, &mut tx).await?);
        }
        if !saved.is_empty() {
            catalog::update_rfq_status(rfq_id, RfqStatus::Quoted, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(AutoQuoteCommit::Committed(saved))
    }
}

impl PoManagement for SqliteDatabase {
    async fn insert_client_po(
        &self,
        order_id: OrderId,
        file_ref: &str,
        uploader: &Actor,
        move_to_pending_admin: bool,
    ) -> Result<OrderDocument, StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_existing_order(order_id, &mut tx).await?;
        let target = OrderStatus::PendingAdminConfirmation;
        if move_to_pending_admin && !order.status.can_transition_to(target) {
            return Err(StoreError::InvalidTransition { order_id, from: order.status, to: target });
        }
        let document =
            documents::insert_document(order_id, DocumentType::ClientPo, file_ref, uploader.user_id, &mut tx).await?;
        orders::set_client_po_uploaded(order_id, true, &mut tx).await?;
        if move_to_pending_admin &&
            order.status != target &&
            !orders::update_status_if(order_id, order.status, target, &mut tx).await?
        {
            return Err(StoreError::ConcurrencyConflict(order_id));
        }
        tx.commit().await?;
        Ok(document)
    }

    async fn fetch_document(&self, document_id: i64) -> Result<Option<OrderDocument>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        documents::fetch_document(document_id, &mut conn).await
    }

    async fn documents_for_order(&self, order_id: OrderId) -> Result<Vec<OrderDocument>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        documents::documents_for_order(order_id, &mut conn).await
    }

    async fn reject_document(&self, document_id: i64, reason: &str) -> Result<Option<OrderDocument>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let document = documents::reject_if_open(document_id, reason, Utc::now(), &mut tx).await?;
        if let Some(doc) = &document {
            orders::set_client_po_uploaded(doc.order_id, false, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(document)
    }
}

impl PaymentManagement for SqliteDatabase {
    async fn insert_payment(&self, payment: NewPayment) -> Result<PaymentRecord, StoreError> {
        let mut tx = self.pool.begin().await?;
        let order_id = payment.order_id;
        orders::fetch_existing_order(order_id, &mut tx).await?;
        let record = payments::insert_payment(payment, &mut tx).await?;
        orders::set_payment_submitted(order_id, record.created_at, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payment {} registered for order {order_id}", record.external_payment_id);
        Ok(record)
    }

    async fn fetch_payment_by_external_id(&self, external_id: &str) -> Result<Option<PaymentRecord>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment_by_external_id(external_id, &mut conn).await
    }

    async fn update_payment(&self, payment_id: i64, update: &PaymentUpdate) -> Result<PaymentRecord, StoreError> {
        let mut conn = self.pool.acquire().await?;
        payments::update_payment(payment_id, update, &mut conn).await?;
        payments::fetch_payment(payment_id, &mut conn).await
    }

    async fn update_payment_status(
        &self,
        payment_id: i64,
        status: PaymentStatus,
    ) -> Result<PaymentRecord, StoreError> {
        let mut conn = self.pool.acquire().await?;
        payments::update_payment_status(payment_id, status, &mut conn).await?;
        payments::fetch_payment(payment_id, &mut conn).await
    }

    async fn confirm_order_payment(
        &self,
        order_id: OrderId,
        payment_reference: &str,
        confirmed_at: DateTime<Utc>,
    ) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        if orders::confirm_payment(order_id, payment_reference, confirmed_at, &mut conn).await? {
            orders::fetch_order(order_id, &mut conn).await
        } else {
            Ok(None)
        }
    }

    async fn insert_invoice(&self, invoice: NewInvoice) -> Result<Invoice, StoreError> {
        let mut conn = self.pool.acquire().await?;
        payments::insert_invoice(invoice, &mut conn).await
    }

    async fn fetch_invoice_for_order(&self, order_id: OrderId) -> Result<Option<Invoice>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_invoice_for_order(order_id, &mut conn).await
    }

    async fn mark_invoice_paid(&self, order_id: OrderId, paid_date: NaiveDate) -> Result<Option<Invoice>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        payments::mark_invoice_paid(order_id, paid_date, &mut conn).await
    }
}

impl AuditLog for SqliteDatabase {
    async fn append_audit_entry(&self, entry: NewPoAuditEntry) -> Result<PoAuditEntry, StoreError> {
        let mut conn = self.pool.acquire().await?;
        audit::append_entry(entry, &mut conn).await
    }

    async fn audit_trail(&self, order_id: OrderId) -> Result<Vec<PoAuditEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        audit::entries_for_order(order_id, &mut conn).await
    }
}
