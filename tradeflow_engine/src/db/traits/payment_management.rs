use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    db::traits::StoreError,
    db_types::{Invoice, NewInvoice, NewPayment, Order, OrderId, PaymentRecord, PaymentStatus, PaymentUpdate},
};

#[allow(async_fn_in_trait)]
pub trait PaymentManagement {
    /// Stores a new `PENDING` payment and stamps the order's `payment_submitted_at`.
    async fn insert_payment(&self, payment: NewPayment) -> Result<PaymentRecord, StoreError>;

    async fn fetch_payment_by_external_id(&self, external_id: &str) -> Result<Option<PaymentRecord>, StoreError>;

    /// Writes the new status together with its timestamp column (and failure reason). Older schemas without the
    /// timestamp columns return [`StoreError::SchemaCompatibility`].
    async fn update_payment(&self, payment_id: i64, update: &PaymentUpdate) -> Result<PaymentRecord, StoreError>;

    /// Writes only the status column.
    async fn update_payment_status(&self, payment_id: i64, status: PaymentStatus)
        -> Result<PaymentRecord, StoreError>;

    /// Moves the order to `PAYMENT_CONFIRMED`, but only from `PENDING_PAYMENT` or `AWAITING_CONFIRMATION`.
    /// Returns `None` if the order was in any other status.
    async fn confirm_order_payment(
        &self,
        order_id: OrderId,
        payment_reference: &str,
        confirmed_at: DateTime<Utc>,
    ) -> Result<Option<Order>, StoreError>;

    async fn insert_invoice(&self, invoice: NewInvoice) -> Result<Invoice, StoreError>;

    async fn fetch_invoice_for_order(&self, order_id: OrderId) -> Result<Option<Invoice>, StoreError>;

    /// Marks the order's `SENT` or `OVERDUE` invoice as paid. Returns `None` if there is no such invoice.
    async fn mark_invoice_paid(&self, order_id: OrderId, paid_date: NaiveDate) -> Result<Option<Invoice>, StoreError>;
}
