//! # TradeFlow engine public API
//!
//! Each API wraps a storage backend (and, where needed, a verification backend, document storage or payment
//! gateway) and exposes one area of the order lifecycle:
//!
//! * [`order_flow_api`] accepts quotes, registers payments and applies manual status changes.
//! * [`auto_quote_api`] runs the auto-quote engine and commits its output.
//! * [`po_workflow_api`] handles PO upload, verification, rejection and system PO generation.
//! * [`payment_webhook_api`] applies payment gateway events to payments, orders and invoices.
//! * [`audit_api`] reads the PO audit trail.
//!
//! # API usage
//!
//! ```rust,ignore
//! use tradeflow_engine::{OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/tradeflow.db", 25).await?;
//! let api = OrderFlowApi::new(db);
//! let transitions = api.allowed_transitions(order_id, &actor).await?;
//! ```
pub mod audit_api;
pub mod auto_quote_api;
pub mod errors;
pub mod gateway;
pub mod order_flow_api;
pub mod payment_webhook_api;
pub mod po_workflow_api;

use crate::db::traits::{
    AuditLog,
    CatalogManagement,
    OrderManagement,
    PaymentManagement,
    PoManagement,
    QuoteManagement,
};

/// Everything [`order_flow_api::OrderFlowApi`] needs from a backend.
pub trait OrderStore: OrderManagement + QuoteManagement + CatalogManagement + PaymentManagement {}
impl<T> OrderStore for T where T: OrderManagement + QuoteManagement + CatalogManagement + PaymentManagement {}

/// Everything [`po_workflow_api::PoWorkflowApi`] needs from a backend.
pub trait PoStore: OrderManagement + PoManagement + AuditLog {}
impl<T> PoStore for T where T: OrderManagement + PoManagement + AuditLog {}

/// Everything [`payment_webhook_api::PaymentWebhookApi`] needs from a backend.
pub trait PaymentStore: OrderManagement + PaymentManagement {}
impl<T> PaymentStore for T where T: OrderManagement + PaymentManagement {}

/// Everything [`auto_quote_api::AutoQuoteApi`] needs from a backend.
pub trait QuoteStore: CatalogManagement + QuoteManagement {}
impl<T> QuoteStore for T where T: CatalogManagement + QuoteManagement {}
