//! TradeFlow engine
//!
//! The engine owns the order lifecycle of the TradeFlow marketplace: RFQs are quoted (by suppliers, or
//! automatically), accepted quotes become orders, orders are backed by a verified purchase order, and payments
//! reported by the gateway settle them.
//!
//! The library is divided into these sections:
//! 1. Pure domain logic. [`order_state_machine`] validates status changes and [`auto_quote`] prices RFQs.
//! 2. Database management and control ([`mod@db`]). The storage traits and their SQLite implementation. You should
//!    not need to touch the database directly. The exception is the data types in [`db_types`], which are public.
//! 3. The public API ([`mod@tf_api`]). PO verification, payment webhooks, auto-quote runs, order flow and the audit
//!    trail.
//!
//! Two events, [`events::OrderConfirmedEvent`] and [`events::PaymentConfirmedEvent`], are published for downstream
//! services such as fulfillment to hook into.
pub mod db;

pub mod auto_quote;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod order_state_machine;
pub mod storage;
pub mod tf_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{verification::SqliteVerifier, SqliteDatabase};
pub use db::traits;
pub use tf_api::{
    audit_api::AuditApi,
    auto_quote_api::{AutoQuoteApi, AutoQuoteSummary},
    errors::{AuditApiError, AutoQuoteError, OrderFlowError, PaymentWebhookError, PoWorkflowError},
    gateway::{map_gateway_status, GatewayError, GatewayPaymentUpdate, PaymentGateway},
    order_flow_api::OrderFlowApi,
    payment_webhook_api::{PaymentProcessingResult, PaymentWebhookApi},
    po_workflow_api::PoWorkflowApi,
};
