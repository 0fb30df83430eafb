//! # Database management and control.
//!
//! This module defines the interface contracts that storage *backends* must honour in order to drive the engine.
//!
//! * [`OrderManagement`] covers orders and their line items, quote acceptance and manual status changes.
//! * [`CatalogManagement`] exposes products, margin settings and RFQs.
//! * [`QuoteManagement`] stores quotes and commits auto-quote batches.
//! * [`PoManagement`] stores purchase order documents.
//! * [`VerificationBackend`] is the atomic "verify and confirm" primitive behind PO verification.
//! * [`PaymentManagement`] holds payment records and invoices, and the conditional writes used by the webhook
//!   processor.
//! * [`AuditLog`] is the append-only PO audit trail.
//!
//! All backends report failures with [`StoreError`]. Schema drift in older deployments is reported as
//! [`StoreError::SchemaCompatibility`] so that callers can degrade gracefully.
mod audit_log;
mod catalog_management;
mod data_objects;
mod errors;
mod order_management;
mod payment_management;
mod po_management;
mod quote_management;
mod verification_backend;

pub use audit_log::AuditLog;
pub use catalog_management::CatalogManagement;
pub use data_objects::{AcceptedQuote, AutoQuoteCommit, StockDecrement, VerificationOutcome};
pub use errors::StoreError;
pub use order_management::OrderManagement;
pub use payment_management::PaymentManagement;
pub use po_management::PoManagement;
pub use quote_management::QuoteManagement;
pub use verification_backend::{VerificationBackend, VerificationMode};
