use thiserror::Error;

use crate::db_types::{OrderId, OrderStatus};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The database schema is out of date. {missing} does not exist")]
    SchemaCompatibility { missing: String },
    #[error("Order {0} was modified by someone else. Refresh the order and try again.")]
    ConcurrencyConflict(OrderId),
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition { order_id: OrderId, from: OrderStatus, to: OrderStatus },
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Document {0} does not exist")]
    DocumentNotFound(i64),
    #[error("Quote {0} does not exist")]
    QuoteNotFound(i64),
    #[error("RFQ {0} does not exist")]
    RfqNotFound(i64),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(String),
    #[error("Payment {0} has already been registered")]
    DuplicatePayment(String),
    #[error("{0}")]
    InvalidRequest(String),
}

impl StoreError {
    pub fn is_schema_error(&self) -> bool {
        matches!(self, StoreError::SchemaCompatibility { .. })
    }
}
