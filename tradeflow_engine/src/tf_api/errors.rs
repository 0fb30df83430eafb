use thiserror::Error;

use crate::{db::traits::StoreError, storage::StorageError};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

#[derive(Debug, Clone, Error)]
pub enum PoWorkflowError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

#[derive(Debug, Clone, Error)]
pub enum PaymentWebhookError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("The payment gateway could not be reached: {0}")]
    Gateway(String),
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Clone, Error)]
pub enum AutoQuoteError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Error)]
pub enum AuditApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
}
