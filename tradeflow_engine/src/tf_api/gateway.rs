//! The engine's view of an external payment gateway.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Money, PaymentStatus};

/// A payment as the gateway reports it, reduced to what the engine needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPaymentUpdate {
    pub external_payment_id: String,
    /// The gateway's own status string, e.g. `paid` or `voided`.
    pub status: String,
    pub amount: Option<Money>,
    pub failure_reason: Option<String>,
}

impl GatewayPaymentUpdate {
    pub fn new<S: Into<String>, T: Into<String>>(external_payment_id: S, status: T) -> Self {
        Self { external_payment_id: external_payment_id.into(), status: status.into(), amount: None, failure_reason: None }
    }

    pub fn with_failure_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }

    pub fn mapped_status(&self) -> PaymentStatus {
        map_gateway_status(&self.status)
    }
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Payment {0} is unknown to the gateway")]
    PaymentNotFound(String),
    #[error("{0}")]
    Unavailable(String),
}

/// Pulls payment state from the gateway.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    async fn fetch_payment(&self, external_payment_id: &str) -> Result<GatewayPaymentUpdate, GatewayError>;
}

/// Maps a gateway status onto [`PaymentStatus`]. Unrecognised values are treated as `PENDING`.
pub fn map_gateway_status(status: &str) -> PaymentStatus {
    match status.trim().to_ascii_lowercase().as_str() {
        "initiated" => PaymentStatus::Pending,
        "paid" => PaymentStatus::Paid,
        "failed" => PaymentStatus::Failed,
        "authorized" => PaymentStatus::Authorized,
        "captured" => PaymentStatus::Captured,
        "refunded" => PaymentStatus::Refunded,
        "voided" => PaymentStatus::Cancelled,
        _ => PaymentStatus::Pending,
    }
}
