use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tradeflow_engine::{
    db_types::{Money, Order, OrderStatus, PaymentRecord, Quote},
    traits::{AcceptedQuote, StockDecrement, VerificationOutcome},
    PaymentProcessingResult,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangeRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPaymentRequest {
    pub payment_id: String,
    /// Defaults to the order amount.
    #[serde(default)]
    pub amount: Option<Money>,
}

/// A client PO upload. `content` is the base64-encoded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoUploadRequest {
    pub file_name: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

pub const SYNC_MODE: &str = "sync_by_payment_id";

/// The body of a sync request on the webhook route: `{"mode": "sync_by_payment_id", "paymentId": "..."}`. The mode
/// may be left out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPaymentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(alias = "paymentId", alias = "id")]
    pub payment_id: String,
}

impl SyncPaymentRequest {
    pub fn has_sync_mode(&self) -> bool {
        self.mode.as_deref().map_or(true, |m| m == SYNC_MODE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedUrlQuery {
    pub expires: i64,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionsResponse {
    pub order_id: i64,
    pub status: OrderStatus,
    pub allowed: Vec<OrderStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptQuoteResponse {
    pub order: Order,
    pub quote: Quote,
}

impl From<AcceptedQuote> for AcceptQuoteResponse {
    fn from(value: AcceptedQuote) -> Self {
        Self { order: value.order, quote: value.quote }
    }
}

/// The result of a verify or system PO call. `already_verified` is true when an earlier call did the work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResponse {
    pub order_id: i64,
    pub already_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stock_decrements: Vec<StockDecrement>,
}

impl From<VerificationOutcome> for VerificationResponse {
    fn from(outcome: VerificationOutcome) -> Self {
        match outcome {
            VerificationOutcome::Verified { order, document_id, decrements } => Self {
                order_id: order.id.value(),
                already_verified: false,
                document_id: Some(document_id),
                order: Some(order),
                stock_decrements: decrements,
            },
            VerificationOutcome::AlreadyVerified { order_id, document_id } => Self {
                order_id: order_id.value(),
                already_verified: true,
                document_id,
                order: None,
                stock_decrements: vec![],
            },
        }
    }
}

/// Webhook replies. Push replies never carry payment details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotent: Option<bool>,
}

impl WebhookResponse {
    pub fn webhook() -> Self {
        Self { success: true, source: "webhook".into(), payment: None, idempotent: None }
    }

    pub fn sync(result: PaymentProcessingResult) -> Self {
        Self { success: true, source: "sync".into(), payment: Some(result.payment), idempotent: Some(result.idempotent) }
    }
}
