use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tf_common::Money;

/// A payment object as returned by `GET /payments/{id}`, and as carried in webhook bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    /// The raw gateway status, e.g. `initiated`, `paid`, `failed`, `authorized`, `captured`, `refunded`, `voided`.
    pub status: String,
    #[serde(default)]
    pub amount: Money,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<PaymentMetadata>,
    #[serde(default)]
    pub source: Option<PaymentSource>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentMetadata {
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentSource {
    #[serde(rename = "type", default)]
    pub source_type: Option<String>,
    /// Human readable reason reported by the issuer. Populated for failed payments.
    #[serde(default)]
    pub message: Option<String>,
}

impl GatewayPayment {
    pub fn failure_reason(&self) -> Option<String> {
        self.source.as_ref().and_then(|s| s.message.clone())
    }
}

/// The body of a webhook push. The gateway wraps the payment in a `data` field, but bare payment objects are
/// accepted too.
#[derive(Debug, Clone)]
pub struct WebhookPayload {
    pub event_type: Option<String>,
    pub payment: GatewayPayment,
}

impl WebhookPayload {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let event_type = value.get("type").and_then(Value::as_str).map(String::from);
        let payment = match value.get("data") {
            Some(data) if data.is_object() => serde_json::from_value(data.clone())?,
            _ => serde_json::from_value(value)?,
        };
        Ok(Self { event_type, payment })
    }
}
