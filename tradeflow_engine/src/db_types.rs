use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

pub use tf_common::Money;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

/// Implements `Display` and `FromStr` for enums that are persisted as fixed strings.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s,)+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant),)+
                    s => Err(ConversionError(format!("{s} is not a valid {}", stringify!($name)))),
                }
            }
        }
    };
}

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim_start_matches('#').parse::<i64>().map(Self).map_err(|_| ConversionError(format!("{s} is not an order id")))
    }
}

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------      OrderStatus      ---------------------------------------------------------
/// The lifecycle status of an order. Legal moves between statuses are defined in
/// [`crate::order_state_machine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// The order was created from an accepted quote and waits for an admin to verify the purchase order.
    PendingAdminConfirmation,
    /// Legacy status for orders that were confirmed before the payment step existed.
    Confirmed,
    /// The purchase order has been verified. The client can pay now.
    PendingPayment,
    /// The client has submitted a payment that the gateway has not settled yet.
    AwaitingConfirmation,
    PaymentConfirmed,
    Processing,
    ReadyForPickup,
    PickupScheduled,
    PickedUp,
    OutForDelivery,
    Shipped,
    InTransit,
    Delivered,
    Completed,
    Disputed,
    Cancelled,
    Refunded,
}

string_enum!(OrderStatus {
    PendingAdminConfirmation => "PENDING_ADMIN_CONFIRMATION",
    Confirmed => "CONFIRMED",
    PendingPayment => "PENDING_PAYMENT",
    AwaitingConfirmation => "AWAITING_CONFIRMATION",
    PaymentConfirmed => "PAYMENT_CONFIRMED",
    Processing => "PROCESSING",
    ReadyForPickup => "READY_FOR_PICKUP",
    PickupScheduled => "PICKUP_SCHEDULED",
    PickedUp => "PICKED_UP",
    OutForDelivery => "OUT_FOR_DELIVERY",
    Shipped => "SHIPPED",
    InTransit => "IN_TRANSIT",
    Delivered => "DELIVERED",
    Completed => "COMPLETED",
    Disputed => "DISPUTED",
    Cancelled => "CANCELLED",
    Refunded => "REFUNDED",
});

//--------------------------------------         Role          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Supplier,
    Admin,
}

string_enum!(Role {
    Client => "client",
    Supplier => "supplier",
    Admin => "admin",
});

/// The authenticated caller of an engine operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
    /// Best-effort remote address, recorded in audit metadata.
    #[serde(default)]
    pub ip: Option<String>,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role, ip: None }
    }

    pub fn admin(user_id: i64) -> Self {
        Self::new(user_id, Role::Admin)
    }

    pub fn client(user_id: i64) -> Self {
        Self::new(user_id, Role::Client)
    }

    pub fn with_ip<S: Into<String>>(mut self, ip: S) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub amount: Money,
    pub client_id: i64,
    pub supplier_id: Option<i64>,
    pub quote_id: Option<i64>,
    pub system_po_generated: bool,
    pub client_po_uploaded: bool,
    pub admin_verified: bool,
    pub admin_verified_by: Option<i64>,
    pub admin_verified_at: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    pub payment_confirmed_at: Option<DateTime<Utc>>,
    pub payment_submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

/// A product and a quantity that will be taken out of stock when an order is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: i64,
    pub quantity: i64,
}

//--------------------------------------        Product        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    InStock,
    LimitedStock,
    LowStock,
    OutOfStock,
    Other(String),
}

impl Availability {
    pub fn as_str(&self) -> &str {
        match self {
            Availability::InStock => "IN_STOCK",
            Availability::LimitedStock => "LIMITED_STOCK",
            Availability::LowStock => "LOW_STOCK",
            Availability::OutOfStock => "OUT_OF_STOCK",
            Availability::Other(s) => s.as_str(),
        }
    }

    /// Limited and low stock products are only auto-quoted when explicitly enabled.
    pub fn is_limited(&self) -> bool {
        matches!(self, Availability::LimitedStock | Availability::LowStock)
    }
}

impl From<String> for Availability {
    fn from(value: String) -> Self {
        match value.as_str() {
            "IN_STOCK" => Self::InStock,
            "LIMITED_STOCK" => Self::LimitedStock,
            "LOW_STOCK" => Self::LowStock,
            "OUT_OF_STOCK" => Self::OutOfStock,
            _ => Self::Other(value),
        }
    }
}

impl Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub supplier_id: i64,
    pub category: Option<String>,
    pub supplier_price: Money,
    #[sqlx(try_from = "String")]
    pub availability: Availability,
    pub stock: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub supplier_id: i64,
    pub category: Option<String>,
    pub supplier_price: Money,
    pub availability: Availability,
    pub stock: Option<i64>,
}

impl NewProduct {
    pub fn new<S: Into<String>>(name: S, supplier_id: i64, supplier_price: Money) -> Self {
        Self {
            name: name.into(),
            supplier_id,
            category: None,
            supplier_price,
            availability: Availability::InStock,
            stock: None,
        }
    }

    pub fn with_category<S: Into<String>>(mut self, category: S) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }

    pub fn with_stock(mut self, stock: i64) -> Self {
        self.stock = Some(stock);
        self
    }
}

/// A margin percentage for a product category. The row with no category is the global default.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct MarginSetting {
    pub id: i64,
    pub category: Option<String>,
    pub margin_percent: f64,
}

//--------------------------------------          RFQ          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RfqStatus {
    Open,
    Quoted,
    Closed,
}

string_enum!(RfqStatus { Open => "OPEN", Quoted => "QUOTED", Closed => "CLOSED" });

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Rfq {
    pub id: i64,
    pub client_id: i64,
    pub status: RfqStatus,
    pub auto_quote_triggered: bool,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub items: Vec<RfqItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct RfqItem {
    pub id: i64,
    pub rfq_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub notes: Option<String>,
    pub flexibility: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRfq {
    pub client_id: i64,
    pub items: Vec<NewRfqItem>,
    /// Defaults to the current time when absent.
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRfqItem {
    pub product_id: i64,
    pub quantity: i64,
    pub notes: Option<String>,
    pub flexibility: Option<String>,
}

impl NewRfqItem {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self { product_id, quantity, notes: None, flexibility: None }
    }
}

//--------------------------------------         Quote         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QuoteType {
    Auto,
    Custom,
}

string_enum!(QuoteType { Auto => "auto", Custom => "custom" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteStatus {
    PendingAdmin,
    SentToClient,
    Accepted,
    Rejected,
}

string_enum!(QuoteStatus {
    PendingAdmin => "PENDING_ADMIN",
    SentToClient => "SENT_TO_CLIENT",
    Accepted => "ACCEPTED",
    Rejected => "REJECTED",
});

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Quote {
    pub id: i64,
    pub rfq_id: i64,
    pub supplier_id: i64,
    pub supplier_price: Money,
    pub margin_percent: f64,
    pub final_price: Money,
    pub lead_time: String,
    pub quote_type: QuoteType,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub items: Vec<QuoteItem>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct QuoteItem {
    pub id: i64,
    pub quote_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub supplier_unit_price: Money,
    pub margin_percent: f64,
    pub unit_price: Money,
    pub line_total: Money,
    pub is_alternative: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuote {
    pub rfq_id: i64,
    pub supplier_id: i64,
    pub supplier_price: Money,
    pub margin_percent: f64,
    pub final_price: Money,
    pub lead_time: String,
    pub quote_type: QuoteType,
    pub status: QuoteStatus,
    pub items: Vec<NewQuoteItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuoteItem {
    pub product_id: i64,
    pub quantity: i64,
    pub supplier_unit_price: Money,
    pub margin_percent: f64,
    pub unit_price: Money,
    pub line_total: Money,
    pub is_alternative: bool,
}

//--------------------------------------    Order documents    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    SystemPo,
    ClientPo,
}

string_enum!(DocumentType { SystemPo => "SYSTEM_PO", ClientPo => "CLIENT_PO" });

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderDocument {
    pub id: i64,
    pub order_id: OrderId,
    pub document_type: DocumentType,
    pub file_ref: String,
    pub uploaded_by: i64,
    pub verified_by: Option<i64>,
    pub verified_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OrderDocument {
    pub fn is_verified(&self) -> bool {
        self.verified_at.is_some()
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected_at.is_some()
    }
}

//--------------------------------------       PO audit        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoAction {
    PoGenerated,
    ClientPoUploaded,
    ClientPoConfirmed,
    PoVerified,
    PoRejected,
}

string_enum!(PoAction {
    PoGenerated => "PO_GENERATED",
    ClientPoUploaded => "CLIENT_PO_UPLOADED",
    ClientPoConfirmed => "CLIENT_PO_CONFIRMED",
    PoVerified => "PO_VERIFIED",
    PoRejected => "PO_REJECTED",
});

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PoAuditEntry {
    pub id: i64,
    pub order_id: OrderId,
    pub document_id: Option<i64>,
    pub actor_user_id: i64,
    pub actor_role: Role,
    pub action: PoAction,
    pub metadata: Json<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPoAuditEntry {
    pub order_id: OrderId,
    pub document_id: Option<i64>,
    pub actor_user_id: i64,
    pub actor_role: Role,
    pub action: PoAction,
    pub metadata: Value,
}

impl NewPoAuditEntry {
    pub fn new(order_id: OrderId, actor: &Actor, action: PoAction) -> Self {
        let metadata = match &actor.ip {
            Some(ip) => serde_json::json!({ "ip": ip }),
            None => serde_json::json!({ "ip": "unknown" }),
        };
        Self { order_id, document_id: None, actor_user_id: actor.user_id, actor_role: actor.role, action, metadata }
    }

    pub fn with_document(mut self, document_id: i64) -> Self {
        self.document_id = Some(document_id);
        self
    }

    /// Adds a key to the metadata object.
    pub fn with_meta<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        if let Value::Object(map) = &mut self.metadata {
            map.insert(key.to_string(), value.into());
        } else {
            warn!("Audit metadata for order {} is not an object. Dropping {key}", self.order_id);
        }
        self
    }
}

//--------------------------------------       Payments        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Authorized,
    Captured,
    Paid,
    Failed,
    Refunded,
    PartiallyRefunded,
    Cancelled,
}

string_enum!(PaymentStatus {
    Pending => "PENDING",
    Authorized => "AUTHORIZED",
    Captured => "CAPTURED",
    Paid => "PAID",
    Failed => "FAILED",
    Refunded => "REFUNDED",
    PartiallyRefunded => "PARTIALLY_REFUNDED",
    Cancelled => "CANCELLED",
});

impl PaymentStatus {
    /// Statuses from which the gateway will not move a payment any further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Captured | PaymentStatus::Refunded | PaymentStatus::Cancelled)
    }

    /// True if the money has been collected from the client.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Captured)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: i64,
    pub order_id: OrderId,
    pub external_payment_id: String,
    pub amount: Money,
    pub status: PaymentStatus,
    // Older deployments lack the timestamp columns
    #[sqlx(default)]
    pub authorized_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub failed_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub failure_reason: Option<String>,
    #[sqlx(default)]
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub external_payment_id: String,
    pub amount: Money,
}

impl NewPayment {
    pub fn new<S: Into<String>>(order_id: OrderId, external_payment_id: S, amount: Money) -> Self {
        Self { order_id, external_payment_id: external_payment_id.into(), amount }
    }
}

/// A status change for a payment record, with the timestamp column that goes with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentUpdate {
    pub status: PaymentStatus,
    pub timestamp: DateTime<Utc>,
    pub failure_reason: Option<String>,
}

impl PaymentUpdate {
    /// The name of the column that records when the payment entered `status`, if there is one.
    pub fn timestamp_column(&self) -> Option<&'static str> {
        match self.status {
            PaymentStatus::Authorized => Some("authorized_at"),
            PaymentStatus::Paid | PaymentStatus::Captured => Some("paid_at"),
            PaymentStatus::Failed => Some("failed_at"),
            PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded => Some("refunded_at"),
            PaymentStatus::Pending | PaymentStatus::Cancelled => None,
        }
    }
}

//--------------------------------------        Invoice        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Overdue,
    Paid,
    Cancelled,
}

string_enum!(InvoiceStatus {
    Draft => "DRAFT",
    Sent => "SENT",
    Overdue => "OVERDUE",
    Paid => "PAID",
    Cancelled => "CANCELLED",
});

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub order_id: OrderId,
    pub invoice_number: String,
    pub amount: Money,
    pub status: InvoiceStatus,
    pub due_date: Option<NaiveDate>,
    pub paid_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvoice {
    pub order_id: OrderId,
    pub invoice_number: String,
    pub amount: Money,
    pub status: InvoiceStatus,
    pub due_date: Option<NaiveDate>,
}
