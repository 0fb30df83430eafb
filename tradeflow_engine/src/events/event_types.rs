use serde::{Deserialize, Serialize};

use crate::{
    db::traits::StockDecrement,
    db_types::{Order, PaymentRecord},
};

/// An admin has verified the order's PO. Stock has been taken and the order is waiting for payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmedEvent {
    pub order: Order,
    pub document_id: i64,
    pub decrements: Vec<StockDecrement>,
}

impl OrderConfirmedEvent {
    pub fn new(order: Order, document_id: i64, decrements: Vec<StockDecrement>) -> Self {
        Self { order, document_id, decrements }
    }
}

/// The order has reached `PAYMENT_CONFIRMED` and can be fulfilled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmedEvent {
    pub order: Order,
    pub payment: PaymentRecord,
}

impl PaymentConfirmedEvent {
    pub fn new(order: Order, payment: PaymentRecord) -> Self {
        Self { order, payment }
    }
}
