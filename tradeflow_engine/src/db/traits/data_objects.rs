use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderId, Quote};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDecrement {
    pub product_id: i64,
    pub quantity: i64,
}

/// The result of a "verify and confirm" call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The document was verified by this call. Stock was decremented and the order moved to `PENDING_PAYMENT`.
    Verified { order: Order, document_id: i64, decrements: Vec<StockDecrement> },
    /// Someone got there first. Nothing was changed.
    AlreadyVerified { order_id: OrderId, document_id: Option<i64> },
}

impl VerificationOutcome {
    pub fn order_id(&self) -> OrderId {
        match self {
            VerificationOutcome::Verified { order, .. } => order.id,
            VerificationOutcome::AlreadyVerified { order_id, .. } => *order_id,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, VerificationOutcome::AlreadyVerified { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedQuote {
    pub order: Order,
    pub quote: Quote,
}

/// The result of committing the auto-quotes for a single RFQ.
#[derive(Debug, Clone, PartialEq)]
pub enum AutoQuoteCommit {
    Committed(Vec<Quote>),
    /// Another runner marked the RFQ as triggered first.
    AlreadyTriggered,
}
