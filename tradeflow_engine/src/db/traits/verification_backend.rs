use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    db::traits::{StoreError, VerificationOutcome},
    db_types::{Actor, OrderId},
};

/// The "verify and confirm" primitive.
///
/// Implementations must guarantee that stock is decremented at most once per order confirmation, no matter how many
/// times, or how concurrently, these methods are called for the same document or order.
#[allow(async_fn_in_trait)]
pub trait VerificationBackend {
    /// Verifies a client PO. This marks the document as verified (only if it is not already), decrements stock for
    /// every line item and moves the order to `PENDING_PAYMENT` with `admin_verified` set.
    async fn verify_client_po(&self, document_id: i64, verifier: &Actor) -> Result<VerificationOutcome, StoreError>;

    /// Confirms an order using a system-generated PO stored at `file_ref`. Guarded by the order's
    /// `system_po_generated` flag, so only the first call has any effect.
    async fn confirm_with_system_po(
        &self,
        order_id: OrderId,
        file_ref: &str,
        admin: &Actor,
    ) -> Result<VerificationOutcome, StoreError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    /// A single database transaction.
    #[default]
    Atomic,
    /// Separate conditional writes. Lost races are reported as conflicts.
    Optimistic,
}

impl FromStr for VerificationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atomic" => Ok(Self::Atomic),
            "optimistic" => Ok(Self::Optimistic),
            s => Err(format!("Unknown verification mode: {s}")),
        }
    }
}

impl Display for VerificationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationMode::Atomic => f.write_str("atomic"),
            VerificationMode::Optimistic => f.write_str("optimistic"),
        }
    }
}
