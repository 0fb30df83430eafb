//! Order status transitions.
//!
//! Every change to an order's status must follow an edge in the adjacency table below. Writing the status an order
//! already has is always allowed (and is a no-op for the store). Every active status may move to `CANCELLED`.
//!
//! Two flavours of the same query are offered. The typed API on [`OrderStatus`] is what the engine uses internally;
//! the string API ([`can_transition`], [`allowed_transitions`]) is for callers holding raw status values, e.g. from a
//! request body. Unknown strings are never an error. They simply have no legal transitions.
use crate::db_types::OrderStatus;

impl OrderStatus {
    pub const ALL: [OrderStatus; 17] = [
        OrderStatus::PendingAdminConfirmation,
        OrderStatus::Confirmed,
        OrderStatus::PendingPayment,
        OrderStatus::AwaitingConfirmation,
        OrderStatus::PaymentConfirmed,
        OrderStatus::Processing,
        OrderStatus::ReadyForPickup,
        OrderStatus::PickupScheduled,
        OrderStatus::PickedUp,
        OrderStatus::OutForDelivery,
        OrderStatus::Shipped,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Disputed,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    fn edges(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            PendingAdminConfirmation => &[Confirmed, PendingPayment, Cancelled],
            Confirmed => &[PendingPayment, AwaitingConfirmation, PaymentConfirmed, Processing, Cancelled],
            PendingPayment => &[PendingAdminConfirmation, AwaitingConfirmation, PaymentConfirmed, Cancelled],
            AwaitingConfirmation => &[PendingPayment, PaymentConfirmed, Cancelled],
            PaymentConfirmed => &[Processing, ReadyForPickup, PickupScheduled, PickedUp, Cancelled],
            Processing => &[ReadyForPickup, PickupScheduled, PickedUp, Cancelled],
            ReadyForPickup => &[PickupScheduled, PickedUp, Cancelled],
            PickupScheduled => &[PickedUp, OutForDelivery, InTransit, Cancelled],
            PickedUp => &[OutForDelivery, InTransit, Delivered, Cancelled],
            OutForDelivery => &[InTransit, Delivered, Cancelled],
            Shipped => &[InTransit, Delivered, Cancelled],
            InTransit => &[Delivered, Cancelled],
            Delivered => &[Completed, Disputed, Refunded],
            Completed => &[],
            Disputed => &[Refunded, Completed, Cancelled],
            Cancelled => &[Refunded],
            Refunded => &[],
        }
    }

    /// Returns true if an order in this status may be moved to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        *self == next || self.edges().contains(&next)
    }

    /// The statuses an order in this status may move to. A new vector is returned on every call.
    pub fn allowed_transitions(&self) -> Vec<OrderStatus> {
        self.edges().to_vec()
    }

    pub fn is_terminal(&self) -> bool {
        self.edges().is_empty()
    }

    /// An active order can still be cancelled.
    pub fn is_active(&self) -> bool {
        self.edges().contains(&OrderStatus::Cancelled)
    }
}

/// String flavour of [`OrderStatus::can_transition_to`]. Returns false if either status is unknown.
pub fn can_transition(current: &str, next: &str) -> bool {
    match (current.parse::<OrderStatus>(), next.parse::<OrderStatus>()) {
        (Ok(current), Ok(next)) => current.can_transition_to(next),
        _ => false,
    }
}

/// String flavour of [`OrderStatus::allowed_transitions`]. Unknown statuses have no transitions.
pub fn allowed_transitions(current: &str) -> Vec<String> {
    current
        .parse::<OrderStatus>()
        .map(|s| s.allowed_transitions().into_iter().map(|s| s.to_string()).collect())
        .unwrap_or_default()
}
