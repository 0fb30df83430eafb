//! Applies payment gateway events to payment, order and invoice records.
//!
//! Gateways deliver events at least once, so every step here is safe to repeat:
//! * A payment already in a terminal status is left alone when the event repeats that status.
//! * The order only moves to `PAYMENT_CONFIRMED` from `PENDING_PAYMENT` or `AWAITING_CONFIRMATION`. An order that has
//!   moved on (or was never waiting for payment) is never dragged back or forward.
//! * The invoice only moves to `PAID` from `SENT` or `OVERDUE`.
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db::traits::StoreError,
    db_types::{Actor, Order, PaymentRecord, PaymentUpdate, Role},
    events::{EventProducers, PaymentConfirmedEvent},
    tf_api::{
        errors::PaymentWebhookError,
        gateway::{GatewayError, GatewayPaymentUpdate, PaymentGateway},
        PaymentStore,
    },
};

/// What processing a gateway event did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProcessingResult {
    pub payment: PaymentRecord,
    /// True if the event repeated a terminal status the payment already had.
    pub idempotent: bool,
    /// The order, if this event moved it to `PAYMENT_CONFIRMED`.
    pub confirmed_order: Option<Order>,
}

pub struct PaymentWebhookApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
}

impl<B, G> Debug for PaymentWebhookApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentWebhookApi")
    }
}

impl<B, G> PaymentWebhookApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, G> PaymentWebhookApi<B, G>
where
    B: PaymentStore,
    G: PaymentGateway,
{
    /// Applies a payment state pushed by the gateway. The caller is responsible for checking the webhook signature.
    pub async fn process_gateway_payment(
        &self,
        update: &GatewayPaymentUpdate,
    ) -> Result<PaymentProcessingResult, PaymentWebhookError> {
        let external_id = update.external_payment_id.as_str();
        if external_id.is_empty() {
            return Err(PaymentWebhookError::InvalidPayload("The payment id is missing".into()));
        }
        let status = update.mapped_status();
        trace!("💳️ Gateway reports payment {external_id} as '{}' ({status})", update.status);
        let payment = self
            .db
            .fetch_payment_by_external_id(external_id)
            .await?
            .ok_or_else(|| StoreError::PaymentNotFound(external_id.to_string()))?;
        if payment.status.is_terminal() && payment.status == status {
            debug!("💳️ Payment {external_id} is already {status}. Nothing to do.");
            return Ok(PaymentProcessingResult { payment, idempotent: true, confirmed_order: None });
        }
        let now = Utc::now();
        let change = PaymentUpdate { status, timestamp: now, failure_reason: update.failure_reason.clone() };
        let payment = match self.db.update_payment(payment.id, &change).await {
            Ok(p) => p,
            Err(StoreError::SchemaCompatibility { missing }) => {
                warn!("💳️ The payments table has no {missing} column. Only the status of {external_id} is updated.");
                self.db.update_payment_status(payment.id, status).await?
            },
            Err(e) => return Err(e.into()),
        };
        info!("💳️ Payment {external_id} is now {status}");
        let mut confirmed_order = None;
        if status.is_settled() {
            let order_id = payment.order_id;
            confirmed_order = self.db.confirm_order_payment(order_id, external_id, now).await?;
            match &confirmed_order {
                Some(order) => {
                    info!("💳️ Order {order_id} is now {}", order.status);
                    let event = PaymentConfirmedEvent::new(order.clone(), payment.clone());
                    self.producers.publish_payment_confirmed(event).await;
                },
                None => info!("💳️ Order {order_id} is not waiting for a payment. Its status is left as it is."),
            }
            match self.db.mark_invoice_paid(order_id, now.date_naive()).await {
                Ok(Some(invoice)) => info!("💳️ Invoice {} is paid", invoice.invoice_number),
                Ok(None) => debug!("💳️ Order {order_id} has no open invoice"),
                Err(e) if e.is_schema_error() => warn!("💳️ Invoices are not available in this deployment: {e}"),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(PaymentProcessingResult { payment, idempotent: false, confirmed_order })
    }

    /// Pulls the payment's state from the gateway and applies it. Admins can sync any payment. Clients can only sync
    /// payments for their own orders. Ownership is checked before the gateway is called.
    pub async fn sync_payment(
        &self,
        external_payment_id: &str,
        actor: &Actor,
    ) -> Result<PaymentProcessingResult, PaymentWebhookError> {
        let payment = self
            .db
            .fetch_payment_by_external_id(external_payment_id)
            .await?
            .ok_or_else(|| StoreError::PaymentNotFound(external_payment_id.to_string()))?;
        match actor.role {
            Role::Admin => {},
            Role::Client => {
                let order = self
                    .db
                    .fetch_order(payment.order_id)
                    .await?
                    .ok_or(StoreError::OrderNotFound(payment.order_id))?;
                if order.client_id != actor.user_id {
                    warn!("💳️ User {} tried to sync payment {external_payment_id}, which is not theirs", actor.user_id);
                    return Err(PaymentWebhookError::Forbidden("This payment does not belong to you".into()));
                }
            },
            Role::Supplier => {
                return Err(PaymentWebhookError::Forbidden("Suppliers cannot sync payments".into()));
            },
        }
        let update = self.gateway.fetch_payment(external_payment_id).await.map_err(|e| match e {
            GatewayError::PaymentNotFound(id) => PaymentWebhookError::Store(StoreError::PaymentNotFound(id)),
            GatewayError::Unavailable(msg) => PaymentWebhookError::Gateway(msg),
        })?;
        if update.external_payment_id != external_payment_id {
            return Err(PaymentWebhookError::InvalidPayload(format!(
                "Asked the gateway for {external_payment_id} but got {}",
                update.external_payment_id
            )));
        }
        self.process_gateway_payment(&update).await
    }
}

