use std::fmt::Debug;

use log::*;

use crate::{
    db::traits::{AcceptedQuote, StoreError},
    db_types::{Actor, Money, NewPayment, Order, OrderId, OrderStatus, PaymentRecord, Role},
    tf_api::{errors::OrderFlowError, OrderStore},
};

/// `OrderFlowApi` moves orders along the happy path outside of PO verification and payment settlement: quotes become
/// orders, clients register their gateway payments, and admins can nudge an order to any status the state machine
/// allows.
pub struct OrderFlowApi<B> {
    db: B,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

/// Admins may see any order. Clients and suppliers only see the orders they are party to.
pub(crate) fn can_access(order: &Order, actor: &Actor) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Client => order.client_id == actor.user_id,
        Role::Supplier => order.supplier_id == Some(actor.user_id),
    }
}

impl<B> OrderFlowApi<B>
where B: OrderStore
{
    /// Fetches an order the actor is allowed to see.
    pub async fn fetch_order(&self, order_id: OrderId, actor: &Actor) -> Result<Order, OrderFlowError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(StoreError::OrderNotFound(order_id))?;
        if !can_access(&order, actor) {
            warn!("🔄️ User {} tried to access order {order_id}, which is not theirs", actor.user_id);
            return Err(OrderFlowError::Forbidden(format!("Order {order_id} does not belong to you")));
        }
        Ok(order)
    }

    /// The statuses the order can move to from where it is now.
    pub async fn allowed_transitions(
        &self,
        order_id: OrderId,
        actor: &Actor,
    ) -> Result<Vec<OrderStatus>, OrderFlowError> {
        let order = self.fetch_order(order_id, actor).await?;
        Ok(order.status.allowed_transitions())
    }

    /// The client accepts a quote that was sent to them. The order is created in `PENDING_ADMIN_CONFIRMATION`.
    pub async fn accept_quote(&self, quote_id: i64, actor: &Actor) -> Result<AcceptedQuote, OrderFlowError> {
        if actor.role != Role::Client {
            return Err(OrderFlowError::Forbidden("Only clients can accept quotes".into()));
        }
        let quote = self.db.fetch_quote(quote_id).await?.ok_or(StoreError::QuoteNotFound(quote_id))?;
        let rfq = self.db.fetch_rfq(quote.rfq_id).await?.ok_or(StoreError::RfqNotFound(quote.rfq_id))?;
        if rfq.client_id != actor.user_id {
            warn!("🔄️ User {} tried to accept quote #{quote_id}, which was not sent to them", actor.user_id);
            return Err(OrderFlowError::Forbidden(format!("Quote #{quote_id} was not sent to you")));
        }
        let accepted = self.db.accept_quote(quote_id, actor.user_id).await?;
        info!("🔄️ Quote #{quote_id} accepted. Order {} created for {}", accepted.order.id, accepted.order.amount);
        Ok(accepted)
    }

    /// Records a payment the client has started with the gateway. The payment is `PENDING` until the gateway
    /// reports otherwise. `amount` defaults to the order amount.
    pub async fn register_payment(
        &self,
        order_id: OrderId,
        external_payment_id: &str,
        amount: Option<Money>,
        actor: &Actor,
    ) -> Result<PaymentRecord, OrderFlowError> {
        let external_payment_id = external_payment_id.trim();
        if external_payment_id.is_empty() {
            return Err(StoreError::InvalidRequest("A payment id is required".into()).into());
        }
        let order = self.fetch_order(order_id, actor).await?;
        if actor.role == Role::Supplier {
            return Err(OrderFlowError::Forbidden("Suppliers cannot register payments".into()));
        }
        if !order.status.can_transition_to(OrderStatus::PaymentConfirmed) || order.status == OrderStatus::PaymentConfirmed
        {
            return Err(StoreError::InvalidRequest(format!(
                "Order {order_id} is {} and is not waiting for a payment",
                order.status
            ))
            .into());
        }
        let amount = amount.unwrap_or(order.amount);
        let payment = self.db.insert_payment(NewPayment::new(order_id, external_payment_id, amount)).await?;
        info!("🔄️ Payment {external_payment_id} of {amount} registered for order {order_id}");
        Ok(payment)
    }

    /// An admin moves the order to `next`.
    ///
    /// * Moving an order to the status it already has is a no-op.
    /// * Moves the state machine does not allow fail with [`StoreError::InvalidTransition`] before anything is
    ///   written.
    /// * If someone else changed the order in the meantime, the change fails with
    ///   [`StoreError::ConcurrencyConflict`].
    pub async fn change_status(
        &self,
        order_id: OrderId,
        next: OrderStatus,
        actor: &Actor,
    ) -> Result<Order, OrderFlowError> {
        if !actor.is_admin() {
            return Err(OrderFlowError::Forbidden("Only admins can change order status".into()));
        }
        let order = self.db.fetch_order(order_id).await?.ok_or(StoreError::OrderNotFound(order_id))?;
        if order.status == next {
            debug!("🔄️ Order {order_id} is already {next}. Nothing to do.");
            return Ok(order);
        }
        if !order.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition { order_id, from: order.status, to: next }.into());
        }
        let updated = self.db.update_order_status(order_id, order.status, next).await?;
        info!("🔄️ Order {order_id} moved from {} to {next} by admin {}", order.status, actor.user_id);
        Ok(updated)
    }
}
