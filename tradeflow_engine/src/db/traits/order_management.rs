use crate::{
    db::traits::{AcceptedQuote, StoreError},
    db_types::{LineItem, Order, OrderId, OrderItem, OrderStatus},
};

/// The `OrderManagement` trait defines the behaviour for querying and mutating orders in the database backend.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError>;

    async fn fetch_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, StoreError>;

    /// The products and quantities an order consumes: the order's own items, else the accepted quote's items, else
    /// the items of the RFQ the quote answered.
    async fn resolve_line_items(&self, order_id: OrderId) -> Result<Vec<LineItem>, StoreError>;

    /// Accepts a quote that was sent to `client_id`, and creates an order in `PENDING_ADMIN_CONFIRMATION` with the
    /// quote's line items. Competing quotes on the same RFQ are rejected and the RFQ is closed.
    async fn accept_quote(&self, quote_id: i64, client_id: i64) -> Result<AcceptedQuote, StoreError>;

    /// Moves the order to `next`, but only if its status is still `expected`. Returns
    /// [`StoreError::ConcurrencyConflict`] if the order changed in the meantime.
    async fn update_order_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order, StoreError>;
}
