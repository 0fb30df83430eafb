use crate::{
    db::traits::StoreError,
    db_types::{MarginSetting, NewProduct, NewRfq, Product, Rfq},
};

/// Read access to the product catalogue, margin settings and RFQs, plus the inserts needed to seed them.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, StoreError>;

    async fn fetch_products(&self) -> Result<Vec<Product>, StoreError>;

    /// Sets the margin for `category`, or the global default if `category` is `None`.
    async fn set_margin(&self, category: Option<&str>, margin_percent: f64) -> Result<MarginSetting, StoreError>;

    async fn fetch_margin_settings(&self) -> Result<Vec<MarginSetting>, StoreError>;

    async fn insert_rfq(&self, rfq: NewRfq) -> Result<Rfq, StoreError>;

    async fn fetch_rfq(&self, rfq_id: i64) -> Result<Option<Rfq>, StoreError>;

    /// Open RFQs that have not been auto-quoted yet, with their items.
    async fn fetch_open_rfqs(&self) -> Result<Vec<Rfq>, StoreError>;
}
