use crate::{
    db::traits::{AutoQuoteCommit, StoreError},
    db_types::{NewQuote, Quote},
};

#[allow(async_fn_in_trait)]
pub trait QuoteManagement {
    async fn insert_quote(&self, quote: NewQuote) -> Result<Quote, StoreError>;

    async fn fetch_quote(&self, quote_id: i64) -> Result<Option<Quote>, StoreError>;

    async fn quotes_for_rfq(&self, rfq_id: i64) -> Result<Vec<Quote>, StoreError>;

    /// Atomically marks the RFQ as auto-quoted, stores `quotes` and moves the RFQ to `QUOTED` if there is at least
    /// one quote. If the RFQ was already marked, nothing is written.
    async fn commit_auto_quotes(&self, rfq_id: i64, quotes: Vec<NewQuote>) -> Result<AutoQuoteCommit, StoreError>;
}
