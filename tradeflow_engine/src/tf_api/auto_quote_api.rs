use std::{collections::HashMap, fmt::Debug};

use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    auto_quote::{generate_auto_quotes, AutoQuoteConfig, MarginTable},
    db::traits::AutoQuoteCommit,
    tf_api::{errors::AutoQuoteError, QuoteStore},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoQuoteSummary {
    /// RFQs this run marked as triggered.
    pub rfqs_processed: usize,
    pub quotes_created: usize,
    /// RFQs another runner got to first.
    pub rfqs_skipped: usize,
}

/// Loads the open RFQs, the catalogue and the margin settings, runs [`generate_auto_quotes`], and commits the
/// result one RFQ at a time.
pub struct AutoQuoteApi<B> {
    db: B,
}

impl<B> Debug for AutoQuoteApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AutoQuoteApi")
    }
}

impl<B> AutoQuoteApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> AutoQuoteApi<B>
where B: QuoteStore
{
    pub async fn run(&self, config: &AutoQuoteConfig, now: DateTime<Utc>) -> Result<AutoQuoteSummary, AutoQuoteError> {
        let mut summary = AutoQuoteSummary::default();
        if !config.enabled {
            trace!("🤖️ Auto-quoting is disabled. Nothing to do.");
            return Ok(summary);
        }
        let rfqs = self.db.fetch_open_rfqs().await?;
        if rfqs.is_empty() {
            trace!("🤖️ No open RFQs");
            return Ok(summary);
        }
        let products = self.db.fetch_products().await?.into_iter().map(|p| (p.id, p)).collect::<HashMap<_, _>>();
        let margins = MarginTable::from_settings(&self.db.fetch_margin_settings().await?);
        let output = generate_auto_quotes(&rfqs, &products, &margins, config, now);
        for rfq in output.rfqs {
            let rfq_id = rfq.rfq_id;
            match self.db.commit_auto_quotes(rfq_id, rfq.quotes).await? {
                AutoQuoteCommit::Committed(quotes) => {
                    debug!("🤖️ RFQ #{rfq_id} auto-quoted. {} quote(s) created.", quotes.len());
                    summary.rfqs_processed += 1;
                    summary.quotes_created += quotes.len();
                },
                AutoQuoteCommit::AlreadyTriggered => {
                    debug!("🤖️ RFQ #{rfq_id} was auto-quoted by another runner");
                    summary.rfqs_skipped += 1;
                },
            }
        }
        if summary.rfqs_processed > 0 {
            info!(
                "🤖️ Auto-quote run complete. {} RFQ(s) processed, {} quote(s) created, {} skipped.",
                summary.rfqs_processed, summary.quotes_created, summary.rfqs_skipped
            );
        }
        Ok(summary)
    }
}
