use std::time::Duration;

use chrono::Utc;
use log::*;
use tradeflow_engine::{auto_quote::AutoQuoteConfig, AutoQuoteApi, SqliteDatabase};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

/// Starts the auto-quote worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `period`, open RFQs that have waited longer than the configured delay are priced from the catalogue. If the
/// feature is disabled, no worker is started and `None` is returned.
pub fn start_auto_quote_worker(
    db: SqliteDatabase,
    config: AutoQuoteConfig,
    period: Duration,
) -> Option<JoinHandle<()>> {
    if !config.enabled {
        info!("🕰️ Auto-quoting is disabled. The auto-quote worker will not be started.");
        return None;
    }
    let handle = tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        // A slow run must not be followed by a burst of catch-up runs
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let api = AutoQuoteApi::new(db);
        info!("🕰️ Auto-quote worker started. Running every {}s", period.as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Running auto-quote job");
            match api.run(&config, Utc::now()).await {
                Ok(summary) if summary.rfqs_processed > 0 || summary.rfqs_skipped > 0 => {
                    info!(
                        "🕰️ Auto-quote job done. {} RFQs quoted, {} quotes created, {} skipped",
                        summary.rfqs_processed, summary.quotes_created, summary.rfqs_skipped
                    );
                },
                Ok(_) => trace!("🕰️ No RFQs were due for auto-quoting"),
                Err(e) => {
                    error!("🕰️ Error running auto-quote job: {e}");
                },
            }
        }
    });
    Some(handle)
}
