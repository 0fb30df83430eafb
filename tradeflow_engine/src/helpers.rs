use std::{future::Future, time::Duration};

use log::*;

/// How long auxiliary lookups (such as the caller's IP address for audit metadata) may take.
pub const BEST_EFFORT_TIMEOUT: Duration = Duration::from_millis(1500);

pub const UNKNOWN: &str = "unknown";

/// Runs a lookup that is nice to have but must never hold up the operation it decorates. A lookup that fails or
/// takes longer than [`BEST_EFFORT_TIMEOUT`] resolves to `"unknown"`.
pub async fn best_effort_lookup<F>(lookup: F) -> String
where F: Future<Output = Option<String>> {
    best_effort_lookup_within(BEST_EFFORT_TIMEOUT, lookup).await
}

pub async fn best_effort_lookup_within<F>(timeout: Duration, lookup: F) -> String
where F: Future<Output = Option<String>> {
    match tokio::time::timeout(timeout, lookup).await {
        Ok(Some(value)) => value,
        Ok(None) => UNKNOWN.to_string(),
        Err(_) => {
            debug!("Best-effort lookup timed out after {}ms", timeout.as_millis());
            UNKNOWN.to_string()
        },
    }
}
