//! Scheduled sweep of expired tokens.

use chrono::Utc;
use std::time::Duration;
use tracing::{error, info};

use crate::auth::TokenService;

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Delete every stored token whose expiry has passed.
pub async fn run_cleanup(tokens: &TokenService) {
    match tokens.sweep_expired(Utc::now()).await {
        Ok(count) if count > 0 => info!(count, "Cleaned up expired tokens"),
        Ok(_) => {}
        Err(e) => error!(error = %e, "Failed to clean up expired tokens"),
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(tokens: TokenService) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        // The first tick completes immediately; startup already ran a sweep.
        interval.tick().await;

        loop {
            interval.tick().await;
            run_cleanup(&tokens).await;
        }
    })
}
