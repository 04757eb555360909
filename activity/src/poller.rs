use std::sync::Arc;
use std::time::Duration;

use health::{ComponentStatus, HealthHandle};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::api::ActivityError;
use crate::coordinator::{Coordinator, PollSummary};
use crate::feed::FeedSource;

/// Fetches `repo` then ingests the batch. The fetch completes before the
/// store is touched, so no lock is held across network I/O.
pub async fn poll_once(
    coordinator: &Coordinator,
    feed: &(dyn FeedSource + Send + Sync),
    repo: &str,
) -> Result<PollSummary, ActivityError> {
    let batch = feed.fetch(repo).await?;
    coordinator.poll_cycle(repo, &batch)
}

/// Polls `repo` forever on a fixed period. A failed cycle is logged and the
/// next tick tries again from scratch.
pub async fn poll_loop(
    coordinator: Coordinator,
    feed: Arc<dyn FeedSource + Send + Sync>,
    repo: String,
    period: Duration,
    liveness: HealthHandle,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        repo = repo.as_str(),
        period_secs = period.as_secs(),
        "starting feed poller"
    );
    loop {
        interval.tick().await;

        match poll_once(&coordinator, feed.as_ref(), &repo).await {
            Ok(summary) => {
                liveness.report_healthy();
                info!(
                    repo = repo.as_str(),
                    new_events = summary.new_count,
                    total_events = summary.total_count,
                    "scheduled poll done"
                );
            }
            // The feed answered, only its content was off
            Err(ActivityError::InvalidFeedBatch(reason)) => {
                liveness.report_healthy();
                error!(
                    repo = repo.as_str(),
                    "scheduled poll got an unusable batch: {}", reason
                );
            }
            Err(err) => {
                liveness.report_status(ComponentStatus::Unhealthy);
                error!(repo = repo.as_str(), "scheduled poll failed: {}", err);
            }
        }
    }
}
