use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::Json;
use health::HealthStatus;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use crate::api::{
    ActivityError, ClearResponse, PollResponse, RecentResponse, ResponseStatus, StatusResponse,
    WebhookResponse,
};
use crate::{dashboard, feed, poller, router};

#[derive(Debug, Default, Deserialize)]
pub struct PollQuery {
    pub repo: Option<String>,
}

pub async fn index() -> &'static str {
    "activity"
}

pub async fn liveness(state: State<router::State>) -> HealthStatus {
    state.liveness.get_status()
}

pub async fn dashboard(state: State<router::State>) -> Html<String> {
    let events = state.coordinator.recent();
    Html(dashboard::render(
        &events,
        state.coordinator.window().whole_hours(),
    ))
}

/// Pulls the feed for one repository and ingests it.
#[instrument(skip_all, fields(repo))]
pub async fn poll_events(
    state: State<router::State>,
    query: Query<PollQuery>,
) -> Result<Json<PollResponse>, ActivityError> {
    let repo = query
        .repo
        .as_deref()
        .filter(|repo| !repo.is_empty())
        .unwrap_or(&state.default_repo);
    tracing::Span::current().record("repo", repo);

    feed::validate_repo(repo)?;
    let summary = poller::poll_once(&state.coordinator, state.feed.as_ref(), repo)
        .await
        .map_err(|err| {
            tracing::warn!("poll request failed: {}", err);
            err
        })?;

    Ok(Json(PollResponse {
        status: ResponseStatus::Success,
        repo: repo.to_owned(),
        new_events: summary.new_count,
        skipped: summary.skipped,
        total_events: summary.total_count,
        sample: summary.sample,
    }))
}

pub async fn recent_events(state: State<router::State>) -> Json<RecentResponse> {
    let events = state.coordinator.recent();
    Json(RecentResponse {
        status: ResponseStatus::Success,
        count: events.len(),
        events,
    })
}

#[instrument(skip_all, fields(body_size = body.len()))]
pub async fn webhook(
    state: State<router::State>,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ActivityError> {
    let payload: Value = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!("rejected webhook body: {}", e);
        ActivityError::InvalidWebhookBody(e.to_string())
    })?;

    let receipt = state.coordinator.accept_webhook(&payload)?;

    Ok(Json(WebhookResponse {
        status: ResponseStatus::Received,
        admitted: receipt.admitted,
        event: receipt.event,
    }))
}

pub async fn clear(state: State<router::State>) -> Json<ClearResponse> {
    Json(ClearResponse {
        status: ResponseStatus::Cleared,
        count: state.coordinator.clear(),
    })
}

pub async fn status(state: State<router::State>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: ResponseStatus::Ok,
        count: state.coordinator.count(),
        capacity: state.coordinator.capacity(),
        window_hours: state.coordinator.window().whole_hours(),
    })
}
