use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::Event;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActivityError {
    #[error("malformed feed record: {0}")]
    MalformedRecord(String),
    #[error("feed returned an unusable batch: {0}")]
    InvalidFeedBatch(String),
    #[error("events feed unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("invalid webhook body: {0}")]
    InvalidWebhookBody(String),
    #[error("invalid repository: {0}")]
    InvalidRepo(String),
}

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Received,
    Cleared,
    Ok,
    Error,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: ResponseStatus,
    pub error: String,
}

impl IntoResponse for ActivityError {
    fn into_response(self) -> Response {
        let code = match self {
            ActivityError::MalformedRecord(_)
            | ActivityError::InvalidWebhookBody(_)
            | ActivityError::InvalidRepo(_) => StatusCode::BAD_REQUEST,

            ActivityError::InvalidFeedBatch(_) | ActivityError::UpstreamUnavailable(_) => {
                StatusCode::BAD_GATEWAY
            }
        };

        (
            code,
            Json(ErrorResponse {
                status: ResponseStatus::Error,
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PollResponse {
    pub status: ResponseStatus,
    pub repo: String,
    pub new_events: usize,
    pub skipped: usize,
    pub total_events: usize,
    pub sample: Vec<Event>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecentResponse {
    pub status: ResponseStatus,
    pub count: usize,
    pub events: Vec<Event>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status: ResponseStatus,
    pub admitted: bool,
    pub event: Event,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearResponse {
    pub status: ResponseStatus,
    pub count: usize,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: ResponseStatus,
    pub count: usize,
    pub capacity: usize,
    pub window_hours: i64,
}
