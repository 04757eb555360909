use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde_json::Value;
use tracing::{debug, error};
use url::Url;

use crate::api::ActivityError;

/// Page size requested from the events feed.
pub const FEED_PAGE_SIZE: u32 = 100;

/// Fetches the raw event batch for a repository. Implementations own their
/// transport concerns (timeouts, TLS); the ingestion core only sees the
/// decoded batch or a cycle-level error.
#[async_trait]
pub trait FeedSource {
    async fn fetch(&self, repo: &str) -> Result<Value, ActivityError>;
}

/// Validates an `owner/name` repository reference.
pub fn validate_repo(repo: &str) -> Result<(), ActivityError> {
    let valid_segment = |segment: &str| {
        !segment.is_empty()
            && segment != "."
            && segment != ".."
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };

    match repo.split_once('/') {
        Some((owner, name)) if valid_segment(owner) && valid_segment(name) => Ok(()),
        _ => Err(ActivityError::InvalidRepo(format!(
            "expected owner/name, got '{}'",
            repo
        ))),
    }
}

#[derive(Clone)]
pub struct GithubFeed {
    client: reqwest::Client,
    base_url: Url,
}

impl GithubFeed {
    pub fn new(
        base_url: &str,
        token: Option<&str>,
        user_agent: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        // Url::join replaces the last path segment unless the base ends in a slash
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn events_url(&self, repo: &str) -> Result<Url, ActivityError> {
        validate_repo(repo)?;
        let mut url = self
            .base_url
            .join(&format!("repos/{}/events", repo))
            .map_err(|e| ActivityError::InvalidRepo(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("per_page", &FEED_PAGE_SIZE.to_string());
        Ok(url)
    }
}

#[async_trait]
impl FeedSource for GithubFeed {
    async fn fetch(&self, repo: &str) -> Result<Value, ActivityError> {
        let url = self.events_url(repo)?;
        debug!(%url, "fetching events feed");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| {
                error!("events feed request failed: {}", e);
                metrics::counter!("activity_feed_fetch_errors_total").increment(1);
                ActivityError::UpstreamUnavailable(e.to_string())
            })?;

        response.json::<Value>().await.map_err(|e| {
            error!("failed to decode events feed: {}", e);
            metrics::counter!("activity_feed_fetch_errors_total").increment(1);
            ActivityError::InvalidFeedBatch(e.to_string())
        })
    }
}
