#![allow(dead_code)]

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;

use activity::api::ActivityError;
use activity::coordinator::Coordinator;
use activity::feed::FeedSource;
use activity::normalizer::Normalizer;
use activity::router::{router, RouterSettings};
use activity::store::MemoryStore;
use activity::time::FixedTime;
use health::HealthRegistry;

pub const NOW: OffsetDateTime = datetime!(2024-05-01 12:00:00 UTC);
pub const MAX_BODY_SIZE: usize = 1_000;

/// Feed stand-in that replays canned batches and records what was asked.
#[derive(Default)]
pub struct StubFeed {
    pub responses: Mutex<Vec<Result<Value, ActivityError>>>,
    pub requested: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
}

impl StubFeed {
    pub fn returning(response: Result<Value, ActivityError>) -> Self {
        let feed = StubFeed::default();
        feed.responses.lock().unwrap().push(response);
        feed
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for StubFeed {
    async fn fetch(&self, repo: &str) -> Result<Value, ActivityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(repo.to_owned());
        // The last canned response repeats forever
        let response = self
            .responses
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_else(|| Ok(Value::Array(vec![])));
        response
    }
}

pub struct TestApp {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub feed: Arc<StubFeed>,
}

impl TestApp {
    pub fn new(feed: StubFeed, capacity: usize) -> Self {
        let store = Arc::new(MemoryStore::new(NonZeroUsize::new(capacity).unwrap()));
        let feed = Arc::new(feed);
        let coordinator = Coordinator::new(
            store.clone(),
            Arc::new(FixedTime { time: NOW }),
            Normalizer::default(),
            Duration::hours(24),
            5,
        );

        let app = router(
            coordinator,
            feed.clone(),
            HealthRegistry::new("liveness"),
            RouterSettings {
                default_repo: "torvalds/linux".to_string(),
                max_webhook_body_bytes: MAX_BODY_SIZE,
                webhook_concurrency_limit: 10,
            },
            None,
        );

        TestApp { app, store, feed }
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, body) = self.get(uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    pub async fn post(&self, uri: &str, body: impl Into<Body>) -> (StatusCode, Vec<u8>) {
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header("content-type", "application/json")
                .body(body.into())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
        let (status, body) = self.post(uri, body).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }
}

pub fn feed_record(id: &str, age: Duration) -> Value {
    let created_at = (NOW - age)
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap();
    serde_json::json!({
        "id": id,
        "type": "PushEvent",
        "actor": {"login": "octocat"},
        "repo": {"name": "torvalds/linux"},
        "created_at": created_at,
        "payload": {"commits": []},
    })
}
