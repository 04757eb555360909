use assert_json_diff::assert_json_include;
use axum::http::StatusCode;
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use activity::store::EventStore;

use crate::common::*;
mod common;

#[tokio::test]
async fn it_accepts_an_empty_payload() {
    let test = TestApp::new(StubFeed::default(), 100);

    let (status, body) = test.post_json("/webhook", "{}").await;
    assert_eq!(status, StatusCode::OK);
    assert_json_include!(
        actual: body.clone(),
        expected: json!({
            "status": "received",
            "admitted": true,
            "event": {
                "type": "webhook",
                "actor": "unknown",
                "repo": "unknown",
                "origin": "webhook",
                "payload_summary": "{}",
            }
        })
    );

    let created_at = body["event"]["created_at"].as_str().unwrap();
    assert_eq!(OffsetDateTime::parse(created_at, &Rfc3339).unwrap(), NOW);
    assert!(body["event"]["id"].as_str().unwrap().starts_with("webhook-"));
    assert_eq!(test.store.count(), 1);
}

#[tokio::test]
async fn it_reads_github_fields() {
    let test = TestApp::new(StubFeed::default(), 100);
    let payload = json!({
        "action": "opened",
        "number": 7,
        "sender": {"login": "octocat"},
        "repository": {"full_name": "octo/hello-world"},
    });

    let (status, body) = test.post_json("/webhook", payload.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_json_include!(
        actual: body,
        expected: json!({
            "event": {"type": "opened", "actor": "octocat", "repo": "octo/hello-world"}
        })
    );
}

#[tokio::test]
async fn it_rejects_non_object_bodies() {
    let test = TestApp::new(StubFeed::default(), 100);

    for body in ["[1, 2]", "\"opened\"", "not json", ""] {
        let (status, response) = test.post_json("/webhook", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{:?}", body);
        assert_eq!(response["status"], "error");
    }
    assert_eq!(test.store.count(), 0);
}

#[tokio::test]
async fn it_rejects_oversized_bodies() {
    let test = TestApp::new(StubFeed::default(), 100);
    let payload = json!({"blob": "x".repeat(MAX_BODY_SIZE)});

    let (status, _) = test.post("/webhook", payload.to_string()).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(test.store.count(), 0);
}

#[tokio::test]
async fn it_shows_webhooks_with_polled_events() {
    let feed = StubFeed::returning(Ok(json!([feed_record(
        "1",
        time::Duration::hours(2)
    )])));
    let test = TestApp::new(feed, 100);

    test.get("/api/events").await;
    test.post("/webhook", r#"{"action": "closed"}"#).await;

    let (status, body) = test.get_json("/api/events/recent").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["events"][0]["type"], "closed");
    assert_eq!(body["events"][1]["id"], "1");
}
