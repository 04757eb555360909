use std::convert::Infallible;
use std::future::ready;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use health::HealthRegistry;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::coordinator::Coordinator;
use crate::endpoints;
use crate::feed::FeedSource;
use crate::prometheus::track_metrics;

#[derive(Clone)]
pub struct State {
    pub coordinator: Coordinator,
    pub feed: Arc<dyn FeedSource + Send + Sync>,
    pub liveness: HealthRegistry,
    pub default_repo: String,
}

#[derive(Clone, Debug)]
pub struct RouterSettings {
    pub default_repo: String,
    pub max_webhook_body_bytes: usize,
    pub webhook_concurrency_limit: usize,
}

pub fn router(
    coordinator: Coordinator,
    feed: Arc<dyn FeedSource + Send + Sync>,
    liveness: HealthRegistry,
    settings: RouterSettings,
    metrics: Option<PrometheusHandle>,
) -> Router {
    let state = State {
        coordinator,
        feed,
        liveness,
        default_repo: settings.default_repo,
    };

    let router = Router::new()
        .route("/", get(endpoints::dashboard))
        .route("/_readiness", get(endpoints::index))
        .route("/_liveness", get(endpoints::liveness))
        .route("/api/events", get(endpoints::poll_events))
        .route("/api/events/recent", get(endpoints::recent_events))
        .route(
            "/webhook",
            post(endpoints::webhook)
                .layer::<_, Infallible>(ConcurrencyLimitLayer::new(
                    settings.webhook_concurrency_limit,
                ))
                .layer(DefaultBodyLimit::max(settings.max_webhook_body_bytes)),
        )
        .route("/clear", get(endpoints::clear).post(endpoints::clear))
        .route("/status", get(endpoints::status))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    // The recorder is global, only the binary installs one
    match metrics {
        Some(recorder_handle) => {
            router.route("/metrics", get(move || ready(recorder_handle.render())))
        }
        None => router,
    }
}
