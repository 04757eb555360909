use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use health::HealthRegistry;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::feed::{validate_repo, FeedSource, GithubFeed};
use crate::normalizer::Normalizer;
use crate::poller;
use crate::prometheus::setup_metrics_recorder;
use crate::router::{self, RouterSettings};
use crate::store::MemoryStore;
use crate::time::SystemTime;

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    validate_repo(&config.default_repo)?;
    let window = config.window()?;

    let liveness = HealthRegistry::new("liveness");

    let store = Arc::new(MemoryStore::new(config.max_capacity));
    let coordinator = Coordinator::new(
        store,
        Arc::new(SystemTime {}),
        Normalizer::new(config.payload_excerpt_bytes),
        window,
        config.sample_size,
    );

    let feed: Arc<dyn FeedSource + Send + Sync> = Arc::new(GithubFeed::new(
        &config.feed_base_url,
        config.github_token.as_deref(),
        &config.user_agent,
        Duration::from_secs(config.fetch_timeout_secs),
    )?);

    if config.poll_interval_secs > 0 {
        let handle = liveness.register("feed_poller".to_string(), config.poller_deadline()?);
        tokio::spawn(poller::poll_loop(
            coordinator.clone(),
            feed.clone(),
            config.default_repo.clone(),
            Duration::from_secs(config.poll_interval_secs),
            handle,
        ));
    }

    let metrics = if config.export_prometheus {
        Some(setup_metrics_recorder()?)
    } else {
        None
    };

    let app = router::router(
        coordinator,
        feed,
        liveness,
        RouterSettings {
            default_repo: config.default_repo.clone(),
            max_webhook_body_bytes: config.max_webhook_body_bytes,
            webhook_concurrency_limit: config.webhook_concurrency_limit,
        },
        metrics,
    );

    tracing::info!("listening on {:?}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
