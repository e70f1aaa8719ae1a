use std::sync::Arc;

use sea_orm::Database;
use tracing::info;

use hooktrail_core::tracing::init_tracing;
use hooktrail_webhooks::config::WebhooksConfig;
use hooktrail_webhooks::infra::processor::HttpEventProcessor;
use hooktrail_webhooks::infra::rate_limit::{
    InMemoryRateLimiter, RateLimiterBackend, RedisRateLimiter,
};
use hooktrail_webhooks::router::build_router;
use hooktrail_webhooks::shutdown::{drain_background, shutdown_signal};
use hooktrail_webhooks::state::AppState;
use hooktrail_webhooks::usecase::executor::CLAIM_GRACE;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = WebhooksConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let limiter = match &config.redis_url {
        Some(url) => {
            let pool = deadpool_redis::Config::from_url(url)
                .create_pool(Some(deadpool_redis::Runtime::Tokio1))
                .expect("failed to create Redis pool");
            info!("rate limits shared through Redis");
            RateLimiterBackend::Redis(RedisRateLimiter { pool })
        }
        None => {
            let limiter = Arc::new(InMemoryRateLimiter::new());
            spawn_sweeper(Arc::clone(&limiter), config.rate_limit_sweep);
            RateLimiterBackend::InMemory(limiter)
        }
    };

    let processor =
        HttpEventProcessor::new(config.processor_urls.clone(), config.processing_timeout)
            .expect("failed to build processor HTTP client");

    if config.admin_local_bypass {
        tracing::warn!("ADMIN_LOCAL_BYPASS is on: admin routes accept requests without identity");
    }

    let state = AppState::new(&config, db, limiter, processor);
    let tasks = state.tasks.clone();

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.webhooks_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("webhooks service listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    drain_background(&tasks, config.processing_timeout.saturating_add(CLAIM_GRACE)).await;
    info!("webhooks service stopped");
}

/// Bound the in-memory limiter's memory by dropping elapsed windows.
fn spawn_sweeper(limiter: Arc<InMemoryRateLimiter>, every: std::time::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every.max(std::time::Duration::from_secs(1)));
        loop {
            interval.tick().await;
            let removed = limiter.sweep_expired();
            if removed > 0 {
                tracing::debug!(removed, "swept expired rate limit entries");
            }
        }
    });
}
