use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use sea_orm::DatabaseConnection;
use tokio_util::task::TaskTracker;

use hooktrail_auth_types::identity::AdminPolicy;
use hooktrail_core::health::Readiness;

use crate::config::{ProviderSettings, WebhooksConfig};
use crate::infra::db::{DbAuditLogRepository, DbEventRepository};
use crate::infra::processor::HttpEventProcessor;
use crate::infra::rate_limit::RateLimiterBackend;
use crate::usecase::executor::AttemptExecutor;
use crate::usecase::rate_limit::RateLimitPolicy;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub limiter: RateLimiterBackend,
    pub processor: HttpEventProcessor,
    pub webhook_secrets: Arc<ProviderSettings>,
    pub max_attempts: u32,
    pub processing_timeout: Duration,
    pub retry_policy: RateLimitPolicy,
    pub search_policy: RateLimitPolicy,
    pub admin_policy: AdminPolicy,
    /// Initial processing spawned by intake; drained on shutdown.
    pub tasks: TaskTracker,
}

impl AppState {
    pub fn new(
        config: &WebhooksConfig,
        db: DatabaseConnection,
        limiter: RateLimiterBackend,
        processor: HttpEventProcessor,
    ) -> Self {
        Self {
            db,
            limiter,
            processor,
            webhook_secrets: Arc::new(config.webhook_secrets.clone()),
            max_attempts: config.max_attempts,
            processing_timeout: config.processing_timeout,
            retry_policy: RateLimitPolicy::retry(config.retry_rate_limit, config.retry_rate_window),
            search_policy: RateLimitPolicy::search(
                config.search_rate_limit,
                config.search_rate_window,
            ),
            admin_policy: AdminPolicy {
                local_bypass: config.admin_local_bypass,
            },
            tasks: TaskTracker::new(),
        }
    }

    pub fn event_repo(&self) -> DbEventRepository {
        DbEventRepository {
            db: self.db.clone(),
        }
    }

    pub fn audit_repo(&self) -> DbAuditLogRepository {
        DbAuditLogRepository {
            db: self.db.clone(),
        }
    }

    pub fn executor(&self) -> AttemptExecutor<DbEventRepository> {
        AttemptExecutor {
            events: self.event_repo(),
            max_attempts: self.max_attempts,
            processing_timeout: self.processing_timeout,
        }
    }
}

impl FromRef<AppState> for AdminPolicy {
    fn from_ref(state: &AppState) -> Self {
        state.admin_policy
    }
}

impl Readiness for AppState {
    async fn is_ready(&self) -> bool {
        self.db.ping().await.is_ok()
    }
}
