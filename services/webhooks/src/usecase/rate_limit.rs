use std::time::Duration;

use crate::domain::repository::RateLimiter;
use crate::domain::types::RateLimitDecision;
use crate::error::WebhookServiceError;

pub const RETRY_PREFIX: &str = "webhook-retry";
pub const SEARCH_PREFIX: &str = "webhook-search";

/// Budget applied to one family of endpoints, keyed by client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub prefix: &'static str,
    pub limit: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn retry(limit: u32, window: Duration) -> Self {
        Self {
            prefix: RETRY_PREFIX,
            limit,
            window,
        }
    }

    pub fn search(limit: u32, window: Duration) -> Self {
        Self {
            prefix: SEARCH_PREFIX,
            limit,
            window,
        }
    }

    pub fn key(&self, client_ip: &str) -> String {
        format!("{}:{}", self.prefix, client_ip)
    }

    pub async fn check<L: RateLimiter>(&self, limiter: &L, client_ip: &str) -> RateLimitDecision {
        let key = self.key(client_ip);
        let decision = limiter.check(&key, self.limit, self.window).await;
        if !decision.allowed {
            tracing::info!(
                key = %key,
                retry_after_secs = decision.retry_after_secs,
                "rate limit exceeded"
            );
        }
        decision
    }

    /// Like [`check`](Self::check), but a denial becomes `RateLimited`.
    pub async fn enforce<L: RateLimiter>(
        &self,
        limiter: &L,
        client_ip: &str,
    ) -> Result<RateLimitDecision, WebhookServiceError> {
        let decision = self.check(limiter, client_ip).await;
        if decision.allowed {
            Ok(decision)
        } else {
            Err(WebhookServiceError::RateLimited {
                retry_after_secs: decision.retry_after_secs.unwrap_or(1),
            })
        }
    }
}
