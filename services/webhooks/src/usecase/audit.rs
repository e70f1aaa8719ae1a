use hooktrail_core::client::ClientInfo;

use crate::domain::repository::{AuditLogRepository, RateLimiter};
use crate::domain::types::{AuditFilter, AuditLogEntry, RateLimitDecision};
use crate::error::WebhookServiceError;
use crate::usecase::rate_limit::RateLimitPolicy;

pub struct AuditPage {
    pub entries: Vec<AuditLogEntry>,
    pub limit: u32,
    pub rate_limit: RateLimitDecision,
}

pub struct QueryAuditLogUseCase<A, L>
where
    A: AuditLogRepository,
    L: RateLimiter,
{
    pub audit: A,
    pub limiter: L,
    pub policy: RateLimitPolicy,
}

impl<A, L> QueryAuditLogUseCase<A, L>
where
    A: AuditLogRepository,
    L: RateLimiter,
{
    pub async fn execute(
        &self,
        filter: AuditFilter,
        client: &ClientInfo,
    ) -> Result<AuditPage, WebhookServiceError> {
        let rate_limit = self.policy.enforce(&self.limiter, &client.ip).await?;
        let entries = self.audit.query(&filter).await?;
        Ok(AuditPage {
            entries,
            limit: filter.effective_limit(),
            rate_limit,
        })
    }
}
