use axum::http::StatusCode;

use hooktrail_auth_types::actor::Actor;
use hooktrail_core::client::ClientInfo;
use hooktrail_domain::id::EventId;

use crate::domain::repository::{EventProcessor, EventRepository, RateLimiter};
use crate::domain::types::{AttemptResult, AuditDraft, EventStatus, RateLimitDecision};
use crate::error::WebhookServiceError;
use crate::usecase::executor::{AttemptExecutor, AttemptOutcome};
use crate::usecase::rate_limit::RateLimitPolicy;

pub struct RetryRequest {
    pub event_id: EventId,
    pub actor: Actor,
    pub client: ClientInfo,
}

/// Expected reasons a retry never reached the side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryRejection {
    RateLimited { retry_after_secs: u64 },
    NotFound,
    AttemptLimitExceeded { max: u32 },
    /// The event is processed, or an attempt is already in flight.
    InvalidTransition { status: EventStatus },
}

impl RetryRejection {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::NotFound => "EVENT_NOT_FOUND",
            Self::AttemptLimitExceeded { .. } => "ATTEMPT_LIMIT_EXCEEDED",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AttemptLimitExceeded { .. } => StatusCode::BAD_REQUEST,
            Self::InvalidTransition { .. } => StatusCode::CONFLICT,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::RateLimited { .. } => "Rate limit exceeded".to_owned(),
            Self::NotFound => "Event not found".to_owned(),
            Self::AttemptLimitExceeded { max } => format!("Max retries reached ({max})"),
            Self::InvalidTransition {
                status: EventStatus::Processing,
            } => "Event is already being processed".to_owned(),
            Self::InvalidTransition { .. } => "Event already processed".to_owned(),
        }
    }
}

/// Terminal state of a retry request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    Succeeded { attempt_number: u32 },
    Failed { attempt_number: u32, error: String },
    Rejected(RetryRejection),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryReport {
    pub outcome: RetryOutcome,
    pub rate_limit: RateLimitDecision,
}

/// Administrator-triggered retry:
/// rate check → claim attempt → side effect → record (+ audit for humans).
pub struct RetryWebhookUseCase<E, L, P>
where
    E: EventRepository,
    L: RateLimiter,
    P: EventProcessor,
{
    pub executor: AttemptExecutor<E>,
    pub limiter: L,
    pub processor: P,
    pub policy: RateLimitPolicy,
}

impl<E, L, P> RetryWebhookUseCase<E, L, P>
where
    E: EventRepository,
    L: RateLimiter,
    P: EventProcessor,
{
    /// Only storage failures are errors; every other end state is reported
    /// in the returned [`RetryOutcome`].
    pub async fn execute(&self, request: RetryRequest) -> Result<RetryReport, WebhookServiceError> {
        let rate_limit = self.policy.check(&self.limiter, &request.client.ip).await;
        if !rate_limit.allowed {
            let rejection = RetryRejection::RateLimited {
                retry_after_secs: rate_limit.retry_after_secs.unwrap_or(1),
            };
            return Ok(RetryReport {
                outcome: RetryOutcome::Rejected(rejection),
                rate_limit,
            });
        }

        // The system actor (local bypass) is never written to the audit trail.
        let audit = match &request.actor {
            Actor::Human { .. } => Some(AuditDraft {
                actor: request.actor.clone(),
                client: request.client.clone(),
            }),
            Actor::System => None,
        };

        let processor = &self.processor;
        let executed = self
            .executor
            .execute(request.event_id, audit, |event| async move {
                processor.process(&event).await
            })
            .await;

        let outcome = match executed {
            Ok(AttemptOutcome {
                attempt_number,
                result: AttemptResult::Succeeded,
                ..
            }) => RetryOutcome::Succeeded { attempt_number },
            Ok(AttemptOutcome {
                attempt_number,
                result: AttemptResult::Failed { error },
                ..
            }) => RetryOutcome::Failed {
                attempt_number,
                error,
            },
            Err(WebhookServiceError::EventNotFound) => {
                RetryOutcome::Rejected(RetryRejection::NotFound)
            }
            Err(WebhookServiceError::AttemptLimitExceeded { max }) => {
                RetryOutcome::Rejected(RetryRejection::AttemptLimitExceeded { max })
            }
            Err(WebhookServiceError::InvalidTransition(t)) => {
                RetryOutcome::Rejected(RetryRejection::InvalidTransition { status: t.from })
            }
            Err(e) => return Err(e),
        };

        Ok(RetryReport {
            outcome,
            rate_limit,
        })
    }
}
