use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use hooktrail_domain::id::EventId;

use crate::domain::repository::EventRepository;
use crate::domain::types::{AttemptCompletion, AttemptResult, AuditDraft, Event, TIMEOUT_ERROR};
use crate::error::WebhookServiceError;

/// Slack past the processing timeout before an open attempt counts as abandoned.
pub const CLAIM_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub event_id: EventId,
    pub attempt_number: u32,
    pub result: AttemptResult,
}

/// Runs one tracked attempt of an event. Never retries on its own.
pub struct AttemptExecutor<E>
where
    E: EventRepository,
{
    pub events: E,
    pub max_attempts: u32,
    pub processing_timeout: Duration,
}

impl<E> AttemptExecutor<E>
where
    E: EventRepository,
{
    /// Claim the next attempt, run `side_effect` under the processing timeout
    /// and record the result on the attempt and the event (plus the audit
    /// entry built from `audit`) in one transaction.
    ///
    /// An event still `PROCESSING` from an attempt older than the processing
    /// timeout plus [`CLAIM_GRACE`] is taken over: that attempt is closed as
    /// `abandoned` before the new one is claimed.
    ///
    /// Fails with `EventNotFound`, `AttemptLimitExceeded` or
    /// `InvalidTransition` before the side effect runs, or `Internal` when
    /// storage is unreachable. A failing side effect is an `Ok` outcome.
    pub async fn execute<F, Fut>(
        &self,
        event_id: EventId,
        audit: Option<AuditDraft>,
        side_effect: F,
    ) -> Result<AttemptOutcome, WebhookServiceError>
    where
        F: FnOnce(Event) -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        // 1. Atomic: load + release stale claim + ceiling check + insert attempt + PROCESSING
        let now = Utc::now();
        let claimed = self
            .events
            .create_attempt(event_id, self.max_attempts, now, self.stale_cutoff(now))
            .await?;
        let attempt_number = claimed.attempt.attempt_number;
        let provider = claimed.event.provider;
        if let Some(abandoned) = claimed.abandoned_attempt {
            warn!(event_id = %event_id, provider = %provider, abandoned_attempt = abandoned, "released abandoned webhook attempt");
        }

        // 2. Side effect, bounded
        let result =
            match tokio::time::timeout(self.processing_timeout, side_effect(claimed.event.clone()))
                .await
            {
                Ok(outcome) => AttemptResult::from_side_effect(outcome),
                Err(_) => AttemptResult::Failed {
                    error: TIMEOUT_ERROR.to_owned(),
                },
            };

        // 3. Attempt + event (+ audit) in one transaction
        let audit_entry = audit.map(|draft| draft.webhook_retry(&claimed, &result));
        let completion = AttemptCompletion {
            attempt_id: claimed.attempt.id,
            event_id,
            result: result.clone(),
            finished_at: Utc::now(),
        };
        self.events
            .complete_attempt(&completion, audit_entry.as_ref())
            .await?;

        match &result {
            AttemptResult::Succeeded => {
                info!(event_id = %event_id, provider = %provider, attempt_number, "webhook attempt succeeded");
            }
            AttemptResult::Failed { error } => {
                warn!(event_id = %event_id, provider = %provider, attempt_number, error = %error, "webhook attempt failed");
            }
        }

        Ok(AttemptOutcome {
            event_id,
            attempt_number,
            result,
        })
    }

    /// Open attempts started before this instant are considered abandoned.
    pub fn stale_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let age = chrono::Duration::from_std(self.processing_timeout.saturating_add(CLAIM_GRACE))
            .unwrap_or(chrono::Duration::MAX);
        now.checked_sub_signed(age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
