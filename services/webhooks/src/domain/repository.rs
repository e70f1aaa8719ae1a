#![allow(async_fn_in_trait)]

use std::time::Duration;

use chrono::{DateTime, Utc};

use hooktrail_domain::id::EventId;
use hooktrail_domain::pagination::PageRequest;

use crate::domain::types::{
    Attempt, AttemptCompletion, AuditFilter, AuditLogEntry, ClaimedAttempt, Event, EventFilter,
    EventWithLatestAttempt, NewAuditEntry, NewEvent, RateLimitDecision,
};
use crate::error::WebhookServiceError;

/// Durable store for events and their attempts.
pub trait EventRepository: Send + Sync {
    /// Persist a freshly received event in `RECEIVED`.
    async fn create_event(&self, new: NewEvent) -> Result<Event, WebhookServiceError>;

    async fn get_event(&self, id: EventId) -> Result<Option<Event>, WebhookServiceError>;

    /// Attempts ordered by `attempt_number` ascending.
    async fn list_attempts(&self, id: EventId) -> Result<Vec<Attempt>, WebhookServiceError>;

    /// Claim the next attempt of an event in one atomic step: check the
    /// ceiling, insert attempt `count + 1`, move the event to `PROCESSING`.
    ///
    /// An event left in `PROCESSING` whose open attempt started before
    /// `stale_before` is first released: the attempt is closed as
    /// `abandoned` and the event moves to `FAILED`. The release is kept
    /// even when the claim itself is then refused.
    ///
    /// Fails with `EventNotFound`, `AttemptLimitExceeded` (no attempt
    /// inserted) or `InvalidTransition` (event already processed or in flight).
    async fn create_attempt(
        &self,
        id: EventId,
        max_attempts: u32,
        started_at: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<ClaimedAttempt, WebhookServiceError>;

    /// Finish an open attempt, complete its event and, when given, append
    /// the audit entry. All-or-nothing. Returns the completed event.
    ///
    /// Fails with `AttemptClosed` when the attempt was already finished,
    /// e.g. released as abandoned by a later claim.
    async fn complete_attempt(
        &self,
        completion: &AttemptCompletion,
        audit: Option<&NewAuditEntry>,
    ) -> Result<Event, WebhookServiceError>;

    /// Newest first, each annotated with its latest attempt.
    async fn list_events(
        &self,
        filter: &EventFilter,
        page: PageRequest,
    ) -> Result<Vec<EventWithLatestAttempt>, WebhookServiceError>;
}

/// Append-only audit trail: entries are never updated or deleted.
pub trait AuditLogRepository: Send + Sync {
    /// Standalone insert for actions recorded outside an attempt completion
    /// (`EMAIL_RETRY`, `SUPPORT_SESSION_START`). `WEBHOOK_RETRY` entries are
    /// written by [`EventRepository::complete_attempt`] instead.
    async fn append(&self, entry: &NewAuditEntry) -> Result<AuditLogEntry, WebhookServiceError>;

    /// Newest first, at most `filter.effective_limit()` entries.
    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>, WebhookServiceError>;
}

/// The side effect run by an attempt. The error string is recorded verbatim.
pub trait EventProcessor: Send + Sync {
    async fn process(&self, event: &Event) -> Result<(), String>;
}

/// Request budget per key. Never fails: an unavailable budget is a denial.
pub trait RateLimiter: Send + Sync {
    async fn check(&self, key: &str, limit: u32, window: Duration) -> RateLimitDecision;
}
