use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use hooktrail_auth_types::actor::Actor;
use hooktrail_core::client::ClientInfo;
use hooktrail_domain::id::{AuditEntryId, EventId};
use hooktrail_domain::pagination::PageRequest;
use hooktrail_webhooks::domain::repository::{
    AuditLogRepository, EventProcessor, EventRepository,
};
use hooktrail_webhooks::domain::types::{
    Attempt, AttemptCompletion, AuditFilter, AuditLogEntry, ClaimedAttempt, Event, EventFilter,
    EventWithLatestAttempt, NewAuditEntry, NewEvent, Provider,
};
use hooktrail_webhooks::error::WebhookServiceError;
use hooktrail_webhooks::infra::rate_limit::{InMemoryRateLimiter, RateLimiterBackend};
use hooktrail_webhooks::usecase::executor::AttemptExecutor;
use hooktrail_webhooks::usecase::rate_limit::RateLimitPolicy;
use hooktrail_webhooks::usecase::retry::{RetryRequest, RetryWebhookUseCase};

// ── MockStore ────────────────────────────────────────────────────────────────

/// Rows shared by [`MockEventRepo`] and [`MockAuditRepo`], like one database.
#[derive(Default)]
pub struct StoreRows {
    pub events: Vec<Event>,
    pub attempts: Vec<Attempt>,
    pub audit: Vec<AuditLogEntry>,
    /// Completions still to fail with `Internal` before touching any row.
    pub failing_completions: u32,
}

#[derive(Clone, Default)]
pub struct MockStore {
    pub rows: Arc<Mutex<StoreRows>>,
    /// Every call fails with `Internal`, as if the database were down.
    pub unavailable: bool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn event_repo(&self) -> MockEventRepo {
        MockEventRepo {
            store: self.clone(),
        }
    }

    pub fn audit_repo(&self) -> MockAuditRepo {
        MockAuditRepo {
            store: self.clone(),
        }
    }

    /// Insert an event directly, bypassing intake.
    pub fn seed_event(&self, provider: Provider) -> Event {
        let event = new_event(provider).into_event(EventId::generate(), Utc::now());
        self.rows.lock().unwrap().events.push(event.clone());
        event
    }

    pub fn event(&self, id: EventId) -> Event {
        self.rows
            .lock()
            .unwrap()
            .events
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .expect("event should exist")
    }

    pub fn attempts(&self, id: EventId) -> Vec<Attempt> {
        let mut attempts: Vec<Attempt> = self
            .rows
            .lock()
            .unwrap()
            .attempts
            .iter()
            .filter(|a| a.event_id == id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.attempt_number);
        attempts
    }

    pub fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.rows.lock().unwrap().audit.clone()
    }

    /// The next completion fails as if the database dropped the transaction.
    pub fn fail_next_completion(&self) {
        self.rows.lock().unwrap().failing_completions += 1;
    }

    /// Move the start of every open attempt of `id` back by `age`.
    pub fn age_open_attempts(&self, id: EventId, age: chrono::Duration) {
        let mut rows = self.rows.lock().unwrap();
        for attempt in rows
            .attempts
            .iter_mut()
            .filter(|a| a.event_id == id && a.is_open())
        {
            attempt.started_at -= age;
        }
    }

    fn check_available(&self) -> Result<(), WebhookServiceError> {
        if self.unavailable {
            Err(WebhookServiceError::Internal(anyhow::anyhow!(
                "connection refused"
            )))
        } else {
            Ok(())
        }
    }
}

pub fn new_event(provider: Provider) -> NewEvent {
    NewEvent {
        provider,
        external_id: Some("ext-123".to_owned()),
        event_type: "invoice.submitted".to_owned(),
        payload: json!({"type": "invoice.submitted", "id": "ext-123"}),
        signature_verified: false,
        tenant_id: Some(Uuid::new_v4()),
        user_id: None,
    }
}

// ── MockEventRepo ────────────────────────────────────────────────────────────

pub struct MockEventRepo {
    pub store: MockStore,
}

impl EventRepository for MockEventRepo {
    async fn create_event(&self, new: NewEvent) -> Result<Event, WebhookServiceError> {
        self.store.check_available()?;
        let event = new.into_event(EventId::generate(), Utc::now());
        self.store.rows.lock().unwrap().events.push(event.clone());
        Ok(event)
    }

    async fn get_event(&self, id: EventId) -> Result<Option<Event>, WebhookServiceError> {
        self.store.check_available()?;
        let rows = self.store.rows.lock().unwrap();
        Ok(rows.events.iter().find(|e| e.id == id).cloned())
    }

    async fn list_attempts(&self, id: EventId) -> Result<Vec<Attempt>, WebhookServiceError> {
        self.store.check_available()?;
        Ok(self.store.attempts(id))
    }

    async fn create_attempt(
        &self,
        id: EventId,
        max_attempts: u32,
        started_at: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<ClaimedAttempt, WebhookServiceError> {
        self.store.check_available()?;
        // One lock for the whole claim, like the row lock in the database.
        let mut guard = self.store.rows.lock().unwrap();
        let rows = &mut *guard;
        let index = rows
            .events
            .iter()
            .position(|e| e.id == id)
            .ok_or(WebhookServiceError::EventNotFound)?;
        let mut event = rows.events[index].clone();

        let mut abandoned_attempt = None;
        if let Some(open) = rows
            .attempts
            .iter_mut()
            .filter(|a| a.event_id == id && a.is_open())
            .max_by_key(|a| a.attempt_number)
        {
            if event.release_stale_claim(open, stale_before, started_at) {
                abandoned_attempt = Some(open.attempt_number);
                rows.events[index] = event.clone();
            }
        }

        let previous_status = event.mark_processing()?;
        let count = rows.attempts.iter().filter(|a| a.event_id == id).count() as u32;
        if count >= max_attempts {
            return Err(WebhookServiceError::AttemptLimitExceeded { max: max_attempts });
        }

        let attempt = Attempt::start(id, count + 1, started_at);
        rows.attempts.push(attempt.clone());
        rows.events[index] = event.clone();
        Ok(ClaimedAttempt {
            attempt,
            event,
            previous_status,
            abandoned_attempt,
        })
    }

    async fn complete_attempt(
        &self,
        completion: &AttemptCompletion,
        audit: Option<&NewAuditEntry>,
    ) -> Result<Event, WebhookServiceError> {
        self.store.check_available()?;
        let mut guard = self.store.rows.lock().unwrap();
        let rows = &mut *guard;
        if rows.failing_completions > 0 {
            rows.failing_completions -= 1;
            return Err(WebhookServiceError::Internal(anyhow::anyhow!("db blip")));
        }
        let index = rows
            .events
            .iter()
            .position(|e| e.id == completion.event_id)
            .ok_or(WebhookServiceError::EventNotFound)?;
        let mut event = rows.events[index].clone();

        let attempt = rows
            .attempts
            .iter_mut()
            .find(|a| a.id == completion.attempt_id && a.event_id == completion.event_id)
            .ok_or_else(|| WebhookServiceError::Internal(anyhow::anyhow!("attempt missing")))?;
        if !attempt.is_open() {
            return Err(WebhookServiceError::AttemptClosed);
        }
        event.complete(&completion.result, completion.finished_at)?;
        attempt.finish(&completion.result, completion.finished_at);
        rows.events[index] = event.clone();
        if let Some(entry) = audit {
            let stored = entry
                .clone()
                .into_entry(AuditEntryId::generate(), Utc::now());
            rows.audit.push(stored);
        }
        Ok(event)
    }

    async fn list_events(
        &self,
        filter: &EventFilter,
        page: PageRequest,
    ) -> Result<Vec<EventWithLatestAttempt>, WebhookServiceError> {
        self.store.check_available()?;
        let page = page.clamped();
        let rows = self.store.rows.lock().unwrap();
        let mut events: Vec<Event> = rows
            .events
            .iter()
            .filter(|e| filter.status.is_none_or(|s| e.status == s))
            .filter(|e| filter.provider.is_none_or(|p| e.provider == p))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        Ok(events
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .map(|event| {
                let latest_attempt = rows
                    .attempts
                    .iter()
                    .filter(|a| a.event_id == event.id)
                    .max_by_key(|a| a.attempt_number)
                    .cloned();
                EventWithLatestAttempt {
                    event,
                    latest_attempt,
                }
            })
            .collect())
    }
}

// ── MockAuditRepo ────────────────────────────────────────────────────────────

pub struct MockAuditRepo {
    pub store: MockStore,
}

impl AuditLogRepository for MockAuditRepo {
    async fn append(&self, entry: &NewAuditEntry) -> Result<AuditLogEntry, WebhookServiceError> {
        self.store.check_available()?;
        let stored = entry
            .clone()
            .into_entry(AuditEntryId::generate(), Utc::now());
        self.store.rows.lock().unwrap().audit.push(stored.clone());
        Ok(stored)
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>, WebhookServiceError> {
        self.store.check_available()?;
        let rows = self.store.rows.lock().unwrap();
        // Insertion order is creation order; newest first.
        Ok(rows
            .audit
            .iter()
            .rev()
            .filter(|e| {
                filter
                    .target_user_id
                    .is_none_or(|id| e.target_user_id == Some(id))
            })
            .filter(|e| {
                filter
                    .target_company_id
                    .is_none_or(|id| e.target_company_id == Some(id))
            })
            .take(filter.effective_limit() as usize)
            .cloned()
            .collect())
    }
}

// ── MockProcessor ────────────────────────────────────────────────────────────

/// Side effect that replays scripted results (then succeeds) and counts calls.
#[derive(Clone, Default)]
pub struct MockProcessor {
    pub script: Arc<Mutex<VecDeque<Result<(), String>>>>,
    pub calls: Arc<Mutex<u32>>,
    /// Sleep before answering; pair with a paused clock to provoke timeouts.
    pub delay: Option<Duration>,
}

impl MockProcessor {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing_with(error: &str) -> Self {
        Self::scripted(vec![Err(error.to_owned())])
    }

    pub fn always_failing(error: &str) -> Self {
        Self::scripted((0..16).map(|_| Err(error.to_owned())).collect())
    }

    pub fn scripted(results: Vec<Result<(), String>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(results.into())),
            ..Self::default()
        }
    }

    pub fn hanging(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

impl EventProcessor for MockProcessor {
    async fn process(&self, _event: &Event) -> Result<(), String> {
        *self.calls.lock().unwrap() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        // Give concurrent retries a chance to interleave.
        tokio::task::yield_now().await;
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

// ── Builders ─────────────────────────────────────────────────────────────────

pub const MAX_ATTEMPTS: u32 = 5;
pub const TIMEOUT: Duration = Duration::from_secs(30);

pub fn executor(store: &MockStore) -> AttemptExecutor<MockEventRepo> {
    AttemptExecutor {
        events: store.event_repo(),
        max_attempts: MAX_ATTEMPTS,
        processing_timeout: TIMEOUT,
    }
}

pub fn limiter() -> RateLimiterBackend {
    RateLimiterBackend::InMemory(Arc::new(InMemoryRateLimiter::new()))
}

pub fn retry_usecase(
    store: &MockStore,
    processor: MockProcessor,
    limiter: RateLimiterBackend,
    retry_limit: u32,
) -> RetryWebhookUseCase<MockEventRepo, RateLimiterBackend, MockProcessor> {
    RetryWebhookUseCase {
        executor: executor(store),
        limiter,
        processor,
        policy: RateLimitPolicy::retry(retry_limit, Duration::from_secs(60)),
    }
}

pub fn admin() -> Actor {
    Actor::human(Uuid::new_v4(), "ops@example.com")
}

pub fn client(ip: &str) -> ClientInfo {
    ClientInfo {
        ip: ip.to_owned(),
        user_agent: "integration-test".to_owned(),
    }
}

pub fn retry_request(event_id: EventId, actor: Actor) -> RetryRequest {
    RetryRequest {
        event_id,
        actor,
        client: client("198.51.100.7"),
    }
}
