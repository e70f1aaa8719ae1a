use hooktrail_core::client::ClientInfo;
use hooktrail_domain::id::EventId;
use hooktrail_domain::pagination::PageRequest;

use crate::domain::repository::{EventRepository, RateLimiter};
use crate::domain::types::{Attempt, Event, EventFilter, EventWithLatestAttempt, RateLimitDecision};
use crate::error::WebhookServiceError;
use crate::usecase::rate_limit::RateLimitPolicy;

// ── List ──────────────────────────────────────────────────────────────────────

pub struct EventPage {
    pub items: Vec<EventWithLatestAttempt>,
    pub page: PageRequest,
    pub rate_limit: RateLimitDecision,
}

pub struct ListEventsUseCase<E, L>
where
    E: EventRepository,
    L: RateLimiter,
{
    pub events: E,
    pub limiter: L,
    pub policy: RateLimitPolicy,
}

impl<E, L> ListEventsUseCase<E, L>
where
    E: EventRepository,
    L: RateLimiter,
{
    pub async fn execute(
        &self,
        filter: EventFilter,
        page: PageRequest,
        client: &ClientInfo,
    ) -> Result<EventPage, WebhookServiceError> {
        let rate_limit = self.policy.enforce(&self.limiter, &client.ip).await?;
        let page = page.clamped();
        let items = self.events.list_events(&filter, page).await?;
        Ok(EventPage {
            items,
            page,
            rate_limit,
        })
    }
}

// ── Detail ────────────────────────────────────────────────────────────────────

pub struct EventDetail {
    pub event: Event,
    pub attempts: Vec<Attempt>,
}

pub struct GetEventUseCase<E>
where
    E: EventRepository,
{
    pub events: E,
}

impl<E> GetEventUseCase<E>
where
    E: EventRepository,
{
    pub async fn execute(&self, id: EventId) -> Result<EventDetail, WebhookServiceError> {
        let event = self
            .events
            .get_event(id)
            .await?
            .ok_or(WebhookServiceError::EventNotFound)?;
        let attempts = self.events.list_attempts(id).await?;
        Ok(EventDetail { event, attempts })
    }
}
