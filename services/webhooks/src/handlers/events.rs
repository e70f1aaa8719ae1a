use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hooktrail_auth_types::identity::AdminIdentity;
use hooktrail_core::client::ClientInfo;
use hooktrail_core::serde::{to_rfc3339_ms, to_rfc3339_ms_opt};
use hooktrail_domain::id::EventId;
use hooktrail_domain::pagination::{DEFAULT_LIMIT, PageRequest};

use crate::domain::types::{Attempt, Event, EventFilter, EventStatus, Provider, UnknownVariant};
use crate::error::WebhookServiceError;
use crate::handlers::rate_limit_headers;
use crate::state::AppState;
use crate::usecase::events::{GetEventUseCase, ListEventsUseCase};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: EventId,
    pub provider: &'static str,
    pub external_id: Option<String>,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub signature_verified: bool,
    pub status: &'static str,
    pub last_error: Option<String>,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub received_at: DateTime<Utc>,
    #[serde(serialize_with = "to_rfc3339_ms_opt")]
    pub processed_at: Option<DateTime<Utc>>,
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            provider: event.provider.as_str(),
            external_id: event.external_id,
            event_type: event.event_type,
            payload: event.payload,
            signature_verified: event.signature_verified,
            status: event.status.as_str(),
            last_error: event.last_error,
            received_at: event.received_at,
            processed_at: event.processed_at,
            tenant_id: event.tenant_id,
            user_id: event.user_id,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResponse {
    pub attempt_number: u32,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub started_at: DateTime<Utc>,
    #[serde(serialize_with = "to_rfc3339_ms_opt")]
    pub finished_at: Option<DateTime<Utc>>,
    pub ok: Option<bool>,
    pub error: Option<String>,
}

impl From<Attempt> for AttemptResponse {
    fn from(attempt: Attempt) -> Self {
        Self {
            attempt_number: attempt.attempt_number,
            started_at: attempt.started_at,
            finished_at: attempt.finished_at,
            ok: attempt.ok,
            error: attempt.error,
        }
    }
}

// ── GET /admin/webhooks ───────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ListEventsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    pub provider: Option<String>,
}

impl ListEventsQuery {
    fn filter(&self) -> Result<EventFilter, WebhookServiceError> {
        let invalid = |e: UnknownVariant| WebhookServiceError::InvalidFilter(e.to_string());
        Ok(EventFilter {
            status: self
                .status
                .as_deref()
                .map(str::parse::<EventStatus>)
                .transpose()
                .map_err(invalid)?,
            provider: self
                .provider
                .as_deref()
                .map(str::parse::<Provider>)
                .transpose()
                .map_err(invalid)?,
        })
    }

    fn page(&self) -> PageRequest {
        PageRequest {
            limit: self.limit.unwrap_or(DEFAULT_LIMIT),
            page: self.page.unwrap_or(1),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListItem {
    #[serde(flatten)]
    pub event: EventResponse,
    pub latest_attempt: Option<AttemptResponse>,
}

#[derive(Serialize)]
pub struct EventListResponse {
    pub items: Vec<EventListItem>,
    pub page: u32,
    pub limit: u32,
}

pub async fn list_events(
    State(state): State<AppState>,
    AdminIdentity(_actor): AdminIdentity,
    client: ClientInfo,
    Query(query): Query<ListEventsQuery>,
) -> Result<impl IntoResponse, WebhookServiceError> {
    let filter = query.filter()?;
    let usecase = ListEventsUseCase {
        events: state.event_repo(),
        limiter: state.limiter.clone(),
        policy: state.search_policy,
    };
    let page = usecase.execute(filter, query.page(), &client).await?;

    let body = EventListResponse {
        items: page
            .items
            .into_iter()
            .map(|row| EventListItem {
                event: row.event.into(),
                latest_attempt: row.latest_attempt.map(Into::into),
            })
            .collect(),
        page: page.page.page,
        limit: page.page.limit,
    };
    Ok((rate_limit_headers(&page.rate_limit), Json(body)))
}

// ── GET /admin/webhooks/{id} ──────────────────────────────────────────────────

#[derive(Serialize)]
pub struct EventDetailResponse {
    #[serde(flatten)]
    pub event: EventResponse,
    pub attempts: Vec<AttemptResponse>,
}

pub async fn get_event(
    State(state): State<AppState>,
    AdminIdentity(_actor): AdminIdentity,
    Path(event_id): Path<EventId>,
) -> Result<Json<EventDetailResponse>, WebhookServiceError> {
    let usecase = GetEventUseCase {
        events: state.event_repo(),
    };
    let detail = usecase.execute(event_id).await?;
    Ok(Json(EventDetailResponse {
        event: detail.event.into(),
        attempts: detail.attempts.into_iter().map(Into::into).collect(),
    }))
}
