use std::collections::HashMap;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionError,
    TransactionTrait,
};
use uuid::Uuid;

use hooktrail_domain::id::{AttemptId, AuditEntryId, EventId};
use hooktrail_domain::pagination::PageRequest;
use hooktrail_webhooks_schema::{audit_logs, webhook_attempts, webhook_events};

use crate::domain::repository::{AuditLogRepository, EventRepository};
use crate::domain::types::{
    Attempt, AttemptCompletion, AuditFilter, AuditLogEntry, ClaimedAttempt, Event, EventFilter,
    EventStatus, EventWithLatestAttempt, NewAuditEntry, NewEvent,
};
use crate::error::WebhookServiceError;

/// Unwrap a transaction error, keeping domain errors raised inside the closure as-is.
fn txn_error(err: TransactionError<WebhookServiceError>, what: &'static str) -> WebhookServiceError {
    match err {
        TransactionError::Connection(e) => {
            WebhookServiceError::Internal(anyhow::Error::new(e).context(what))
        }
        TransactionError::Transaction(e) => e,
    }
}

// ── Event repository ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbEventRepository {
    pub db: DatabaseConnection,
}

impl EventRepository for DbEventRepository {
    async fn create_event(&self, new: NewEvent) -> Result<Event, WebhookServiceError> {
        let event = new.into_event(EventId::generate(), Utc::now());
        webhook_events::ActiveModel {
            id: Set(event.id.0),
            provider: Set(event.provider.as_str().to_owned()),
            external_id: Set(event.external_id.clone()),
            event_type: Set(event.event_type.clone()),
            payload: Set(event.payload.clone()),
            signature_verified: Set(event.signature_verified),
            status: Set(event.status.as_str().to_owned()),
            last_error: Set(None),
            received_at: Set(event.received_at),
            processed_at: Set(None),
            tenant_id: Set(event.tenant_id),
            user_id: Set(event.user_id),
        }
        .insert(&self.db)
        .await
        .context("create webhook event")?;
        Ok(event)
    }

    async fn get_event(&self, id: EventId) -> Result<Option<Event>, WebhookServiceError> {
        let model = webhook_events::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .context("find webhook event")?;
        Ok(model.map(event_from_model).transpose()?)
    }

    async fn list_attempts(&self, id: EventId) -> Result<Vec<Attempt>, WebhookServiceError> {
        let models = webhook_attempts::Entity::find()
            .filter(webhook_attempts::Column::EventId.eq(id.0))
            .order_by_asc(webhook_attempts::Column::AttemptNumber)
            .all(&self.db)
            .await
            .context("list webhook attempts")?;
        let attempts = models
            .into_iter()
            .map(attempt_from_model)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(attempts)
    }

    async fn create_attempt(
        &self,
        id: EventId,
        max_attempts: u32,
        started_at: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<ClaimedAttempt, WebhookServiceError> {
        // Refusals leave the closure as `Ok(Err(_))`: a stale release commits
        // even when the new claim is refused.
        self.db
            .transaction::<_, Result<ClaimedAttempt, WebhookServiceError>, WebhookServiceError>(
                |txn| {
                    Box::pin(async move {
                        // Row lock serializes concurrent claims on the same event.
                        let mut event = lock_event(txn, id).await?;
                        let abandoned_attempt =
                            release_stale_claim(txn, &mut event, stale_before, started_at).await?;
                        match claim_attempt(txn, event, max_attempts, started_at).await {
                            Ok(mut claimed) => {
                                claimed.abandoned_attempt = abandoned_attempt;
                                Ok(Ok(claimed))
                            }
                            Err(WebhookServiceError::Internal(e)) => {
                                Err(WebhookServiceError::Internal(e))
                            }
                            Err(refused) => Ok(Err(refused)),
                        }
                    })
                },
            )
            .await
            .map_err(|e| txn_error(e, "claim webhook attempt"))?
    }

    async fn complete_attempt(
        &self,
        completion: &AttemptCompletion,
        audit: Option<&NewAuditEntry>,
    ) -> Result<Event, WebhookServiceError> {
        let completion = completion.clone();
        let audit = audit.cloned();
        self.db
            .transaction::<_, Event, WebhookServiceError>(|txn| {
                Box::pin(async move {
                    let mut event = lock_event(txn, completion.event_id).await?;
                    let model = webhook_attempts::Entity::find_by_id(completion.attempt_id.0)
                        .one(txn)
                        .await
                        .context("find webhook attempt")?
                        .context("completed attempt does not exist")?;
                    let mut attempt = attempt_from_model(model)?;
                    if attempt.event_id != event.id {
                        return Err(anyhow::anyhow!(
                            "attempt {} belongs to event {}",
                            attempt.id,
                            attempt.event_id
                        )
                        .into());
                    }
                    if !attempt.is_open() {
                        return Err(WebhookServiceError::AttemptClosed);
                    }

                    event.complete(&completion.result, completion.finished_at)?;
                    attempt.finish(&completion.result, completion.finished_at);
                    update_attempt_result(txn, &attempt).await?;
                    update_event_state(txn, &event).await?;

                    if let Some(entry) = audit {
                        insert_audit_entry(txn, &entry).await?;
                    }
                    Ok(event)
                })
            })
            .await
            .map_err(|e| txn_error(e, "complete webhook attempt"))
    }

    async fn list_events(
        &self,
        filter: &EventFilter,
        page: PageRequest,
    ) -> Result<Vec<EventWithLatestAttempt>, WebhookServiceError> {
        let page = page.clamped();
        let mut query = webhook_events::Entity::find()
            .order_by_desc(webhook_events::Column::ReceivedAt)
            .order_by_desc(webhook_events::Column::Id);
        if let Some(status) = filter.status {
            query = query.filter(webhook_events::Column::Status.eq(status.as_str()));
        }
        if let Some(provider) = filter.provider {
            query = query.filter(webhook_events::Column::Provider.eq(provider.as_str()));
        }
        let models = query
            .offset(page.offset())
            .limit(u64::from(page.limit))
            .all(&self.db)
            .await
            .context("list webhook events")?;

        let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
        let attempts = webhook_attempts::Entity::find()
            .filter(webhook_attempts::Column::EventId.is_in(ids))
            .order_by_asc(webhook_attempts::Column::AttemptNumber)
            .all(&self.db)
            .await
            .context("list latest webhook attempts")?;

        // Ascending order: the last one seen per event is the latest.
        let mut latest: HashMap<Uuid, webhook_attempts::Model> = HashMap::new();
        for attempt in attempts {
            latest.insert(attempt.event_id, attempt);
        }

        let rows = models
            .into_iter()
            .map(|model| {
                let latest_attempt = latest.remove(&model.id).map(attempt_from_model).transpose()?;
                Ok(EventWithLatestAttempt {
                    event: event_from_model(model)?,
                    latest_attempt,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

async fn lock_event<C: ConnectionTrait>(conn: &C, id: EventId) -> Result<Event, WebhookServiceError> {
    let model = webhook_events::Entity::find_by_id(id.0)
        .lock_exclusive()
        .one(conn)
        .await
        .context("lock webhook event")?
        .ok_or(WebhookServiceError::EventNotFound)?;
    Ok(event_from_model(model)?)
}

/// Close the open attempt of a `PROCESSING` event when it started before
/// `stale_before`. Returns the number of the attempt released.
async fn release_stale_claim<C: ConnectionTrait>(
    conn: &C,
    event: &mut Event,
    stale_before: DateTime<Utc>,
    at: DateTime<Utc>,
) -> Result<Option<u32>, WebhookServiceError> {
    if event.status != EventStatus::Processing {
        return Ok(None);
    }
    let Some(model) = webhook_attempts::Entity::find()
        .filter(webhook_attempts::Column::EventId.eq(event.id.0))
        .filter(webhook_attempts::Column::FinishedAt.is_null())
        .order_by_desc(webhook_attempts::Column::AttemptNumber)
        .one(conn)
        .await
        .context("find open webhook attempt")?
    else {
        return Ok(None);
    };
    let mut open = attempt_from_model(model)?;
    if !event.release_stale_claim(&mut open, stale_before, at) {
        return Ok(None);
    }
    update_attempt_result(conn, &open).await?;
    update_event_state(conn, event).await?;
    Ok(Some(open.attempt_number))
}

/// Ceiling check, insert attempt `count + 1`, event to `PROCESSING`.
async fn claim_attempt<C: ConnectionTrait>(
    conn: &C,
    mut event: Event,
    max_attempts: u32,
    started_at: DateTime<Utc>,
) -> Result<ClaimedAttempt, WebhookServiceError> {
    let previous_status = event.mark_processing()?;

    let count = webhook_attempts::Entity::find()
        .filter(webhook_attempts::Column::EventId.eq(event.id.0))
        .count(conn)
        .await
        .context("count webhook attempts")?;
    if count >= u64::from(max_attempts) {
        return Err(WebhookServiceError::AttemptLimitExceeded { max: max_attempts });
    }

    let number = u32::try_from(count + 1).context("attempt number overflow")?;
    let attempt = Attempt::start(event.id, number, started_at);
    insert_attempt(conn, &attempt).await?;
    update_event_state(conn, &event).await?;

    Ok(ClaimedAttempt {
        attempt,
        event,
        previous_status,
        abandoned_attempt: None,
    })
}

async fn insert_attempt<C: ConnectionTrait>(
    conn: &C,
    attempt: &Attempt,
) -> Result<(), WebhookServiceError> {
    webhook_attempts::ActiveModel {
        id: Set(attempt.id.0),
        event_id: Set(attempt.event_id.0),
        attempt_number: Set(
            i32::try_from(attempt.attempt_number).context("attempt number out of range")?,
        ),
        started_at: Set(attempt.started_at),
        finished_at: Set(attempt.finished_at),
        ok: Set(attempt.ok),
        error: Set(attempt.error.clone()),
    }
    .insert(conn)
    .await
    .context("insert webhook attempt")?;
    Ok(())
}

async fn update_attempt_result<C: ConnectionTrait>(
    conn: &C,
    attempt: &Attempt,
) -> Result<(), WebhookServiceError> {
    webhook_attempts::ActiveModel {
        id: Set(attempt.id.0),
        ok: Set(attempt.ok),
        error: Set(attempt.error.clone()),
        finished_at: Set(attempt.finished_at),
        ..Default::default()
    }
    .update(conn)
    .await
    .context("finish webhook attempt")?;
    Ok(())
}

async fn update_event_state<C: ConnectionTrait>(
    conn: &C,
    event: &Event,
) -> Result<(), WebhookServiceError> {
    webhook_events::ActiveModel {
        id: Set(event.id.0),
        status: Set(event.status.as_str().to_owned()),
        last_error: Set(event.last_error.clone()),
        processed_at: Set(event.processed_at),
        ..Default::default()
    }
    .update(conn)
    .await
    .context("update webhook event status")?;
    Ok(())
}

fn event_from_model(model: webhook_events::Model) -> anyhow::Result<Event> {
    Ok(Event {
        id: EventId(model.id),
        provider: model.provider.parse().context("stored webhook provider")?,
        external_id: model.external_id,
        event_type: model.event_type,
        payload: model.payload,
        signature_verified: model.signature_verified,
        status: model.status.parse().context("stored webhook status")?,
        last_error: model.last_error,
        received_at: model.received_at,
        processed_at: model.processed_at,
        tenant_id: model.tenant_id,
        user_id: model.user_id,
    })
}

fn attempt_from_model(model: webhook_attempts::Model) -> anyhow::Result<Attempt> {
    Ok(Attempt {
        id: AttemptId(model.id),
        event_id: EventId(model.event_id),
        attempt_number: u32::try_from(model.attempt_number).context("stored attempt number")?,
        started_at: model.started_at,
        finished_at: model.finished_at,
        ok: model.ok,
        error: model.error,
    })
}

// ── Audit log repository ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbAuditLogRepository {
    pub db: DatabaseConnection,
}

impl AuditLogRepository for DbAuditLogRepository {
    async fn append(&self, entry: &NewAuditEntry) -> Result<AuditLogEntry, WebhookServiceError> {
        insert_audit_entry(&self.db, entry).await
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>, WebhookServiceError> {
        let mut query = audit_logs::Entity::find()
            .order_by_desc(audit_logs::Column::CreatedAt)
            .order_by_desc(audit_logs::Column::Id);
        if let Some(user_id) = filter.target_user_id {
            query = query.filter(audit_logs::Column::TargetUserId.eq(user_id));
        }
        if let Some(company_id) = filter.target_company_id {
            query = query.filter(audit_logs::Column::TargetCompanyId.eq(company_id));
        }
        let models = query
            .limit(u64::from(filter.effective_limit()))
            .all(&self.db)
            .await
            .context("query audit logs")?;
        let entries = models
            .into_iter()
            .map(audit_from_model)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

/// Shared by [`DbAuditLogRepository::append`] and attempt completion, which
/// writes the `WEBHOOK_RETRY` entry inside its own transaction.
async fn insert_audit_entry<C: ConnectionTrait>(
    conn: &C,
    entry: &NewAuditEntry,
) -> Result<AuditLogEntry, WebhookServiceError> {
    let stored = entry.clone().into_entry(AuditEntryId::generate(), Utc::now());
    audit_logs::ActiveModel {
        id: Set(stored.id.0),
        actor_user_id: Set(stored.actor_user_id),
        actor_email: Set(stored.actor_email.clone()),
        action: Set(stored.action.as_str().to_owned()),
        target_user_id: Set(stored.target_user_id),
        target_company_id: Set(stored.target_company_id),
        metadata: Set(stored.metadata.clone()),
        ip: Set(stored.ip.clone()),
        user_agent: Set(stored.user_agent.clone()),
        created_at: Set(stored.created_at),
    }
    .insert(conn)
    .await
    .context("append audit entry")?;
    Ok(stored)
}

fn audit_from_model(model: audit_logs::Model) -> anyhow::Result<AuditLogEntry> {
    Ok(AuditLogEntry {
        id: AuditEntryId(model.id),
        actor_user_id: model.actor_user_id,
        actor_email: model.actor_email,
        action: model.action.parse().context("stored audit action")?,
        target_user_id: model.target_user_id,
        target_company_id: model.target_company_id,
        metadata: model.metadata,
        ip: model.ip,
        user_agent: model.user_agent,
        created_at: model.created_at,
    })
}
