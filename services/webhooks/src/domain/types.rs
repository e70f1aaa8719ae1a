use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use hooktrail_auth_types::actor::Actor;
use hooktrail_core::client::{ClientInfo, UNKNOWN};
use hooktrail_domain::id::{AttemptId, AuditEntryId, EventId};

/// Attempt ceiling per event unless `MAX_ATTEMPTS` overrides it.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Error recorded on an attempt whose side effect outlived the processing timeout.
pub const TIMEOUT_ERROR: &str = "timeout";

/// Error recorded on an attempt that was still open when a later claim took the event over.
pub const ABANDONED_ERROR: &str = "abandoned";

/// Default and maximum page size for audit queries.
pub const AUDIT_DEFAULT_LIMIT: u32 = 50;
pub const AUDIT_MAX_LIMIT: u32 = 100;

/// A stored string or query value that names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($text) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(UnknownVariant {
                    kind: $kind,
                    value: s.to_owned(),
                })
            }
        }
    };
}

// ── Provider ──────────────────────────────────────────────────────────────────

/// Origin of an inbound callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Tax authority.
    Aeat,
    /// Payment provider.
    Stripe,
    /// Email provider.
    Resend,
}

string_enum!(Provider, "provider", {
    Aeat => "AEAT",
    Stripe => "STRIPE",
    Resend => "RESEND",
});

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Aeat, Provider::Stripe, Provider::Resend];

    /// Resolve the `{provider}` segment of `POST /webhooks/{provider}`.
    /// Only the lowercase form is routed.
    pub fn from_path(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().to_ascii_lowercase() == segment)
    }
}

// ── Event ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventStatus {
    Received,
    Processing,
    Processed,
    Failed,
}

string_enum!(EventStatus, "status", {
    Received => "RECEIVED",
    Processing => "PROCESSING",
    Processed => "PROCESSED",
    Failed => "FAILED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub from: EventStatus,
    pub to: EventStatus,
}

/// One inbound occurrence requiring processing.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub provider: Provider,
    pub external_id: Option<String>,
    pub event_type: String,
    pub payload: Value,
    pub signature_verified: bool,
    pub status: EventStatus,
    pub last_error: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl Event {
    /// RECEIVED | FAILED → PROCESSING. Returns the status the event left.
    ///
    /// PROCESSED is terminal. PROCESSING is refused as well so that two
    /// attempts of the same event never run side by side.
    pub fn mark_processing(&mut self) -> Result<EventStatus, InvalidTransition> {
        match self.status {
            EventStatus::Received | EventStatus::Failed => {
                let previous = self.status;
                self.status = EventStatus::Processing;
                Ok(previous)
            }
            from => Err(InvalidTransition {
                from,
                to: EventStatus::Processing,
            }),
        }
    }

    /// Close an open attempt left behind by a worker that never finished it,
    /// moving the event PROCESSING → FAILED. Only attempts started before
    /// `stale_before` are released; a live claim is left alone.
    pub fn release_stale_claim(
        &mut self,
        open: &mut Attempt,
        stale_before: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> bool {
        if self.status != EventStatus::Processing
            || !open.is_open()
            || open.event_id != self.id
            || open.started_at >= stale_before
        {
            return false;
        }
        let result = AttemptResult::Failed {
            error: ABANDONED_ERROR.to_owned(),
        };
        open.finish(&result, at);
        self.status = EventStatus::Failed;
        self.last_error = Some(ABANDONED_ERROR.to_owned());
        true
    }

    /// PROCESSING → PROCESSED | FAILED, following the attempt result.
    pub fn complete(
        &mut self,
        result: &AttemptResult,
        at: DateTime<Utc>,
    ) -> Result<(), InvalidTransition> {
        let to = result.resulting_status();
        if self.status != EventStatus::Processing {
            return Err(InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        match result {
            AttemptResult::Succeeded => {
                self.processed_at = Some(at);
                self.last_error = None;
            }
            AttemptResult::Failed { error } => {
                self.last_error = Some(error.clone());
            }
        }
        Ok(())
    }
}

/// Intake input; becomes an [`Event`] in `RECEIVED` once stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub provider: Provider,
    pub external_id: Option<String>,
    pub event_type: String,
    pub payload: Value,
    pub signature_verified: bool,
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl NewEvent {
    pub fn into_event(self, id: EventId, received_at: DateTime<Utc>) -> Event {
        Event {
            id,
            provider: self.provider,
            external_id: self.external_id,
            event_type: self.event_type,
            payload: self.payload,
            signature_verified: self.signature_verified,
            status: EventStatus::Received,
            last_error: None,
            received_at,
            processed_at: None,
            tenant_id: self.tenant_id,
            user_id: self.user_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub status: Option<EventStatus>,
    pub provider: Option<Provider>,
}

/// Listing row: an event plus its most recent attempt, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct EventWithLatestAttempt {
    pub event: Event,
    pub latest_attempt: Option<Attempt>,
}

// ── Attempt ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    Succeeded,
    Failed { error: String },
}

impl AttemptResult {
    pub fn from_side_effect(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::Succeeded,
            Err(error) => Self::Failed { error },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Succeeded => None,
            Self::Failed { error } => Some(error),
        }
    }

    pub fn resulting_status(&self) -> EventStatus {
        match self {
            Self::Succeeded => EventStatus::Processed,
            Self::Failed { .. } => EventStatus::Failed,
        }
    }
}

/// One execution record of processing an event. `ok` is `None` while in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub id: AttemptId,
    pub event_id: EventId,
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub ok: Option<bool>,
    pub error: Option<String>,
}

impl Attempt {
    pub fn start(event_id: EventId, attempt_number: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            id: AttemptId::generate(),
            event_id,
            attempt_number,
            started_at,
            finished_at: None,
            ok: None,
            error: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.finished_at.is_none()
    }

    pub fn finish(&mut self, result: &AttemptResult, at: DateTime<Utc>) {
        self.ok = Some(result.is_ok());
        self.error = result.error().map(str::to_owned);
        self.finished_at = Some(at);
    }
}

/// Result of the atomic "check ceiling, insert attempt, mark processing" step.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedAttempt {
    pub attempt: Attempt,
    /// The event as left by the claim, i.e. in `PROCESSING`.
    pub event: Event,
    pub previous_status: EventStatus,
    /// Number of a stale attempt this claim closed as abandoned, if any.
    pub abandoned_attempt: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptCompletion {
    pub attempt_id: AttemptId,
    pub event_id: EventId,
    pub result: AttemptResult,
    pub finished_at: DateTime<Utc>,
}

// ── Audit ─────────────────────────────────────────────────────────────────────

/// Closed set of audited administrative actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    WebhookRetry,
    EmailRetry,
    SupportSessionStart,
}

string_enum!(AuditAction, "audit action", {
    WebhookRetry => "WEBHOOK_RETRY",
    EmailRetry => "EMAIL_RETRY",
    SupportSessionStart => "SUPPORT_SESSION_START",
});

/// Audit entry before it is stored. Never fails to build: absent client
/// metadata is recorded as `"unknown"`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub actor_user_id: Option<Uuid>,
    pub actor_email: Option<String>,
    pub action: AuditAction,
    pub target_user_id: Option<Uuid>,
    pub target_company_id: Option<Uuid>,
    pub metadata: Value,
    pub ip: String,
    pub user_agent: String,
}

impl NewAuditEntry {
    pub fn new(actor: &Actor, action: AuditAction, client: &ClientInfo) -> Self {
        Self {
            actor_user_id: actor.user_id(),
            actor_email: actor.email().map(str::to_owned),
            action,
            target_user_id: None,
            target_company_id: None,
            metadata: json!({}),
            ip: or_unknown(&client.ip),
            user_agent: or_unknown(&client.user_agent),
        }
    }

    pub fn with_targets(mut self, user_id: Option<Uuid>, company_id: Option<Uuid>) -> Self {
        self.target_user_id = user_id;
        self.target_company_id = company_id;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn into_entry(self, id: AuditEntryId, created_at: DateTime<Utc>) -> AuditLogEntry {
        AuditLogEntry {
            id,
            actor_user_id: self.actor_user_id,
            actor_email: self.actor_email,
            action: self.action,
            target_user_id: self.target_user_id,
            target_company_id: self.target_company_id,
            metadata: self.metadata,
            ip: self.ip,
            user_agent: self.user_agent,
            created_at,
        }
    }
}

fn or_unknown(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        UNKNOWN.to_owned()
    } else {
        value.to_owned()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditLogEntry {
    pub id: AuditEntryId,
    pub actor_user_id: Option<Uuid>,
    pub actor_email: Option<String>,
    pub action: AuditAction,
    pub target_user_id: Option<Uuid>,
    pub target_company_id: Option<Uuid>,
    pub metadata: Value,
    pub ip: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub target_user_id: Option<Uuid>,
    pub target_company_id: Option<Uuid>,
    pub limit: Option<u32>,
}

impl AuditFilter {
    /// Page size clamped to 1–100, default 50.
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(AUDIT_DEFAULT_LIMIT)
            .clamp(1, AUDIT_MAX_LIMIT)
    }
}

/// Who asked for an attempt. Turned into a `WEBHOOK_RETRY` entry once the
/// outcome is known, so the entry can be written with the completion.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditDraft {
    pub actor: Actor,
    pub client: ClientInfo,
}

impl AuditDraft {
    pub fn webhook_retry(
        &self,
        claimed: &ClaimedAttempt,
        result: &AttemptResult,
    ) -> NewAuditEntry {
        let event = &claimed.event;
        NewAuditEntry::new(&self.actor, AuditAction::WebhookRetry, &self.client)
            .with_targets(event.user_id, event.tenant_id)
            .with_metadata(json!({
                "eventId": event.id.to_string(),
                "provider": event.provider.as_str(),
                "eventType": event.event_type,
                "externalId": event.external_id,
                "attemptNumber": claimed.attempt.attempt_number,
                "ok": result.is_ok(),
                "error": result.error(),
                "previousStatus": claimed.previous_status.as_str(),
                "resultingStatus": result.resulting_status().as_str(),
            }))
    }
}

// ── Rate limiting ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    /// Set on denials only; at least 1.
    pub retry_after_secs: Option<u64>,
}
