use std::sync::Arc;

use serde_json::{Map, Value};
use uuid::Uuid;

use hooktrail_domain::id::EventId;

use crate::config::ProviderSettings;
use crate::domain::repository::{EventProcessor, EventRepository};
use crate::domain::types::{Event, NewEvent, Provider};
use crate::error::WebhookServiceError;
use crate::infra::signature::verify_signature;
use crate::usecase::executor::AttemptExecutor;

const EVENT_TYPE_FIELDS: [&str; 3] = ["type", "event_type", "eventType"];
const EXTERNAL_ID_FIELDS: [&str; 3] = ["id", "event_id", "eventId"];

/// Transport signature as sent by the provider, if any.
#[derive(Debug, Clone, Default)]
pub struct SignatureHeaders {
    pub signature: Option<String>,
    pub timestamp: Option<String>,
}

pub struct IngestWebhookInput {
    /// `{provider}` path segment, not yet validated.
    pub provider: String,
    pub body: bytes::Bytes,
    pub signature: SignatureHeaders,
}

/// Validate and store an inbound callback. Processing happens afterwards,
/// see [`process_received`].
pub struct IngestWebhookUseCase<E>
where
    E: EventRepository,
{
    pub events: E,
    pub secrets: Arc<ProviderSettings>,
}

impl<E> IngestWebhookUseCase<E>
where
    E: EventRepository,
{
    pub async fn execute(&self, input: IngestWebhookInput) -> Result<Event, WebhookServiceError> {
        // 1. Known provider → 400 otherwise
        let provider =
            Provider::from_path(&input.provider).ok_or(WebhookServiceError::UnknownProvider)?;

        // 2. Signature, when the provider has a secret → 401 otherwise
        let signature_verified = match self.secrets.get(provider) {
            None => false,
            Some(secret) => {
                let (Some(signature), Some(timestamp)) =
                    (&input.signature.signature, &input.signature.timestamp)
                else {
                    return Err(WebhookServiceError::InvalidSignature);
                };
                if !verify_signature(secret, timestamp, &input.body, signature) {
                    return Err(WebhookServiceError::InvalidSignature);
                }
                true
            }
        };

        // 3. Payload shape → 400 otherwise
        let new_event = parse_payload(provider, &input.body, signature_verified)?;

        // 4. Persist in RECEIVED
        let event = self.events.create_event(new_event).await?;
        tracing::info!(
            event_id = %event.id,
            provider = %event.provider,
            event_type = %event.event_type,
            signature_verified,
            "webhook received"
        );
        Ok(event)
    }
}

/// Interpret a raw provider body. Only shape is checked; no provider rules.
pub fn parse_payload(
    provider: Provider,
    body: &[u8],
    signature_verified: bool,
) -> Result<NewEvent, WebhookServiceError> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| WebhookServiceError::InvalidPayload(format!("body is not JSON: {e}")))?;
    let Some(object) = payload.as_object() else {
        return Err(WebhookServiceError::InvalidPayload(
            "body must be a JSON object".to_owned(),
        ));
    };

    let event_type = first_string(object, &EVENT_TYPE_FIELDS)
        .filter(|t| !t.trim().is_empty())
        .ok_or(WebhookServiceError::MissingEventType)?
        .to_owned();
    let external_id = first_string(object, &EXTERNAL_ID_FIELDS).map(str::to_owned);
    let tenant_id = association(object, "tenantId");
    let user_id = association(object, "userId");

    Ok(NewEvent {
        provider,
        external_id,
        event_type,
        payload,
        signature_verified,
        tenant_id,
        user_id,
    })
}

fn first_string<'a>(object: &'a Map<String, Value>, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .find_map(|field| object.get(*field).and_then(Value::as_str))
}

/// UUID at the top level or under `metadata`; anything else is ignored.
fn association(object: &Map<String, Value>, field: &str) -> Option<Uuid> {
    let top = object.get(field);
    let nested = object
        .get("metadata")
        .and_then(Value::as_object)
        .and_then(|m| m.get(field));
    [top, nested]
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find_map(|s| s.parse().ok())
}

/// Initial processing of a freshly stored event: system actor, no rate
/// limit, no audit. Meant to be spawned once the intake has answered.
pub async fn process_received<E, P>(executor: AttemptExecutor<E>, processor: P, event_id: EventId)
where
    E: EventRepository,
    P: EventProcessor,
{
    let executed = executor
        .execute(event_id, None, |event| async move {
            processor.process(&event).await
        })
        .await;
    if let Err(e) = executed {
        tracing::error!(event_id = %event_id, error = %e, "initial webhook processing did not run");
    }
}
