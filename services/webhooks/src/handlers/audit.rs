use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hooktrail_auth_types::identity::AdminIdentity;
use hooktrail_core::client::ClientInfo;
use hooktrail_core::serde::to_rfc3339_ms;
use hooktrail_domain::id::AuditEntryId;

use crate::domain::types::{AuditFilter, AuditLogEntry};
use crate::error::WebhookServiceError;
use crate::handlers::rate_limit_headers;
use crate::state::AppState;
use crate::usecase::audit::QueryAuditLogUseCase;

// ── GET /admin/audit-logs ─────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuditLogQuery {
    pub target_user_id: Option<Uuid>,
    pub target_company_id: Option<Uuid>,
    pub limit: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntryResponse {
    pub id: AuditEntryId,
    pub actor_user_id: Option<Uuid>,
    pub actor_email: Option<String>,
    pub action: &'static str,
    pub target_user_id: Option<Uuid>,
    pub target_company_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub ip: String,
    pub user_agent: String,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
}

impl From<AuditLogEntry> for AuditLogEntryResponse {
    fn from(entry: AuditLogEntry) -> Self {
        Self {
            id: entry.id,
            actor_user_id: entry.actor_user_id,
            actor_email: entry.actor_email,
            action: entry.action.as_str(),
            target_user_id: entry.target_user_id,
            target_company_id: entry.target_company_id,
            metadata: entry.metadata,
            ip: entry.ip,
            user_agent: entry.user_agent,
            created_at: entry.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct AuditLogListResponse {
    pub entries: Vec<AuditLogEntryResponse>,
    pub limit: u32,
}

pub async fn query_audit_logs(
    State(state): State<AppState>,
    AdminIdentity(_actor): AdminIdentity,
    client: ClientInfo,
    Query(query): Query<AuditLogQuery>,
) -> Result<impl IntoResponse, WebhookServiceError> {
    let usecase = QueryAuditLogUseCase {
        audit: state.audit_repo(),
        limiter: state.limiter.clone(),
        policy: state.search_policy,
    };
    let filter = AuditFilter {
        target_user_id: query.target_user_id,
        target_company_id: query.target_company_id,
        limit: query.limit,
    };
    let page = usecase.execute(filter, &client).await?;

    let body = AuditLogListResponse {
        entries: page.entries.into_iter().map(Into::into).collect(),
        limit: page.limit,
    };
    Ok((rate_limit_headers(&page.rate_limit), Json(body)))
}
