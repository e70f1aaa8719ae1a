use sea_orm::entity::prelude::*;

/// One inbound provider callback. Rows are never deleted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "webhook_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// `AEAT`, `STRIPE` or `RESEND`.
    pub provider: String,
    pub external_id: Option<String>,
    pub event_type: String,
    /// Provider payload, stored verbatim.
    pub payload: Json,
    pub signature_verified: bool,
    /// `RECEIVED`, `PROCESSING`, `PROCESSED` or `FAILED`.
    pub status: String,
    pub last_error: Option<String>,
    pub received_at: chrono::DateTime<chrono::Utc>,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::webhook_attempts::Entity")]
    Attempts,
}

impl Related<super::webhook_attempts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attempts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
