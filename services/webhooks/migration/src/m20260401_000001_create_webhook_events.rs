use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WebhookEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WebhookEvents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WebhookEvents::Provider).string().not_null())
                    .col(ColumnDef::new(WebhookEvents::ExternalId).string())
                    .col(ColumnDef::new(WebhookEvents::EventType).string().not_null())
                    .col(
                        ColumnDef::new(WebhookEvents::Payload)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WebhookEvents::SignatureVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(WebhookEvents::Status)
                            .string()
                            .not_null()
                            .default("RECEIVED"),
                    )
                    .col(ColumnDef::new(WebhookEvents::LastError).text())
                    .col(
                        ColumnDef::new(WebhookEvents::ReceivedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WebhookEvents::ProcessedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(WebhookEvents::TenantId).uuid())
                    .col(ColumnDef::new(WebhookEvents::UserId).uuid())
                    .to_owned(),
            )
            .await?;

        // Admin listing: filter by status / provider, newest first.
        manager
            .create_index(
                Index::create()
                    .table(WebhookEvents::Table)
                    .col(WebhookEvents::Status)
                    .col(WebhookEvents::ReceivedAt)
                    .name("idx_webhook_events_status_received_at")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(WebhookEvents::Table)
                    .col(WebhookEvents::Provider)
                    .col(WebhookEvents::ExternalId)
                    .name("idx_webhook_events_provider_external_id")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WebhookEvents::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub(crate) enum WebhookEvents {
    Table,
    Id,
    Provider,
    ExternalId,
    EventType,
    Payload,
    SignatureVerified,
    Status,
    LastError,
    ReceivedAt,
    ProcessedAt,
    TenantId,
    UserId,
}
