use sea_orm_migration::prelude::*;

use crate::m20260401_000001_create_webhook_events::WebhookEvents;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WebhookAttempts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WebhookAttempts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WebhookAttempts::EventId).uuid().not_null())
                    .col(
                        ColumnDef::new(WebhookAttempts::AttemptNumber)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WebhookAttempts::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WebhookAttempts::FinishedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(WebhookAttempts::Ok).boolean())
                    .col(ColumnDef::new(WebhookAttempts::Error).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_webhook_attempts_event_id")
                            .from(WebhookAttempts::Table, WebhookAttempts::EventId)
                            .to(WebhookEvents::Table, WebhookEvents::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Last line of defence against two concurrent retries claiming the same number.
        manager
            .create_index(
                Index::create()
                    .table(WebhookAttempts::Table)
                    .col(WebhookAttempts::EventId)
                    .col(WebhookAttempts::AttemptNumber)
                    .unique()
                    .name("uq_webhook_attempts_event_id_attempt_number")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WebhookAttempts::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum WebhookAttempts {
    Table,
    Id,
    EventId,
    AttemptNumber,
    StartedAt,
    FinishedAt,
    Ok,
    Error,
}
