use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuditLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuditLogs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuditLogs::ActorUserId).uuid())
                    .col(ColumnDef::new(AuditLogs::ActorEmail).string())
                    .col(ColumnDef::new(AuditLogs::Action).string().not_null())
                    .col(ColumnDef::new(AuditLogs::TargetUserId).uuid())
                    .col(ColumnDef::new(AuditLogs::TargetCompanyId).uuid())
                    .col(ColumnDef::new(AuditLogs::Metadata).json_binary().not_null())
                    .col(
                        ColumnDef::new(AuditLogs::Ip)
                            .string()
                            .not_null()
                            .default("unknown"),
                    )
                    .col(
                        ColumnDef::new(AuditLogs::UserAgent)
                            .string()
                            .not_null()
                            .default("unknown"),
                    )
                    .col(
                        ColumnDef::new(AuditLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(AuditLogs::Table)
                    .col(AuditLogs::TargetUserId)
                    .col(AuditLogs::CreatedAt)
                    .name("idx_audit_logs_target_user_id_created_at")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(AuditLogs::Table)
                    .col(AuditLogs::TargetCompanyId)
                    .col(AuditLogs::CreatedAt)
                    .name("idx_audit_logs_target_company_id_created_at")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum AuditLogs {
    Table,
    Id,
    ActorUserId,
    ActorEmail,
    Action,
    TargetUserId,
    TargetCompanyId,
    Metadata,
    Ip,
    UserAgent,
    CreatedAt,
}
