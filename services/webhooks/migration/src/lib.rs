use sea_orm_migration::prelude::*;

mod m20260401_000001_create_webhook_events;
mod m20260401_000002_create_webhook_attempts;
mod m20260401_000003_create_audit_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260401_000001_create_webhook_events::Migration),
            Box::new(m20260401_000002_create_webhook_attempts::Migration),
            Box::new(m20260401_000003_create_audit_logs::Migration),
        ]
    }
}
