//! sea-orm entities owned by the webhooks service.

pub mod audit_logs;
pub mod webhook_attempts;
pub mod webhook_events;
