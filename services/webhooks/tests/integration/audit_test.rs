use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use hooktrail_webhooks::domain::repository::AuditLogRepository;
use hooktrail_webhooks::domain::types::{AuditAction, AuditFilter, NewAuditEntry};
use hooktrail_webhooks::error::WebhookServiceError;
use hooktrail_webhooks::infra::rate_limit::RateLimiterBackend;
use hooktrail_webhooks::usecase::audit::QueryAuditLogUseCase;
use hooktrail_webhooks::usecase::rate_limit::RateLimitPolicy;

use crate::helpers::{MockAuditRepo, MockStore, admin, client, limiter};

fn entry(company: Option<Uuid>, n: u32) -> NewAuditEntry {
    NewAuditEntry::new(&admin(), AuditAction::WebhookRetry, &client("10.0.0.1"))
        .with_targets(None, company)
        .with_metadata(json!({ "n": n }))
}

fn query_usecase(
    store: &MockStore,
    limit: u32,
) -> QueryAuditLogUseCase<MockAuditRepo, RateLimiterBackend> {
    QueryAuditLogUseCase {
        audit: store.audit_repo(),
        limiter: limiter(),
        policy: RateLimitPolicy::search(limit, Duration::from_secs(60)),
    }
}

#[tokio::test]
async fn should_return_entries_newest_first() {
    let store = MockStore::new();
    let repo = store.audit_repo();
    for n in 0..3 {
        repo.append(&entry(None, n)).await.unwrap();
    }

    let page = query_usecase(&store, 60)
        .execute(AuditFilter::default(), &client("10.0.0.1"))
        .await
        .unwrap();

    let order: Vec<_> = page.entries.iter().map(|e| e.metadata["n"].clone()).collect();
    assert_eq!(order, vec![json!(2), json!(1), json!(0)]);
    assert_eq!(page.limit, 50);
    assert!(page.rate_limit.allowed);
}

#[tokio::test]
async fn should_filter_by_target_company_and_cap_limit() {
    let store = MockStore::new();
    let repo = store.audit_repo();
    let company = Uuid::new_v4();
    for n in 0..4 {
        repo.append(&entry(Some(company), n)).await.unwrap();
    }
    repo.append(&entry(Some(Uuid::new_v4()), 99)).await.unwrap();

    let page = query_usecase(&store, 60)
        .execute(
            AuditFilter {
                target_company_id: Some(company),
                limit: Some(2),
                ..AuditFilter::default()
            },
            &client("10.0.0.1"),
        )
        .await
        .unwrap();

    assert_eq!(page.entries.len(), 2);
    assert!(
        page.entries
            .iter()
            .all(|e| e.target_company_id == Some(company))
    );
}

#[tokio::test]
async fn should_leave_entries_untouched_by_queries() {
    let store = MockStore::new();
    let repo = store.audit_repo();
    let stored = repo.append(&entry(None, 1)).await.unwrap();

    for _ in 0..3 {
        repo.query(&AuditFilter::default()).await.unwrap();
    }

    assert_eq!(store.audit_entries(), vec![stored]);
}

#[tokio::test]
async fn should_rate_limit_audit_search() {
    let store = MockStore::new();
    let usecase = query_usecase(&store, 1);
    usecase
        .execute(AuditFilter::default(), &client("10.0.0.2"))
        .await
        .unwrap();

    let result = usecase
        .execute(AuditFilter::default(), &client("10.0.0.2"))
        .await;

    assert!(matches!(
        result,
        Err(WebhookServiceError::RateLimited { retry_after_secs }) if retry_after_secs >= 1
    ));
}
