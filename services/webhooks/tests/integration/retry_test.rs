use std::sync::Arc;

use hooktrail_auth_types::actor::Actor;
use hooktrail_domain::id::EventId;
use hooktrail_webhooks::domain::repository::RateLimiter;
use hooktrail_webhooks::domain::types::{ABANDONED_ERROR, AuditAction, EventStatus, Provider};
use hooktrail_webhooks::error::WebhookServiceError;
use hooktrail_webhooks::usecase::intake::process_received;
use hooktrail_webhooks::usecase::retry::{RetryOutcome, RetryRejection};

use crate::helpers::{
    MockProcessor, MockStore, admin, executor, limiter, retry_request, retry_usecase,
};

/// An event whose initial processing failed with a timeout.
async fn failed_event(store: &MockStore) -> EventId {
    let event = store.seed_event(Provider::Aeat);
    process_received(
        executor(store),
        MockProcessor::failing_with("timeout"),
        event.id,
    )
    .await;
    event.id
}

#[tokio::test]
async fn should_fail_initial_processing_without_audit() {
    let store = MockStore::new();

    let id = failed_event(&store).await;

    let event = store.event(id);
    assert_eq!(event.status, EventStatus::Failed);
    assert_eq!(event.last_error.as_deref(), Some("timeout"));
    let attempts = store.attempts(id);
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].ok, Some(false));
    assert!(store.audit_entries().is_empty());
}

#[tokio::test]
async fn should_process_failed_event_on_admin_retry() {
    let store = MockStore::new();
    let id = failed_event(&store).await;
    let usecase = retry_usecase(&store, MockProcessor::succeeding(), limiter(), 30);

    let report = usecase.execute(retry_request(id, admin())).await.unwrap();

    assert_eq!(report.outcome, RetryOutcome::Succeeded { attempt_number: 2 });
    assert!(report.rate_limit.allowed);
    assert_eq!(report.rate_limit.remaining, 29);
    let event = store.event(id);
    assert_eq!(event.status, EventStatus::Processed);
    assert_eq!(event.last_error, None);
    assert!(event.processed_at.is_some());
    assert_eq!(store.attempts(id).len(), 2);
}

#[tokio::test]
async fn should_reject_retry_of_processed_event() {
    let store = MockStore::new();
    let id = failed_event(&store).await;
    let usecase = retry_usecase(&store, MockProcessor::succeeding(), limiter(), 30);
    usecase.execute(retry_request(id, admin())).await.unwrap();

    let report = usecase.execute(retry_request(id, admin())).await.unwrap();

    let RetryOutcome::Rejected(rejection) = report.outcome else {
        panic!("expected rejection, got {:?}", report.outcome);
    };
    assert_eq!(
        rejection,
        RetryRejection::InvalidTransition {
            status: EventStatus::Processed
        }
    );
    assert_eq!(rejection.message(), "Event already processed");
    assert_eq!(rejection.status(), 409);
    assert_eq!(store.attempts(id).len(), 2);
    assert_eq!(usecase.processor.calls(), 1);
}

#[tokio::test]
async fn should_reject_sixth_attempt_with_max_retries_message() {
    let store = MockStore::new();
    let id = failed_event(&store).await;
    let usecase = retry_usecase(&store, MockProcessor::always_failing("boom"), limiter(), 30);
    for expected in 2..=5 {
        let report = usecase.execute(retry_request(id, admin())).await.unwrap();
        assert_eq!(
            report.outcome,
            RetryOutcome::Failed {
                attempt_number: expected,
                error: "boom".to_owned()
            }
        );
    }

    let report = usecase.execute(retry_request(id, admin())).await.unwrap();

    let RetryOutcome::Rejected(rejection) = report.outcome else {
        panic!("expected rejection, got {:?}", report.outcome);
    };
    assert_eq!(rejection, RetryRejection::AttemptLimitExceeded { max: 5 });
    assert_eq!(rejection.message(), "Max retries reached (5)");
    assert_eq!(rejection.status(), 400);
    assert_eq!(store.attempts(id).len(), 5);
    assert_eq!(usecase.processor.calls(), 4);
}

#[tokio::test]
async fn should_report_not_found_for_unknown_event() {
    let store = MockStore::new();
    let usecase = retry_usecase(&store, MockProcessor::succeeding(), limiter(), 30);
    let missing = EventId::generate();

    let report = usecase
        .execute(retry_request(missing, admin()))
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        RetryOutcome::Rejected(RetryRejection::NotFound)
    );
    assert!(store.attempts(missing).is_empty());
    assert!(store.audit_entries().is_empty());
}

#[tokio::test]
async fn should_audit_human_retry_with_attempt_metadata() {
    let store = MockStore::new();
    let id = failed_event(&store).await;
    let usecase = retry_usecase(&store, MockProcessor::succeeding(), limiter(), 30);
    let actor = admin();
    let event = store.event(id);

    usecase
        .execute(retry_request(id, actor.clone()))
        .await
        .unwrap();

    let entries = store.audit_entries();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.action, AuditAction::WebhookRetry);
    assert_eq!(entry.actor_user_id, actor.user_id());
    assert_eq!(entry.actor_email.as_deref(), Some("ops@example.com"));
    assert_eq!(entry.target_company_id, event.tenant_id);
    assert_eq!(entry.ip, "198.51.100.7");
    assert_eq!(entry.user_agent, "integration-test");
    assert_eq!(entry.metadata["eventId"], id.to_string());
    assert_eq!(entry.metadata["attemptNumber"], 2);
    assert_eq!(entry.metadata["ok"], true);
    assert_eq!(entry.metadata["previousStatus"], "FAILED");
    assert_eq!(entry.metadata["resultingStatus"], "PROCESSED");
}

#[tokio::test]
async fn should_audit_failed_retry_too() {
    let store = MockStore::new();
    let id = failed_event(&store).await;
    let usecase = retry_usecase(&store, MockProcessor::failing_with("502"), limiter(), 30);

    usecase.execute(retry_request(id, admin())).await.unwrap();

    let entries = store.audit_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].metadata["ok"], false);
    assert_eq!(entries[0].metadata["error"], "502");
}

#[tokio::test]
async fn should_not_audit_system_actor_retry() {
    let store = MockStore::new();
    let id = failed_event(&store).await;
    let usecase = retry_usecase(&store, MockProcessor::succeeding(), limiter(), 30);

    let report = usecase
        .execute(retry_request(id, Actor::System))
        .await
        .unwrap();

    assert_eq!(report.outcome, RetryOutcome::Succeeded { attempt_number: 2 });
    assert!(store.audit_entries().is_empty());
}

#[tokio::test]
async fn should_reject_rate_limited_retry_before_claiming() {
    let store = MockStore::new();
    let id = failed_event(&store).await;
    let limiter = limiter();
    let usecase = retry_usecase(&store, MockProcessor::succeeding(), limiter.clone(), 1);
    // Spend the only slot of this client.
    limiter
        .check(
            &usecase.policy.key("198.51.100.7"),
            1,
            usecase.policy.window,
        )
        .await;

    let report = usecase.execute(retry_request(id, admin())).await.unwrap();

    let RetryOutcome::Rejected(RetryRejection::RateLimited { retry_after_secs }) = report.outcome
    else {
        panic!("expected rate limit, got {:?}", report.outcome);
    };
    assert!(retry_after_secs >= 1);
    assert!(!report.rate_limit.allowed);
    assert_eq!(store.attempts(id).len(), 1);
    assert_eq!(usecase.processor.calls(), 0);
    assert!(store.audit_entries().is_empty());
}

#[tokio::test]
async fn should_propagate_storage_failure() {
    let store = MockStore::unavailable();
    let usecase = retry_usecase(&store, MockProcessor::succeeding(), limiter(), 30);

    let result = usecase
        .execute(retry_request(EventId::generate(), admin()))
        .await;

    assert!(matches!(result, Err(WebhookServiceError::Internal(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn should_keep_attempt_numbers_contiguous_under_concurrent_retries() {
    let store = MockStore::new();
    let id = failed_event(&store).await;
    let usecase = Arc::new(retry_usecase(
        &store,
        MockProcessor::always_failing("busy"),
        limiter(),
        100,
    ));

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let usecase = Arc::clone(&usecase);
            tokio::spawn(async move { usecase.execute(retry_request(id, admin())).await })
        })
        .collect();
    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert!(matches!(
            report.outcome,
            RetryOutcome::Failed { .. } | RetryOutcome::Rejected(_)
        ));
    }

    let numbers: Vec<u32> = store
        .attempts(id)
        .iter()
        .map(|a| a.attempt_number)
        .collect();
    assert!(numbers.len() <= 5);
    let expected: Vec<u32> = (1..=numbers.len() as u32).collect();
    assert_eq!(numbers, expected);
    assert!(store.attempts(id).iter().all(|a| a.ok == Some(false)));
    assert_eq!(store.event(id).status, EventStatus::Failed);
}

#[tokio::test]
async fn should_conflict_on_retry_while_claim_is_live_then_take_it_over() {
    let store = MockStore::new();
    let event = store.seed_event(Provider::Stripe);
    store.fail_next_completion();
    process_received(executor(&store), MockProcessor::succeeding(), event.id).await;
    let usecase = retry_usecase(&store, MockProcessor::succeeding(), limiter(), 30);

    let live = usecase
        .execute(retry_request(event.id, admin()))
        .await
        .unwrap();
    store.age_open_attempts(event.id, chrono::Duration::hours(1));
    let report = usecase
        .execute(retry_request(event.id, admin()))
        .await
        .unwrap();

    assert_eq!(
        live.outcome,
        RetryOutcome::Rejected(RetryRejection::InvalidTransition {
            status: EventStatus::Processing
        })
    );
    assert_eq!(report.outcome, RetryOutcome::Succeeded { attempt_number: 2 });
    let attempts = store.attempts(event.id);
    assert_eq!(attempts[0].ok, Some(false));
    assert_eq!(attempts[0].error.as_deref(), Some(ABANDONED_ERROR));
    assert_eq!(store.event(event.id).status, EventStatus::Processed);
    let entries = store.audit_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].metadata["previousStatus"], "FAILED");
}

#[tokio::test]
async fn should_release_abandoned_claim_even_at_ceiling() {
    let store = MockStore::new();
    let id = failed_event(&store).await;
    let usecase = retry_usecase(&store, MockProcessor::always_failing("boom"), limiter(), 30);
    for _ in 2..=4 {
        usecase.execute(retry_request(id, admin())).await.unwrap();
    }
    store.fail_next_completion();
    assert!(usecase.execute(retry_request(id, admin())).await.is_err());
    store.age_open_attempts(id, chrono::Duration::hours(1));

    let report = usecase.execute(retry_request(id, admin())).await.unwrap();

    assert_eq!(
        report.outcome,
        RetryOutcome::Rejected(RetryRejection::AttemptLimitExceeded { max: 5 })
    );
    let event = store.event(id);
    assert_eq!(event.status, EventStatus::Failed);
    assert_eq!(event.last_error.as_deref(), Some(ABANDONED_ERROR));
    let attempts = store.attempts(id);
    assert_eq!(attempts.len(), 5);
    assert!(attempts.iter().all(|a| !a.is_open()));
}
