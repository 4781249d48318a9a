//! End-to-end tests for the retention purge job.

use std::time::Duration;

use integration_tests::{
    fixtures::{self, days_ago},
    setup::TestContext,
};
use stats_core::{EventType, CLICKS_COLLECTION, STATS_COLLECTION};
use worker::{JobConfig, JobKind, RunStatus};

#[tokio::test]
async fn test_backlog_is_purged_in_bounded_batches() {
    let ctx = TestContext::new();
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelA, days_ago(400), 1200);
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelB, days_ago(10), 5);

    let result = ctx.runner.run_purge(None).await.unwrap();
    assert_eq!(result.deleted, 1200);
    assert_eq!(result.batches, 3);
    assert_eq!(result.cutoff, days_ago(360));

    // Three full fetches plus the empty one that ends the loop
    assert_eq!(ctx.memory.query_calls(), 4);
    assert_eq!(ctx.memory.len(CLICKS_COLLECTION), 5);

    let run = ctx.runner.last_run(JobKind::Purge).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.record_count, 1200);
}

#[tokio::test]
async fn test_second_purge_deletes_nothing() {
    let ctx = TestContext::new();
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelA, days_ago(361), 42);

    assert_eq!(ctx.runner.run_purge(None).await.unwrap().deleted, 42);

    let again = ctx.runner.run_purge(None).await.unwrap();
    assert_eq!(again.deleted, 0);
    assert_eq!(again.batches, 0);
}

#[tokio::test]
async fn test_purge_on_empty_store_succeeds() {
    let ctx = TestContext::new();

    let result = ctx.runner.run_purge(None).await.unwrap();
    assert_eq!(result.deleted, 0);
}

/// A click exactly at the cutoff is kept.
#[tokio::test]
async fn test_cutoff_is_exclusive() {
    let ctx = TestContext::new();
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelA, days_ago(360), 1);
    fixtures::seed_clicks(
        &ctx.memory,
        "s1",
        EventType::ContactChannelA,
        days_ago(360) - chrono::Duration::seconds(1),
        1,
    );

    let result = ctx.runner.run_purge(None).await.unwrap();
    assert_eq!(result.deleted, 1);
    assert_eq!(ctx.memory.len(CLICKS_COLLECTION), 1);
}

#[tokio::test]
async fn test_failed_batch_reports_partial_count() {
    let ctx = TestContext::new();
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelA, days_ago(500), 1200);
    ctx.store.fail_batch_writes_after(2);

    let err = ctx.runner.run_purge(None).await.unwrap_err();
    assert_eq!(err.error_code(), Some("JOB_001"));
    assert_eq!(err.partial_deleted(), Some(1000));
    assert_eq!(ctx.memory.len(CLICKS_COLLECTION), 200);

    // The next run resumes where the last one stopped
    ctx.store.clear_faults();
    let result = ctx.runner.run_purge(None).await.unwrap();
    assert_eq!(result.deleted, 200);
    assert!(ctx.memory.is_empty(CLICKS_COLLECTION));
}

#[tokio::test]
async fn test_fetch_failure_is_fatal() {
    let ctx = TestContext::new();
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelA, days_ago(500), 10);
    ctx.store.set_fail_queries(true);

    let err = ctx.runner.run_purge(None).await.unwrap_err();
    assert_eq!(err.error_code(), Some("STORE_001"));
    assert_eq!(ctx.memory.len(CLICKS_COLLECTION), 10);

    let run = ctx.runner.last_run(JobKind::Purge).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_retention_override() {
    let ctx = TestContext::new();
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelA, days_ago(45), 3);
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelA, days_ago(10), 2);

    let result = ctx.runner.run_purge(Some(30)).await.unwrap();
    assert_eq!(result.deleted, 3);
    assert_eq!(result.cutoff, days_ago(30));
    assert_eq!(ctx.memory.len(CLICKS_COLLECTION), 2);
}

#[tokio::test]
async fn test_zero_retention_is_rejected() {
    let ctx = TestContext::new();
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelA, days_ago(1), 3);

    let err = ctx.runner.run_purge(Some(0)).await.unwrap_err();
    assert_eq!(err.http_status(), 400);
    assert_eq!(ctx.memory.len(CLICKS_COLLECTION), 3);
}

#[tokio::test]
async fn test_unrepresentable_retention_is_rejected() {
    let ctx = TestContext::new();
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelA, days_ago(500), 3);

    let err = ctx.runner.run_purge(Some(u32::MAX)).await.unwrap_err();
    assert_eq!(err.http_status(), 400);
    assert_eq!(ctx.memory.len(CLICKS_COLLECTION), 3);
}

/// Batches committed before the budget runs out are reported on the timeout.
#[tokio::test(start_paused = true)]
async fn test_timeout_reports_partial_count() {
    let ctx = TestContext::with_config(JobConfig {
        job_timeout: Duration::from_millis(250),
        ..Default::default()
    });
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelA, days_ago(500), 1200);
    ctx.store.set_query_delay(Duration::from_millis(100));

    // Two fetch/delete cycles fit in the budget, the third fetch does not
    let err = ctx.runner.run_purge(None).await.unwrap_err();
    assert_eq!(err.error_code(), Some("JOB_002"));
    assert_eq!(err.partial_deleted(), Some(1000));
    assert_eq!(ctx.memory.len(CLICKS_COLLECTION), 200);

    let run = ctx.runner.last_run(JobKind::Purge).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.unwrap().contains("after deleting 1000 records"));
}

/// Purging raw clicks leaves the cumulative stats intact.
#[tokio::test]
async fn test_purge_keeps_stats_documents() {
    let ctx = TestContext::new();
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelA, days_ago(2), 4);
    ctx.runner.run_aggregate().await.unwrap();

    // Age everything past the horizon
    ctx.memory.set_clock(fixtures::now() + chrono::Duration::days(400));
    let result = ctx.runner.run_purge(None).await.unwrap();
    assert_eq!(result.deleted, 4);

    let doc = fixtures::stats_doc(&ctx.memory, "s1").unwrap();
    assert_eq!(fixtures::count(&doc, stats_core::FIELD_TOTAL_COUNT_A), 4);
    assert_eq!(ctx.memory.len(STATS_COLLECTION), 1);
}
