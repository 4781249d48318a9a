//! End-to-end tests for the window aggregation job.
//!
//! Jobs run through the shared `JobRunner` on top of an in-memory store
//! wrapped in `FaultyStore` for failure injection.

use std::time::{Duration, Instant};

use integration_tests::{
    fixtures::{self, count, days_ago, hours_ago},
    setup::TestContext,
};
use serde_json::json;
use stats_core::{
    EventType, CLICKS_COLLECTION, FIELD_LAST_AGGREGATED_AT, FIELD_TOTAL_COUNT_A,
    FIELD_TOTAL_COUNT_B, FIELD_WINDOW_COUNT_A, FIELD_WINDOW_COUNT_B, STATS_COLLECTION,
};
use worker::{JobConfig, JobKind, RunStatus};

/// Clicks older than seven days are ignored; the boundary is inclusive.
#[tokio::test]
async fn test_window_excludes_clicks_older_than_seven_days() {
    let ctx = TestContext::new();
    ctx.memory.insert(
        CLICKS_COLLECTION,
        fixtures::click("s1", EventType::ContactChannelA, days_ago(8)),
    );
    ctx.memory.insert(
        CLICKS_COLLECTION,
        fixtures::click("s1", EventType::ContactChannelB, days_ago(6)),
    );
    ctx.memory.insert(
        CLICKS_COLLECTION,
        fixtures::click("s1", EventType::ContactChannelA, hours_ago(1)),
    );
    ctx.memory.insert(
        CLICKS_COLLECTION,
        fixtures::click("s2", EventType::ContactChannelB, days_ago(7)),
    );

    let result = ctx.runner.run_aggregate().await.unwrap();
    assert_eq!(result.events_scanned, 3);
    assert_eq!(result.entities_updated, 2);

    let s1 = fixtures::stats_doc(&ctx.memory, "s1").unwrap();
    assert_eq!(count(&s1, FIELD_WINDOW_COUNT_A), 1);
    assert_eq!(count(&s1, FIELD_WINDOW_COUNT_B), 1);

    let s2 = fixtures::stats_doc(&ctx.memory, "s2").unwrap();
    assert_eq!(count(&s2, FIELD_WINDOW_COUNT_B), 1);
}

#[tokio::test]
async fn test_invalid_clicks_are_skipped() {
    let ctx = TestContext::new();
    ctx.memory.insert(
        CLICKS_COLLECTION,
        fixtures::raw_click("", "CONTACT_CHANNEL_A", hours_ago(2)),
    );
    ctx.memory.insert(
        CLICKS_COLLECTION,
        fixtures::raw_click("s1", "UNKNOWN", hours_ago(2)),
    );
    ctx.memory.insert(
        CLICKS_COLLECTION,
        fixtures::raw_click("s1", "CONTACT_CHANNEL_B", hours_ago(2)),
    );

    let result = ctx.runner.run_aggregate().await.unwrap();
    assert_eq!(result.events_scanned, 3);
    assert_eq!(result.events_skipped, 2);
    assert_eq!(result.entities_updated, 1);
    assert!(result.entities_failed.is_empty());

    let s1 = fixtures::stats_doc(&ctx.memory, "s1").unwrap();
    assert_eq!(count(&s1, FIELD_WINDOW_COUNT_A), 0);
    assert_eq!(count(&s1, FIELD_WINDOW_COUNT_B), 1);
    assert_eq!(ctx.memory.len(STATS_COLLECTION), 1);
}

#[tokio::test]
async fn test_totals_never_decrease_across_runs() {
    let ctx = TestContext::new();
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelA, days_ago(1), 3);
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelB, days_ago(2), 2);

    let mut last = (0, 0);
    for _ in 0..3 {
        ctx.runner.run_aggregate().await.unwrap();
        let doc = fixtures::stats_doc(&ctx.memory, "s1").unwrap();
        let totals = (
            count(&doc, FIELD_TOTAL_COUNT_A),
            count(&doc, FIELD_TOTAL_COUNT_B),
        );
        assert!(totals.0 >= last.0 && totals.1 >= last.1);
        last = totals;
    }

    // Every run re-counts the same window
    assert_eq!(last, (9, 6));
}

#[tokio::test]
async fn test_unrelated_stats_fields_are_preserved() {
    let ctx = TestContext::new();
    let mut existing = document_store::Fields::new();
    existing.insert("displayName".into(), json!("Acme Tiles"));
    existing.insert(FIELD_TOTAL_COUNT_A.into(), json!(40));
    ctx.memory.insert_with_key(STATS_COLLECTION, "s1", existing);
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelA, hours_ago(5), 2);

    ctx.runner.run_aggregate().await.unwrap();

    let doc = fixtures::stats_doc(&ctx.memory, "s1").unwrap();
    assert_eq!(doc["displayName"], json!("Acme Tiles"));
    assert_eq!(count(&doc, FIELD_TOTAL_COUNT_A), 42);
    assert_eq!(count(&doc, FIELD_TOTAL_COUNT_B), 0);
    assert_eq!(
        doc[FIELD_LAST_AGGREGATED_AT],
        json!(fixtures::now().to_rfc3339())
    );
}

#[tokio::test]
async fn test_empty_window_writes_nothing() {
    let ctx = TestContext::new();
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelA, days_ago(30), 4);

    let result = ctx.runner.run_aggregate().await.unwrap();
    assert_eq!(result.entities_updated, 0);
    assert_eq!(result.events_scanned, 0);
    assert!(ctx.memory.is_empty(STATS_COLLECTION));
}

#[tokio::test]
async fn test_aggregation_never_deletes_clicks() {
    let ctx = TestContext::new();
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelA, hours_ago(3), 5);
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelB, days_ago(400), 5);

    ctx.runner.run_aggregate().await.unwrap();
    assert_eq!(ctx.memory.len(CLICKS_COLLECTION), 10);
}

/// One supplier's failed write is reported, the rest still land.
#[tokio::test]
async fn test_partial_write_failure_continues() {
    let ctx = TestContext::new();
    for supplier in ["s1", "s2", "s3"] {
        fixtures::seed_clicks(&ctx.memory, supplier, EventType::ContactChannelA, hours_ago(1), 1);
    }
    ctx.store.fail_merges_for("s2");

    let result = ctx.runner.run_aggregate().await.unwrap();
    assert_eq!(result.entities_updated, 2);
    assert_eq!(result.entities_failed, vec!["s2".to_string()]);
    assert!(fixtures::stats_doc(&ctx.memory, "s1").is_some());
    assert!(fixtures::stats_doc(&ctx.memory, "s2").is_none());
    assert!(fixtures::stats_doc(&ctx.memory, "s3").is_some());

    let run = ctx.runner.last_run(JobKind::Aggregate).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.record_count, 2);
}

#[tokio::test]
async fn test_window_fetch_failure_is_fatal() {
    let ctx = TestContext::new();
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelA, hours_ago(1), 1);
    ctx.store.set_fail_queries(true);

    let err = ctx.runner.run_aggregate().await.unwrap_err();
    assert_eq!(err.error_code(), Some("STORE_001"));
    assert!(ctx.memory.is_empty(STATS_COLLECTION));

    let run = ctx.runner.last_run(JobKind::Aggregate).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.unwrap().contains("STORE_001"));

    // The next run picks the window up again
    ctx.store.clear_faults();
    let result = ctx.runner.run_aggregate().await.unwrap();
    assert_eq!(result.entities_updated, 1);
}

#[tokio::test]
async fn test_run_exceeding_budget_times_out() {
    let ctx = TestContext::with_config(JobConfig {
        job_timeout: Duration::from_millis(50),
        ..Default::default()
    });
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelA, hours_ago(1), 1);
    ctx.store.set_query_delay(Duration::from_millis(500));

    let err = ctx.runner.run_aggregate().await.unwrap_err();
    assert_eq!(err.error_code(), Some("JOB_002"));
    assert!(ctx.memory.is_empty(STATS_COLLECTION));
}

/// Overlapping triggers of the same job run one after the other.
#[tokio::test]
async fn test_concurrent_runs_are_serialized() {
    let ctx = TestContext::new();
    fixtures::seed_clicks(&ctx.memory, "s1", EventType::ContactChannelB, hours_ago(1), 2);
    let delay = Duration::from_millis(100);
    ctx.store.set_query_delay(delay);

    let started = Instant::now();
    let (first, second) = tokio::join!(ctx.runner.run_aggregate(), ctx.runner.run_aggregate());
    assert!(started.elapsed() >= delay * 2);

    assert_eq!(first.unwrap().entities_updated, 1);
    assert_eq!(second.unwrap().entities_updated, 1);

    let doc = fixtures::stats_doc(&ctx.memory, "s1").unwrap();
    assert_eq!(count(&doc, FIELD_WINDOW_COUNT_B), 2);
    assert_eq!(count(&doc, FIELD_TOTAL_COUNT_B), 4);
}
