//! Integration tests for the queue, run history and run log tables.
//!
//! These run against a real PostgreSQL database and are ignored by default.
//! Run with `DATABASE_URL=... cargo test -p rftm-db -- --ignored`.

use assert_matches::assert_matches;
use rftm_core::pagination::PageRequest;
use rftm_core::queue::QueueStatus;
use rftm_core::run_status::{RunStatus, RunType};
use rftm_db::models::queue_item::NewQueueItem;
use rftm_db::models::run_history::{NewRun, RunHistoryFilter, RunTransition};
use rftm_db::models::run_log::NewRunLog;
use rftm_db::models::test_case::{CreateTestCase, TestCase, TestCaseFilter};
use rftm_db::models::test_script::CreateTestScript;
use rftm_db::repositories::{QueueItemRepo, RunHistoryRepo, TestCaseRepo, TestScriptRepo};
use rftm_db::store::UQ_QUEUE_PENDING;
use rftm_db::{PgStore, Store, StoreError};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_case(pool: &PgPool, name: &str) -> TestCase {
    let script = TestScriptRepo::create(
        pool,
        &CreateTestScript {
            name: format!("{name} suite"),
            description: None,
            content: Some("*** Test Cases ***".into()),
            metadata: None,
        },
        "system",
    )
    .await
    .unwrap();
    TestCaseRepo::create(
        pool,
        &CreateTestCase {
            test_script_id: script.id,
            name: name.to_string(),
            description: None,
            variables: None,
        },
    )
    .await
    .unwrap()
}

fn queue_item(case_id: i64, priority: i32) -> NewQueueItem {
    NewQueueItem {
        case_id,
        run_id: None,
        priority,
        enqueued_by: "system".into(),
    }
}

fn new_run(case_id: i64) -> NewRun {
    NewRun {
        case_id,
        run_type: RunType::Queued,
        executor: "system".into(),
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn claim_follows_priority_then_fifo(pool: PgPool) {
    let a = seed_case(&pool, "A").await;
    let b = seed_case(&pool, "B").await;
    let c = seed_case(&pool, "C").await;

    QueueItemRepo::insert(&pool, &queue_item(a.id, 5)).await.unwrap();
    QueueItemRepo::insert(&pool, &queue_item(b.id, 1)).await.unwrap();
    QueueItemRepo::insert(&pool, &queue_item(c.id, 5)).await.unwrap();

    let order: Vec<i64> = [
        QueueItemRepo::claim_next(&pool).await.unwrap().unwrap(),
        QueueItemRepo::claim_next(&pool).await.unwrap().unwrap(),
        QueueItemRepo::claim_next(&pool).await.unwrap().unwrap(),
    ]
    .iter()
    .map(|item| item.case_id)
    .collect();
    assert_eq!(order, vec![b.id, a.id, c.id]);
    assert!(QueueItemRepo::claim_next(&pool).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn concurrent_claims_are_disjoint(pool: PgPool) {
    for i in 0..10 {
        let case = seed_case(&pool, &format!("case {i}")).await;
        QueueItemRepo::insert(&pool, &queue_item(case.id, 10)).await.unwrap();
    }

    let claims = futures::future::join_all((0..10).map(|_| {
        let pool = pool.clone();
        async move { QueueItemRepo::claim_next(&pool).await.unwrap() }
    }))
    .await;

    let mut ids: Vec<i64> = claims.into_iter().flatten().map(|item| item.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 10);
    assert!(QueueItemRepo::list_pending(&pool).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn duplicate_pending_item_is_rejected(pool: PgPool) {
    let case = seed_case(&pool, "dup").await;
    let store = PgStore::new(pool.clone());

    store.insert_queue_item(&queue_item(case.id, 10)).await.unwrap();
    let err = store
        .insert_queue_item(&queue_item(case.id, 3))
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::UniqueViolation(c) if c == UQ_QUEUE_PENDING);

    // Once removed, the pair may be enqueued again.
    assert_eq!(store.remove_pending_queue_items(case.id).await.unwrap(), 1);
    let again = store.insert_queue_item(&queue_item(case.id, 3)).await.unwrap();
    assert_eq!(again.status, QueueStatus::Pending);
}

// ---------------------------------------------------------------------------
// Run history
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn transition_sets_timestamps_and_links_log(pool: PgPool) {
    let case = seed_case(&pool, "run").await;
    let store = PgStore::new(pool.clone());
    let run = store.insert_run(&new_run(case.id)).await.unwrap();
    assert_eq!(run.status, RunStatus::Pending);
    assert!(run.ended_at.is_none());

    let running = store
        .transition_run(&RunTransition::new(run.id, RunStatus::Pending, RunStatus::Running))
        .await
        .unwrap()
        .unwrap();
    assert!(running.running_at.is_some());

    let failed = store
        .transition_run(
            &RunTransition::new(run.id, RunStatus::Running, RunStatus::Failed)
                .with_failure_reason("boom")
                .with_log(Some(NewRunLog::new("runs/x/output.log").with_size(4))),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failed.failure_reason.as_deref(), Some("boom"));
    assert!(failed.ended_at.is_some());

    let log = store.get_run_log(run.id).await.unwrap().unwrap();
    assert_eq!(log.size_bytes, Some(4));

    // Terminal rows never move again.
    let replay = store
        .transition_run(&RunTransition::new(run.id, RunStatus::Running, RunStatus::Completed))
        .await
        .unwrap();
    assert!(replay.is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn run_list_filters_and_pages(pool: PgPool) {
    let case = seed_case(&pool, "pages").await;
    for _ in 0..5 {
        RunHistoryRepo::create(&pool, &new_run(case.id)).await.unwrap();
    }

    let filter = RunHistoryFilter {
        case_id: Some(case.id),
        status: Some(RunStatus::Pending),
    };
    let (first, total) = RunHistoryRepo::list(&pool, &filter, PageRequest { page: 1, page_size: 2 })
        .await
        .unwrap();
    let (third, _) = RunHistoryRepo::list(&pool, &filter, PageRequest { page: 3, page_size: 2 })
        .await
        .unwrap();
    assert_eq!(total, 5);
    assert_eq!(first.len(), 2);
    assert_eq!(third.len(), 1);
    assert!(first[0].id > first[1].id);
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn store_is_healthy_once_migrations_are_applied(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    assert_matches!(store.health_check().await, Err(StoreError::Unavailable(_)));

    store.migrate_until_ready().await;

    assert!(store.schema_ready());
    store.health_check().await.unwrap();
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn case_with_runs_cannot_be_deleted(pool: PgPool) {
    let case = seed_case(&pool, "kept").await;
    let store = PgStore::new(pool.clone());
    store.insert_run(&new_run(case.id)).await.unwrap();

    assert!(store.case_has_runs(case.id).await.unwrap());
    assert_matches!(
        store.delete_case(case.id).await,
        Err(StoreError::ForeignKeyViolation(_))
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires a PostgreSQL DATABASE_URL"]
async fn case_name_filter_is_case_insensitive(pool: PgPool) {
    let login = seed_case(&pool, "Valid Login").await;
    seed_case(&pool, "Logout").await;

    let filter = TestCaseFilter {
        test_script_id: None,
        name: Some("valid LOG".into()),
    };
    let (rows, total) = TestCaseRepo::list(&pool, &filter, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].id, login.id);
}
