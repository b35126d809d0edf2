//! Queue admission, ordering, claim and removal against the in-memory store.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use assert_matches::assert_matches;
use common::Harness;
use rftm_core::error::CoreError;
use rftm_core::queue::{QueueStatus, DEFAULT_PRIORITY, MAX_PRIORITY};

#[tokio::test]
async fn lower_priority_number_is_dequeued_first() {
    let h = Harness::new();
    let cases = h.seed_cases(2).await;
    let (a, b) = (&cases[0], &cases[1]);
    let queue = h.orchestrator.queue();

    queue.enqueue(b.id, Some(5), None, &h.caller).await.unwrap();
    queue.enqueue(a.id, Some(1), None, &h.caller).await.unwrap();

    assert_eq!(queue.dequeue_next().await.unwrap().unwrap().case_id, a.id);
    assert_eq!(queue.dequeue_next().await.unwrap().unwrap().case_id, b.id);
    assert!(queue.dequeue_next().await.unwrap().is_none());
}

#[tokio::test]
async fn equal_priority_is_fifo() {
    let h = Harness::new();
    let cases = h.seed_cases(3).await;
    let queue = h.orchestrator.queue();

    for case in &cases {
        queue.enqueue(case.id, None, None, &h.caller).await.unwrap();
    }

    let mut order = Vec::new();
    while let Some(item) = queue.dequeue_next().await.unwrap() {
        assert_eq!(item.priority, DEFAULT_PRIORITY);
        order.push(item.case_id);
    }
    assert_eq!(order, cases.iter().map(|c| c.id).collect::<Vec<_>>());
}

#[tokio::test]
async fn claimed_item_is_marked_removed() {
    let h = Harness::new();
    let cases = h.seed_cases(1).await;
    let queue = h.orchestrator.queue();
    queue.enqueue(cases[0].id, None, None, &h.caller).await.unwrap();

    let item = queue.dequeue_next().await.unwrap().unwrap();
    assert_eq!(item.status, QueueStatus::Removed);
    assert!(item.removed_at.is_some());
    assert!(queue.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_dequeues_deliver_each_item_once() {
    const N: usize = 25;
    let h = Harness::new();
    let cases = h.seed_cases(N).await;
    for case in &cases {
        h.orchestrator
            .queue()
            .enqueue(case.id, Some((case.id % 7) as i32), None, &h.caller)
            .await
            .unwrap();
    }

    let claims = futures::future::join_all((0..N).map(|_| {
        let orchestrator = h.orchestrator.clone();
        tokio::spawn(async move { orchestrator.queue().dequeue_next().await.unwrap() })
    }))
    .await;

    let claimed: Vec<_> = claims.into_iter().map(|r| r.unwrap()).collect();
    assert!(claimed.iter().all(Option::is_some), "no caller came back empty");
    let ids: HashSet<i64> = claimed.into_iter().flatten().map(|item| item.id).collect();
    assert_eq!(ids.len(), N);
    assert!(h.orchestrator.queue().dequeue_next().await.unwrap().is_none());
}

#[tokio::test]
async fn second_direct_enqueue_of_a_case_conflicts() {
    let h = Harness::new();
    let cases = h.seed_cases(1).await;
    let queue = h.orchestrator.queue();

    queue.enqueue(cases[0].id, None, None, &h.caller).await.unwrap();
    assert_matches!(
        queue.enqueue(cases[0].id, Some(1), None, &h.caller).await,
        Err(CoreError::Conflict(_))
    );

    // Once the pending item is gone the case can be queued again.
    assert!(queue.remove(cases[0].id).await.unwrap());
    queue.enqueue(cases[0].id, Some(1), None, &h.caller).await.unwrap();
}

#[tokio::test]
async fn enqueue_validates_case_and_priority() {
    let h = Harness::new();
    let cases = h.seed_cases(1).await;
    let queue = h.orchestrator.queue();

    assert_matches!(
        queue.enqueue(9_999, None, None, &h.caller).await,
        Err(CoreError::NotFound { entity: "TestCase", id: 9_999 })
    );
    assert_matches!(
        queue.enqueue(cases[0].id, Some(MAX_PRIORITY + 1), None, &h.caller).await,
        Err(CoreError::Validation(_))
    );
    assert_matches!(
        queue.enqueue(cases[0].id, Some(-1), None, &h.caller).await,
        Err(CoreError::Validation(_))
    );
    assert!(queue.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn remove_without_pending_item_returns_false() {
    let h = Harness::new();
    let cases = h.seed_cases(1).await;
    let queue = h.orchestrator.queue();

    assert!(!queue.remove(cases[0].id).await.unwrap());
    assert!(!queue.remove(12_345).await.unwrap());
}

#[tokio::test]
async fn list_pending_is_ordered_and_read_only() {
    let h = Harness::new();
    let cases = h.seed_cases(3).await;
    let queue = h.orchestrator.queue();
    queue.enqueue(cases[0].id, Some(50), None, &h.caller).await.unwrap();
    queue.enqueue(cases[1].id, Some(0), None, &h.caller).await.unwrap();
    queue.enqueue(cases[2].id, Some(50), None, &h.caller).await.unwrap();

    let first: Vec<_> = queue.list_pending().await.unwrap().iter().map(|i| i.case_id).collect();
    let second: Vec<_> = queue.list_pending().await.unwrap().iter().map(|i| i.case_id).collect();
    assert_eq!(first, vec![cases[1].id, cases[0].id, cases[2].id]);
    assert_eq!(first, second);
}

#[tokio::test]
async fn purge_drops_only_old_removed_items() {
    let h = Harness::new();
    let cases = h.seed_cases(2).await;
    let queue = h.orchestrator.queue();
    queue.enqueue(cases[0].id, Some(1), None, &h.caller).await.unwrap();
    queue.enqueue(cases[1].id, Some(2), None, &h.caller).await.unwrap();
    queue.dequeue_next().await.unwrap();

    assert_eq!(queue.purge_removed(chrono::Duration::hours(1)).await.unwrap(), 0);

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(queue.purge_removed(chrono::Duration::zero()).await.unwrap(), 1);
    assert_eq!(queue.list_pending().await.unwrap().len(), 1);
}
