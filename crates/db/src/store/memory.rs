//! In-process [`Store`] with the same invariants as the PostgreSQL schema.
//!
//! Every method takes the single table lock once and performs its whole
//! read-check-write inside that critical section, which gives the claim and
//! compare-and-set operations the same atomicity the SQL statements have.
//! No lock is held across an `.await` other than the lock acquisition.
//!
//! Used by the test suites and by local development without PostgreSQL.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rftm_core::pagination::PageRequest;
use rftm_core::queue::{dequeue_order, QueueStatus};
use rftm_core::run_status::RunStatus;
use rftm_core::types::{DbId, Timestamp};
use tokio::sync::Mutex;

use super::{Store, StoreError, StoreResult, UQ_QUEUE_PENDING};
use crate::models::queue_item::{NewQueueItem, QueueItem};
use crate::models::run_history::{NewRun, RunHistory, RunHistoryFilter, RunTransition};
use crate::models::run_log::RunLog;
use crate::models::test_case::{CreateTestCase, TestCase, TestCaseFilter, UpdateTestCase};
use crate::models::test_script::{CreateTestScript, TestScript, UpdateTestScript};

#[derive(Default)]
struct Tables {
    next_id: DbId,
    scripts: BTreeMap<DbId, TestScript>,
    cases: BTreeMap<DbId, TestCase>,
    queue: BTreeMap<DbId, QueueItem>,
    runs: BTreeMap<DbId, RunHistory>,
    /// Keyed by run id; one log per run.
    logs: BTreeMap<DbId, RunLog>,
}

impl Tables {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn case_has_runs(&self, case_id: DbId) -> bool {
        self.runs.values().any(|r| r.case_id == case_id)
    }

    fn drop_queue_items_for_cases(&mut self, case_ids: &[DbId]) {
        self.queue.retain(|_, item| !case_ids.contains(&item.case_id));
    }
}

/// [`Store`] kept entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the database going away (`false`) or coming back (`true`).
    ///
    /// While unavailable every call fails with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store marked unavailable".into()))
        } else {
            Ok(())
        }
    }
}

/// Slice one page out of an already ordered list.
fn paginate<T: Clone>(rows: &[T], page: PageRequest) -> (Vec<T>, i64) {
    let total = rows.len() as i64;
    let start = page.offset().min(total) as usize;
    let end = page.offset().saturating_add(page.limit()).min(total) as usize;
    (rows[start..end].to_vec(), total)
}

/// Newest first, ties broken by id descending.
fn newest_first(a: (Timestamp, DbId), b: (Timestamp, DbId)) -> std::cmp::Ordering {
    b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1))
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_script(
        &self,
        input: &CreateTestScript,
        created_by: &str,
    ) -> StoreResult<TestScript> {
        self.ensure_available()?;
        let mut t = self.tables.lock().await;
        let now = Utc::now();
        let script = TestScript {
            id: t.next_id(),
            name: input.name.clone(),
            description: input.description.clone(),
            content: input.content.clone().unwrap_or_default(),
            metadata: input
                .metadata
                .clone()
                .unwrap_or_else(|| serde_json::json!({})),
            created_by: Some(created_by.to_string()),
            created_at: now,
            updated_at: now,
        };
        t.scripts.insert(script.id, script.clone());
        Ok(script)
    }

    async fn get_script(&self, id: DbId) -> StoreResult<Option<TestScript>> {
        self.ensure_available()?;
        Ok(self.tables.lock().await.scripts.get(&id).cloned())
    }

    async fn list_scripts(&self, page: PageRequest) -> StoreResult<(Vec<TestScript>, i64)> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        let mut rows: Vec<TestScript> = t.scripts.values().cloned().collect();
        rows.sort_by(|a, b| newest_first((a.created_at, a.id), (b.created_at, b.id)));
        Ok(paginate(&rows, page))
    }

    async fn update_script(
        &self,
        id: DbId,
        input: &UpdateTestScript,
    ) -> StoreResult<Option<TestScript>> {
        self.ensure_available()?;
        let mut t = self.tables.lock().await;
        let Some(script) = t.scripts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &input.name {
            script.name = name.clone();
        }
        if let Some(description) = &input.description {
            script.description = Some(description.clone());
        }
        if let Some(content) = &input.content {
            script.content = content.clone();
        }
        if let Some(metadata) = &input.metadata {
            script.metadata = metadata.clone();
        }
        script.updated_at = Utc::now();
        Ok(Some(script.clone()))
    }

    async fn delete_script(&self, id: DbId) -> StoreResult<bool> {
        self.ensure_available()?;
        let mut t = self.tables.lock().await;
        if !t.scripts.contains_key(&id) {
            return Ok(false);
        }
        let case_ids: Vec<DbId> = t
            .cases
            .values()
            .filter(|c| c.test_script_id == id)
            .map(|c| c.id)
            .collect();
        if case_ids.iter().any(|case_id| t.case_has_runs(*case_id)) {
            return Err(StoreError::ForeignKeyViolation(
                "fk_run_history_test_case".into(),
            ));
        }
        t.drop_queue_items_for_cases(&case_ids);
        t.cases.retain(|_, c| c.test_script_id != id);
        t.scripts.remove(&id);
        Ok(true)
    }

    async fn script_has_runs(&self, id: DbId) -> StoreResult<bool> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        Ok(t
            .cases
            .values()
            .filter(|c| c.test_script_id == id)
            .any(|c| t.case_has_runs(c.id)))
    }

    async fn create_case(&self, input: &CreateTestCase) -> StoreResult<TestCase> {
        self.ensure_available()?;
        let mut t = self.tables.lock().await;
        if !t.scripts.contains_key(&input.test_script_id) {
            return Err(StoreError::ForeignKeyViolation(
                "fk_test_cases_test_script".into(),
            ));
        }
        let now = Utc::now();
        let case = TestCase {
            id: t.next_id(),
            test_script_id: input.test_script_id,
            name: input.name.clone(),
            description: input.description.clone(),
            variables: input
                .variables
                .clone()
                .unwrap_or_else(|| serde_json::json!({})),
            created_at: now,
            updated_at: now,
        };
        t.cases.insert(case.id, case.clone());
        Ok(case)
    }

    async fn get_case(&self, id: DbId) -> StoreResult<Option<TestCase>> {
        self.ensure_available()?;
        Ok(self.tables.lock().await.cases.get(&id).cloned())
    }

    async fn existing_case_ids(&self, ids: &[DbId]) -> StoreResult<Vec<DbId>> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        let mut found: Vec<DbId> = ids
            .iter()
            .copied()
            .filter(|id| t.cases.contains_key(id))
            .collect();
        found.sort_unstable();
        found.dedup();
        Ok(found)
    }

    async fn list_cases(
        &self,
        filter: &TestCaseFilter,
        page: PageRequest,
    ) -> StoreResult<(Vec<TestCase>, i64)> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        let needle = filter.name.as_ref().map(|n| n.to_lowercase());
        let mut rows: Vec<TestCase> = t
            .cases
            .values()
            .filter(|c| filter.test_script_id.map_or(true, |s| c.test_script_id == s))
            .filter(|c| {
                needle
                    .as_ref()
                    .map_or(true, |n| c.name.to_lowercase().contains(n.as_str()))
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| newest_first((a.created_at, a.id), (b.created_at, b.id)));
        Ok(paginate(&rows, page))
    }

    async fn update_case(
        &self,
        id: DbId,
        input: &UpdateTestCase,
    ) -> StoreResult<Option<TestCase>> {
        self.ensure_available()?;
        let mut t = self.tables.lock().await;
        if let Some(script_id) = input.test_script_id {
            if !t.scripts.contains_key(&script_id) {
                return Err(StoreError::ForeignKeyViolation(
                    "fk_test_cases_test_script".into(),
                ));
            }
        }
        let Some(case) = t.cases.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(script_id) = input.test_script_id {
            case.test_script_id = script_id;
        }
        if let Some(name) = &input.name {
            case.name = name.clone();
        }
        if let Some(description) = &input.description {
            case.description = Some(description.clone());
        }
        if let Some(variables) = &input.variables {
            case.variables = variables.clone();
        }
        case.updated_at = Utc::now();
        Ok(Some(case.clone()))
    }

    async fn delete_case(&self, id: DbId) -> StoreResult<bool> {
        self.ensure_available()?;
        let mut t = self.tables.lock().await;
        if !t.cases.contains_key(&id) {
            return Ok(false);
        }
        if t.case_has_runs(id) {
            return Err(StoreError::ForeignKeyViolation(
                "fk_run_history_test_case".into(),
            ));
        }
        t.drop_queue_items_for_cases(&[id]);
        t.cases.remove(&id);
        Ok(true)
    }

    async fn case_has_runs(&self, id: DbId) -> StoreResult<bool> {
        self.ensure_available()?;
        Ok(self.tables.lock().await.case_has_runs(id))
    }

    async fn insert_queue_item(&self, input: &NewQueueItem) -> StoreResult<QueueItem> {
        self.ensure_available()?;
        let mut t = self.tables.lock().await;
        if !t.cases.contains_key(&input.case_id) {
            return Err(StoreError::ForeignKeyViolation(
                "fk_queue_items_test_case".into(),
            ));
        }
        if let Some(run_id) = input.run_id {
            if !t.runs.contains_key(&run_id) {
                return Err(StoreError::ForeignKeyViolation("fk_queue_items_run".into()));
            }
        }
        let duplicate = t.queue.values().any(|item| {
            item.status == QueueStatus::Pending
                && item.case_id == input.case_id
                && item.run_id == input.run_id
        });
        if duplicate {
            return Err(StoreError::UniqueViolation(UQ_QUEUE_PENDING.into()));
        }
        let item = QueueItem {
            id: t.next_id(),
            case_id: input.case_id,
            run_id: input.run_id,
            priority: input.priority,
            status: QueueStatus::Pending,
            enqueued_by: input.enqueued_by.clone(),
            enqueued_at: Utc::now(),
            removed_at: None,
        };
        t.queue.insert(item.id, item.clone());
        Ok(item)
    }

    async fn claim_next_queue_item(&self) -> StoreResult<Option<QueueItem>> {
        self.ensure_available()?;
        let mut t = self.tables.lock().await;
        let next_id = t
            .queue
            .values()
            .filter(|item| item.status == QueueStatus::Pending)
            .min_by(|a, b| {
                dequeue_order(
                    (a.priority, a.enqueued_at, a.id),
                    (b.priority, b.enqueued_at, b.id),
                )
            })
            .map(|item| item.id);

        let Some(id) = next_id else {
            return Ok(None);
        };
        let Some(item) = t.queue.get_mut(&id) else {
            return Ok(None);
        };
        item.status = QueueStatus::Removed;
        item.removed_at = Some(Utc::now());
        Ok(Some(item.clone()))
    }

    async fn remove_pending_queue_items(&self, case_id: DbId) -> StoreResult<u64> {
        self.ensure_available()?;
        let mut t = self.tables.lock().await;
        let now = Utc::now();
        let mut removed = 0;
        for item in t.queue.values_mut() {
            if item.case_id == case_id && item.status == QueueStatus::Pending {
                item.status = QueueStatus::Removed;
                item.removed_at = Some(now);
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn list_pending_queue_items(&self) -> StoreResult<Vec<QueueItem>> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        let mut rows: Vec<QueueItem> = t
            .queue
            .values()
            .filter(|item| item.status == QueueStatus::Pending)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            dequeue_order(
                (a.priority, a.enqueued_at, a.id),
                (b.priority, b.enqueued_at, b.id),
            )
        });
        Ok(rows)
    }

    async fn purge_removed_queue_items(&self, cutoff: Timestamp) -> StoreResult<u64> {
        self.ensure_available()?;
        let mut t = self.tables.lock().await;
        let before = t.queue.len();
        t.queue.retain(|_, item| {
            !(item.status == QueueStatus::Removed
                && item.removed_at.is_some_and(|at| at < cutoff))
        });
        Ok((before - t.queue.len()) as u64)
    }

    async fn insert_run(&self, input: &NewRun) -> StoreResult<RunHistory> {
        self.ensure_available()?;
        let mut t = self.tables.lock().await;
        if !t.cases.contains_key(&input.case_id) {
            return Err(StoreError::ForeignKeyViolation(
                "fk_run_history_test_case".into(),
            ));
        }
        let now = Utc::now();
        let run = RunHistory {
            id: t.next_id(),
            case_id: input.case_id,
            run_type: input.run_type,
            status: RunStatus::Pending,
            executor: input.executor.clone(),
            started_at: now,
            running_at: None,
            ended_at: None,
            failure_reason: None,
            created_at: now,
        };
        t.runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn get_run(&self, id: DbId) -> StoreResult<Option<RunHistory>> {
        self.ensure_available()?;
        Ok(self.tables.lock().await.runs.get(&id).cloned())
    }

    async fn list_runs(
        &self,
        filter: &RunHistoryFilter,
        page: PageRequest,
    ) -> StoreResult<(Vec<RunHistory>, i64)> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        let mut rows: Vec<RunHistory> = t
            .runs
            .values()
            .filter(|r| filter.case_id.map_or(true, |c| r.case_id == c))
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| newest_first((a.started_at, a.id), (b.started_at, b.id)));
        Ok(paginate(&rows, page))
    }

    async fn transition_run(&self, transition: &RunTransition) -> StoreResult<Option<RunHistory>> {
        self.ensure_available()?;
        let mut t = self.tables.lock().await;

        if transition.log.is_some() && t.logs.contains_key(&transition.run_id) {
            return Err(StoreError::UniqueViolation("uq_run_logs_run_id".into()));
        }
        let in_expected_state = t
            .runs
            .get(&transition.run_id)
            .is_some_and(|run| run.status == transition.from);
        if !in_expected_state {
            return Ok(None);
        }

        let log_id = transition.log.as_ref().map(|_| t.next_id());
        let now = Utc::now();
        let Some(run) = t.runs.get_mut(&transition.run_id) else {
            return Ok(None);
        };
        run.status = transition.to;
        if transition.to == RunStatus::Running {
            run.running_at = Some(now);
        }
        if transition.to.is_terminal() {
            run.ended_at = Some(now);
        }
        if let Some(reason) = &transition.failure_reason {
            run.failure_reason = Some(reason.clone());
        }
        let updated = run.clone();

        if let (Some(log), Some(id)) = (&transition.log, log_id) {
            t.logs.insert(
                transition.run_id,
                RunLog {
                    id,
                    run_id: transition.run_id,
                    storage_key: log.storage_key.clone(),
                    content_type: log.content_type.clone(),
                    size_bytes: log.size_bytes,
                    created_at: now,
                },
            );
        }

        Ok(Some(updated))
    }

    async fn list_stale_running_runs(&self, cutoff: Timestamp) -> StoreResult<Vec<RunHistory>> {
        self.ensure_available()?;
        let t = self.tables.lock().await;
        let mut rows: Vec<RunHistory> = t
            .runs
            .values()
            .filter(|r| r.status == RunStatus::Running)
            .filter(|r| r.running_at.is_some_and(|at| at < cutoff))
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.running_at, r.id));
        Ok(rows)
    }

    async fn get_run_log(&self, run_id: DbId) -> StoreResult<Option<RunLog>> {
        self.ensure_available()?;
        Ok(self.tables.lock().await.logs.get(&run_id).cloned())
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.ensure_available()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use rftm_core::run_status::RunType;

    use super::*;
    use crate::models::run_log::NewRunLog;

    async fn seed_case(store: &MemoryStore) -> TestCase {
        let script = store
            .create_script(
                &CreateTestScript {
                    name: "Suite".into(),
                    description: None,
                    content: None,
                    metadata: None,
                },
                "system",
            )
            .await
            .unwrap();
        store
            .create_case(&CreateTestCase {
                test_script_id: script.id,
                name: "Case".into(),
                description: None,
                variables: None,
            })
            .await
            .unwrap()
    }

    fn new_run(case_id: DbId) -> NewRun {
        NewRun {
            case_id,
            run_type: RunType::Immediate,
            executor: "system".into(),
        }
    }

    #[tokio::test]
    async fn defaults_are_filled_on_create() {
        let store = MemoryStore::new();
        let case = seed_case(&store).await;
        assert_eq!(case.variables, serde_json::json!({}));
        let script = store.get_script(case.test_script_id).await.unwrap().unwrap();
        assert_eq!(script.content, "");
        assert_eq!(script.created_by.as_deref(), Some("system"));
    }

    #[tokio::test]
    async fn case_requires_existing_script() {
        let store = MemoryStore::new();
        let err = store
            .create_case(&CreateTestCase {
                test_script_id: 999,
                name: "orphan".into(),
                description: None,
                variables: None,
            })
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::ForeignKeyViolation(_));
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let store = MemoryStore::new();
        let case = seed_case(&store).await;
        let run = store.insert_run(&new_run(case.id)).await.unwrap();

        let stale = RunTransition::new(run.id, RunStatus::Running, RunStatus::Completed);
        assert!(store.transition_run(&stale).await.unwrap().is_none());

        let ok = RunTransition::new(run.id, RunStatus::Pending, RunStatus::Running);
        let running = store.transition_run(&ok).await.unwrap().unwrap();
        assert_eq!(running.status, RunStatus::Running);
        assert!(running.running_at.is_some());
        assert!(running.ended_at.is_none());

        // Replaying the same transition loses the race.
        assert!(store.transition_run(&ok).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn terminal_transition_links_log() {
        let store = MemoryStore::new();
        let case = seed_case(&store).await;
        let run = store.insert_run(&new_run(case.id)).await.unwrap();
        store
            .transition_run(&RunTransition::new(run.id, RunStatus::Pending, RunStatus::Running))
            .await
            .unwrap();

        let done = store
            .transition_run(
                &RunTransition::new(run.id, RunStatus::Running, RunStatus::Completed)
                    .with_log(Some(NewRunLog::new("runs/1/output.log").with_size(12))),
            )
            .await
            .unwrap()
            .unwrap();
        assert!(done.ended_at.is_some());

        let log = store.get_run_log(run.id).await.unwrap().unwrap();
        assert_eq!(log.storage_key, "runs/1/output.log");
        assert_eq!(log.size_bytes, Some(12));
    }

    #[tokio::test]
    async fn delete_case_with_runs_is_refused() {
        let store = MemoryStore::new();
        let case = seed_case(&store).await;
        store.insert_run(&new_run(case.id)).await.unwrap();

        assert_matches!(
            store.delete_case(case.id).await,
            Err(StoreError::ForeignKeyViolation(_))
        );
        assert_matches!(
            store.delete_script(case.test_script_id).await,
            Err(StoreError::ForeignKeyViolation(_))
        );
        assert!(store.get_case(case.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_script_cascades_to_cases_and_queue() {
        let store = MemoryStore::new();
        let case = seed_case(&store).await;
        store
            .insert_queue_item(&NewQueueItem {
                case_id: case.id,
                run_id: None,
                priority: 10,
                enqueued_by: "system".into(),
            })
            .await
            .unwrap();

        assert!(store.delete_script(case.test_script_id).await.unwrap());
        assert!(store.get_case(case.id).await.unwrap().is_none());
        assert!(store.list_pending_queue_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert_matches!(store.health_check().await, Err(StoreError::Unavailable(_)));
        assert_matches!(store.get_run(1).await, Err(StoreError::Unavailable(_)));
        store.set_available(true);
        assert!(store.health_check().await.is_ok());
    }

    #[test]
    fn paginate_past_the_end_is_empty() {
        let rows = vec![1, 2, 3];
        let (items, total) = paginate(&rows, PageRequest { page: 3, page_size: 2 });
        assert!(items.is_empty());
        assert_eq!(total, 3);
        let (items, _) = paginate(&rows, PageRequest { page: 2, page_size: 2 });
        assert_eq!(items, vec![3]);
    }

    #[test]
    fn paginate_huge_page_number_is_empty() {
        let rows = vec![1, 2, 3];
        let page = PageRequest {
            page: i64::MAX / 10,
            page_size: 10,
        };
        let (items, total) = paginate(&rows, page);
        assert!(items.is_empty());
        assert_eq!(total, 3);

        let (items, _) = paginate(&rows, PageRequest { page: i64::MAX, page_size: 100 });
        assert!(items.is_empty());
    }
}
