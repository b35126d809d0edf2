#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rftm_core::runner::{RunContext, RunOutcome, RunnerError, SimulatedRunner, TestRunner};
use rftm_core::types::{Caller, DbId};
use rftm_db::models::test_case::{CreateTestCase, TestCase};
use rftm_db::models::test_script::{CreateTestScript, TestScript};
use rftm_db::{MemoryStore, Store};
use rftm_execution::Orchestrator;
use rftm_storage::{
    ArtifactStore, LocalArtifactStore, PresignedUrl, StorageError, StorageResult, StoredArtifact,
};

/// In-memory store, on-disk artifacts and an orchestrator wired together.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub artifacts: Arc<LocalArtifactStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub caller: Caller,
    _dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_runner(Arc::new(SimulatedRunner::passing()))
    }

    pub fn with_runner(runner: Arc<dyn TestRunner>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(LocalArtifactStore::new(dir.path()));
        Self::build(runner, artifacts.clone(), artifacts, dir)
    }

    /// Orchestrator whose artifact store rejects every upload.
    pub fn with_broken_storage() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(LocalArtifactStore::new(dir.path()));
        Self::build(
            Arc::new(SimulatedRunner::passing()),
            Arc::new(BrokenArtifactStore),
            artifacts,
            dir,
        )
    }

    fn build(
        runner: Arc<dyn TestRunner>,
        uploads: Arc<dyn ArtifactStore>,
        artifacts: Arc<LocalArtifactStore>,
        dir: tempfile::TempDir,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = Arc::new(Orchestrator::new(store.clone(), uploads, runner));
        Self {
            store,
            artifacts,
            orchestrator,
            caller: Caller::system(),
            _dir: dir,
        }
    }

    pub async fn seed_script(&self, name: &str) -> TestScript {
        self.store
            .create_script(
                &CreateTestScript {
                    name: name.to_string(),
                    description: None,
                    content: Some("*** Test Cases ***\nSmoke\n    Log    hi".into()),
                    metadata: None,
                },
                self.caller.as_str(),
            )
            .await
            .unwrap()
    }

    pub async fn seed_case(&self, script_id: DbId, name: &str) -> TestCase {
        self.store
            .create_case(&CreateTestCase {
                test_script_id: script_id,
                name: name.to_string(),
                description: None,
                variables: Some(serde_json::json!({ "BROWSER": "headless" })),
            })
            .await
            .unwrap()
    }

    /// `n` cases under one fresh script.
    pub async fn seed_cases(&self, n: usize) -> Vec<TestCase> {
        let script = self.seed_script("Suite").await;
        let mut cases = Vec::with_capacity(n);
        for i in 0..n {
            cases.push(self.seed_case(script.id, &format!("Case {i}")).await);
        }
        cases
    }
}

/// Upload target that is always down.
pub struct BrokenArtifactStore;

#[async_trait]
impl ArtifactStore for BrokenArtifactStore {
    async fn put(&self, _: &str, _: Vec<u8>, _: &str) -> StorageResult<StoredArtifact> {
        Err(StorageError::Unavailable("connection refused".into()))
    }

    async fn get_url(&self, key: &str, _: Duration) -> StorageResult<PresignedUrl> {
        Err(StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, _: &str) -> StorageResult<()> {
        Err(StorageError::Unavailable("connection refused".into()))
    }

    async fn health_check(&self) -> StorageResult<()> {
        Err(StorageError::Unavailable("connection refused".into()))
    }
}

/// Runner that cannot start.
pub struct CrashingRunner;

#[async_trait]
impl TestRunner for CrashingRunner {
    async fn run(&self, _: &RunContext) -> Result<RunOutcome, RunnerError> {
        Err(RunnerError::Crashed("robot executable not found".into()))
    }
}

/// Runner that never finishes within any reasonable budget.
pub struct HangingRunner;

#[async_trait]
impl TestRunner for HangingRunner {
    async fn run(&self, _: &RunContext) -> Result<RunOutcome, RunnerError> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Err(RunnerError::Crashed("unreachable".into()))
    }
}
