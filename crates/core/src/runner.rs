//! Test runner interface.
//!
//! Defines [`TestRunner`], the seam between the execution orchestrator and
//! whatever actually executes a Robot Framework test case, along with
//! [`RunContext`], [`RunOutcome`] and [`RunnerError`].
//!
//! The service does not invoke Robot Framework itself. [`SimulatedRunner`]
//! stands in for it and produces a Robot-style text log.

use std::time::Duration;

use async_trait::async_trait;

use crate::types::DbId;

/// Everything a runner needs to execute one test case.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: DbId,
    pub case_id: DbId,
    pub case_name: String,
    pub script_id: DbId,
    pub script_name: String,
    /// Script body text (`.robot` source).
    pub script_content: String,
    /// Case variables (JSON object).
    pub variables: serde_json::Value,
}

/// Result of a runner invocation that produced a verdict.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Whether every test in the case passed.
    pub passed: bool,
    /// Raw log bytes to persist as the run's artifact.
    pub log: Vec<u8>,
    /// One-line summary; used as the failure reason when `passed` is false.
    pub summary: String,
    /// Wall-clock time spent in the runner.
    pub duration: Duration,
}

/// Errors that prevent a runner from producing a verdict at all.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The runner exceeded its time budget.
    #[error("Runner timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The runner could not be started or crashed.
    #[error("Runner crashed: {0}")]
    Crashed(String),
}

/// Trait implemented by test runners.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Execute the test case described by `ctx`.
    async fn run(&self, ctx: &RunContext) -> Result<RunOutcome, RunnerError>;
}

/// Placeholder runner that never invokes Robot Framework.
///
/// Renders a Robot-style console log for the case and reports the
/// configured verdict.
#[derive(Debug, Clone, Default)]
pub struct SimulatedRunner {
    failure: Option<String>,
}

impl SimulatedRunner {
    /// A runner whose every case passes.
    pub fn passing() -> Self {
        Self { failure: None }
    }

    /// A runner whose every case fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
        }
    }

    fn render_log(&self, ctx: &RunContext, verdict: &str) -> String {
        let rule = "=".repeat(78);
        let thin = "-".repeat(78);
        let mut out = String::new();
        out.push_str(&format!("{rule}\n{}\n{rule}\n", ctx.script_name));
        if let Some(vars) = ctx.variables.as_object() {
            for (name, value) in vars {
                out.push_str(&format!("${{{name}}} = {value}\n"));
            }
        }
        out.push_str(&format!("{:<70}| {verdict} |\n", ctx.case_name));
        if let Some(msg) = &self.failure {
            out.push_str(&format!("{msg}\n"));
        }
        out.push_str(&format!("{thin}\nrun {} case {}\n", ctx.run_id, ctx.case_id));
        out
    }
}

#[async_trait]
impl TestRunner for SimulatedRunner {
    async fn run(&self, ctx: &RunContext) -> Result<RunOutcome, RunnerError> {
        let started = std::time::Instant::now();
        let (passed, verdict, summary) = match &self.failure {
            None => (true, "PASS", format!("{} passed", ctx.case_name)),
            Some(msg) => (false, "FAIL", msg.clone()),
        };
        let log = self.render_log(ctx, verdict).into_bytes();
        Ok(RunOutcome {
            passed,
            log,
            summary,
            duration: started.elapsed(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
