//! Execution core: the queue, the run history state machine, the
//! orchestrator that ties them to a [`TestRunner`](rftm_core::runner::TestRunner),
//! and the background drainer that works through queued runs.

pub mod drainer;
pub mod history;
pub mod orchestrator;
pub mod queue;

pub use drainer::{DrainReport, DrainerConfig, QueueDrainer};
pub use history::RunHistoryTracker;
pub use orchestrator::{ExecutionResult, Orchestrator, DEFAULT_RUNNER_TIMEOUT};
pub use queue::QueueManager;
