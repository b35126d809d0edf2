//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` (or any `PgExecutor` where a method must run
//! inside a caller's transaction) as the first argument.

pub mod queue_item_repo;
pub mod run_history_repo;
pub mod run_log_repo;
pub mod test_case_repo;
pub mod test_script_repo;

pub use queue_item_repo::QueueItemRepo;
pub use run_history_repo::RunHistoryRepo;
pub use run_log_repo::RunLogRepo;
pub use test_case_repo::TestCaseRepo;
pub use test_script_repo::TestScriptRepo;
