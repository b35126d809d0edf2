//! Domain types and pure logic shared by every rftm crate.
//!
//! Nothing in here touches the database, object storage or HTTP. The run
//! state machine, queue ordering policy and pagination rules live here so
//! they can be unit tested in isolation.

pub mod env;
pub mod error;
pub mod pagination;
pub mod queue;
pub mod run_status;
pub mod runner;
pub mod types;
pub mod validation;
