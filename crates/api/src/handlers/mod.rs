pub mod execution;
pub mod history;
pub mod queue;
pub mod test_case;
pub mod test_script;
