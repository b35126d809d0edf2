//! Run history state machine.
//!
//! ```text
//! pending ──> running ──> completed
//!                    └──> failed
//! ```
//!
//! Transitions only move forward. `completed` and `failed` are terminal.
//! Stored as lowercase text in `run_history.status`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle status of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Every status, in lifecycle order.
pub const ALL_RUN_STATUSES: [RunStatus; 4] = [
    RunStatus::Pending,
    RunStatus::Running,
    RunStatus::Completed,
    RunStatus::Failed,
];

impl RunStatus {
    /// Database / wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse the database / wire representation.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::Validation(format!(
                "Unknown run status '{other}'. Must be one of: pending, running, completed, failed"
            ))),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    /// Check a transition, returning [`CoreError::InvalidState`] if illegal.
    pub fn ensure_transition(self, next: RunStatus) -> Result<(), CoreError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(CoreError::InvalidState(format!(
                "Cannot transition run from '{self}' to '{next}'"
            )))
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for RunStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

/// How a run was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    /// Driven to a terminal status within the request.
    #[serde(alias = "ad_hoc")]
    Immediate,
    /// Placed on the execution queue for a worker to drain.
    Queued,
}

impl RunType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Queued => "queued",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "immediate" | "ad_hoc" => Ok(Self::Immediate),
            "queued" => Ok(Self::Queued),
            other => Err(CoreError::Validation(format!(
                "Unknown run type '{other}'. Must be one of: immediate, queued"
            ))),
        }
    }
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for RunType {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn only_forward_transitions_are_allowed() {
        let mut allowed = Vec::new();
        for from in ALL_RUN_STATUSES {
            for to in ALL_RUN_STATUSES {
                if from.can_transition_to(to) {
                    allowed.push((from, to));
                }
            }
        }
        assert_eq!(
            allowed,
            vec![
                (RunStatus::Pending, RunStatus::Running),
                (RunStatus::Running, RunStatus::Completed),
                (RunStatus::Running, RunStatus::Failed),
            ]
        );
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [RunStatus::Completed, RunStatus::Failed] {
            assert!(from.is_terminal());
            for to in ALL_RUN_STATUSES {
                assert!(!from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn completing_a_pending_run_is_invalid_state() {
        assert_matches!(
            RunStatus::Pending.ensure_transition(RunStatus::Completed),
            Err(CoreError::InvalidState(_))
        );
        assert_matches!(
            RunStatus::Pending.ensure_transition(RunStatus::Failed),
            Err(CoreError::InvalidState(_))
        );
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in ALL_RUN_STATUSES {
            assert_eq!(RunStatus::parse(status.as_str()).unwrap(), status);
        }
        assert_matches!(RunStatus::parse("passed"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn ad_hoc_is_an_alias_for_immediate() {
        assert_eq!(RunType::parse("ad_hoc").unwrap(), RunType::Immediate);
        let parsed: RunType = serde_json::from_str("\"ad_hoc\"").unwrap();
        assert_eq!(parsed, RunType::Immediate);
        let parsed: RunType = serde_json::from_str("\"queued\"").unwrap();
        assert_eq!(parsed, RunType::Queued);
    }

    #[test]
    fn unknown_run_type_is_rejected() {
        assert_matches!(RunType::parse("scheduled"), Err(CoreError::Validation(_)));
        assert!(serde_json::from_str::<RunType>("\"later\"").is_err());
    }
}
