use std::fmt;

use serde::{Deserialize, Serialize};

/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Identity recorded on every write (`created_by`, `enqueued_by`, `executor`).
///
/// Authentication was removed from the service, so every request acts as
/// [`Caller::system`]. The value is still threaded explicitly from the HTTP
/// boundary into the execution layer rather than read from global state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Caller(String);

/// Name of the built-in caller identity.
pub const SYSTEM_CALLER: &str = "system";

impl Caller {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn system() -> Self {
        Self(SYSTEM_CALLER.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Caller {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_caller_is_system() {
        assert_eq!(Caller::default().as_str(), "system");
        assert_eq!(Caller::system(), Caller::new(SYSTEM_CALLER));
    }

    #[test]
    fn caller_serializes_as_plain_string() {
        let json = serde_json::to_value(Caller::new("ci-bot")).unwrap();
        assert_eq!(json, serde_json::json!("ci-bot"));
    }
}
