use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A status transition that the state machine does not allow.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The database or object store could not be reached.
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether a caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::DependencyUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = CoreError::NotFound {
            entity: "TestCase",
            id: 7,
        };
        assert_eq!(err.to_string(), "Entity not found: TestCase with id 7");
    }

    #[test]
    fn retryable_kinds() {
        assert!(CoreError::Conflict("x".into()).is_retryable());
        assert!(CoreError::DependencyUnavailable("db".into()).is_retryable());
        assert!(!CoreError::InvalidState("x".into()).is_retryable());
        assert!(!CoreError::Validation("x".into()).is_retryable());
    }
}
