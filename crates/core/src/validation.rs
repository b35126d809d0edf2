//! Field validation helpers for test scripts and test cases.

use crate::error::CoreError;

/// Maximum length of a script or case name, in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Validate that a name is non-blank and at most [`MAX_NAME_LEN`] characters.
pub fn validate_name(field: &str, name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be empty")));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "{field} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate that a free-form JSON field (metadata, variables) is an object.
pub fn validate_json_object(field: &str, value: &serde_json::Value) -> Result<(), CoreError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "{field} must be a JSON object"
        )))
    }
}
