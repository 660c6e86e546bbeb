//! Common validation utilities.

use validator::ValidationError;

/// Validates that a string contains something other than whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}

/// Validates that a string carries no control characters (tabs and newlines included).
pub fn validate_no_control_chars(value: &str) -> Result<(), ValidationError> {
    if value.chars().any(char::is_control) {
        let mut err = ValidationError::new("control_characters");
        err.message = Some("Value must not contain control characters".into());
        Err(err)
    } else {
        Ok(())
    }
}
