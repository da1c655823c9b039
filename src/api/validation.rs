//! Input validation for API requests.
//!
//! Field checks return `Result<(), String>`; handlers collect them with the
//! `ValidationErrorBuilder` from the `error` module. Date, range and amount
//! rules live in the engine, these only guard the shape of free-text input.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for client, trainer and staff identifiers (1-64 chars)
    static ref PERSON_ID_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9]([A-Za-z0-9_.:@-]{0,62}[A-Za-z0-9])?$"
    ).unwrap();

    /// Regex for leave types (e.g., annual, sick, unpaid_parental)
    static ref LEAVE_TYPE_REGEX: Regex = Regex::new(
        r"^[a-z][a-z0-9_]{0,31}$"
    ).unwrap();
}

/// Longest accepted free-text note or reason
const MAX_NOTE_LENGTH: usize = 2000;

/// Validate a client, trainer or staff identifier
pub fn validate_person_id(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if !PERSON_ID_REGEX.is_match(id) {
        return Err(format!(
            "Invalid {}. Use letters, digits and . _ : @ - (max 64 characters)",
            field_name
        ));
    }

    Ok(())
}

/// Validate a leave type
pub fn validate_leave_type(leave_type: &str) -> Result<(), String> {
    if leave_type.is_empty() {
        return Err("Leave type is required".to_string());
    }
    if !LEAVE_TYPE_REGEX.is_match(leave_type) {
        return Err("Leave type must be lowercase letters, digits or underscores".to_string());
    }
    Ok(())
}

/// Validate optional free text (notes, leave reasons)
pub fn validate_note(note: &Option<String>) -> Result<(), String> {
    if let Some(note) = note {
        if note.chars().count() > MAX_NOTE_LENGTH {
            return Err(format!("Text is too long (max {} characters)", MAX_NOTE_LENGTH));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_person_id() {
        assert!(validate_person_id("trainer-42", "trainer_id").is_ok());
        assert!(validate_person_id("c1", "client_id").is_ok());
        assert!(validate_person_id("staff.jane@north", "staff_id").is_ok());
        assert!(validate_person_id("x", "staff_id").is_ok());

        assert!(validate_person_id("", "staff_id").is_err());
        assert!(validate_person_id("-leading", "staff_id").is_err());
        assert!(validate_person_id("trailing-", "staff_id").is_err());
        assert!(validate_person_id("has space", "staff_id").is_err());
        assert!(validate_person_id(&"a".repeat(65), "staff_id").is_err());
        assert!(validate_person_id(&"a".repeat(64), "staff_id").is_ok());
    }

    #[test]
    fn test_validate_leave_type() {
        assert!(validate_leave_type("annual").is_ok());
        assert!(validate_leave_type("sick_2").is_ok());

        assert!(validate_leave_type("").is_err());
        assert!(validate_leave_type("Annual").is_err());
        assert!(validate_leave_type("1day").is_err());
    }

    #[test]
    fn test_validate_note() {
        assert!(validate_note(&None).is_ok());
        assert!(validate_note(&Some("short".to_string())).is_ok());
        assert!(validate_note(&Some("x".repeat(MAX_NOTE_LENGTH + 1))).is_err());
    }
}
