//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a participant identity is 1 to 64 characters drawn from
/// ASCII alphanumerics plus `-`, `_`, `.` and `@`.
///
/// # Examples
///
/// ```ignore
/// validate_participant_id("maria.souza@org") // Ok
/// validate_participant_id("")                // Err - empty
/// validate_participant_id("joão")            // Err - non-ASCII
/// ```
pub fn validate_participant_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > 64 {
        let mut err = ValidationError::new("participant_id_length");
        err.message =
            Some(format!("Participant ID must be 1-64 characters (got {})", id.len()).into());
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
    {
        let mut err = ValidationError::new("participant_id_format");
        err.message = Some(
            "Participant ID must contain only ASCII alphanumerics, `-`, `_`, `.` or `@`".into(),
        );
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_participant_id_valid() {
        assert!(validate_participant_id("maria.souza@org").is_ok());
        assert!(validate_participant_id("p-001_a").is_ok());
        assert!(validate_participant_id("x").is_ok());
    }

    #[test]
    fn test_validate_participant_id_invalid_length() {
        assert!(validate_participant_id("").is_err());
        assert!(validate_participant_id(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_participant_id_invalid_format() {
        assert!(validate_participant_id("joao silva").is_err()); // space
        assert!(validate_participant_id("joão").is_err()); // non-ASCII
        assert!(validate_participant_id("a#b").is_err()); // symbol
    }
}
