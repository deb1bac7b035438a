//! Validation helpers for DTOs.

use validator::ValidationError;

/// Custom `validator` check rejecting empty or whitespace-only text. The value
/// itself is never trimmed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_is_blank() {
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank(" \t\n").is_err());
        assert!(validate_not_blank(" Ana ").is_ok());
    }
}
