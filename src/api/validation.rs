//! Input checks for path parameters and request bodies.

use lazy_static::lazy_static;
use regex::Regex;

use super::error::ApiError;

lazy_static! {
    /// Something that looks like an address: no whitespace, exactly one `@`
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@[^@\s]+$").unwrap();
}

/// Validate a store-assigned document id
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

pub fn require_id(id: &str) -> Result<(), ApiError> {
    validate_uuid(id, "id").map_err(ApiError::bad_request)
}

pub fn require_email(email: &str) -> Result<(), ApiError> {
    validate_email(email).map_err(ApiError::bad_request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000", "id").is_ok());
        assert!(validate_uuid("", "id").is_err());
        assert!(validate_uuid("6650f1a2b3c4d5e6f7a8b9c0", "id").is_err());
        assert!(validate_uuid("not-an-id", "id").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("guest@bistro.test").is_ok());
        assert!(validate_email("a@b").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("two@@signs.test").is_err());
        assert!(validate_email("spa ce@bistro.test").is_err());
        assert!(validate_email(&format!("{}@b.c", "a".repeat(260))).is_err());
    }
}
