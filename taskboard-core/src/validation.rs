//! Input validation shared by the REST and GraphQL surfaces.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ValidationError;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]{3,32}$").expect("Invalid username regex"));

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid email regex"));

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_NAME_LEN: usize = 200;

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::missing("username"));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(ValidationError::invalid(
            "username",
            "must be 3-32 characters of letters, digits, '_', '.' or '-'",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::missing("email"));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ValidationError::invalid("email", "not a valid email address"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::missing("password"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::invalid(
            "password",
            format!("must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

/// Trimmed, non-empty, bounded display name (project name, task title).
pub fn validate_name(field: &str, value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::missing(field));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::invalid(
            field,
            format!("must be at most {} characters", MAX_NAME_LEN),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_username_rules() {
        assert!(validate_username("alice_01").is_ok());
        assert!(validate_username("al").is_err());
        assert!(validate_username("has space").is_err());
        assert_eq!(
            validate_username(""),
            Err(ValidationError::missing("username"))
        );
    }

    #[test]
    fn test_email_rules() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("alice@localhost").is_err());
        assert!(validate_email("not an email").is_err());
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("hunter22").is_ok());
        assert!(validate_password("short").is_err());
    }

    #[test]
    fn test_name_trimmed() {
        assert!(validate_name("title", "   ").is_err());
        assert!(validate_name("title", " ship it ").is_ok());
        assert!(validate_name("title", &"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_generated_usernames_valid(name in "[A-Za-z0-9_.-]{3,32}") {
            prop_assert!(validate_username(&name).is_ok());
        }

        #[test]
        fn prop_generated_emails_valid(local in "[a-z0-9.]{1,20}", domain in "[a-z]{1,12}", tld in "[a-z]{2,6}") {
            let email = format!("{}@{}.{}", local, domain, tld);
            prop_assert!(validate_email(&email).is_ok());
        }
    }
}
