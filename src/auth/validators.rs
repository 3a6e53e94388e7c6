// src/auth/validators.rs

use super::models::{LoginRequest, RegisterRequest};
use crate::common::{is_valid_email, ValidationResult, Validator};

/// Minimum accepted length for a new password
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub struct RegisterValidator;

impl Validator<RegisterRequest> for RegisterValidator {
    fn validate(&self, data: &RegisterRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if data.name.is_empty() {
            result.add_error("name", "Name is required");
        }

        if !is_valid_email(&data.email) {
            result.add_error("email", "Email must be a valid address");
        }

        if data.password.chars().count() < MIN_PASSWORD_LENGTH {
            result.add_error("password", "Password must be at least 8 characters");
        }

        result
    }
}

pub struct LoginValidator;

impl Validator<LoginRequest> for LoginValidator {
    fn validate(&self, data: &LoginRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if !is_valid_email(&data.email) {
            result.add_error("email", "Email must be a valid address");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_register_validator_valid_data() {
        let result = RegisterValidator.validate(&register("Ada", "ada@example.com", "12345678"));
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_register_validator_collects_all_errors() {
        let result = RegisterValidator.validate(&register("", "not-an-email", "short"));
        assert!(!result.is_valid);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "email", "password"]);
    }

    #[test]
    fn test_register_name_only_needs_one_character() {
        assert!(RegisterValidator.validate(&register(" ", "ada@example.com", "12345678")).is_valid);
        assert!(!RegisterValidator.validate(&register("", "ada@example.com", "12345678")).is_valid);
    }

    #[test]
    fn test_register_password_length_counts_characters() {
        // 8 multi-byte characters
        let result = RegisterValidator.validate(&register("Ada", "ada@example.com", "ééééééüü"));
        assert!(result.is_valid);
        let result = RegisterValidator.validate(&register("Ada", "ada@example.com", "1234567"));
        assert!(!result.is_valid);
    }

    #[test]
    fn test_login_validator() {
        let ok = LoginValidator.validate(&LoginRequest {
            email: "ada@example.com".to_string(),
            password: "x".to_string(),
        });
        assert!(ok.is_valid);

        let bad = LoginValidator.validate(&LoginRequest {
            email: "ada".to_string(),
            password: "x".to_string(),
        });
        assert!(!bad.is_valid);
    }
}
