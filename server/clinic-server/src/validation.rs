//! Request validation utilities for consistent validation across handlers
//!
//! This module provides a `RequestValidation` trait, helper macros and the
//! field rules shared by the account endpoints (phone numbers, person names).

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ApiError;

lazy_static! {
    static ref PHONE_PATTERN: Regex = Regex::new(r"^[0-9]{10}$").unwrap();
    static ref NAME_PATTERN: Regex = Regex::new(r"^[A-Za-zÁÉÍÓÚÜÑáéíóúüñ ]+$").unwrap();
}

/// Trait for validating request payloads
///
/// Implemented by create/update request types so every handler reports
/// violations the same way.
pub trait RequestValidation {
    /// Validates the request and returns an error if validation fails
    fn validate(&self) -> Result<(), ApiError>;
}

/// Macro for validating fields with custom predicates
///
/// # Usage
///
/// ```rust,ignore
/// validate_field!(self.phone, is_valid_phone(&self.phone), "Phone must have exactly 10 digits");
/// ```
#[macro_export]
macro_rules! validate_field {
    ($field:expr, $predicate:expr, $message:expr) => {
        if !$predicate {
            return Err($crate::error::ApiError::validation($message));
        }
    };
}

/// Macro for validating required fields (non-empty strings)
#[macro_export]
macro_rules! validate_required {
    ($field:expr, $message:expr) => {
        $crate::validate_field!($field, !$field.trim().is_empty(), $message);
    };
}

/// Macro for validating string length in characters
#[macro_export]
macro_rules! validate_length {
    ($field:expr, $min:expr, $max:expr, $message:expr) => {
        let len = $field.chars().count();
        $crate::validate_field!($field, len >= $min && len <= $max, $message);
    };
}

/// Macro for validating numeric ranges
///
/// # Usage
///
/// ```rust,ignore
/// validate_range!(&self.age, 18, 120, "Age must be between 18 and 120");
/// ```
#[macro_export]
macro_rules! validate_range {
    ($field:expr, $min:expr, $max:expr, $message:expr) => {
        $crate::validate_field!($field, *$field >= $min && *$field <= $max, $message);
    };
}

/// Exactly ten ASCII digits
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_PATTERN.is_match(phone)
}

/// Letters (accents included) and spaces, at least two characters
pub fn is_valid_person_name(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.chars().count() >= 2 && NAME_PATTERN.is_match(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    struct TestRequest {
        name: String,
        phone: String,
        age: i32,
    }

    impl RequestValidation for TestRequest {
        fn validate(&self) -> Result<(), ApiError> {
            validate_required!(self.name, "Name is required");
            validate_length!(self.name, 2, 100, "Name must be between 2 and 100 characters");
            validate_field!(self.phone, is_valid_phone(&self.phone), "Phone must have exactly 10 digits");
            validate_range!(&self.age, 18, 120, "Age must be between 18 and 120");
            Ok(())
        }
    }

    fn request() -> TestRequest {
        TestRequest {
            name: "Ana".to_string(),
            phone: "7551234567".to_string(),
            age: 30,
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_empty_name() {
        let req = TestRequest { name: "   ".to_string(), ..request() };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_short_phone() {
        let req = TestRequest { phone: "755123".to_string(), ..request() };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_age_out_of_range() {
        assert!(TestRequest { age: 17, ..request() }.validate().is_err());
        assert!(TestRequest { age: 121, ..request() }.validate().is_err());
        assert!(TestRequest { age: 120, ..request() }.validate().is_ok());
    }

    #[test]
    fn test_phone_rule() {
        assert!(is_valid_phone("5512345678"));
        assert!(!is_valid_phone("55-1234-5678"));
        assert!(!is_valid_phone("551234567"));
        assert!(!is_valid_phone("55123456789"));
    }

    #[test]
    fn test_person_name_rule() {
        assert!(is_valid_person_name("José María"));
        assert!(is_valid_person_name("Núñez"));
        assert!(!is_valid_person_name("J"));
        assert!(!is_valid_person_name("R2D2"));
        assert!(!is_valid_person_name("Ana-Luisa"));
    }
}
