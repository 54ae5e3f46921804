// Sanitization of error messages before they reach clients or logs

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Postgres constraint errors echo the offending values: `Key (phone)=(5512345678)`
    static ref KEY_DETAIL_REGEX: Regex = Regex::new(r"Key \(([^)]*)\)=\([^)]*\)").unwrap();
    static ref LONG_DIGITS_REGEX: Regex = Regex::new(r"\b\d{7,}\b").unwrap();
}

/// Strips record values out of database and driver messages
#[derive(Debug, Default, Clone, Copy)]
pub struct DataSanitizer;

impl DataSanitizer {
    pub fn new() -> Self {
        Self
    }

    /// Remove echoed column values and long digit runs (phone numbers)
    pub fn sanitize_for_client(&self, message: &str) -> String {
        let without_keys = KEY_DETAIL_REGEX.replace_all(message, "Key ($1)=([redacted])");
        LONG_DIGITS_REGEX
            .replace_all(&without_keys, "[redacted]")
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_detail_is_redacted() {
        let sanitizer = DataSanitizer::new();
        let cleaned = sanitizer.sanitize_for_client(
            "duplicate key value violates unique constraint \"users_phone_key\": Key (phone)=(5512345678) already exists.",
        );
        assert!(cleaned.contains("Key (phone)=([redacted])"));
        assert!(!cleaned.contains("5512345678"));
    }

    #[test]
    fn test_plain_message_is_untouched() {
        let sanitizer = DataSanitizer::new();
        assert_eq!(
            sanitizer.sanitize_for_client("Requested record not found."),
            "Requested record not found."
        );
    }
}
