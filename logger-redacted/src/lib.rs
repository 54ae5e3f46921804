//! Redaction of patient identifiers before they reach the logs
//!
//! Patients log in with their phone number, so phone numbers show up in
//! request paths, error messages and audit lines. This crate rewrites those
//! values into short correlation hashes so two log lines about the same
//! patient can still be matched without exposing the number itself.
//!
//! # Detected Data Types
//!
//! - **Phone Numbers**: 10-digit national numbers with an optional `+52` prefix
//! - **Email Addresses**: user@example.com
//! - **Bearer Tokens**: `Bearer eyJ...` authorization values
//!
//! # Example
//!
//! ```rust
//! use logger_redacted::{PiiRedactor, RedactionConfig};
//!
//! let redactor = PiiRedactor::new(RedactionConfig::default());
//! let line = redactor.redact("login attempt for 7551234567");
//! assert!(line.starts_with("login attempt for PHONE["));
//! ```

pub mod redactor;
pub mod macros;
pub mod config;

pub use redactor::*;
pub use config::*;

/// Redact a single phone number for a structured log field
pub fn redact_phone(phone: &str) -> String {
    PiiRedactor::new(RedactionConfig::default()).redact_value("PHONE", phone)
}
