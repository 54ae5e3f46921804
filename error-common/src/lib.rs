//! Common error handling utilities for the clinic engine
//!
//! This crate provides the process-level error type used by binaries during
//! startup, the stable error codes returned to API clients, and sanitization
//! of messages before they leave the server.
//!
//! # Error Categories
//!
//! - **Validation**: input validation and data format errors
//! - **Authentication / Authorization**: credential and role errors
//! - **Scheduling**: slot and lifecycle rule violations
//! - **Billing**: payment workflow violations
//! - **Database**: connection, query and constraint errors
//!
//! # Example
//!
//! ```rust
//! use error_common::{codes, DataSanitizer};
//!
//! let sanitizer = DataSanitizer::new();
//! let message = sanitizer.sanitize_for_client(
//!     "duplicate key value violates unique constraint \"users_phone_key\" Key (phone)=(5512345678) already exists.",
//! );
//! assert!(!message.contains("5512345678"));
//! assert_eq!(codes::database::CONSTRAINT_VIOLATION, "DB_4003");
//! ```

pub mod types;
pub mod codes;
pub mod sanitization;

pub use types::*;
pub use sanitization::*;
