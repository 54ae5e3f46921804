//! Billing for clinic appointments
//!
//! Provides:
//! - Bank transfer payments uploaded by patients, pending verification
//! - In-office payments recorded by clinicians, approved on the spot
//! - Settlement of the first payment when a doctor confirms an appointment
//! - Reversal of payments with a recorded reason

pub mod error;
pub mod models;
pub mod payment;
pub mod repository;
pub mod service;

pub use error::*;
pub use models::*;
pub use payment::*;
pub use repository::*;
pub use service::*;
