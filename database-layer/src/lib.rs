//! Database layer for the clinic engine
//!
//! Provides the PostgreSQL connection pool, the embedded schema migrations,
//! the row models shared by every service, and one repository per aggregate.
//!
//! # Key Features
//!
//! - **Connection Management**: pooled connections with health checks
//! - **Migration System**: `sqlx` migrations embedded in the binary
//! - **Repositories**: typed queries over users, catalog, appointments,
//!   treatments, clinical records and consents
//! - **Constraint Mapping**: unique and foreign-key violations are classified
//!   so callers can answer 409 / 400 instead of 500
//!
//! Reads go through the pool held by each repository. Writes take a
//! `&mut PgConnection` so several of them can share one transaction:
//!
//! ```rust,no_run
//! use database_layer::{DatabasePool, TransactionManager, TreatmentRepository};
//!
//! # async fn example(patient_id: uuid::Uuid, doctor_id: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
//! let db = DatabasePool::new("postgresql://localhost/clinic", 10).await?;
//! db.migrate().await?;
//!
//! let treatments = TreatmentRepository::new(db.pool().clone());
//! let mut tx = TransactionManager::new(db.pool().clone()).begin().await?;
//! let treatment = treatments.create(&mut *tx, patient_id, doctor_id, 15).await?;
//! treatments.name_if_unnamed(&mut *tx, treatment.id, "Acné").await?;
//! TransactionManager::commit(tx).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod models;
pub mod query;
pub mod transaction;

pub mod appointment_repository;
pub mod catalog_repository;
pub mod clinical_repository;
pub mod consent_repository;
pub mod treatment_repository;
pub mod user_repository;

pub use connection::*;
pub use error::*;
pub use models::*;
pub use query::{Page, PageRequest, PaginatedQuery};
pub use transaction::*;

pub use appointment_repository::*;
pub use catalog_repository::*;
pub use clinical_repository::*;
pub use consent_repository::*;
pub use treatment_repository::*;
pub use user_repository::*;
