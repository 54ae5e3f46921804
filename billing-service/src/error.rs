use database_layer::DatabaseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// Another open payment of the same method exists for the appointment
    #[error("Duplicate payment: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        BillingError::Database(DatabaseError::SqlxError(err))
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
