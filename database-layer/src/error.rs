use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Constraint family of a rejected write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    Check,
}

/// Classify a driver error raised by a table constraint
pub fn constraint_violation(err: &sqlx::Error) -> Option<(ConstraintKind, Option<String>)> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };

    let kind = match db_err.kind() {
        sqlx::error::ErrorKind::UniqueViolation => ConstraintKind::Unique,
        sqlx::error::ErrorKind::ForeignKeyViolation => ConstraintKind::ForeignKey,
        sqlx::error::ErrorKind::CheckViolation | sqlx::error::ErrorKind::NotNullViolation => {
            ConstraintKind::Check
        }
        _ => return None,
    };

    Some((kind, db_err.constraint().map(str::to_string)))
}

impl DatabaseError {
    /// Constraint that rejected the statement, if any
    pub fn constraint_violation(&self) -> Option<(ConstraintKind, Option<String>)> {
        match self {
            DatabaseError::SqlxError(err) => constraint_violation(err),
            _ => None,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self.constraint_violation(), Some((ConstraintKind::Unique, _)))
    }
}

impl From<DatabaseError> for error_common::ClinicError {
    fn from(err: DatabaseError) -> Self {
        error_common::ClinicError::DatabaseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_are_not_constraints() {
        let err = DatabaseError::SqlxError(sqlx::Error::RowNotFound);
        assert!(err.constraint_violation().is_none());
        assert!(!err.is_unique_violation());
    }

    #[test]
    fn test_converts_to_process_error() {
        let err: error_common::ClinicError =
            DatabaseError::MigrationError("checksum mismatch".to_string()).into();
        assert!(err.to_string().contains("checksum mismatch"));
    }
}
