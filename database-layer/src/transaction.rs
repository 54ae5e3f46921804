// Transaction management
use crate::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

/// Begins transactions for multi-step mutations
#[derive(Clone, Debug)]
pub struct TransactionManager {
    pool: PgPool,
}

impl TransactionManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begin a new transaction
    pub async fn begin(&self) -> DatabaseResult<Transaction<'static, Postgres>> {
        debug!("Beginning transaction");

        self.pool
            .begin()
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Failed to begin transaction: {}", e)))
    }

    /// Commit a transaction started by [`TransactionManager::begin`]
    pub async fn commit(tx: Transaction<'static, Postgres>) -> DatabaseResult<()> {
        tx.commit()
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Failed to commit transaction: {}", e)))?;
        debug!("Transaction committed");
        Ok(())
    }
}
