use anyhow::{Context, Result};
use billing_service::{BillingService, PaymentRepository};
use database_layer::{
    AppointmentRepository, CatalogRepository, ClinicalRepository, ConsentRepository,
    DatabasePool, TransactionManager, TreatmentRepository, UserRepository,
};
use logger_redacted::PiiRedactor;
use sqlx::{Pool, Postgres};
use std::sync::Arc;

use crate::auth::tokens::TokenService;
use crate::config::ClinicConfig;
use crate::services::media::{LocalMediaStore, MediaStore};

/// Main clinic server state
#[derive(Clone)]
pub struct ClinicServer {
    /// Server configuration
    pub config: Arc<ClinicConfig>,
    /// Database connection pool
    pub db_pool: Pool<Postgres>,
    pub transactions: TransactionManager,
    pub users: UserRepository,
    pub catalog: CatalogRepository,
    pub appointments: AppointmentRepository,
    pub treatments: TreatmentRepository,
    pub clinical: ClinicalRepository,
    pub consents: ConsentRepository,
    pub billing: BillingService,
    /// JWT issuing and validation
    pub tokens: Arc<TokenService>,
    /// Storage for uploaded receipts and signatures
    pub media: Arc<dyn MediaStore>,
    /// Redactor used by the audit log
    pub redactor: PiiRedactor,
}

impl ClinicServer {
    /// Connect to the configured database and build the server state
    pub async fn new(config: ClinicConfig) -> Result<Self> {
        let database = DatabasePool::new(&config.database.url, config.database.max_connections)
            .await
            .context("Failed to connect to the database")?;

        Self::new_with_pool(database.pool().clone(), config)
    }

    /// Build the server state around an existing pool.
    /// Useful for testing with a lazily connected pool.
    pub fn new_with_pool(db_pool: Pool<Postgres>, config: ClinicConfig) -> Result<Self> {
        config.validate()?;

        let default_amount = config.default_payment_amount()?;
        let billing = BillingService::new(PaymentRepository::new(db_pool.clone()), default_amount);
        let tokens = Arc::new(TokenService::new(&config.auth));
        let media: Arc<dyn MediaStore> = Arc::new(LocalMediaStore::new(&config.clinic.media_dir));
        let redactor = PiiRedactor::new(config.logging.redaction_config());

        Ok(Self {
            transactions: TransactionManager::new(db_pool.clone()),
            users: UserRepository::new(db_pool.clone()),
            catalog: CatalogRepository::new(db_pool.clone()),
            appointments: AppointmentRepository::new(db_pool.clone()),
            treatments: TreatmentRepository::new(db_pool.clone()),
            clinical: ClinicalRepository::new(db_pool.clone()),
            consents: ConsentRepository::new(db_pool.clone()),
            billing,
            tokens,
            media,
            redactor,
            config: Arc::new(config),
            db_pool,
        })
    }

    /// Get server configuration
    pub fn get_config(&self) -> &ClinicConfig {
        &self.config
    }

    /// Replace the media store, used by tests
    pub fn with_media_store(mut self, media: Arc<dyn MediaStore>) -> Self {
        self.media = media;
        self
    }
}
