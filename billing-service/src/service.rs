use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

use crate::error::BillingResult;
use crate::models::{Payment, PaymentDraft, PaymentMethod};
use crate::payment::{ensure_no_open_payment, ensure_revertible, parse_amount};
use crate::repository::PaymentRepository;

/// Billing service
#[derive(Debug, Clone)]
pub struct BillingService {
    payments: PaymentRepository,
    default_amount: Decimal,
}

impl BillingService {
    /// Create a new billing service
    pub fn new(payments: PaymentRepository, default_amount: Decimal) -> Self {
        Self { payments, default_amount }
    }

    pub fn payments(&self) -> &PaymentRepository {
        &self.payments
    }

    pub fn default_amount(&self) -> Decimal {
        self.default_amount
    }

    /// Validate a new payment request and resolve its total
    pub async fn prepare(
        &self,
        appointment_id: Uuid,
        method: PaymentMethod,
        requested_total: Option<&str>,
    ) -> BillingResult<Decimal> {
        let total = parse_amount(requested_total, self.default_amount)?;
        let existing = self.payments.for_appointment(appointment_id).await?;
        ensure_no_open_payment(&existing, method)?;
        Ok(total)
    }

    /// Persist a prepared payment
    pub async fn record(&self, conn: &mut PgConnection, draft: &PaymentDraft) -> BillingResult<Payment> {
        let payment = self.payments.create(conn, draft).await?;
        info!(
            payment_id = %payment.id,
            appointment_id = %payment.appointment_id,
            method = ?payment.method,
            total = %payment.total,
            "Payment recorded"
        );
        Ok(payment)
    }

    /// Settle the appointment's first payment when a doctor confirms it
    pub async fn settle_on_confirmation(
        &self,
        conn: &mut PgConnection,
        appointment_id: Uuid,
    ) -> BillingResult<Option<Payment>> {
        let payment = self.payments.approve_first(conn, appointment_id, Utc::now()).await?;
        if let Some(payment) = &payment {
            info!(payment_id = %payment.id, %appointment_id, "Payment approved on confirmation");
        }
        Ok(payment)
    }

    /// Reject and zero a payment
    pub async fn revert(
        &self,
        conn: &mut PgConnection,
        payment: &Payment,
        reason: Option<&str>,
    ) -> BillingResult<Payment> {
        ensure_revertible(payment)?;
        let reverted = self.payments.revert(conn, payment.id, reason, Utc::now()).await?;
        info!(payment_id = %reverted.id, "Payment reverted");
        Ok(reverted)
    }
}
