use chrono::{DateTime, Utc};
use database_layer::{Page, PageRequest, PaginatedQuery};
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::error::BillingResult;
use crate::models::{Payment, PaymentDraft, PaymentMethod, PaymentStatus};

/// List filters; visibility restrictions are expressed as forced ids
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentFilter {
    pub patient_id: Option<Uuid>,
    /// Only payments of appointments attended by this doctor
    pub doctor_id: Option<Uuid>,
    pub method: Option<PaymentMethod>,
    pub status: Option<PaymentStatus>,
}

impl PaymentFilter {
    fn apply(&self, query: &mut PaginatedQuery<'_>) {
        query
            .filter_eq("p.patient_id", self.patient_id)
            .filter_eq("p.method", self.method)
            .filter_eq("p.status", self.status);
        if let Some(doctor_id) = self.doctor_id {
            query.filter_raw(
                "EXISTS (SELECT 1 FROM appointments a WHERE a.id = p.appointment_id AND a.doctor_id = {})",
                doctor_id,
            );
        }
    }
}

/// Repository for appointment payments
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: Pool<Postgres>,
}

impl PaymentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> BillingResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(payment)
    }

    /// Payments of one appointment, oldest first
    pub async fn for_appointment(&self, appointment_id: Uuid) -> BillingResult<Vec<Payment>> {
        self.for_appointments(&[appointment_id]).await
    }

    /// Payments of several appointments, oldest first
    pub async fn for_appointments(&self, appointment_ids: &[Uuid]) -> BillingResult<Vec<Payment>> {
        if appointment_ids.is_empty() {
            return Ok(Vec::new());
        }

        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE appointment_id = ANY($1) ORDER BY created_at ASC",
        )
        .bind(appointment_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }

    pub async fn list(&self, filter: PaymentFilter, page: PageRequest) -> BillingResult<Page<Payment>> {
        let mut count = PaginatedQuery::new("SELECT COUNT(*) FROM payments p WHERE 1=1");
        filter.apply(&mut count);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = PaginatedQuery::new("SELECT p.* FROM payments p WHERE 1=1");
        filter.apply(&mut select);
        select
            .order_by("p.paid_at DESC NULLS LAST, p.created_at DESC")
            .paginate(page);
        let items = select.build_query_as::<Payment>().fetch_all(&self.pool).await?;

        Ok(Page { items, total, request: page })
    }

    pub async fn create(&self, conn: &mut PgConnection, draft: &PaymentDraft) -> BillingResult<Payment> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments
                (patient_id, appointment_id, total, paid, paid_at, verified, method, status, receipt_path)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(draft.patient_id)
        .bind(draft.appointment_id)
        .bind(draft.total)
        .bind(draft.paid)
        .bind(draft.paid_at)
        .bind(draft.verified)
        .bind(draft.method)
        .bind(draft.status)
        .bind(draft.receipt_path.as_deref())
        .fetch_one(conn)
        .await?;
        Ok(payment)
    }

    /// Settle the appointment's earliest payment in full
    pub async fn approve_first(
        &self,
        conn: &mut PgConnection,
        appointment_id: Uuid,
        now: DateTime<Utc>,
    ) -> BillingResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments SET
                status = 'APPROVED',
                verified = TRUE,
                paid = total,
                paid_at = $2,
                updated_at = NOW()
            WHERE id = (
                SELECT id FROM payments
                WHERE appointment_id = $1
                ORDER BY created_at ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(appointment_id)
        .bind(now)
        .fetch_optional(conn)
        .await?;
        Ok(payment)
    }

    pub async fn revert(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> BillingResult<Payment> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments SET
                status = 'REJECTED',
                verified = FALSE,
                paid = 0,
                reversed = TRUE,
                reversal_reason = $2,
                reversed_at = $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(now)
        .fetch_one(conn)
        .await?;
        Ok(payment)
    }
}
