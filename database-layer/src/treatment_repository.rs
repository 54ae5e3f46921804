use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::error::DatabaseResult;
use crate::models::Treatment;

/// Appointment facts a treatment needs to suggest its next visit
#[derive(Debug, Clone, Copy, Default, sqlx::FromRow)]
pub struct TreatmentActivity {
    pub latest_attended: Option<DateTime<Utc>>,
    pub latest_any: Option<DateTime<Utc>>,
    pub total_appointments: i64,
    pub total_prescriptions: i64,
}

/// Repository for treatments
#[derive(Debug, Clone)]
pub struct TreatmentRepository {
    pool: Pool<Postgres>,
}

impl TreatmentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Treatment>> {
        let treatment = sqlx::query_as::<_, Treatment>("SELECT * FROM treatments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(treatment)
    }

    /// Most recently started treatment of a patient, active or not
    pub async fn latest_for_patient(&self, patient_id: Uuid) -> DatabaseResult<Option<Treatment>> {
        let treatment = sqlx::query_as::<_, Treatment>(
            "SELECT * FROM treatments WHERE patient_id = $1 ORDER BY started_at DESC LIMIT 1",
        )
        .bind(patient_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(treatment)
    }

    /// Most recently started active treatment of a patient
    pub async fn latest_active_for_patient(&self, patient_id: Uuid) -> DatabaseResult<Option<Treatment>> {
        let treatment = sqlx::query_as::<_, Treatment>(
            r#"
            SELECT * FROM treatments
            WHERE patient_id = $1 AND active
            ORDER BY started_at DESC
            LIMIT 1
            "#,
        )
        .bind(patient_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(treatment)
    }

    /// Active treatment of a patient/doctor pair, read inside the caller's transaction
    pub async fn active_for_pair(
        &self,
        conn: &mut PgConnection,
        patient_id: Uuid,
        doctor_id: Uuid,
    ) -> DatabaseResult<Option<Treatment>> {
        let treatment = sqlx::query_as::<_, Treatment>(
            r#"
            SELECT * FROM treatments
            WHERE patient_id = $1 AND doctor_id = $2 AND active
            ORDER BY started_at DESC
            LIMIT 1
            "#,
        )
        .bind(patient_id)
        .bind(doctor_id)
        .fetch_optional(conn)
        .await?;
        Ok(treatment)
    }

    pub async fn create(
        &self,
        conn: &mut PgConnection,
        patient_id: Uuid,
        doctor_id: Uuid,
        frequency_days: i32,
    ) -> DatabaseResult<Treatment> {
        let treatment = sqlx::query_as::<_, Treatment>(
            r#"
            INSERT INTO treatments (patient_id, doctor_id, frequency_days)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(patient_id)
        .bind(doctor_id)
        .bind(frequency_days)
        .fetch_one(conn)
        .await?;
        Ok(treatment)
    }

    pub async fn finish(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        reason: Option<&str>,
    ) -> DatabaseResult<Treatment> {
        let treatment = sqlx::query_as::<_, Treatment>(
            r#"
            UPDATE treatments
            SET active = FALSE, ended_at = NOW(), close_reason = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(reason)
        .fetch_one(conn)
        .await?;
        Ok(treatment)
    }

    /// Set the name only when the treatment has none yet
    pub async fn name_if_unnamed(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        name: &str,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE treatments SET name = $2, updated_at = NOW()
            WHERE id = $1 AND (name IS NULL OR name = '')
            "#,
        )
        .bind(id)
        .bind(name)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn activity(&self, treatment_id: Uuid) -> DatabaseResult<TreatmentActivity> {
        let activity = sqlx::query_as::<_, TreatmentActivity>(
            r#"
            SELECT
                (SELECT MAX(scheduled_at) FROM appointments
                 WHERE treatment_id = $1 AND attended) AS latest_attended,
                (SELECT MAX(scheduled_at) FROM appointments
                 WHERE treatment_id = $1) AS latest_any,
                (SELECT COUNT(*) FROM appointments
                 WHERE treatment_id = $1) AS total_appointments,
                (SELECT COUNT(*) FROM prescriptions pr
                 JOIN appointments a ON a.id = pr.appointment_id
                 WHERE a.treatment_id = $1) AS total_prescriptions
            "#,
        )
        .bind(treatment_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(activity)
    }
}
