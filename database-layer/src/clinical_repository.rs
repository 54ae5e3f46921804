use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, Pool, Postgres};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::DatabaseResult;
use crate::models::{ClinicalReport, MedicationLine, PaymentStatus, Prescription, Procedure, ReportStatus};
use crate::query::{Page, PageRequest, PaginatedQuery};

/// Shared list filter for reports, prescriptions and procedures
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
}

impl RecordFilter {
    fn apply(&self, query: &mut PaginatedQuery<'_>) {
        query
            .filter_eq("patient_id", self.patient_id)
            .filter_eq("doctor_id", self.doctor_id)
            .filter_eq("appointment_id", self.appointment_id);
    }
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub appointment_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub summary: String,
    pub diagnosis: Option<String>,
    pub recommendations: Option<String>,
    pub status: ReportStatus,
}

#[derive(Debug, Clone, Default)]
pub struct ReportChanges {
    pub summary: Option<String>,
    pub diagnosis: Option<String>,
    pub recommendations: Option<String>,
    pub status: Option<ReportStatus>,
}

#[derive(Debug, Clone)]
pub struct NewPrescription {
    pub appointment_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub general_instructions: Option<String>,
    pub notes: Option<String>,
    pub valid_until: Option<NaiveDate>,
    pub medications: Vec<MedicationLine>,
}

#[derive(Debug, Clone, Default)]
pub struct PrescriptionChanges {
    pub general_instructions: Option<String>,
    pub notes: Option<String>,
    pub valid_until: Option<NaiveDate>,
    /// Replaces every stored line when present
    pub medications: Option<Vec<MedicationLine>>,
}

/// Prescription with its medication lines
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PrescriptionDetail {
    #[serde(flatten)]
    pub prescription: Prescription,
    pub medications: Vec<MedicationLine>,
}

#[derive(Debug, Clone)]
pub struct NewProcedure {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub cost: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct ProcedureChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub cost: Option<Decimal>,
    pub payment_status: Option<PaymentStatus>,
}

#[derive(sqlx::FromRow)]
struct MedicationRow {
    prescription_id: Uuid,
    #[sqlx(flatten)]
    line: MedicationLine,
}

/// Repository for reports, prescriptions and in-visit procedures
#[derive(Debug, Clone)]
pub struct ClinicalRepository {
    pool: Pool<Postgres>,
}

impl ClinicalRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    // Reports

    pub async fn find_report(&self, id: Uuid) -> DatabaseResult<Option<ClinicalReport>> {
        let report = sqlx::query_as::<_, ClinicalReport>("SELECT * FROM clinical_reports WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(report)
    }

    pub async fn report_exists_for(&self, appointment_id: Uuid) -> DatabaseResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM clinical_reports WHERE appointment_id = $1)",
        )
        .bind(appointment_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn list_reports(
        &self,
        filter: RecordFilter,
        page: PageRequest,
    ) -> DatabaseResult<Page<ClinicalReport>> {
        let mut count = PaginatedQuery::new("SELECT COUNT(*) FROM clinical_reports WHERE 1=1");
        filter.apply(&mut count);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = PaginatedQuery::new("SELECT * FROM clinical_reports WHERE 1=1");
        filter.apply(&mut select);
        select.order_by("created_at DESC").paginate(page);
        let items = select.build_query_as::<ClinicalReport>().fetch_all(&self.pool).await?;

        Ok(Page { items, total, request: page })
    }

    pub async fn create_report(
        &self,
        conn: &mut PgConnection,
        report: &NewReport,
    ) -> DatabaseResult<ClinicalReport> {
        let created = sqlx::query_as::<_, ClinicalReport>(
            r#"
            INSERT INTO clinical_reports
                (appointment_id, patient_id, doctor_id, summary, diagnosis, recommendations, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(report.appointment_id)
        .bind(report.patient_id)
        .bind(report.doctor_id)
        .bind(&report.summary)
        .bind(report.diagnosis.as_deref())
        .bind(report.recommendations.as_deref())
        .bind(report.status)
        .fetch_one(conn)
        .await?;
        Ok(created)
    }

    pub async fn update_report(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        changes: &ReportChanges,
    ) -> DatabaseResult<ClinicalReport> {
        let updated = sqlx::query_as::<_, ClinicalReport>(
            r#"
            UPDATE clinical_reports SET
                summary = COALESCE($2, summary),
                diagnosis = COALESCE($3, diagnosis),
                recommendations = COALESCE($4, recommendations),
                status = COALESCE($5, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.summary.as_deref())
        .bind(changes.diagnosis.as_deref())
        .bind(changes.recommendations.as_deref())
        .bind(changes.status)
        .fetch_one(conn)
        .await?;
        Ok(updated)
    }

    pub async fn delete_report(&self, conn: &mut PgConnection, id: Uuid) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM clinical_reports WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Summary of the appointment's report, preferring a FINAL one
    pub async fn report_summary_for(
        &self,
        conn: &mut PgConnection,
        appointment_id: Uuid,
    ) -> DatabaseResult<Option<String>> {
        let summary = sqlx::query_scalar::<_, String>(
            r#"
            SELECT summary FROM clinical_reports
            WHERE appointment_id = $1 AND summary <> ''
            ORDER BY (status = 'FINAL') DESC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(appointment_id)
        .fetch_optional(conn)
        .await?;
        Ok(summary)
    }

    // Prescriptions

    pub async fn find_prescription(&self, id: Uuid) -> DatabaseResult<Option<PrescriptionDetail>> {
        let prescription = sqlx::query_as::<_, Prescription>("SELECT * FROM prescriptions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match prescription {
            Some(prescription) => {
                let mut lines = self.medications_for(&[prescription.id]).await?;
                let medications = lines.remove(&prescription.id).unwrap_or_default();
                Ok(Some(PrescriptionDetail { prescription, medications }))
            }
            None => Ok(None),
        }
    }

    pub async fn prescription_exists_for(&self, appointment_id: Uuid) -> DatabaseResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM prescriptions WHERE appointment_id = $1)",
        )
        .bind(appointment_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn list_prescriptions(
        &self,
        filter: RecordFilter,
        page: PageRequest,
    ) -> DatabaseResult<Page<PrescriptionDetail>> {
        let mut count = PaginatedQuery::new("SELECT COUNT(*) FROM prescriptions WHERE 1=1");
        filter.apply(&mut count);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = PaginatedQuery::new("SELECT * FROM prescriptions WHERE 1=1");
        filter.apply(&mut select);
        select.order_by("issued_at DESC").paginate(page);
        let prescriptions = select.build_query_as::<Prescription>().fetch_all(&self.pool).await?;

        let ids: Vec<Uuid> = prescriptions.iter().map(|p| p.id).collect();
        let mut lines = self.medications_for(&ids).await?;
        let items = prescriptions
            .into_iter()
            .map(|prescription| {
                let medications = lines.remove(&prescription.id).unwrap_or_default();
                PrescriptionDetail { prescription, medications }
            })
            .collect();

        Ok(Page { items, total, request: page })
    }

    async fn medications_for(&self, ids: &[Uuid]) -> DatabaseResult<HashMap<Uuid, Vec<MedicationLine>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, MedicationRow>(
            r#"
            SELECT prescription_id, name, dose, frequency, duration, route, notes
            FROM medication_lines
            WHERE prescription_id = ANY($1)
            ORDER BY prescription_id, position
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<MedicationLine>> = HashMap::new();
        for row in rows {
            grouped.entry(row.prescription_id).or_default().push(row.line);
        }
        Ok(grouped)
    }

    async fn replace_medications(
        conn: &mut PgConnection,
        prescription_id: Uuid,
        medications: &[MedicationLine],
    ) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM medication_lines WHERE prescription_id = $1")
            .bind(prescription_id)
            .execute(&mut *conn)
            .await?;

        for (position, line) in (0_i32..).zip(medications) {
            sqlx::query(
                r#"
                INSERT INTO medication_lines
                    (prescription_id, position, name, dose, frequency, duration, route, notes)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(prescription_id)
            .bind(position)
            .bind(&line.name)
            .bind(&line.dose)
            .bind(&line.frequency)
            .bind(&line.duration)
            .bind(line.route.as_deref())
            .bind(line.notes.as_deref())
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    pub async fn create_prescription(
        &self,
        conn: &mut PgConnection,
        prescription: &NewPrescription,
    ) -> DatabaseResult<PrescriptionDetail> {
        let created = sqlx::query_as::<_, Prescription>(
            r#"
            INSERT INTO prescriptions
                (appointment_id, patient_id, doctor_id, general_instructions, notes, valid_until)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(prescription.appointment_id)
        .bind(prescription.patient_id)
        .bind(prescription.doctor_id)
        .bind(prescription.general_instructions.as_deref())
        .bind(prescription.notes.as_deref())
        .bind(prescription.valid_until)
        .fetch_one(&mut *conn)
        .await?;

        Self::replace_medications(conn, created.id, &prescription.medications).await?;

        Ok(PrescriptionDetail {
            prescription: created,
            medications: prescription.medications.clone(),
        })
    }

    pub async fn update_prescription(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        changes: &PrescriptionChanges,
    ) -> DatabaseResult<Prescription> {
        let updated = sqlx::query_as::<_, Prescription>(
            r#"
            UPDATE prescriptions SET
                general_instructions = COALESCE($2, general_instructions),
                notes = COALESCE($3, notes),
                valid_until = COALESCE($4, valid_until),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.general_instructions.as_deref())
        .bind(changes.notes.as_deref())
        .bind(changes.valid_until)
        .fetch_one(&mut *conn)
        .await?;

        if let Some(medications) = &changes.medications {
            Self::replace_medications(conn, id, medications).await?;
        }
        Ok(updated)
    }

    pub async fn delete_prescription(&self, conn: &mut PgConnection, id: Uuid) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM prescriptions WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// (has FINAL report, has prescription) for an appointment
    pub async fn attendance_facts(
        &self,
        conn: &mut PgConnection,
        appointment_id: Uuid,
    ) -> DatabaseResult<(bool, bool)> {
        let facts = sqlx::query_as::<_, (bool, bool)>(
            r#"
            SELECT
                EXISTS (SELECT 1 FROM clinical_reports
                        WHERE appointment_id = $1 AND status = 'FINAL'),
                EXISTS (SELECT 1 FROM prescriptions WHERE appointment_id = $1)
            "#,
        )
        .bind(appointment_id)
        .fetch_one(conn)
        .await?;
        Ok(facts)
    }

    // Procedures

    pub async fn find_procedure(&self, id: Uuid) -> DatabaseResult<Option<Procedure>> {
        let procedure = sqlx::query_as::<_, Procedure>("SELECT * FROM procedures WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(procedure)
    }

    pub async fn list_procedures(
        &self,
        filter: RecordFilter,
        page: PageRequest,
    ) -> DatabaseResult<Page<Procedure>> {
        let mut count = PaginatedQuery::new("SELECT COUNT(*) FROM procedures WHERE 1=1");
        filter.apply(&mut count);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = PaginatedQuery::new("SELECT * FROM procedures WHERE 1=1");
        filter.apply(&mut select);
        select.order_by("created_at DESC").paginate(page);
        let items = select.build_query_as::<Procedure>().fetch_all(&self.pool).await?;

        Ok(Page { items, total, request: page })
    }

    /// Procedures of several appointments at once, oldest first
    pub async fn procedures_for(&self, appointment_ids: &[Uuid]) -> DatabaseResult<Vec<Procedure>> {
        if appointment_ids.is_empty() {
            return Ok(Vec::new());
        }

        let procedures = sqlx::query_as::<_, Procedure>(
            "SELECT * FROM procedures WHERE appointment_id = ANY($1) ORDER BY created_at ASC",
        )
        .bind(appointment_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(procedures)
    }

    pub async fn create_procedure(
        &self,
        conn: &mut PgConnection,
        procedure: &NewProcedure,
    ) -> DatabaseResult<Procedure> {
        let created = sqlx::query_as::<_, Procedure>(
            r#"
            INSERT INTO procedures (appointment_id, patient_id, doctor_id, name, description, cost)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(procedure.appointment_id)
        .bind(procedure.patient_id)
        .bind(procedure.doctor_id)
        .bind(&procedure.name)
        .bind(procedure.description.as_deref())
        .bind(procedure.cost)
        .fetch_one(conn)
        .await?;
        Ok(created)
    }

    pub async fn update_procedure(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        changes: &ProcedureChanges,
    ) -> DatabaseResult<Procedure> {
        let updated = sqlx::query_as::<_, Procedure>(
            r#"
            UPDATE procedures SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                cost = COALESCE($4, cost),
                payment_status = COALESCE($5, payment_status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.cost)
        .bind(changes.payment_status)
        .fetch_one(conn)
        .await?;
        Ok(updated)
    }

    pub async fn delete_procedure(&self, conn: &mut PgConnection, id: Uuid) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM procedures WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }
}
