use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::error::DatabaseResult;
use crate::models::{
    Appointment, AppointmentDetail, AppointmentKind, AppointmentStatus, PaymentMethod,
};
use crate::query::{Page, PageRequest, PaginatedQuery};

const DETAIL_SELECT: &str = r#"
    SELECT a.*,
           (p.first_name || ' ' || p.last_name) AS patient_name,
           (d.first_name || ' ' || d.last_name) AS doctor_name,
           s.name AS specialty_name,
           s.requires_consent,
           t.active AS treatment_active
    FROM appointments a
    JOIN users p ON p.id = a.patient_id
    JOIN users d ON d.id = a.doctor_id
    JOIN specialties s ON s.id = a.specialty_id
    LEFT JOIN treatments t ON t.id = a.treatment_id
    WHERE 1=1"#;

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub specialty_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub kind: AppointmentKind,
    pub treatment_id: Option<Uuid>,
    pub preferred_payment_method: Option<PaymentMethod>,
    pub created_by: Uuid,
}

/// List filters; visibility restrictions are expressed as forced ids
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub specialty_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    pub until: Option<DateTime<Utc>>,
}

/// Repository for appointments
#[derive(Debug, Clone)]
pub struct AppointmentRepository {
    pool: Pool<Postgres>,
}

impl AppointmentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Appointment>> {
        let appointment = sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(appointment)
    }

    pub async fn find_detail(&self, id: Uuid) -> DatabaseResult<Option<AppointmentDetail>> {
        let sql = format!("{} AND a.id = $1", DETAIL_SELECT);
        let detail = sqlx::query_as::<_, AppointmentDetail>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(detail)
    }

    pub async fn list(
        &self,
        filter: AppointmentFilter,
        page: PageRequest,
    ) -> DatabaseResult<Page<AppointmentDetail>> {
        fn apply(query: &mut PaginatedQuery<'_>, filter: AppointmentFilter) {
            query
                .filter_eq("a.patient_id", filter.patient_id)
                .filter_eq("a.doctor_id", filter.doctor_id)
                .filter_eq("a.specialty_id", filter.specialty_id)
                .filter_eq("a.status", filter.status)
                .filter_gte("a.scheduled_at", filter.from)
                .filter_lt("a.scheduled_at", filter.until);
        }

        let mut count = PaginatedQuery::new("SELECT COUNT(*) FROM appointments a WHERE 1=1");
        apply(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = PaginatedQuery::new(DETAIL_SELECT);
        apply(&mut select, filter);
        select.order_by("a.scheduled_at ASC").paginate(page);
        let items = select
            .build_query_as::<AppointmentDetail>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page { items, total, request: page })
    }

    /// Non-cancelled bookings of the given doctors inside `[from, until)`
    pub async fn booked_slots(
        &self,
        doctor_ids: &[Uuid],
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> DatabaseResult<Vec<(Uuid, DateTime<Utc>)>> {
        let slots = sqlx::query_as::<_, (Uuid, DateTime<Utc>)>(
            r#"
            SELECT doctor_id, scheduled_at
            FROM appointments
            WHERE doctor_id = ANY($1)
              AND scheduled_at >= $2 AND scheduled_at < $3
              AND status <> 'CANCELLED'
            "#,
        )
        .bind(doctor_ids)
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;
        Ok(slots)
    }

    /// Whether the doctor already has a non-cancelled appointment at `at`
    pub async fn slot_taken(
        &self,
        doctor_id: Uuid,
        at: DateTime<Utc>,
        except: Option<Uuid>,
    ) -> DatabaseResult<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM appointments
                WHERE doctor_id = $1 AND scheduled_at = $2
                  AND status <> 'CANCELLED'
                  AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(doctor_id)
        .bind(at)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    /// Whether the treatment already has a SUBSEQUENT appointment that is not cancelled
    pub async fn open_subsequent_exists(&self, treatment_id: Uuid) -> DatabaseResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM appointments
                WHERE treatment_id = $1 AND kind = 'SUBSEQUENT' AND status <> 'CANCELLED'
            )
            "#,
        )
        .bind(treatment_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Earliest INITIAL appointment linked to the treatment
    pub async fn initial_for_treatment(&self, treatment_id: Uuid) -> DatabaseResult<Option<Appointment>> {
        let appointment = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT * FROM appointments
            WHERE treatment_id = $1 AND kind = 'INITIAL'
            ORDER BY scheduled_at ASC
            LIMIT 1
            "#,
        )
        .bind(treatment_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(appointment)
    }

    pub async fn create(
        &self,
        conn: &mut PgConnection,
        appointment: &NewAppointment,
    ) -> DatabaseResult<Appointment> {
        let created = sqlx::query_as::<_, Appointment>(
            r#"
            INSERT INTO appointments
                (patient_id, doctor_id, specialty_id, scheduled_at, kind, status,
                 treatment_id, preferred_payment_method, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, 'PENDING', $6, $7, $8, $8)
            RETURNING *
            "#,
        )
        .bind(appointment.patient_id)
        .bind(appointment.doctor_id)
        .bind(appointment.specialty_id)
        .bind(appointment.scheduled_at)
        .bind(appointment.kind)
        .bind(appointment.treatment_id)
        .bind(appointment.preferred_payment_method)
        .bind(appointment.created_by)
        .fetch_one(conn)
        .await?;
        Ok(created)
    }

    pub async fn set_status(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        status: AppointmentStatus,
        updated_by: Uuid,
    ) -> DatabaseResult<Appointment> {
        let updated = sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments
            SET status = $2, updated_by = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(updated_by)
        .fetch_one(conn)
        .await?;
        Ok(updated)
    }

    pub async fn reschedule(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        scheduled_at: DateTime<Utc>,
        updated_by: Uuid,
    ) -> DatabaseResult<Appointment> {
        let updated = sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments
            SET scheduled_at = $2, updated_by = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(scheduled_at)
        .bind(updated_by)
        .fetch_one(conn)
        .await?;
        Ok(updated)
    }

    pub async fn link_treatment(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        treatment_id: Uuid,
        updated_by: Uuid,
    ) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            UPDATE appointments
            SET treatment_id = $2, updated_by = $3, updated_at = NOW()
            WHERE id = $1 AND treatment_id IS DISTINCT FROM $2
            "#,
        )
        .bind(id)
        .bind(treatment_id)
        .bind(updated_by)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn set_attended(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        attended: bool,
    ) -> DatabaseResult<()> {
        sqlx::query("UPDATE appointments SET attended = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(attended)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn mark_consent_completed(&self, conn: &mut PgConnection, id: Uuid) -> DatabaseResult<()> {
        sqlx::query("UPDATE appointments SET consent_completed = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }
}
