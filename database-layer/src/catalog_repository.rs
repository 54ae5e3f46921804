use chrono::NaiveTime;
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::error::DatabaseResult;
use crate::models::{Schedule, Specialty};

#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub doctor_id: Uuid,
    pub specialty_id: Uuid,
    pub weekday: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Repository for specialties and weekly doctor schedules
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: Pool<Postgres>,
}

impl CatalogRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn list_specialties(&self) -> DatabaseResult<Vec<Specialty>> {
        let specialties = sqlx::query_as::<_, Specialty>(
            "SELECT id, code, name, description, requires_consent FROM specialties ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(specialties)
    }

    pub async fn find_specialty(&self, id: Uuid) -> DatabaseResult<Option<Specialty>> {
        let specialty = sqlx::query_as::<_, Specialty>(
            "SELECT id, code, name, description, requires_consent FROM specialties WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(specialty)
    }

    pub async fn create_schedule(
        &self,
        conn: &mut PgConnection,
        schedule: &NewSchedule,
    ) -> DatabaseResult<Schedule> {
        let created = sqlx::query_as::<_, Schedule>(
            r#"
            INSERT INTO schedules (doctor_id, specialty_id, weekday, start_time, end_time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, doctor_id, specialty_id, weekday, start_time, end_time
            "#,
        )
        .bind(schedule.doctor_id)
        .bind(schedule.specialty_id)
        .bind(schedule.weekday)
        .bind(schedule.start_time)
        .bind(schedule.end_time)
        .fetch_one(conn)
        .await?;
        Ok(created)
    }

    /// Schedules on an ISO weekday, optionally narrowed to a specialty and a doctor,
    /// ordered by start time
    pub async fn schedules_on(
        &self,
        weekday: i16,
        specialty_id: Option<Uuid>,
        doctor_id: Option<Uuid>,
    ) -> DatabaseResult<Vec<Schedule>> {
        let schedules = sqlx::query_as::<_, Schedule>(
            r#"
            SELECT id, doctor_id, specialty_id, weekday, start_time, end_time
            FROM schedules
            WHERE weekday = $1
              AND ($2::uuid IS NULL OR specialty_id = $2)
              AND ($3::uuid IS NULL OR doctor_id = $3)
            ORDER BY start_time ASC, doctor_id ASC
            "#,
        )
        .bind(weekday)
        .bind(specialty_id)
        .bind(doctor_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(schedules)
    }
}
