use rust_decimal::Decimal;
use sqlx::{PgConnection, Pool, Postgres};
use tracing::debug;
use uuid::Uuid;

use crate::error::DatabaseResult;
use crate::models::{Role, Sex, User};
use crate::query::{Page, PageRequest, PaginatedQuery};

/// Fields of a new account; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub sex: Sex,
    pub weight_kg: Option<Decimal>,
    pub phone: String,
    pub role: Role,
    pub specialty_id: Option<Uuid>,
    pub password_hash: String,
}

/// Partial update; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
    pub sex: Option<Sex>,
    pub weight_kg: Option<Decimal>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub specialty_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub password_hash: Option<String>,
}

/// Which patients a caller may list
#[derive(Debug, Clone, Copy, Default)]
pub struct PatientScope {
    /// Only this patient (patients listing themselves)
    pub patient_id: Option<Uuid>,
    /// Only patients with at least one appointment with this doctor
    pub treated_by: Option<Uuid>,
}

/// Repository for user accounts
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: Pool<Postgres>,
}

impl UserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_by_phone(&self, phone: &str) -> DatabaseResult<Option<User>> {
        debug!(phone = %logger_redacted::redact_phone(phone), "Looking up user by phone");

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE phone = $1")
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Whether another account already uses this phone
    pub async fn phone_taken(&self, phone: &str, except: Option<Uuid>) -> DatabaseResult<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM users WHERE phone = $1 AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(phone)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    pub async fn create(&self, conn: &mut PgConnection, user: &NewUser) -> DatabaseResult<User> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users
                (first_name, last_name, age, sex, weight_kg, phone, role, specialty_id, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.age)
        .bind(user.sex)
        .bind(user.weight_kg)
        .bind(&user.phone)
        .bind(user.role)
        .bind(user.specialty_id)
        .bind(&user.password_hash)
        .fetch_one(conn)
        .await?;
        Ok(created)
    }

    pub async fn update(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        changes: &UserChanges,
    ) -> DatabaseResult<Option<User>> {
        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                age = COALESCE($4, age),
                sex = COALESCE($5, sex),
                weight_kg = COALESCE($6, weight_kg),
                phone = COALESCE($7, phone),
                role = COALESCE($8, role),
                specialty_id = COALESCE($9, specialty_id),
                is_active = COALESCE($10, is_active),
                password_hash = COALESCE($11, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.first_name.as_deref())
        .bind(changes.last_name.as_deref())
        .bind(changes.age)
        .bind(changes.sex)
        .bind(changes.weight_kg)
        .bind(changes.phone.as_deref())
        .bind(changes.role)
        .bind(changes.specialty_id)
        .bind(changes.is_active)
        .bind(changes.password_hash.as_deref())
        .fetch_optional(conn)
        .await?;
        Ok(updated)
    }

    pub async fn delete(&self, conn: &mut PgConnection, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All accounts ordered by role, last name, first name
    pub async fn list(&self, page: PageRequest) -> DatabaseResult<Page<User>> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        let items = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            ORDER BY role, last_name, first_name
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page { items, total, request: page })
    }

    /// Patient accounts visible within `scope`, ordered by last name, first name
    pub async fn list_patients(
        &self,
        scope: PatientScope,
        page: PageRequest,
    ) -> DatabaseResult<Page<User>> {
        fn apply(query: &mut PaginatedQuery<'_>, scope: PatientScope) {
            query.filter_eq("u.id", scope.patient_id);
            if let Some(doctor_id) = scope.treated_by {
                query.filter_raw(
                    "EXISTS (SELECT 1 FROM appointments a WHERE a.patient_id = u.id AND a.doctor_id = {})",
                    doctor_id,
                );
            }
        }

        let mut count = PaginatedQuery::new("SELECT COUNT(*) FROM users u WHERE u.role = 'PATIENT'");
        apply(&mut count, scope);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = PaginatedQuery::new("SELECT u.* FROM users u WHERE u.role = 'PATIENT'");
        apply(&mut select, scope);
        select.order_by("u.last_name, u.first_name").paginate(page);
        let items = select.build_query_as::<User>().fetch_all(&self.pool).await?;

        Ok(Page { items, total, request: page })
    }

    /// Whether the doctor has at least one appointment with the patient
    pub async fn treats_patient(&self, doctor_id: Uuid, patient_id: Uuid) -> DatabaseResult<bool> {
        let treats = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM appointments WHERE doctor_id = $1 AND patient_id = $2)",
        )
        .bind(doctor_id)
        .bind(patient_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(treats)
    }
}
