// Database models
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Patient,
    Dermatologist,
    Podiatrist,
    Screening,
    Admin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Patient,
        Role::Dermatologist,
        Role::Podiatrist,
        Role::Screening,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "PATIENT",
            Role::Dermatologist => "DERMATOLOGIST",
            Role::Podiatrist => "PODIATRIST",
            Role::Screening => "SCREENING",
            Role::Admin => "ADMIN",
        }
    }

    /// Case-insensitive lookup by wire name
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(value.trim()))
    }

    pub fn is_clinician(&self) -> bool {
        matches!(self, Role::Dermatologist | Role::Podiatrist | Role::Screening)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Roles allowed to publish weekly schedules
    pub fn can_publish_schedule(&self) -> bool {
        matches!(self, Role::Admin | Role::Dermatologist | Role::Podiatrist)
    }

    /// Lowercase path segment used by dashboard redirects
    pub fn slug(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_sex", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl Sex {
    /// Label printed on consent documents
    pub fn label_es(&self) -> &'static str {
        match self {
            Sex::Male => "Masculino",
            Sex::Female => "Femenino",
            Sex::Other => "Otro",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "appointment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl AppointmentStatus {
    /// Parse a list filter value: a full status name or its one-letter code (P, C, X)
    pub fn from_filter(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_uppercase();
        match value.as_str() {
            "PENDING" | "P" => Some(AppointmentStatus::Pending),
            "CONFIRMED" | "C" => Some(AppointmentStatus::Confirmed),
            "CANCELLED" | "CANCELED" | "X" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "appointment_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentKind {
    Initial,
    Subsequent,
}

impl AppointmentKind {
    pub fn label_es(&self) -> &'static str {
        match self {
            AppointmentKind::Initial => "Primera vez",
            AppointmentKind::Subsequent => "Subsecuente",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_method", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Transfer,
    InOffice,
}

impl PaymentMethod {
    /// Case-insensitive lookup; `in-office` and `in office` are accepted
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_uppercase().replace(&['-', ' '][..], "_");
        match normalized.as_str() {
            "TRANSFER" => Some(PaymentMethod::Transfer),
            "IN_OFFICE" => Some(PaymentMethod::InOffice),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(PaymentStatus::Pending),
            "APPROVED" => Some(PaymentStatus::Approved),
            "REJECTED" => Some(PaymentStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "report_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Draft,
    #[default]
    Final,
}

/// User account row, including the password hash
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub sex: Sex,
    pub weight_kg: Option<Decimal>,
    pub phone: String,
    pub role: Role,
    pub specialty_id: Option<Uuid>,
    pub is_active: bool,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Public account view
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub sex: Sex,
    #[schema(value_type = Option<String>)]
    pub weight_kg: Option<Decimal>,
    pub phone: String,
    pub role: Role,
    pub specialty_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            age: user.age,
            sex: user.sex,
            weight_kg: user.weight_kg,
            phone: user.phone,
            role: user.role,
            specialty_id: user.specialty_id,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Specialty {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: String,
    pub requires_consent: bool,
}

/// Weekly availability window of a doctor
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Schedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub specialty_id: Uuid,
    /// ISO weekday, 1 = Monday .. 6 = Saturday
    pub weekday: i16,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "10:00:00")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Treatment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub name: Option<String>,
    pub description: Option<String>,
    pub frequency_days: i32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub close_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub specialty_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub kind: AppointmentKind,
    pub status: AppointmentStatus,
    pub treatment_id: Option<Uuid>,
    pub consent_completed: bool,
    pub attended: bool,
    pub preferred_payment_method: Option<PaymentMethod>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Appointment joined with participant names, specialty and treatment state
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AppointmentDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient_name: String,
    pub doctor_name: String,
    pub specialty_name: String,
    pub requires_consent: bool,
    /// `None` when no treatment is linked
    pub treatment_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ClinicalReport {
    pub id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub summary: String,
    pub diagnosis: Option<String>,
    pub recommendations: Option<String>,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Prescription {
    pub id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub general_instructions: Option<String>,
    pub notes: Option<String>,
    pub issued_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = Date)]
    pub valid_until: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct MedicationLine {
    pub name: String,
    pub dose: String,
    pub frequency: String,
    pub duration: String,
    pub route: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Procedure {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "350.00")]
    pub cost: Decimal,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Consent {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub primary_diagnosis: Option<String>,
    pub proposed_procedure: Option<String>,
    pub benefits: Option<String>,
    pub risks: Option<String>,
    pub alternatives: Option<String>,
    pub witness1_name: Option<String>,
    pub witness2_name: Option<String>,
    pub place: String,
    #[schema(value_type = String, format = Date)]
    pub consent_date: NaiveDate,
    #[schema(value_type = String, example = "10:30:00")]
    pub consent_time: NaiveTime,
    pub patient_signature_path: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("dermatologist"), Some(Role::Dermatologist));
        assert_eq!(Role::parse(" Admin "), Some(Role::Admin));
        assert_eq!(Role::parse("nurse"), None);
    }

    #[test]
    fn test_clinician_roles() {
        assert!(Role::Screening.is_clinician());
        assert!(!Role::Admin.is_clinician());
        assert!(!Role::Patient.is_clinician());
        assert!(!Role::Screening.can_publish_schedule());
        assert!(Role::Podiatrist.can_publish_schedule());
    }

    #[test]
    fn test_status_filter_accepts_codes_and_names() {
        assert_eq!(AppointmentStatus::from_filter("p"), Some(AppointmentStatus::Pending));
        assert_eq!(AppointmentStatus::from_filter("C"), Some(AppointmentStatus::Confirmed));
        assert_eq!(AppointmentStatus::from_filter("x"), Some(AppointmentStatus::Cancelled));
        assert_eq!(AppointmentStatus::from_filter("cancelled"), Some(AppointmentStatus::Cancelled));
        assert_eq!(AppointmentStatus::from_filter("done"), None);
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!(PaymentMethod::parse("transfer"), Some(PaymentMethod::Transfer));
        assert_eq!(PaymentMethod::parse("in-office"), Some(PaymentMethod::InOffice));
        assert_eq!(PaymentMethod::parse("IN_OFFICE"), Some(PaymentMethod::InOffice));
        assert_eq!(PaymentMethod::parse("cash"), None);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&PaymentMethod::InOffice).unwrap(), "\"IN_OFFICE\"");
        assert_eq!(serde_json::to_string(&ReportStatus::default()).unwrap(), "\"FINAL\"");
        assert_eq!(Role::Podiatrist.slug(), "podiatrist");
    }
}
