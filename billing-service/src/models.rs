use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub use database_layer::{PaymentMethod, PaymentStatus};

/// Payment recorded against an appointment
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub appointment_id: Uuid,
    #[schema(value_type = String, example = "900.00")]
    pub total: Decimal,
    #[schema(value_type = String, example = "0.00")]
    pub paid: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
    pub verified: bool,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub receipt_path: Option<String>,
    pub reversed: bool,
    pub reversal_reason: Option<String>,
    pub reversed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Amount still owed
    pub fn outstanding(&self) -> Decimal {
        self.total - self.paid
    }

    /// Not reversed and still pending or approved
    pub fn is_open(&self) -> bool {
        !self.reversed && matches!(self.status, PaymentStatus::Pending | PaymentStatus::Approved)
    }
}

/// Values of a payment about to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDraft {
    pub patient_id: Uuid,
    pub appointment_id: Uuid,
    pub total: Decimal,
    pub paid: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
    pub verified: bool,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub receipt_path: Option<String>,
}

impl PaymentDraft {
    /// Patient-uploaded bank transfer awaiting verification
    pub fn transfer(patient_id: Uuid, appointment_id: Uuid, total: Decimal, receipt_path: String) -> Self {
        Self {
            patient_id,
            appointment_id,
            total,
            paid: Decimal::ZERO,
            paid_at: None,
            verified: false,
            method: PaymentMethod::Transfer,
            status: PaymentStatus::Pending,
            receipt_path: Some(receipt_path),
        }
    }

    /// Charge collected at the clinic, approved on the spot
    pub fn in_office(patient_id: Uuid, appointment_id: Uuid, total: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            patient_id,
            appointment_id,
            total,
            paid: total,
            paid_at: Some(now),
            verified: true,
            method: PaymentMethod::InOffice,
            status: PaymentStatus::Approved,
            receipt_path: None,
        }
    }
}
