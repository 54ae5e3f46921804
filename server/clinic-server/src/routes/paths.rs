//! Centralized API route path constants
//!
//! utoipa `#[path(...)]` attributes need string literals, so handlers repeat
//! these paths with `{id}` placeholders. Keep both in sync.

/// API base path
pub const API_V1: &str = "/api/v1";

/// Health check endpoints
pub mod health {
    pub const HEALTH: &str = "/health";
    pub const VERSION: &str = "/version";
    pub const STATUS: &str = "/status";
}

/// Authentication endpoints, relative to `AUTH`
pub mod auth {
    pub const AUTH: &str = "/auth";
    pub const REGISTER: &str = "/register";
    pub const LOGIN: &str = "/login";
    pub const REFRESH: &str = "/refresh";
    pub const VERIFY: &str = "/verify";
    pub const LOGOUT: &str = "/logout";
    pub const DASHBOARD: &str = "/dashboard/:role";
}

/// Account management endpoints
pub mod users {
    pub const USERS: &str = "/users";
    pub const USER_BY_ID: &str = "/users/:id";
    pub const PATIENTS: &str = "/patients";
    pub const PATIENT_BY_ID: &str = "/patients/:id";
    pub const PATIENT_APPOINTMENTS: &str = "/patients/:id/appointments";
    pub const SCREENING_RESULTS: &str = "/screening/results";
}

/// Specialty and schedule endpoints
pub mod catalog {
    pub const SPECIALTIES: &str = "/specialties";
    pub const SCHEDULES: &str = "/schedules";
    pub const AVAILABLE_SLOTS: &str = "/schedules/available";
}

/// Appointment endpoints
pub mod appointments {
    pub const APPOINTMENTS: &str = "/appointments";
    pub const APPOINTMENT_BY_ID: &str = "/appointments/:id";
    pub const CONFIRM: &str = "/appointments/:id/confirm";
    pub const CANCEL: &str = "/appointments/:id/cancel";
    pub const RESCHEDULE: &str = "/appointments/:id/reschedule";
    pub const SUBSEQUENT_BY_DOCTOR: &str = "/appointments/:id/subsequent";
    pub const SUBSEQUENT_BY_PATIENT: &str = "/appointments/subsequent";
}

/// Treatment endpoints
pub mod treatments {
    pub const CURRENT: &str = "/treatment";
    pub const FINISH: &str = "/treatments/:id/finish";
}

/// Payment endpoints
pub mod payments {
    pub const PAYMENTS: &str = "/payments";
    pub const IN_OFFICE: &str = "/payments/in-office";
    pub const REVERT: &str = "/payments/:id/revert";
}

/// Clinical record endpoints
pub mod clinical {
    pub const REPORTS: &str = "/reports";
    pub const REPORT_BY_ID: &str = "/reports/:id";
    pub const PRESCRIPTIONS: &str = "/prescriptions";
    pub const PRESCRIPTION_BY_ID: &str = "/prescriptions/:id";
    pub const PROCEDURES: &str = "/procedures";
    pub const PROCEDURE_BY_ID: &str = "/procedures/:id";
}

/// Consent endpoints
pub mod consents {
    pub const CONSENT: &str = "/appointments/:id/consent";
    pub const DOWNLOAD: &str = "/appointments/:id/consent/download";
}
