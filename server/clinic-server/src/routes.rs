pub mod paths;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::{
    handlers::{appointments, auth, catalog, clinical, consents, health, payments, treatments, users},
    openapi,
    server::ClinicServer,
};

/// Create health check routes
pub fn health_routes() -> Router<ClinicServer> {
    Router::new()
        .route(paths::health::HEALTH, get(health::health_check))
        .route(paths::health::VERSION, get(health::version_info))
        .route(paths::health::STATUS, get(health::system_status))
}

/// Create authentication routes
pub fn auth_routes() -> Router<ClinicServer> {
    Router::new()
        .route(paths::auth::REGISTER, post(auth::register))
        .route(paths::auth::LOGIN, post(auth::login))
        .route(paths::auth::REFRESH, post(auth::refresh))
        .route(paths::auth::VERIFY, get(auth::verify))
        .route(paths::auth::LOGOUT, post(auth::logout))
}

/// Create account management routes
pub fn user_routes() -> Router<ClinicServer> {
    Router::new()
        .route(paths::auth::DASHBOARD, get(auth::dashboard))
        // Staff and patient accounts (admin)
        .route(paths::users::USERS, get(users::list_users).post(users::create_user))
        .route(
            paths::users::USER_BY_ID,
            get(users::get_user).patch(users::update_user).delete(users::delete_user),
        )
        // Patients
        .route(paths::users::PATIENTS, get(users::list_patients))
        .route(
            paths::users::PATIENT_BY_ID,
            get(users::get_patient).patch(users::update_patient).delete(users::delete_patient),
        )
        .route(paths::users::PATIENT_APPOINTMENTS, get(users::patient_appointments))
        .route(paths::users::SCREENING_RESULTS, get(users::screening_results))
}

/// Create specialty and schedule routes
pub fn catalog_routes() -> Router<ClinicServer> {
    Router::new()
        .route(paths::catalog::SPECIALTIES, get(catalog::list_specialties))
        .route(paths::catalog::SCHEDULES, post(catalog::create_schedule))
        .route(paths::catalog::AVAILABLE_SLOTS, get(catalog::available_slots))
}

/// Create appointment and consent routes
pub fn appointment_routes() -> Router<ClinicServer> {
    Router::new()
        .route(
            paths::appointments::APPOINTMENTS,
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route(paths::appointments::SUBSEQUENT_BY_PATIENT, post(appointments::request_subsequent))
        .route(paths::appointments::APPOINTMENT_BY_ID, get(appointments::get_appointment))
        .route(paths::appointments::CONFIRM, post(appointments::confirm_appointment))
        .route(paths::appointments::CANCEL, post(appointments::cancel_appointment))
        .route(paths::appointments::RESCHEDULE, patch(appointments::reschedule_appointment))
        .route(paths::appointments::SUBSEQUENT_BY_DOCTOR, post(appointments::schedule_subsequent))
        // Informed consent
        .route(paths::consents::CONSENT, get(consents::get_consent).post(consents::save_consent))
        .route(paths::consents::DOWNLOAD, get(consents::download_consent))
}

/// Create treatment routes
pub fn treatment_routes() -> Router<ClinicServer> {
    Router::new()
        .route(
            paths::treatments::CURRENT,
            get(treatments::current_treatment).patch(treatments::update_current_treatment),
        )
        .route(paths::treatments::FINISH, post(treatments::finish_treatment))
}

/// Create payment routes
pub fn payment_routes() -> Router<ClinicServer> {
    Router::new()
        .route(
            paths::payments::PAYMENTS,
            get(payments::list_payments).post(payments::create_transfer_payment),
        )
        .route(paths::payments::IN_OFFICE, post(payments::create_in_office_payment))
        .route(paths::payments::REVERT, post(payments::revert_payment))
}

/// Create clinical record routes
pub fn clinical_routes() -> Router<ClinicServer> {
    Router::new()
        // Reports
        .route(
            paths::clinical::REPORTS,
            get(clinical::list_reports).post(clinical::create_report),
        )
        .route(
            paths::clinical::REPORT_BY_ID,
            get(clinical::get_report)
                .patch(clinical::update_report)
                .delete(clinical::delete_report),
        )
        // Prescriptions
        .route(
            paths::clinical::PRESCRIPTIONS,
            get(clinical::list_prescriptions).post(clinical::create_prescription),
        )
        .route(
            paths::clinical::PRESCRIPTION_BY_ID,
            get(clinical::get_prescription)
                .patch(clinical::update_prescription)
                .delete(clinical::delete_prescription),
        )
        // Procedures
        .route(
            paths::clinical::PROCEDURES,
            get(clinical::list_procedures).post(clinical::create_procedure),
        )
        .route(
            paths::clinical::PROCEDURE_BY_ID,
            get(clinical::get_procedure)
                .patch(clinical::update_procedure)
                .delete(clinical::delete_procedure),
        )
}

/// Create API v1 routes
pub fn api_v1_routes() -> Router<ClinicServer> {
    Router::new()
        .nest(paths::auth::AUTH, auth_routes())
        .merge(user_routes())
        .merge(catalog_routes())
        .merge(appointment_routes())
        .merge(treatment_routes())
        .merge(payment_routes())
        .merge(clinical_routes())
}

/// Create all application routes
pub fn create_routes() -> Router<ClinicServer> {
    Router::new()
        // Health check routes (no authentication required)
        .merge(health_routes())
        // API documentation routes
        .merge(openapi::create_docs_routes())
        .nest(paths::API_V1, api_v1_routes())
}
