use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::server::ClinicServer;

/// Main OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health endpoints
        crate::handlers::health::health_check,
        crate::handlers::health::version_info,
        crate::handlers::health::system_status,

        // Authentication endpoints
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::refresh,
        crate::handlers::auth::verify,
        crate::handlers::auth::logout,
        crate::handlers::auth::dashboard,

        // Accounts
        crate::handlers::users::create_user,
        crate::handlers::users::list_users,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::users::list_patients,
        crate::handlers::users::get_patient,
        crate::handlers::users::update_patient,
        crate::handlers::users::delete_patient,
        crate::handlers::users::patient_appointments,
        crate::handlers::users::screening_results,

        // Catalog
        crate::handlers::catalog::list_specialties,
        crate::handlers::catalog::create_schedule,
        crate::handlers::catalog::available_slots,

        // Appointments
        crate::handlers::appointments::list_appointments,
        crate::handlers::appointments::create_appointment,
        crate::handlers::appointments::get_appointment,
        crate::handlers::appointments::confirm_appointment,
        crate::handlers::appointments::cancel_appointment,
        crate::handlers::appointments::reschedule_appointment,
        crate::handlers::appointments::schedule_subsequent,
        crate::handlers::appointments::request_subsequent,

        // Treatments
        crate::handlers::treatments::current_treatment,
        crate::handlers::treatments::update_current_treatment,
        crate::handlers::treatments::finish_treatment,

        // Payments
        crate::handlers::payments::create_transfer_payment,
        crate::handlers::payments::create_in_office_payment,
        crate::handlers::payments::revert_payment,
        crate::handlers::payments::list_payments,

        // Clinical records
        crate::handlers::clinical::list_reports,
        crate::handlers::clinical::create_report,
        crate::handlers::clinical::get_report,
        crate::handlers::clinical::update_report,
        crate::handlers::clinical::delete_report,
        crate::handlers::clinical::list_prescriptions,
        crate::handlers::clinical::create_prescription,
        crate::handlers::clinical::get_prescription,
        crate::handlers::clinical::update_prescription,
        crate::handlers::clinical::delete_prescription,
        crate::handlers::clinical::list_procedures,
        crate::handlers::clinical::create_procedure,
        crate::handlers::clinical::get_procedure,
        crate::handlers::clinical::update_procedure,
        crate::handlers::clinical::delete_procedure,

        // Consent
        crate::handlers::consents::get_consent,
        crate::handlers::consents::save_consent,
        crate::handlers::consents::download_consent,
    ),
    components(
        schemas(
            // Envelope
            crate::error::ApiErrorResponse,
            crate::error::ResponseMetadata,
            crate::error::PaginationInfo,

            // Health schemas
            crate::handlers::health::HealthResponse,
            crate::handlers::health::VersionResponse,
            crate::handlers::health::StatusResponse,

            // Authentication schemas
            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::RegisterResponse,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::LoginResponse,
            crate::handlers::auth::RefreshRequest,
            crate::handlers::auth::RefreshResponse,
            crate::handlers::auth::DetailResponse,
            crate::handlers::auth::DashboardResponse,

            // Account schemas
            crate::handlers::users::CreateUserRequest,
            crate::handlers::users::UpdateUserRequest,
            database_layer::UserProfile,
            database_layer::Role,
            database_layer::Sex,

            // Catalog schemas
            crate::handlers::catalog::CreateScheduleRequest,
            crate::handlers::catalog::AvailableSlotsResponse,
            database_layer::Specialty,
            database_layer::Schedule,

            // Appointment schemas
            crate::handlers::appointments::AppointmentView,
            crate::handlers::appointments::CreateAppointmentRequest,
            crate::handlers::appointments::ConfirmAppointmentRequest,
            crate::handlers::appointments::RescheduleRequest,
            crate::handlers::appointments::ScheduleSubsequentRequest,
            crate::handlers::appointments::AppointmentActionResponse,
            database_layer::Appointment,
            database_layer::AppointmentDetail,
            database_layer::AppointmentStatus,
            database_layer::AppointmentKind,

            // Treatment schemas
            crate::handlers::treatments::TreatmentView,
            crate::handlers::treatments::FinishTreatmentRequest,
            database_layer::Treatment,

            // Payment schemas
            crate::handlers::payments::TransferPaymentRequest,
            crate::handlers::payments::InOfficePaymentRequest,
            crate::handlers::payments::RevertPaymentRequest,
            billing_service::Payment,
            database_layer::PaymentMethod,
            database_layer::PaymentStatus,

            // Clinical schemas
            crate::handlers::clinical::CreateReportRequest,
            crate::handlers::clinical::UpdateReportRequest,
            crate::handlers::clinical::CreatePrescriptionRequest,
            crate::handlers::clinical::UpdatePrescriptionRequest,
            crate::handlers::clinical::CreateProcedureRequest,
            crate::handlers::clinical::UpdateProcedureRequest,
            database_layer::ClinicalReport,
            database_layer::ReportStatus,
            database_layer::Prescription,
            database_layer::PrescriptionDetail,
            database_layer::MedicationLine,
            database_layer::Procedure,

            // Consent schemas
            crate::handlers::consents::SaveConsentRequest,
            database_layer::Consent,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "System health and status endpoints"),
        (name = "authentication", description = "Registration, login and tokens"),
        (name = "users", description = "Staff and patient accounts"),
        (name = "catalog", description = "Specialties, doctor schedules and free slots"),
        (name = "appointments", description = "Booking and appointment lifecycle"),
        (name = "treatments", description = "Recurring care between a patient and a doctor"),
        (name = "payments", description = "Transfers, in-office payments and reversals"),
        (name = "clinical", description = "Reports, prescriptions and procedures"),
        (name = "consent", description = "Informed consent capture and PDF"),
    ),
    info(
        title = "Clinic Engine API",
        version = "0.1.0",
        description = "Scheduling, billing and clinical records for a dermatology and podiatry clinic.",
        contact(
            name = "Clinic Engine Team",
            email = "team@clinic-engine.dev",
        ),
    ),
)]
pub struct ApiDoc;

/// Registers the bearer JWT scheme referenced by `security(("bearer_auth" = []))`
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Swagger UI and the raw OpenAPI document
pub fn create_docs_routes() -> Router<ClinicServer> {
    Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_clinic_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/v1/auth/login",
            "/api/v1/appointments/{id}/confirm",
            "/api/v1/appointments/subsequent",
            "/api/v1/payments/in-office",
            "/api/v1/appointments/{id}/consent/download",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing path {}", path);
        }
    }

    #[test]
    fn test_bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
