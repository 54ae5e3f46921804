//! Clinical reports, prescriptions and in-visit procedures
//!
//! Reports and prescriptions drive the attended flag of their appointment,
//! so every change to them refreshes it in the same transaction.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use database_layer::{
    ClinicalReport, MedicationLine, NewPrescription, NewProcedure, NewReport, PaymentStatus, PrescriptionChanges,
    PrescriptionDetail, Procedure, ProcedureChanges, RecordFilter, ReportChanges, ReportStatus, Role,
    TransactionManager,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{api_paginated, api_success, ApiError, ApiResponse, ApiResult};
use crate::handlers::{found, non_blank};
use crate::middleware::AuthContext;
use crate::server::ClinicServer;
use crate::services::attendance::{name_active_treatment, refresh_attended};
use crate::types::pagination::page_request;
use crate::validation::RequestValidation;
use crate::validate_required;

#[derive(Debug, Deserialize, IntoParams)]
pub struct RecordQuery {
    pub patient_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    #[param(minimum = 1)]
    pub page: Option<u32>,
    #[param(minimum = 1, maximum = 100)]
    pub page_size: Option<u32>,
}

impl RecordQuery {
    /// Requested filters narrowed to what the caller may see
    fn visible_to(&self, auth: &AuthContext) -> RecordFilter {
        let mut filter = RecordFilter {
            patient_id: self.patient_id,
            doctor_id: None,
            appointment_id: self.appointment_id,
        };
        match auth.role {
            Role::Admin => {}
            Role::Patient => filter.patient_id = Some(auth.user_id),
            _ => filter.doctor_id = Some(auth.user_id),
        }
        filter
    }
}

/// What the caller may do with a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordAccess {
    Read,
    Full,
}

fn record_access(auth: &AuthContext, patient_id: Uuid, doctor_id: Uuid) -> ApiResult<RecordAccess> {
    if auth.is_admin() || (auth.is_clinician() && doctor_id == auth.user_id) {
        Ok(RecordAccess::Full)
    } else if auth.is_patient() && patient_id == auth.user_id {
        Ok(RecordAccess::Read)
    } else {
        Err(ApiError::authorization("You do not have access to this record"))
    }
}

fn require_full(access: RecordAccess) -> ApiResult<()> {
    match access {
        RecordAccess::Full => Ok(()),
        RecordAccess::Read => Err(ApiError::authorization("Patients can only read their records")),
    }
}

/// Check the patient and appointment of a new record and resolve its doctor
async fn resolve_author(
    server: &ClinicServer,
    auth: &AuthContext,
    patient_id: Uuid,
    appointment_id: Option<Uuid>,
    doctor_id: Option<Uuid>,
) -> ApiResult<Uuid> {
    auth.require_staff()?;

    let doctor_id = if auth.is_admin() {
        let doctor_id = doctor_id.ok_or_else(|| ApiError::validation("'doctor_id' is required for administrators"))?;
        let doctor = found(server.users.find_by_id(doctor_id).await, "Doctor")?;
        if !doctor.role.is_clinician() {
            return Err(ApiError::validation("'doctor_id' must reference a clinician"));
        }
        doctor_id
    } else {
        auth.user_id
    };

    let patient = found(server.users.find_by_id(patient_id).await, "Patient")?;
    if patient.role != Role::Patient {
        return Err(ApiError::validation("'patient_id' must reference a patient"));
    }

    if let Some(appointment_id) = appointment_id {
        let appointment = found(server.appointments.find_by_id(appointment_id).await, "Appointment")?;
        if appointment.patient_id != patient_id {
            return Err(ApiError::validation("The appointment does not belong to this patient"));
        }
    }

    Ok(doctor_id)
}

async fn refresh_if_linked(
    conn: &mut sqlx::PgConnection,
    server: &ClinicServer,
    appointment_id: Option<Uuid>,
) -> ApiResult<()> {
    if let Some(appointment_id) = appointment_id {
        refresh_attended(conn, &server.clinical, &server.appointments, appointment_id).await?;
    }
    Ok(())
}

// Reports

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "patient_id": "8a3f0c1e-6d2b-4f7a-9e1c-2b3d4e5f6a7b",
    "appointment_id": "5b0e4b7e-2c43-4a3e-9a57-0d5f7c1e2a11",
    "summary": "Dermatitis atópica en antebrazos",
    "diagnosis": "Dermatitis atópica moderada",
    "status": "FINAL"
}))]
pub struct CreateReportRequest {
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    /// Required when the caller is an administrator
    pub doctor_id: Option<Uuid>,
    pub summary: String,
    pub diagnosis: Option<String>,
    pub recommendations: Option<String>,
    /// Defaults to FINAL
    pub status: Option<ReportStatus>,
}

impl RequestValidation for CreateReportRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.summary, "Summary is required");
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateReportRequest {
    pub summary: Option<String>,
    pub diagnosis: Option<String>,
    pub recommendations: Option<String>,
    pub status: Option<ReportStatus>,
}

impl RequestValidation for UpdateReportRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(summary) = &self.summary {
            validate_required!(summary, "Summary cannot be blank");
        }
        Ok(())
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/reports",
    params(RecordQuery),
    responses((status = 200, description = "Reports visible to the caller", body = Vec<ClinicalReport>)),
    tag = "clinical",
    security(("bearer_auth" = []))
)]
pub async fn list_reports(
    State(server): State<ClinicServer>,
    Query(query): Query<RecordQuery>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<ClinicalReport>>>, ApiError> {
    let page = server
        .clinical
        .list_reports(query.visible_to(&auth), page_request(query.page, query.page_size))
        .await?;
    Ok(Json(api_paginated(page)))
}

#[utoipa::path(
    post,
    path = "/api/v1/reports",
    request_body = CreateReportRequest,
    responses(
        (status = 201, description = "Report created", body = ClinicalReport),
        (status = 400, description = "Invalid report"),
        (status = 403, description = "Clinicians and administrators only"),
        (status = 409, description = "The appointment already has a report")
    ),
    tag = "clinical",
    security(("bearer_auth" = []))
)]
pub async fn create_report(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    Json(req): Json<CreateReportRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ClinicalReport>>), ApiError> {
    auth.require_staff()?;
    req.validate()?;
    let doctor_id = resolve_author(&server, &auth, req.patient_id, req.appointment_id, req.doctor_id).await?;
    if let Some(appointment_id) = req.appointment_id {
        if server.clinical.report_exists_for(appointment_id).await? {
            return Err(ApiError::conflict("The appointment already has a clinical report"));
        }
    }

    let report = NewReport {
        appointment_id: req.appointment_id,
        patient_id: req.patient_id,
        doctor_id,
        summary: req.summary.trim().to_string(),
        diagnosis: non_blank(req.diagnosis),
        recommendations: non_blank(req.recommendations),
        status: req.status.unwrap_or_default(),
    };

    let mut tx = server.transactions.begin().await?;
    let created = server.clinical.create_report(&mut *tx, &report).await?;
    refresh_if_linked(&mut *tx, &server, created.appointment_id).await?;
    name_active_treatment(&mut *tx, &server.treatments, created.patient_id, created.doctor_id, &created.summary)
        .await?;
    TransactionManager::commit(tx).await?;

    info!(report_id = %created.id, doctor_id = %created.doctor_id, status = ?created.status, "Clinical report created");
    Ok((StatusCode::CREATED, Json(api_success(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/{id}",
    params(("id" = Uuid, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report", body = ClinicalReport),
        (status = 403, description = "No access to this report"),
        (status = 404, description = "Report not found")
    ),
    tag = "clinical",
    security(("bearer_auth" = []))
)]
pub async fn get_report(
    State(server): State<ClinicServer>,
    Path(report_id): Path<Uuid>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<ClinicalReport>>, ApiError> {
    let report = found(server.clinical.find_report(report_id).await, "Report")?;
    record_access(&auth, report.patient_id, report.doctor_id)?;
    Ok(Json(api_success(report)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/reports/{id}",
    params(("id" = Uuid, Path, description = "Report ID")),
    request_body = UpdateReportRequest,
    responses(
        (status = 200, description = "Report updated", body = ClinicalReport),
        (status = 403, description = "Only the author or an administrator can edit"),
        (status = 404, description = "Report not found")
    ),
    tag = "clinical",
    security(("bearer_auth" = []))
)]
pub async fn update_report(
    State(server): State<ClinicServer>,
    Path(report_id): Path<Uuid>,
    auth: AuthContext,
    Json(req): Json<UpdateReportRequest>,
) -> Result<Json<ApiResponse<ClinicalReport>>, ApiError> {
    req.validate()?;
    let report = found(server.clinical.find_report(report_id).await, "Report")?;
    require_full(record_access(&auth, report.patient_id, report.doctor_id)?)?;

    let changes = ReportChanges {
        summary: req.summary.map(|s| s.trim().to_string()),
        diagnosis: req.diagnosis,
        recommendations: req.recommendations,
        status: req.status,
    };

    let mut tx = server.transactions.begin().await?;
    let updated = server.clinical.update_report(&mut *tx, report.id, &changes).await?;
    refresh_if_linked(&mut *tx, &server, updated.appointment_id).await?;
    name_active_treatment(&mut *tx, &server.treatments, updated.patient_id, updated.doctor_id, &updated.summary)
        .await?;
    TransactionManager::commit(tx).await?;

    Ok(Json(api_success(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/reports/{id}",
    params(("id" = Uuid, Path, description = "Report ID")),
    responses(
        (status = 204, description = "Report deleted"),
        (status = 400, description = "Final reports cannot be deleted"),
        (status = 403, description = "Only the author or an administrator can delete"),
        (status = 404, description = "Report not found")
    ),
    tag = "clinical",
    security(("bearer_auth" = []))
)]
pub async fn delete_report(
    State(server): State<ClinicServer>,
    Path(report_id): Path<Uuid>,
    auth: AuthContext,
) -> Result<StatusCode, ApiError> {
    let report = found(server.clinical.find_report(report_id).await, "Report")?;
    require_full(record_access(&auth, report.patient_id, report.doctor_id)?)?;
    if report.status == ReportStatus::Final {
        return Err(ApiError::bad_request("Final reports cannot be deleted"));
    }

    let mut tx = server.transactions.begin().await?;
    server.clinical.delete_report(&mut *tx, report.id).await?;
    refresh_if_linked(&mut *tx, &server, report.appointment_id).await?;
    TransactionManager::commit(tx).await?;

    info!(report_id = %report.id, by = %auth.user_id, "Clinical report deleted");
    Ok(StatusCode::NO_CONTENT)
}

// Prescriptions

fn check_medications(lines: &[MedicationLine]) -> ApiResult<()> {
    for line in lines {
        let complete = [&line.name, &line.dose, &line.frequency, &line.duration]
            .iter()
            .all(|value| !value.trim().is_empty());
        if !complete {
            return Err(ApiError::validation(
                "Each medication needs a name, dose, frequency and duration",
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "patient_id": "8a3f0c1e-6d2b-4f7a-9e1c-2b3d4e5f6a7b",
    "appointment_id": "5b0e4b7e-2c43-4a3e-9a57-0d5f7c1e2a11",
    "general_instructions": "Aplicar después del baño",
    "valid_until": "2025-04-30",
    "medications": [
        {"name": "Hidrocortisona 1%", "dose": "capa fina", "frequency": "cada 12 h", "duration": "14 días", "route": "tópica"}
    ]
}))]
pub struct CreatePrescriptionRequest {
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    /// Required when the caller is an administrator
    pub doctor_id: Option<Uuid>,
    pub general_instructions: Option<String>,
    pub notes: Option<String>,
    #[schema(value_type = Option<String>, format = Date)]
    pub valid_until: Option<NaiveDate>,
    #[serde(default)]
    pub medications: Vec<MedicationLine>,
}

impl RequestValidation for CreatePrescriptionRequest {
    fn validate(&self) -> Result<(), ApiError> {
        check_medications(&self.medications)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdatePrescriptionRequest {
    pub general_instructions: Option<String>,
    pub notes: Option<String>,
    #[schema(value_type = Option<String>, format = Date)]
    pub valid_until: Option<NaiveDate>,
    /// Replaces all medication lines when present
    pub medications: Option<Vec<MedicationLine>>,
}

impl RequestValidation for UpdatePrescriptionRequest {
    fn validate(&self) -> Result<(), ApiError> {
        match &self.medications {
            Some(lines) => check_medications(lines),
            None => Ok(()),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/prescriptions",
    params(RecordQuery),
    responses((status = 200, description = "Prescriptions visible to the caller", body = Vec<PrescriptionDetail>)),
    tag = "clinical",
    security(("bearer_auth" = []))
)]
pub async fn list_prescriptions(
    State(server): State<ClinicServer>,
    Query(query): Query<RecordQuery>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<PrescriptionDetail>>>, ApiError> {
    let page = server
        .clinical
        .list_prescriptions(query.visible_to(&auth), page_request(query.page, query.page_size))
        .await?;
    Ok(Json(api_paginated(page)))
}

#[utoipa::path(
    post,
    path = "/api/v1/prescriptions",
    request_body = CreatePrescriptionRequest,
    responses(
        (status = 201, description = "Prescription issued", body = PrescriptionDetail),
        (status = 400, description = "Invalid prescription"),
        (status = 403, description = "Clinicians and administrators only"),
        (status = 409, description = "The appointment already has a prescription")
    ),
    tag = "clinical",
    security(("bearer_auth" = []))
)]
pub async fn create_prescription(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    Json(req): Json<CreatePrescriptionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PrescriptionDetail>>), ApiError> {
    auth.require_staff()?;
    req.validate()?;
    let doctor_id = resolve_author(&server, &auth, req.patient_id, req.appointment_id, req.doctor_id).await?;
    if let Some(appointment_id) = req.appointment_id {
        if server.clinical.prescription_exists_for(appointment_id).await? {
            return Err(ApiError::conflict("The appointment already has a prescription"));
        }
    }

    let prescription = NewPrescription {
        appointment_id: req.appointment_id,
        patient_id: req.patient_id,
        doctor_id,
        general_instructions: non_blank(req.general_instructions),
        notes: non_blank(req.notes),
        valid_until: req.valid_until,
        medications: req.medications,
    };

    let mut tx = server.transactions.begin().await?;
    let created = server.clinical.create_prescription(&mut *tx, &prescription).await?;
    refresh_if_linked(&mut *tx, &server, created.prescription.appointment_id).await?;
    TransactionManager::commit(tx).await?;

    info!(
        prescription_id = %created.prescription.id,
        medications = created.medications.len(),
        "Prescription issued"
    );
    Ok((StatusCode::CREATED, Json(api_success(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/prescriptions/{id}",
    params(("id" = Uuid, Path, description = "Prescription ID")),
    responses(
        (status = 200, description = "Prescription", body = PrescriptionDetail),
        (status = 403, description = "No access to this prescription"),
        (status = 404, description = "Prescription not found")
    ),
    tag = "clinical",
    security(("bearer_auth" = []))
)]
pub async fn get_prescription(
    State(server): State<ClinicServer>,
    Path(prescription_id): Path<Uuid>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<PrescriptionDetail>>, ApiError> {
    let detail = found(server.clinical.find_prescription(prescription_id).await, "Prescription")?;
    record_access(&auth, detail.prescription.patient_id, detail.prescription.doctor_id)?;
    Ok(Json(api_success(detail)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/prescriptions/{id}",
    params(("id" = Uuid, Path, description = "Prescription ID")),
    request_body = UpdatePrescriptionRequest,
    responses(
        (status = 200, description = "Prescription updated", body = PrescriptionDetail),
        (status = 403, description = "Only the author or an administrator can edit"),
        (status = 404, description = "Prescription not found")
    ),
    tag = "clinical",
    security(("bearer_auth" = []))
)]
pub async fn update_prescription(
    State(server): State<ClinicServer>,
    Path(prescription_id): Path<Uuid>,
    auth: AuthContext,
    Json(req): Json<UpdatePrescriptionRequest>,
) -> Result<Json<ApiResponse<PrescriptionDetail>>, ApiError> {
    req.validate()?;
    let current = found(server.clinical.find_prescription(prescription_id).await, "Prescription")?;
    let prescription = &current.prescription;
    require_full(record_access(&auth, prescription.patient_id, prescription.doctor_id)?)?;

    let changes = PrescriptionChanges {
        general_instructions: req.general_instructions,
        notes: req.notes,
        valid_until: req.valid_until,
        medications: req.medications,
    };

    let mut tx = server.transactions.begin().await?;
    let updated = server
        .clinical
        .update_prescription(&mut *tx, prescription.id, &changes)
        .await?;
    refresh_if_linked(&mut *tx, &server, updated.appointment_id).await?;
    TransactionManager::commit(tx).await?;

    let detail = found(server.clinical.find_prescription(updated.id).await, "Prescription")?;
    Ok(Json(api_success(detail)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/prescriptions/{id}",
    params(("id" = Uuid, Path, description = "Prescription ID")),
    responses(
        (status = 204, description = "Prescription deleted"),
        (status = 403, description = "Only the author or an administrator can delete"),
        (status = 404, description = "Prescription not found")
    ),
    tag = "clinical",
    security(("bearer_auth" = []))
)]
pub async fn delete_prescription(
    State(server): State<ClinicServer>,
    Path(prescription_id): Path<Uuid>,
    auth: AuthContext,
) -> Result<StatusCode, ApiError> {
    let detail = found(server.clinical.find_prescription(prescription_id).await, "Prescription")?;
    let prescription = detail.prescription;
    require_full(record_access(&auth, prescription.patient_id, prescription.doctor_id)?)?;

    let mut tx = server.transactions.begin().await?;
    server.clinical.delete_prescription(&mut *tx, prescription.id).await?;
    refresh_if_linked(&mut *tx, &server, prescription.appointment_id).await?;
    TransactionManager::commit(tx).await?;

    info!(prescription_id = %prescription.id, by = %auth.user_id, "Prescription deleted");
    Ok(StatusCode::NO_CONTENT)
}

// Procedures

fn check_cost(cost: Option<Decimal>) -> ApiResult<()> {
    match cost {
        Some(cost) if cost < Decimal::ZERO => Err(ApiError::validation("Cost cannot be negative")),
        _ => Ok(()),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "appointment_id": "5b0e4b7e-2c43-4a3e-9a57-0d5f7c1e2a11",
    "name": "Crioterapia",
    "cost": "350.00"
}))]
pub struct CreateProcedureRequest {
    pub appointment_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Defaults to 0
    #[schema(value_type = Option<String>)]
    pub cost: Option<Decimal>,
}

impl RequestValidation for CreateProcedureRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_required!(self.name, "Procedure name is required");
        check_cost(self.cost)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProcedureRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub cost: Option<Decimal>,
    /// `PENDING`, `APPROVED` or `REJECTED`
    pub payment_status: Option<String>,
}

impl UpdateProcedureRequest {
    fn into_changes(self) -> ApiResult<ProcedureChanges> {
        if let Some(name) = &self.name {
            validate_required!(name, "Procedure name cannot be blank");
        }
        check_cost(self.cost)?;
        let payment_status = match self.payment_status.as_deref() {
            Some(raw) => Some(
                PaymentStatus::parse(raw)
                    .ok_or_else(|| ApiError::validation(format!("Unknown payment status '{}'", raw.trim())))?,
            ),
            None => None,
        };
        Ok(ProcedureChanges {
            name: self.name.map(|n| n.trim().to_string()),
            description: self.description,
            cost: self.cost,
            payment_status,
        })
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/procedures",
    params(RecordQuery),
    responses((status = 200, description = "Procedures visible to the caller", body = Vec<Procedure>)),
    tag = "clinical",
    security(("bearer_auth" = []))
)]
pub async fn list_procedures(
    State(server): State<ClinicServer>,
    Query(query): Query<RecordQuery>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<Procedure>>>, ApiError> {
    let page = server
        .clinical
        .list_procedures(query.visible_to(&auth), page_request(query.page, query.page_size))
        .await?;
    Ok(Json(api_paginated(page)))
}

#[utoipa::path(
    post,
    path = "/api/v1/procedures",
    request_body = CreateProcedureRequest,
    responses(
        (status = 201, description = "Procedure recorded", body = Procedure),
        (status = 400, description = "Invalid procedure"),
        (status = 403, description = "Not the appointment's doctor or an administrator"),
        (status = 404, description = "Appointment not found")
    ),
    tag = "clinical",
    security(("bearer_auth" = []))
)]
pub async fn create_procedure(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    Json(req): Json<CreateProcedureRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Procedure>>), ApiError> {
    auth.require_staff()?;
    req.validate()?;

    let appointment = found(server.appointments.find_by_id(req.appointment_id).await, "Appointment")?;
    if !auth.is_admin() && appointment.doctor_id != auth.user_id {
        return Err(ApiError::authorization("You can only record procedures for your own appointments"));
    }

    let procedure = NewProcedure {
        appointment_id: appointment.id,
        patient_id: appointment.patient_id,
        doctor_id: appointment.doctor_id,
        name: req.name.trim().to_string(),
        description: non_blank(req.description),
        cost: req.cost.unwrap_or(Decimal::ZERO),
    };

    let mut tx = server.transactions.begin().await?;
    let created = server.clinical.create_procedure(&mut *tx, &procedure).await?;
    TransactionManager::commit(tx).await?;

    info!(procedure_id = %created.id, appointment_id = %created.appointment_id, "Procedure recorded");
    Ok((StatusCode::CREATED, Json(api_success(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/procedures/{id}",
    params(("id" = Uuid, Path, description = "Procedure ID")),
    responses(
        (status = 200, description = "Procedure", body = Procedure),
        (status = 403, description = "No access to this procedure"),
        (status = 404, description = "Procedure not found")
    ),
    tag = "clinical",
    security(("bearer_auth" = []))
)]
pub async fn get_procedure(
    State(server): State<ClinicServer>,
    Path(procedure_id): Path<Uuid>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Procedure>>, ApiError> {
    let procedure = found(server.clinical.find_procedure(procedure_id).await, "Procedure")?;
    record_access(&auth, procedure.patient_id, procedure.doctor_id)?;
    Ok(Json(api_success(procedure)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/procedures/{id}",
    params(("id" = Uuid, Path, description = "Procedure ID")),
    request_body = UpdateProcedureRequest,
    responses(
        (status = 200, description = "Procedure updated", body = Procedure),
        (status = 400, description = "Invalid changes"),
        (status = 403, description = "Only the doctor or an administrator can edit"),
        (status = 404, description = "Procedure not found")
    ),
    tag = "clinical",
    security(("bearer_auth" = []))
)]
pub async fn update_procedure(
    State(server): State<ClinicServer>,
    Path(procedure_id): Path<Uuid>,
    auth: AuthContext,
    Json(req): Json<UpdateProcedureRequest>,
) -> Result<Json<ApiResponse<Procedure>>, ApiError> {
    let changes = req.into_changes()?;
    let procedure = found(server.clinical.find_procedure(procedure_id).await, "Procedure")?;
    require_full(record_access(&auth, procedure.patient_id, procedure.doctor_id)?)?;

    let mut tx = server.transactions.begin().await?;
    let updated = server.clinical.update_procedure(&mut *tx, procedure.id, &changes).await?;
    TransactionManager::commit(tx).await?;

    Ok(Json(api_success(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/procedures/{id}",
    params(("id" = Uuid, Path, description = "Procedure ID")),
    responses(
        (status = 204, description = "Procedure deleted"),
        (status = 403, description = "Only the doctor or an administrator can delete"),
        (status = 404, description = "Procedure not found")
    ),
    tag = "clinical",
    security(("bearer_auth" = []))
)]
pub async fn delete_procedure(
    State(server): State<ClinicServer>,
    Path(procedure_id): Path<Uuid>,
    auth: AuthContext,
) -> Result<StatusCode, ApiError> {
    let procedure = found(server.clinical.find_procedure(procedure_id).await, "Procedure")?;
    require_full(record_access(&auth, procedure.patient_id, procedure.doctor_id)?)?;

    let mut tx = server.transactions.begin().await?;
    server.clinical.delete_procedure(&mut *tx, procedure.id).await?;
    TransactionManager::commit(tx).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn line(name: &str, dose: &str) -> MedicationLine {
        MedicationLine {
            name: name.to_string(),
            dose: dose.to_string(),
            frequency: "cada 8 h".to_string(),
            duration: "7 días".to_string(),
            route: None,
            notes: None,
        }
    }

    #[test]
    fn test_record_access_by_role() {
        let patient = Uuid::new_v4();
        let doctor = Uuid::new_v4();

        let admin = AuthContext::new(Uuid::new_v4(), Role::Admin);
        assert_eq!(record_access(&admin, patient, doctor).unwrap(), RecordAccess::Full);

        let author = AuthContext::new(doctor, Role::Dermatologist);
        assert_eq!(record_access(&author, patient, doctor).unwrap(), RecordAccess::Full);

        let owner = AuthContext::new(patient, Role::Patient);
        assert_eq!(record_access(&owner, patient, doctor).unwrap(), RecordAccess::Read);
        assert!(require_full(RecordAccess::Read).is_err());

        let other_doctor = AuthContext::new(Uuid::new_v4(), Role::Podiatrist);
        assert!(record_access(&other_doctor, patient, doctor).is_err());
    }

    #[test]
    fn test_visibility_overrides_requested_filters() {
        let query = RecordQuery {
            patient_id: Some(Uuid::new_v4()),
            appointment_id: None,
            page: None,
            page_size: None,
        };

        let me = Uuid::new_v4();
        let filter = query.visible_to(&AuthContext::new(me, Role::Patient));
        assert_eq!(filter.patient_id, Some(me));

        let filter = query.visible_to(&AuthContext::new(me, Role::Screening));
        assert_eq!(filter.doctor_id, Some(me));
        assert_eq!(filter.patient_id, query.patient_id);
    }

    #[test]
    fn test_medication_lines_must_be_complete() {
        assert!(check_medications(&[line("Cetirizina", "10 mg")]).is_ok());
        assert!(check_medications(&[line("Cetirizina", " ")]).is_err());
        assert!(check_medications(&[]).is_ok());
    }

    #[test]
    fn test_procedure_cost_and_status() {
        assert!(check_cost(Some(Decimal::from_str("-0.01").unwrap())).is_err());
        assert!(check_cost(Some(Decimal::ZERO)).is_ok());

        let changes = UpdateProcedureRequest {
            payment_status: Some("approved".to_string()),
            ..Default::default()
        }
        .into_changes()
        .unwrap();
        assert_eq!(changes.payment_status, Some(PaymentStatus::Approved));

        let invalid = UpdateProcedureRequest {
            payment_status: Some("PAID".to_string()),
            ..Default::default()
        };
        assert!(invalid.into_changes().is_err());
    }

    #[test]
    fn test_report_summary_required() {
        let req = CreateReportRequest {
            patient_id: Uuid::new_v4(),
            appointment_id: None,
            doctor_id: None,
            summary: "   ".to_string(),
            diagnosis: None,
            recommendations: None,
            status: None,
        };
        assert!(req.validate().is_err());
    }
}
