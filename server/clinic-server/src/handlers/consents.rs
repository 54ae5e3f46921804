//! Informed consent capture and PDF download

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use database_layer::{
    AppointmentDetail, AppointmentStatus, Consent, ConsentMedicalFields, ConsentSetting, Role, TransactionManager,
};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{api_success, ApiError, ApiResponse, ApiResult};
use crate::handlers::{found, non_blank, required};
use crate::middleware::AuthContext;
use crate::server::ClinicServer;
use crate::services::consent_pdf::{render_consent_pdf, ConsentDocument};
use crate::services::media::{decode_upload, signature_key};
use crate::services::scheduling::to_local;

/// Patients send their signature; doctors and administrators send the
/// medical content
#[derive(Debug, Default, Deserialize, ToSchema)]
#[schema(example = json!({
    "primary_diagnosis": "Onicomicosis en primer ortejo derecho",
    "proposed_procedure": "Avulsión química de la uña",
    "risks": "Dolor leve, infección local",
    "witness1_name": "María Torres"
}))]
pub struct SaveConsentRequest {
    /// Signature image, plain base64 or a `data:` URL
    pub signature_base64: Option<String>,
    pub signature_filename: Option<String>,
    pub primary_diagnosis: Option<String>,
    pub proposed_procedure: Option<String>,
    pub benefits: Option<String>,
    pub risks: Option<String>,
    pub alternatives: Option<String>,
    pub witness1_name: Option<String>,
    pub witness2_name: Option<String>,
}

impl SaveConsentRequest {
    fn medical_fields(&self) -> ConsentMedicalFields {
        ConsentMedicalFields {
            primary_diagnosis: non_blank(self.primary_diagnosis.clone()),
            proposed_procedure: non_blank(self.proposed_procedure.clone()),
            benefits: non_blank(self.benefits.clone()),
            risks: non_blank(self.risks.clone()),
            alternatives: non_blank(self.alternatives.clone()),
            witness1_name: non_blank(self.witness1_name.clone()),
            witness2_name: non_blank(self.witness2_name.clone()),
        }
    }
}

/// Appointment of a consent request, checked for specialty and participant
async fn consent_appointment(
    server: &ClinicServer,
    auth: &AuthContext,
    appointment_id: Uuid,
) -> ApiResult<AppointmentDetail> {
    let detail = found(server.appointments.find_detail(appointment_id).await, "Appointment")?;
    if !detail.requires_consent {
        return Err(ApiError::bad_request("This specialty does not require informed consent"));
    }
    let appointment = &detail.appointment;
    let participant =
        auth.is_admin() || appointment.patient_id == auth.user_id || appointment.doctor_id == auth.user_id;
    if !participant {
        return Err(ApiError::authorization("You do not have access to this consent"));
    }
    Ok(detail)
}

fn consent_setting(server: &ClinicServer, detail: &AppointmentDetail) -> ConsentSetting {
    let local = to_local(detail.appointment.scheduled_at, server.config.clinic_offset());
    ConsentSetting {
        place: server.config.clinic.consent_place.clone(),
        date: local.date_naive(),
        time: local.time(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/appointments/{id}/consent",
    params(("id" = Uuid, Path, description = "Appointment ID")),
    responses(
        (status = 200, description = "Consent of the appointment", body = Consent),
        (status = 400, description = "Specialty does not require consent"),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Appointment or consent not found")
    ),
    tag = "consent",
    security(("bearer_auth" = []))
)]
pub async fn get_consent(
    State(server): State<ClinicServer>,
    Path(appointment_id): Path<Uuid>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Consent>>, ApiError> {
    let detail = consent_appointment(&server, &auth, appointment_id).await?;
    let consent = found(server.consents.find_by_appointment(detail.appointment.id).await, "Consent")?;
    Ok(Json(api_success(consent)))
}

/// Create or complete the consent of a confirmed appointment
#[utoipa::path(
    post,
    path = "/api/v1/appointments/{id}/consent",
    params(("id" = Uuid, Path, description = "Appointment ID")),
    request_body = SaveConsentRequest,
    responses(
        (status = 200, description = "Consent updated", body = Consent),
        (status = 201, description = "Consent created", body = Consent),
        (status = 400, description = "Appointment not confirmed, missing signature or no fields given"),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Appointment not found")
    ),
    tag = "consent",
    security(("bearer_auth" = []))
)]
pub async fn save_consent(
    State(server): State<ClinicServer>,
    Path(appointment_id): Path<Uuid>,
    auth: AuthContext,
    Json(req): Json<SaveConsentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Consent>>), ApiError> {
    let detail = consent_appointment(&server, &auth, appointment_id).await?;
    if detail.appointment.status != AppointmentStatus::Confirmed {
        return Err(ApiError::bad_request("Consent can only be given for confirmed appointments"));
    }
    let setting = consent_setting(&server, &detail);
    let appointment_id = detail.appointment.id;

    let (consent, created) = if auth.role == Role::Patient {
        let raw = required(&req.signature_base64, "signature_base64")?;
        let upload = decode_upload(raw, req.signature_filename.as_deref(), "png")
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        let path = server
            .media
            .put(&signature_key(appointment_id, &upload.extension), upload.bytes)
            .await?;

        let mut tx = server.transactions.begin().await?;
        let saved = server
            .consents
            .save_signature(&mut *tx, appointment_id, &setting, &path)
            .await?;
        server.appointments.mark_consent_completed(&mut *tx, appointment_id).await?;
        TransactionManager::commit(tx).await?;

        info!(%appointment_id, "Consent signed by patient");
        saved
    } else {
        let fields = req.medical_fields();
        if fields.is_empty() {
            return Err(ApiError::bad_request("No consent fields were provided"));
        }

        let mut tx = server.transactions.begin().await?;
        let saved = server
            .consents
            .save_medical_fields(&mut *tx, appointment_id, &setting, &fields)
            .await?;
        TransactionManager::commit(tx).await?;

        info!(%appointment_id, by = %auth.user_id, "Consent medical fields saved");
        saved
    };

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(api_success(consent))))
}

/// Consent document as a PDF attachment
#[utoipa::path(
    get,
    path = "/api/v1/appointments/{id}/consent/download",
    params(("id" = Uuid, Path, description = "Appointment ID")),
    responses(
        (status = 200, description = "Consent PDF", content_type = "application/pdf", body = String),
        (status = 400, description = "Specialty does not require consent"),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Appointment or consent not found")
    ),
    tag = "consent",
    security(("bearer_auth" = []))
)]
pub async fn download_consent(
    State(server): State<ClinicServer>,
    Path(appointment_id): Path<Uuid>,
    auth: AuthContext,
) -> Result<impl IntoResponse, ApiError> {
    let detail = consent_appointment(&server, &auth, appointment_id).await?;
    let consent = found(server.consents.find_by_appointment(detail.appointment.id).await, "Consent")?;
    let patient = found(server.users.find_by_id(detail.appointment.patient_id).await, "Patient")?;

    let document = ConsentDocument {
        patient_name: patient.full_name(),
        patient_age: patient.age,
        patient_sex: patient.sex.label_es().to_string(),
        patient_phone: patient.phone,
        doctor_name: detail.doctor_name,
        specialty_name: Some(detail.specialty_name).filter(|name| !name.is_empty()),
        appointment_kind: detail.appointment.kind.label_es().to_string(),
        scheduled_at: to_local(detail.appointment.scheduled_at, server.config.clinic_offset()),
        primary_diagnosis: consent.primary_diagnosis,
        proposed_procedure: consent.proposed_procedure,
        benefits: consent.benefits,
        risks: consent.risks,
        alternatives: consent.alternatives,
        witness1_name: consent.witness1_name,
        witness2_name: consent.witness2_name,
        place: consent.place,
        date: consent.consent_date,
        time: consent.consent_time,
        signed: consent.patient_signature_path.is_some(),
    };

    let bytes = tokio::task::spawn_blocking(move || render_consent_pdf(&document))
        .await
        .map_err(|e| ApiError::internal(format!("Consent rendering task failed: {}", e)))??;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        ConsentDocument::file_name(detail.appointment.id)
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_medical_fields_count_as_missing() {
        let req = SaveConsentRequest {
            risks: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(req.medical_fields().is_empty());

        let req = SaveConsentRequest {
            witness2_name: Some("Pedro Ruiz".to_string()),
            ..Default::default()
        };
        assert_eq!(req.medical_fields().witness2_name.as_deref(), Some("Pedro Ruiz"));
    }
}
