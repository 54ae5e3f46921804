use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use database_layer::{TransactionManager, Treatment};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{api_success, ApiError, ApiResponse, ApiResult};
use crate::handlers::{found, non_blank};
use crate::middleware::AuthContext;
use crate::server::ClinicServer;
use crate::services::treatment_plan::next_visit;

/// Treatment with its doctor and progress
#[derive(Debug, Serialize, ToSchema)]
pub struct TreatmentView {
    #[serde(flatten)]
    pub treatment: Treatment,
    #[schema(example = "Laura Méndez")]
    pub doctor_name: String,
    #[schema(example = "Dermatología")]
    pub doctor_specialty: Option<String>,
    pub total_appointments: i64,
    pub total_prescriptions: i64,
    /// Suggested follow-up date; absent once the treatment is finished
    pub next_visit: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct FinishTreatmentRequest {
    #[schema(example = "Lesion resolved")]
    pub reason: Option<String>,
}

async fn treatment_view(server: &ClinicServer, treatment: Treatment) -> ApiResult<TreatmentView> {
    let doctor = found(server.users.find_by_id(treatment.doctor_id).await, "Doctor")?;
    let doctor_specialty = match doctor.specialty_id {
        Some(specialty_id) => server.catalog.find_specialty(specialty_id).await?.map(|s| s.name),
        None => None,
    };
    let activity = server.treatments.activity(treatment.id).await?;

    Ok(TreatmentView {
        next_visit: next_visit(&treatment, &activity),
        doctor_name: doctor.full_name(),
        doctor_specialty,
        total_appointments: activity.total_appointments,
        total_prescriptions: activity.total_prescriptions,
        treatment,
    })
}

async fn current_view(server: &ClinicServer, auth: &AuthContext) -> ApiResult<TreatmentView> {
    auth.require_patient()?;
    let treatment = found(server.treatments.latest_for_patient(auth.user_id).await, "Treatment")?;
    treatment_view(server, treatment).await
}

/// Caller's most recent treatment
#[utoipa::path(
    get,
    path = "/api/v1/treatment",
    responses(
        (status = 200, description = "Current treatment", body = TreatmentView),
        (status = 403, description = "Patients only"),
        (status = 404, description = "No treatment yet")
    ),
    tag = "treatments",
    security(("bearer_auth" = []))
)]
pub async fn current_treatment(
    State(server): State<ClinicServer>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<TreatmentView>>, ApiError> {
    Ok(Json(api_success(current_view(&server, &auth).await?)))
}

/// Every exposed treatment field is read-only for patients; the body is ignored
#[utoipa::path(
    patch,
    path = "/api/v1/treatment",
    responses(
        (status = 200, description = "Unchanged current treatment", body = TreatmentView),
        (status = 403, description = "Patients only"),
        (status = 404, description = "No treatment yet")
    ),
    tag = "treatments",
    security(("bearer_auth" = []))
)]
pub async fn update_current_treatment(
    State(server): State<ClinicServer>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<TreatmentView>>, ApiError> {
    Ok(Json(api_success(current_view(&server, &auth).await?)))
}

/// Close a treatment
#[utoipa::path(
    post,
    path = "/api/v1/treatments/{id}/finish",
    params(("id" = Uuid, Path, description = "Treatment ID")),
    request_body = FinishTreatmentRequest,
    responses(
        (status = 200, description = "Treatment finished", body = TreatmentView),
        (status = 400, description = "Treatment already finished"),
        (status = 403, description = "Not the treating doctor or an administrator"),
        (status = 404, description = "Treatment not found")
    ),
    tag = "treatments",
    security(("bearer_auth" = []))
)]
pub async fn finish_treatment(
    State(server): State<ClinicServer>,
    Path(treatment_id): Path<Uuid>,
    auth: AuthContext,
    body: Option<Json<FinishTreatmentRequest>>,
) -> Result<Json<ApiResponse<TreatmentView>>, ApiError> {
    let treatment = found(server.treatments.find_by_id(treatment_id).await, "Treatment")?;
    if !auth.is_admin() && treatment.doctor_id != auth.user_id {
        return Err(ApiError::authorization("Only the treating doctor or an administrator can finish it"));
    }
    if !treatment.active {
        return Err(ApiError::bad_request("The treatment is already finished"));
    }

    let reason = body.and_then(|Json(req)| non_blank(req.reason));
    let mut tx = server.transactions.begin().await?;
    let finished = server
        .treatments
        .finish(&mut *tx, treatment.id, reason.as_deref())
        .await?;
    TransactionManager::commit(tx).await?;

    info!(treatment_id = %finished.id, by = %auth.user_id, "Treatment finished");
    Ok(Json(api_success(treatment_view(&server, finished).await?)))
}
