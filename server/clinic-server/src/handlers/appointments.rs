//! Appointment booking and lifecycle endpoints
//!
//! Slot checks run against the doctor schedules in clinic local time. Every
//! mutation that touches more than one row runs in a single transaction; the
//! partial unique indexes on appointments back the slot and follow-up checks
//! when two requests race.

use std::collections::{HashMap, HashSet};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use billing_service::Payment;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use database_layer::{
    Appointment, AppointmentDetail, AppointmentFilter, AppointmentKind, AppointmentStatus, NewAppointment, Page,
    PaymentMethod, Procedure, Role, TransactionManager,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{api_paginated, api_success, ApiError, ApiResponse, ApiResult};
use crate::handlers::{found, parse_date, parse_datetime, required};
use crate::middleware::AuthContext;
use crate::server::ClinicServer;
use crate::services::appointment_rules::{
    check_admin_cancel, check_confirmed, check_future, check_patient_cancel, check_pending, check_reschedulable,
    patient_can_cancel, patient_can_reschedule, ConfirmAction,
};
use crate::services::scheduling::{any_covering, first_free_covering, iso_weekday, local_day_bounds, to_local, SUNDAY};
use crate::services::treatment_plan::{follow_up_frequency, name_from_summary, next_visit, CONFIRMATION_FREQUENCY_DAYS};
use crate::types::pagination::page_request;

/// Appointment with its payments, procedures and what the caller may still do
#[derive(Debug, Serialize, ToSchema)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub detail: AppointmentDetail,
    pub payments: Vec<Payment>,
    pub procedures: Vec<Procedure>,
    /// Only ever true for the owning patient
    pub patient_can_reschedule: bool,
    pub patient_can_cancel: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListAppointmentsQuery {
    /// `P`, `C`, `X` or the full status name
    #[param(example = "P")]
    pub status: Option<String>,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub specialty_id: Option<Uuid>,
    /// Local date, `YYYY-MM-DD`; malformed values are ignored
    pub date_from: Option<String>,
    /// Local date, `YYYY-MM-DD`, inclusive; malformed values are ignored
    pub date_to: Option<String>,
    #[param(minimum = 1)]
    pub page: Option<u32>,
    #[param(minimum = 1, maximum = 100)]
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "specialty_id": "3f1c2a9e-8d1b-4c55-9d8e-2f4b6a7c9e10",
    "scheduled_at": "2025-03-03T09:00:00-06:00",
    "preferred_payment_method": "TRANSFER"
}))]
pub struct CreateAppointmentRequest {
    pub specialty_id: Option<Uuid>,
    /// RFC 3339, or a naive timestamp read as clinic local time
    pub scheduled_at: Option<String>,
    /// `TRANSFER` or `IN_OFFICE`, case-insensitive
    pub preferred_payment_method: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmAppointmentRequest {
    /// `confirm` or `cancel`
    #[schema(example = "confirm")]
    pub action: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RescheduleRequest {
    pub scheduled_at: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ScheduleSubsequentRequest {
    pub scheduled_at: Option<String>,
    /// Days between visits when a treatment has to be created; defaults to 30
    #[schema(value_type = Option<i32>, example = 30)]
    pub frequency_days: Option<serde_json::Value>,
}

/// Outcome of a status change
#[derive(Debug, Serialize, ToSchema)]
pub struct AppointmentActionResponse {
    #[schema(example = "Appointment confirmed")]
    pub detail: String,
    pub status: AppointmentStatus,
    /// Whether a payment was settled by the confirmation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_payment: Option<bool>,
}

fn is_participant(auth: &AuthContext, appointment: &Appointment) -> bool {
    auth.is_admin() || appointment.patient_id == auth.user_id || appointment.doctor_id == auth.user_id
}

fn ensure_participant(auth: &AuthContext, appointment: &Appointment) -> ApiResult<()> {
    if is_participant(auth, appointment) {
        Ok(())
    } else {
        Err(ApiError::authorization("You do not have access to this appointment"))
    }
}

fn ensure_doctor_or_admin(auth: &AuthContext, appointment: &Appointment) -> ApiResult<()> {
    if auth.is_admin() || appointment.doctor_id == auth.user_id {
        Ok(())
    } else {
        Err(ApiError::authorization("Only the appointment's doctor or an administrator can do this"))
    }
}

/// Attach payments, procedures and the patient flags to appointment rows
async fn build_views(
    server: &ClinicServer,
    auth: &AuthContext,
    details: Vec<AppointmentDetail>,
) -> ApiResult<Vec<AppointmentView>> {
    let ids: Vec<Uuid> = details.iter().map(|d| d.appointment.id).collect();

    let mut payments: HashMap<Uuid, Vec<Payment>> = HashMap::new();
    for payment in server.billing.payments().for_appointments(&ids).await? {
        payments.entry(payment.appointment_id).or_default().push(payment);
    }
    let mut procedures: HashMap<Uuid, Vec<Procedure>> = HashMap::new();
    for procedure in server.clinical.procedures_for(&ids).await? {
        procedures.entry(procedure.appointment_id).or_default().push(procedure);
    }

    let now = Utc::now();
    let offset = server.config.clinic_offset();

    Ok(details
        .into_iter()
        .map(|detail| {
            let id = detail.appointment.id;
            let owner = detail.appointment.patient_id == auth.user_id;
            AppointmentView {
                patient_can_reschedule: owner
                    && patient_can_reschedule(&detail.appointment, detail.treatment_active, now),
                patient_can_cancel: owner && patient_can_cancel(&detail.appointment, now, offset),
                payments: payments.remove(&id).unwrap_or_default(),
                procedures: procedures.remove(&id).unwrap_or_default(),
                detail,
            }
        })
        .collect())
}

async fn view_of(server: &ClinicServer, auth: &AuthContext, appointment_id: Uuid) -> ApiResult<AppointmentView> {
    let detail = found(server.appointments.find_detail(appointment_id).await, "Appointment")?;
    build_views(server, auth, vec![detail])
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found("Appointment"))
}

/// Schedules of `doctor` (and `specialty`) on the local weekday of `at`
/// must cover its local time
async fn ensure_covered(
    server: &ClinicServer,
    at: DateTime<Utc>,
    offset: FixedOffset,
    specialty_id: Option<Uuid>,
    doctor_id: Uuid,
) -> ApiResult<()> {
    let weekday = iso_weekday(to_local(at, offset).date_naive());
    let covered = weekday != SUNDAY && {
        let schedules = server.catalog.schedules_on(weekday, specialty_id, Some(doctor_id)).await?;
        any_covering(&schedules, at, offset)
    };
    if covered {
        Ok(())
    } else {
        Err(ApiError::bad_request("The doctor has no schedule covering that date and time"))
    }
}

async fn ensure_slot_free(
    server: &ClinicServer,
    doctor_id: Uuid,
    at: DateTime<Utc>,
    except: Option<Uuid>,
) -> ApiResult<()> {
    if server.appointments.slot_taken(doctor_id, at, except).await? {
        Err(ApiError::conflict("The doctor already has an appointment at that time"))
    } else {
        Ok(())
    }
}

/// List appointments visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/appointments",
    params(ListAppointmentsQuery),
    responses(
        (status = 200, description = "Appointments ordered by date", body = Vec<AppointmentView>),
        (status = 400, description = "Unknown status filter")
    ),
    tag = "appointments",
    security(("bearer_auth" = []))
)]
pub async fn list_appointments(
    State(server): State<ClinicServer>,
    Query(query): Query<ListAppointmentsQuery>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<AppointmentView>>>, ApiError> {
    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            AppointmentStatus::from_filter(raw)
                .ok_or_else(|| ApiError::bad_request(format!("Unknown status filter '{}'", raw)))?,
        ),
        None => None,
    };

    let offset = server.config.clinic_offset();
    let bounds = |raw: &Option<String>| {
        raw.as_deref()
            .and_then(parse_date)
            .and_then(|date| local_day_bounds(date, offset))
    };

    let mut filter = AppointmentFilter {
        patient_id: query.patient_id,
        doctor_id: query.doctor_id,
        specialty_id: query.specialty_id,
        status,
        from: bounds(&query.date_from).map(|(start, _)| start),
        until: bounds(&query.date_to).map(|(_, end)| end),
    };
    match auth.role {
        Role::Admin => {}
        Role::Patient => filter.patient_id = Some(auth.user_id),
        _ => filter.doctor_id = Some(auth.user_id),
    }

    let page = server
        .appointments
        .list(filter, page_request(query.page, query.page_size))
        .await?;
    let items = build_views(&server, &auth, page.items).await?;

    Ok(Json(api_paginated(Page {
        items,
        total: page.total,
        request: page.request,
    })))
}

/// Book an initial appointment
#[utoipa::path(
    post,
    path = "/api/v1/appointments",
    request_body = CreateAppointmentRequest,
    responses(
        (status = 201, description = "Appointment booked as PENDING", body = AppointmentView),
        (status = 400, description = "Missing fields, past time or no slot available"),
        (status = 403, description = "Patients only"),
        (status = 409, description = "The slot was taken concurrently")
    ),
    tag = "appointments",
    security(("bearer_auth" = []))
)]
pub async fn create_appointment(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AppointmentView>>), ApiError> {
    auth.require_patient()?;
    let specialty_id = req
        .specialty_id
        .ok_or_else(|| ApiError::validation("'specialty_id' is required"))?;
    let offset = server.config.clinic_offset();
    let at = parse_datetime(required(&req.scheduled_at, "scheduled_at")?, offset, "scheduled_at")?;
    let preferred_payment_method = req
        .preferred_payment_method
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| {
            PaymentMethod::parse(m).ok_or_else(|| ApiError::bad_request(format!("Invalid payment method '{}'", m)))
        })
        .transpose()?;
    check_future(at, Utc::now())?;

    found(server.catalog.find_specialty(specialty_id).await, "Specialty")?;

    let no_slots = || ApiError::bad_request("No slots available for the selected date and time");
    let weekday = iso_weekday(to_local(at, offset).date_naive());
    if weekday == SUNDAY {
        return Err(no_slots());
    }
    let schedules = server.catalog.schedules_on(weekday, Some(specialty_id), None).await?;
    let doctors: Vec<Uuid> = schedules.iter().map(|s| s.doctor_id).collect();
    let busy: HashSet<Uuid> = server
        .appointments
        .booked_slots(&doctors, at, at + Duration::seconds(1))
        .await?
        .into_iter()
        .filter(|(_, booked_at)| *booked_at == at)
        .map(|(doctor_id, _)| doctor_id)
        .collect();
    let schedule = first_free_covering(&schedules, at, offset, |doctor_id| busy.contains(&doctor_id))
        .ok_or_else(no_slots)?;

    let new_appointment = NewAppointment {
        patient_id: auth.user_id,
        doctor_id: schedule.doctor_id,
        specialty_id,
        scheduled_at: at,
        kind: AppointmentKind::Initial,
        treatment_id: None,
        preferred_payment_method,
        created_by: auth.user_id,
    };

    let mut tx = server.transactions.begin().await?;
    let appointment = server.appointments.create(&mut *tx, &new_appointment).await?;
    TransactionManager::commit(tx).await?;

    info!(
        appointment_id = %appointment.id,
        doctor_id = %appointment.doctor_id,
        scheduled_at = %appointment.scheduled_at,
        "Appointment booked"
    );
    let view = view_of(&server, &auth, appointment.id).await?;
    Ok((StatusCode::CREATED, Json(api_success(view))))
}

#[utoipa::path(
    get,
    path = "/api/v1/appointments/{id}",
    params(("id" = Uuid, Path, description = "Appointment ID")),
    responses(
        (status = 200, description = "Appointment", body = AppointmentView),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Appointment not found")
    ),
    tag = "appointments",
    security(("bearer_auth" = []))
)]
pub async fn get_appointment(
    State(server): State<ClinicServer>,
    Path(appointment_id): Path<Uuid>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<AppointmentView>>, ApiError> {
    let view = view_of(&server, &auth, appointment_id).await?;
    ensure_participant(&auth, &view.detail.appointment)?;
    Ok(Json(api_success(view)))
}

/// Doctor decision on a pending appointment
#[utoipa::path(
    post,
    path = "/api/v1/appointments/{id}/confirm",
    params(("id" = Uuid, Path, description = "Appointment ID")),
    request_body = ConfirmAppointmentRequest,
    responses(
        (status = 200, description = "Appointment confirmed or cancelled", body = AppointmentActionResponse),
        (status = 400, description = "Unknown action or appointment already processed"),
        (status = 403, description = "Not the appointment's doctor or an administrator"),
        (status = 404, description = "Appointment not found")
    ),
    tag = "appointments",
    security(("bearer_auth" = []))
)]
pub async fn confirm_appointment(
    State(server): State<ClinicServer>,
    Path(appointment_id): Path<Uuid>,
    auth: AuthContext,
    Json(req): Json<ConfirmAppointmentRequest>,
) -> Result<Json<ApiResponse<AppointmentActionResponse>>, ApiError> {
    let action = ConfirmAction::parse(&req.action)?;
    let appointment = found(server.appointments.find_by_id(appointment_id).await, "Appointment")?;
    ensure_doctor_or_admin(&auth, &appointment)?;
    check_pending(&appointment)?;

    let mut tx = server.transactions.begin().await?;
    let response = match action {
        ConfirmAction::Cancel => {
            server
                .appointments
                .set_status(&mut *tx, appointment.id, AppointmentStatus::Cancelled, auth.user_id)
                .await?;
            AppointmentActionResponse {
                detail: "Appointment cancelled".to_string(),
                status: AppointmentStatus::Cancelled,
                linked_payment: Some(false),
            }
        }
        ConfirmAction::Confirm => {
            let payment = server.billing.settle_on_confirmation(&mut *tx, appointment.id).await?;
            server
                .appointments
                .set_status(&mut *tx, appointment.id, AppointmentStatus::Confirmed, auth.user_id)
                .await?;

            if appointment.kind == AppointmentKind::Initial {
                let treatment = match server
                    .treatments
                    .active_for_pair(&mut *tx, appointment.patient_id, appointment.doctor_id)
                    .await?
                {
                    Some(treatment) => treatment,
                    None => {
                        server
                            .treatments
                            .create(&mut *tx, appointment.patient_id, appointment.doctor_id, CONFIRMATION_FREQUENCY_DAYS)
                            .await?
                    }
                };
                server
                    .appointments
                    .link_treatment(&mut *tx, appointment.id, treatment.id, auth.user_id)
                    .await?;
            }

            AppointmentActionResponse {
                detail: "Appointment confirmed".to_string(),
                status: AppointmentStatus::Confirmed,
                linked_payment: Some(payment.is_some()),
            }
        }
    };
    TransactionManager::commit(tx).await?;

    info!(appointment_id = %appointment.id, status = ?response.status, by = %auth.user_id, "Appointment processed");
    Ok(Json(api_success(response)))
}

/// Cancel by the patient (7 days notice) or an administrator
#[utoipa::path(
    post,
    path = "/api/v1/appointments/{id}/cancel",
    params(("id" = Uuid, Path, description = "Appointment ID")),
    responses(
        (status = 200, description = "Appointment cancelled", body = AppointmentActionResponse),
        (status = 400, description = "Appointment cannot be cancelled anymore"),
        (status = 403, description = "Not the owning patient or an administrator"),
        (status = 404, description = "Appointment not found")
    ),
    tag = "appointments",
    security(("bearer_auth" = []))
)]
pub async fn cancel_appointment(
    State(server): State<ClinicServer>,
    Path(appointment_id): Path<Uuid>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<AppointmentActionResponse>>, ApiError> {
    let appointment = found(server.appointments.find_by_id(appointment_id).await, "Appointment")?;
    match auth.role {
        Role::Admin => check_admin_cancel(&appointment)?,
        Role::Patient if appointment.patient_id == auth.user_id => {
            check_patient_cancel(&appointment, Utc::now(), server.config.clinic_offset())?
        }
        _ => return Err(ApiError::authorization("Only the patient or an administrator can cancel this appointment")),
    }

    let mut tx = server.transactions.begin().await?;
    let updated = server
        .appointments
        .set_status(&mut *tx, appointment.id, AppointmentStatus::Cancelled, auth.user_id)
        .await?;
    TransactionManager::commit(tx).await?;

    info!(appointment_id = %updated.id, by = %auth.user_id, "Appointment cancelled");
    Ok(Json(api_success(AppointmentActionResponse {
        detail: "Appointment cancelled".to_string(),
        status: updated.status,
        linked_payment: None,
    })))
}

/// Move an appointment to another covered, free time
#[utoipa::path(
    patch,
    path = "/api/v1/appointments/{id}/reschedule",
    params(("id" = Uuid, Path, description = "Appointment ID")),
    request_body = RescheduleRequest,
    responses(
        (status = 200, description = "Appointment moved", body = AppointmentView),
        (status = 400, description = "Appointment cannot be moved or time not covered"),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Appointment not found"),
        (status = 409, description = "The doctor is busy at that time")
    ),
    tag = "appointments",
    security(("bearer_auth" = []))
)]
pub async fn reschedule_appointment(
    State(server): State<ClinicServer>,
    Path(appointment_id): Path<Uuid>,
    auth: AuthContext,
    Json(req): Json<RescheduleRequest>,
) -> Result<Json<ApiResponse<AppointmentView>>, ApiError> {
    let offset = server.config.clinic_offset();
    let at = parse_datetime(required(&req.scheduled_at, "scheduled_at")?, offset, "scheduled_at")?;

    let detail = found(server.appointments.find_detail(appointment_id).await, "Appointment")?;
    let appointment = &detail.appointment;
    ensure_participant(&auth, appointment)?;

    let now = Utc::now();
    check_reschedulable(appointment, detail.treatment_active, now)?;
    check_future(at, now)?;
    ensure_covered(&server, at, offset, Some(appointment.specialty_id), appointment.doctor_id).await?;
    ensure_slot_free(&server, appointment.doctor_id, at, Some(appointment.id)).await?;

    let mut tx = server.transactions.begin().await?;
    server.appointments.reschedule(&mut *tx, appointment.id, at, auth.user_id).await?;
    TransactionManager::commit(tx).await?;

    info!(appointment_id = %appointment.id, scheduled_at = %at, by = %auth.user_id, "Appointment rescheduled");
    let view = view_of(&server, &auth, appointment.id).await?;
    Ok(Json(api_success(view)))
}

/// Doctor schedules the follow-up visit of a confirmed appointment
#[utoipa::path(
    post,
    path = "/api/v1/appointments/{id}/subsequent",
    params(("id" = Uuid, Path, description = "Base appointment ID")),
    request_body = ScheduleSubsequentRequest,
    responses(
        (status = 201, description = "Follow-up booked as PENDING", body = AppointmentView),
        (status = 400, description = "Base not confirmed, time invalid or not covered, or treatment finished"),
        (status = 403, description = "Not the appointment's doctor or an administrator"),
        (status = 404, description = "Appointment not found"),
        (status = 409, description = "Slot taken or follow-up already scheduled")
    ),
    tag = "appointments",
    security(("bearer_auth" = []))
)]
pub async fn schedule_subsequent(
    State(server): State<ClinicServer>,
    Path(appointment_id): Path<Uuid>,
    auth: AuthContext,
    Json(req): Json<ScheduleSubsequentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AppointmentView>>), ApiError> {
    let offset = server.config.clinic_offset();
    let at = parse_datetime(required(&req.scheduled_at, "scheduled_at")?, offset, "scheduled_at")?;
    let frequency_days = follow_up_frequency(req.frequency_days.as_ref());

    let base = found(server.appointments.find_by_id(appointment_id).await, "Appointment")?;
    ensure_doctor_or_admin(&auth, &base)?;
    check_confirmed(&base, "scheduling a follow-up")?;
    check_future(at, Utc::now())?;
    ensure_covered(&server, at, offset, Some(base.specialty_id), base.doctor_id).await?;
    ensure_slot_free(&server, base.doctor_id, at, None).await?;

    let mut tx = server.transactions.begin().await?;

    let linked = match base.treatment_id {
        Some(treatment_id) => server.treatments.find_by_id(treatment_id).await?,
        None => None,
    };
    let treatment = match linked {
        Some(treatment) => treatment,
        None => match server
            .treatments
            .active_for_pair(&mut *tx, base.patient_id, base.doctor_id)
            .await?
        {
            Some(treatment) => treatment,
            None => {
                server
                    .treatments
                    .create(&mut *tx, base.patient_id, base.doctor_id, frequency_days)
                    .await?
            }
        },
    };
    if !treatment.active {
        return Err(ApiError::bad_request("The treatment is finished; no follow-up can be scheduled"));
    }
    if server.appointments.open_subsequent_exists(treatment.id).await? {
        return Err(ApiError::conflict("The treatment already has a subsequent appointment"));
    }

    if treatment.name.as_deref().map_or(true, |name| name.trim().is_empty()) {
        let summary = server.clinical.report_summary_for(&mut *tx, base.id).await?;
        if let Some(name) = summary.as_deref().and_then(name_from_summary) {
            server.treatments.name_if_unnamed(&mut *tx, treatment.id, &name).await?;
        }
    }

    server
        .appointments
        .link_treatment(&mut *tx, base.id, treatment.id, auth.user_id)
        .await?;
    let follow_up = server
        .appointments
        .create(
            &mut *tx,
            &NewAppointment {
                patient_id: base.patient_id,
                doctor_id: base.doctor_id,
                specialty_id: base.specialty_id,
                scheduled_at: at,
                kind: AppointmentKind::Subsequent,
                treatment_id: Some(treatment.id),
                preferred_payment_method: base.preferred_payment_method,
                created_by: auth.user_id,
            },
        )
        .await?;
    TransactionManager::commit(tx).await?;

    info!(
        appointment_id = %follow_up.id,
        base_appointment_id = %base.id,
        treatment_id = %treatment.id,
        "Subsequent appointment scheduled by doctor"
    );
    let view = view_of(&server, &auth, follow_up.id).await?;
    Ok((StatusCode::CREATED, Json(api_success(view))))
}

/// Patient books the follow-up suggested by their active treatment
#[utoipa::path(
    post,
    path = "/api/v1/appointments/subsequent",
    responses(
        (status = 201, description = "Follow-up booked as PENDING at the suggested date", body = AppointmentView),
        (status = 400, description = "No active treatment or no covering schedule"),
        (status = 403, description = "Patients only"),
        (status = 409, description = "Follow-up already requested or slot taken")
    ),
    tag = "appointments",
    security(("bearer_auth" = []))
)]
pub async fn request_subsequent(
    State(server): State<ClinicServer>,
    auth: AuthContext,
) -> Result<(StatusCode, Json<ApiResponse<AppointmentView>>), ApiError> {
    auth.require_patient()?;

    let treatment = server
        .treatments
        .latest_for_patient(auth.user_id)
        .await?
        .filter(|treatment| treatment.active)
        .ok_or_else(|| ApiError::bad_request("You have no active treatment"))?;
    if server.appointments.open_subsequent_exists(treatment.id).await? {
        return Err(ApiError::conflict("The treatment already has a subsequent appointment"));
    }
    let initial = server
        .appointments
        .initial_for_treatment(treatment.id)
        .await?
        .ok_or_else(|| ApiError::bad_request("The treatment has no initial appointment"))?;

    let activity = server.treatments.activity(treatment.id).await?;
    let at = next_visit(&treatment, &activity)
        .ok_or_else(|| ApiError::bad_request("The treatment has no next visit date"))?;

    let doctor = found(server.users.find_by_id(treatment.doctor_id).await, "Doctor")?;
    let specialty_id = doctor.specialty_id.unwrap_or(initial.specialty_id);

    let offset = server.config.clinic_offset();
    ensure_covered(&server, at, offset, None, doctor.id).await?;
    ensure_slot_free(&server, doctor.id, at, None).await?;

    let mut tx = server.transactions.begin().await?;
    let follow_up = server
        .appointments
        .create(
            &mut *tx,
            &NewAppointment {
                patient_id: auth.user_id,
                doctor_id: doctor.id,
                specialty_id,
                scheduled_at: at,
                kind: AppointmentKind::Subsequent,
                treatment_id: Some(treatment.id),
                preferred_payment_method: initial.preferred_payment_method,
                created_by: auth.user_id,
            },
        )
        .await?;
    TransactionManager::commit(tx).await?;

    info!(appointment_id = %follow_up.id, treatment_id = %treatment.id, "Subsequent appointment requested by patient");
    let view = view_of(&server, &auth, follow_up.id).await?;
    Ok((StatusCode::CREATED, Json(api_success(view))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appointment(patient_id: Uuid, doctor_id: Uuid) -> Appointment {
        let now = Utc::now();
        Appointment {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            specialty_id: Uuid::new_v4(),
            scheduled_at: now,
            kind: AppointmentKind::Initial,
            status: AppointmentStatus::Pending,
            treatment_id: None,
            consent_completed: false,
            attended: false,
            preferred_payment_method: None,
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_participants() {
        let patient = Uuid::new_v4();
        let doctor = Uuid::new_v4();
        let appt = appointment(patient, doctor);

        assert!(is_participant(&AuthContext::new(patient, Role::Patient), &appt));
        assert!(is_participant(&AuthContext::new(doctor, Role::Dermatologist), &appt));
        assert!(is_participant(&AuthContext::new(Uuid::new_v4(), Role::Admin), &appt));
        assert!(!is_participant(&AuthContext::new(Uuid::new_v4(), Role::Podiatrist), &appt));
    }

    #[test]
    fn test_only_doctor_or_admin_decides() {
        let patient = Uuid::new_v4();
        let doctor = Uuid::new_v4();
        let appt = appointment(patient, doctor);

        assert!(ensure_doctor_or_admin(&AuthContext::new(doctor, Role::Podiatrist), &appt).is_ok());
        assert!(ensure_doctor_or_admin(&AuthContext::new(patient, Role::Patient), &appt).is_err());
    }

    #[test]
    fn test_action_response_omits_missing_payment_flag() {
        let body = serde_json::to_value(AppointmentActionResponse {
            detail: "Appointment cancelled".to_string(),
            status: AppointmentStatus::Cancelled,
            linked_payment: None,
        })
        .unwrap();
        assert_eq!(body["status"], "CANCELLED");
        assert!(body.get("linked_payment").is_none());
    }
}
