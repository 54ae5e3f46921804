use std::collections::HashSet;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveTime;
use database_layer::{NewSchedule, Schedule, Specialty, TransactionManager};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{api_success, ApiError, ApiResponse, ApiResult};
use crate::handlers::{found, parse_date};
use crate::middleware::AuthContext;
use crate::server::ClinicServer;
use crate::services::scheduling::{available_times, iso_weekday, local_day_bounds, SUNDAY};
use crate::validation::RequestValidation;

/// Weekly availability window published by a doctor
#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "specialty_id": "3f1c2a9e-8d1b-4c55-9d8e-2f4b6a7c9e10",
    "weekday": 1,
    "start_time": "09:00",
    "end_time": "10:00"
}))]
pub struct CreateScheduleRequest {
    pub specialty_id: Uuid,
    /// ISO weekday, 1 = Monday .. 6 = Saturday
    pub weekday: i16,
    /// `HH:MM` or `HH:MM:SS`, clinic local time
    pub start_time: String,
    pub end_time: String,
}

fn parse_time(raw: &str, field: &str) -> ApiResult<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| ApiError::validation(format!("'{}' must be a time as HH:MM", field)))
}

impl RequestValidation for CreateScheduleRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if !(1..SUNDAY).contains(&self.weekday) {
            return Err(ApiError::validation("Weekday must be between 1 (Monday) and 6 (Saturday)"));
        }
        let start = parse_time(&self.start_time, "start_time")?;
        let end = parse_time(&self.end_time, "end_time")?;
        if start >= end {
            return Err(ApiError::validation("Start time must be before end time"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AvailableSlotsQuery {
    pub specialty_id: Option<Uuid>,
    /// Local date, `YYYY-MM-DD`
    #[param(example = "2025-03-03")]
    pub date: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AvailableSlotsResponse {
    #[schema(example = json!(["09:00", "11:30"]))]
    pub available_times: Vec<String>,
}

/// Specialties offered by the clinic
#[utoipa::path(
    get,
    path = "/api/v1/specialties",
    responses(
        (status = 200, description = "Specialties", body = Vec<Specialty>)
    ),
    tag = "catalog"
)]
pub async fn list_specialties(
    State(server): State<ClinicServer>,
) -> Result<Json<ApiResponse<Vec<Specialty>>>, ApiError> {
    let specialties = server.catalog.list_specialties().await?;
    Ok(Json(api_success(specialties)))
}

/// Publish a weekly schedule for the calling doctor
#[utoipa::path(
    post,
    path = "/api/v1/schedules",
    request_body = CreateScheduleRequest,
    responses(
        (status = 201, description = "Schedule created", body = Schedule),
        (status = 400, description = "Invalid schedule"),
        (status = 403, description = "Role cannot publish schedules"),
        (status = 409, description = "The doctor already has a schedule starting then")
    ),
    tag = "catalog",
    security(("bearer_auth" = []))
)]
pub async fn create_schedule(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    Json(req): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Schedule>>), ApiError> {
    if !auth.role.can_publish_schedule() {
        return Err(ApiError::authorization("Your role cannot publish schedules"));
    }
    req.validate()?;
    found(server.catalog.find_specialty(req.specialty_id).await, "Specialty")?;

    let schedule = NewSchedule {
        doctor_id: auth.user_id,
        specialty_id: req.specialty_id,
        weekday: req.weekday,
        start_time: parse_time(&req.start_time, "start_time")?,
        end_time: parse_time(&req.end_time, "end_time")?,
    };

    let mut tx = server.transactions.begin().await?;
    let created = server.catalog.create_schedule(&mut *tx, &schedule).await?;
    TransactionManager::commit(tx).await?;

    info!(schedule_id = %created.id, doctor_id = %created.doctor_id, weekday = created.weekday, "Schedule published");
    Ok((StatusCode::CREATED, Json(api_success(created))))
}

/// Free start times of a specialty on a date
#[utoipa::path(
    get,
    path = "/api/v1/schedules/available",
    params(AvailableSlotsQuery),
    responses(
        (status = 200, description = "Start times as HH:MM, empty on Sundays", body = AvailableSlotsResponse),
        (status = 400, description = "Missing specialty_id or date, or malformed date")
    ),
    tag = "catalog",
    security(("bearer_auth" = []))
)]
pub async fn available_slots(
    State(server): State<ClinicServer>,
    Query(query): Query<AvailableSlotsQuery>,
    _auth: AuthContext,
) -> Result<Json<ApiResponse<AvailableSlotsResponse>>, ApiError> {
    let (Some(specialty_id), Some(raw_date)) = (query.specialty_id, query.date.as_deref()) else {
        return Err(ApiError::bad_request("specialty_id and date are required"));
    };
    let date = parse_date(raw_date).ok_or_else(|| ApiError::bad_request("Invalid date, expected YYYY-MM-DD"))?;

    let weekday = iso_weekday(date);
    if weekday == SUNDAY {
        return Ok(Json(api_success(AvailableSlotsResponse {
            available_times: Vec::new(),
        })));
    }

    let offset = server.config.clinic_offset();
    let schedules = server.catalog.schedules_on(weekday, Some(specialty_id), None).await?;
    let (from, until) = local_day_bounds(date, offset)
        .ok_or_else(|| ApiError::bad_request("Date out of range"))?;

    let doctors: Vec<Uuid> = schedules.iter().map(|s| s.doctor_id).collect();
    let booked: HashSet<_> = server
        .appointments
        .booked_slots(&doctors, from, until)
        .await?
        .into_iter()
        .collect();

    Ok(Json(api_success(AvailableSlotsResponse {
        available_times: available_times(&schedules, date, offset, &booked),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(weekday: i16, start: &str, end: &str) -> CreateScheduleRequest {
        CreateScheduleRequest {
            specialty_id: Uuid::new_v4(),
            weekday,
            start_time: start.to_string(),
            end_time: end.to_string(),
        }
    }

    #[test]
    fn test_schedule_validation() {
        assert!(request(1, "09:00", "10:00").validate().is_ok());
        assert!(request(6, "09:00:00", "09:30:00").validate().is_ok());
        assert!(request(7, "09:00", "10:00").validate().is_err());
        assert!(request(0, "09:00", "10:00").validate().is_err());
        assert!(request(2, "10:00", "10:00").validate().is_err());
        assert!(request(2, "9am", "10:00").validate().is_err());
    }
}
