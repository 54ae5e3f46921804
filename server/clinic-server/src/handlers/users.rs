use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use database_layer::{
    AppointmentDetail, AppointmentFilter, NewUser, PatientScope, Role, Sex, TransactionManager, User,
    UserChanges, UserProfile,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::password::{check_password_policy, hash_password};
use crate::error::{api_paginated, api_success, ApiError, ApiResponse, ApiResult};
use crate::handlers::found;
use crate::middleware::AuthContext;
use crate::server::ClinicServer;
use crate::types::PaginationParams;
use crate::validation::{is_valid_person_name, is_valid_phone, RequestValidation};
use crate::{validate_field, validate_range};
use logger_redacted::redact_phone;

const MAX_WEIGHT_KG: i64 = 300;

/// `MALE`, `FEMALE`, `OTHER` or their first letter, case-insensitive
pub(crate) fn parse_sex(raw: &str) -> ApiResult<Sex> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "MALE" | "M" => Ok(Sex::Male),
        "FEMALE" | "F" => Ok(Sex::Female),
        "OTHER" | "O" => Ok(Sex::Other),
        _ => Err(ApiError::validation("Sex must be MALE, FEMALE or OTHER")),
    }
}

pub(crate) fn parse_role(raw: &str) -> ApiResult<Role> {
    Role::parse(raw).ok_or_else(|| ApiError::validation(format!("Unknown role '{}'", raw.trim())))
}

pub(crate) fn check_name(name: &str, field: &str) -> ApiResult<()> {
    if is_valid_person_name(name) {
        Ok(())
    } else {
        Err(ApiError::validation(format!(
            "{} may only contain letters and spaces and needs at least 2 characters",
            field
        )))
    }
}

pub(crate) fn check_weight(weight_kg: Option<Decimal>) -> ApiResult<()> {
    match weight_kg {
        Some(w) if w <= Decimal::ZERO || w > Decimal::from(MAX_WEIGHT_KG) => {
            Err(ApiError::validation("Weight must be greater than 0 and at most 300 kg"))
        }
        _ => Ok(()),
    }
}

/// Password policy plus the optional confirmation match
pub(crate) fn check_new_password(password: &str, confirm: Option<&str>) -> ApiResult<()> {
    if let Some(rule) = check_password_policy(password) {
        return Err(ApiError::validation(rule));
    }
    match confirm {
        Some(confirm) if confirm != password => Err(ApiError::validation("Passwords do not match")),
        _ => Ok(()),
    }
}

/// Reject a phone number already used by another account
pub(crate) async fn ensure_phone_free(server: &ClinicServer, phone: &str, except: Option<Uuid>) -> ApiResult<()> {
    if server.users.phone_taken(phone, except).await? {
        info!(phone = %redact_phone(phone), "Phone number already registered");
        return Err(ApiError::conflict("Phone number is already registered"));
    }
    Ok(())
}

/// Account creation by an administrator
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[schema(example = "Ana")]
    pub first_name: String,
    #[schema(example = "López")]
    pub last_name: String,
    #[schema(example = 34)]
    pub age: i32,
    #[schema(example = "FEMALE")]
    pub sex: String,
    #[schema(value_type = Option<String>, example = "62.5")]
    pub weight_kg: Option<Decimal>,
    #[schema(example = "7551234567")]
    pub phone: String,
    #[schema(example = "DERMATOLOGIST")]
    pub role: String,
    pub specialty_id: Option<Uuid>,
    pub password: String,
    pub password_confirm: Option<String>,
}

impl RequestValidation for CreateUserRequest {
    fn validate(&self) -> Result<(), ApiError> {
        check_name(&self.first_name, "First name")?;
        check_name(&self.last_name, "Last name")?;
        validate_range!(&self.age, 18, 120, "Age must be between 18 and 120");
        parse_sex(&self.sex)?;
        check_weight(self.weight_kg)?;
        validate_field!(self.phone, is_valid_phone(&self.phone), "Phone must have exactly 10 digits");
        parse_role(&self.role)?;
        check_new_password(&self.password, self.password_confirm.as_deref())
    }
}

/// Partial account update; omitted fields keep their value
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
    pub sex: Option<String>,
    #[schema(value_type = Option<String>)]
    pub weight_kg: Option<Decimal>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub specialty_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

impl RequestValidation for UpdateUserRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(ref first_name) = self.first_name {
            check_name(first_name, "First name")?;
        }
        if let Some(ref last_name) = self.last_name {
            check_name(last_name, "Last name")?;
        }
        if let Some(ref age) = self.age {
            validate_range!(age, 18, 120, "Age must be between 18 and 120");
        }
        if let Some(ref sex) = self.sex {
            parse_sex(sex)?;
        }
        check_weight(self.weight_kg)?;
        if let Some(ref phone) = self.phone {
            validate_field!(phone, is_valid_phone(phone), "Phone must have exactly 10 digits");
        }
        if let Some(ref role) = self.role {
            parse_role(role)?;
        }
        if let Some(ref password) = self.password {
            check_new_password(password, None)?;
        }
        Ok(())
    }
}

impl UpdateUserRequest {
    /// Fields a patient may change on their own record
    fn strip_privileged(self) -> Self {
        Self {
            role: None,
            specialty_id: None,
            is_active: None,
            ..self
        }
    }

    async fn into_changes(self) -> ApiResult<UserChanges> {
        let password_hash = match self.password {
            Some(ref password) => Some(hash_password(password).await?),
            None => None,
        };
        Ok(UserChanges {
            first_name: self.first_name.map(|v| v.trim().to_string()),
            last_name: self.last_name.map(|v| v.trim().to_string()),
            age: self.age,
            sex: self.sex.as_deref().map(parse_sex).transpose()?,
            weight_kg: self.weight_kg,
            phone: self.phone,
            role: self.role.as_deref().map(parse_role).transpose()?,
            specialty_id: self.specialty_id,
            is_active: self.is_active,
            password_hash,
        })
    }
}

async fn apply_update(
    server: &ClinicServer,
    user_id: Uuid,
    req: UpdateUserRequest,
) -> ApiResult<UserProfile> {
    if let Some(ref phone) = req.phone {
        ensure_phone_free(server, phone, Some(user_id)).await?;
    }
    let changes = req.into_changes().await?;

    let mut tx = server.transactions.begin().await?;
    let updated = found(server.users.update(&mut *tx, user_id, &changes).await, "User")?;
    TransactionManager::commit(tx).await?;

    info!(user_id = %user_id, "Account updated");
    Ok(updated.into())
}

async fn delete_account(server: &ClinicServer, user_id: Uuid) -> ApiResult<()> {
    let mut tx = server.transactions.begin().await?;
    let deleted = server.users.delete(&mut *tx, user_id).await?;
    TransactionManager::commit(tx).await?;
    if !deleted {
        return Err(ApiError::not_found("User"));
    }
    info!(user_id = %user_id, "Account deleted");
    Ok(())
}

/// Create an account with any role
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = UserProfile),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Administrators only"),
        (status = 409, description = "Phone number already registered")
    ),
    tag = "users",
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserProfile>>), ApiError> {
    auth.require_admin()?;
    req.validate()?;
    ensure_phone_free(&server, &req.phone, None).await?;

    let new_user = NewUser {
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        age: req.age,
        sex: parse_sex(&req.sex)?,
        weight_kg: req.weight_kg,
        phone: req.phone.clone(),
        role: parse_role(&req.role)?,
        specialty_id: req.specialty_id,
        password_hash: hash_password(&req.password).await?,
    };

    let mut tx = server.transactions.begin().await?;
    let user = server.users.create(&mut *tx, &new_user).await?;
    TransactionManager::commit(tx).await?;

    info!(user_id = %user.id, role = %user.role, created_by = %auth.user_id, "Account created by administrator");
    Ok((StatusCode::CREATED, Json(api_success(user.into()))))
}

/// List every account
#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(PaginationParams),
    responses(
        (status = 200, description = "Accounts ordered by role, last name, first name", body = Vec<UserProfile>),
        (status = 403, description = "Administrators only")
    ),
    tag = "users",
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(server): State<ClinicServer>,
    Query(pagination): Query<PaginationParams>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<UserProfile>>>, ApiError> {
    auth.require_admin()?;
    let page = server.users.list(pagination.to_page_request()).await?;
    Ok(Json(api_paginated(page.map(UserProfile::from))))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Account", body = UserProfile),
        (status = 404, description = "User not found")
    ),
    tag = "users",
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(server): State<ClinicServer>,
    Path(user_id): Path<Uuid>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    auth.require_admin()?;
    let user = found(server.users.find_by_id(user_id).await, "User")?;
    Ok(Json(api_success(user.into())))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Account updated", body = UserProfile),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Phone number already registered")
    ),
    tag = "users",
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(server): State<ClinicServer>,
    Path(user_id): Path<Uuid>,
    auth: AuthContext,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    auth.require_admin()?;
    req.validate()?;
    let profile = apply_update(&server, user_id, req).await?;
    Ok(Json(api_success(profile)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 404, description = "User not found")
    ),
    tag = "users",
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(server): State<ClinicServer>,
    Path(user_id): Path<Uuid>,
    auth: AuthContext,
) -> Result<StatusCode, ApiError> {
    auth.require_admin()?;
    delete_account(&server, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Patient accounts visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/patients",
    params(PaginationParams),
    responses(
        (status = 200, description = "Patients ordered by last name, first name", body = Vec<UserProfile>)
    ),
    tag = "patients",
    security(("bearer_auth" = []))
)]
pub async fn list_patients(
    State(server): State<ClinicServer>,
    Query(pagination): Query<PaginationParams>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<UserProfile>>>, ApiError> {
    let scope = match auth.role {
        Role::Patient => PatientScope {
            patient_id: Some(auth.user_id),
            treated_by: None,
        },
        Role::Admin => PatientScope::default(),
        _ => PatientScope {
            patient_id: None,
            treated_by: Some(auth.user_id),
        },
    };
    let page = server.users.list_patients(scope, pagination.to_page_request()).await?;
    Ok(Json(api_paginated(page.map(UserProfile::from))))
}

async fn find_patient(server: &ClinicServer, patient_id: Uuid) -> ApiResult<User> {
    let user = found(server.users.find_by_id(patient_id).await, "Patient")?;
    if user.role != Role::Patient {
        return Err(ApiError::not_found("Patient"));
    }
    Ok(user)
}

#[utoipa::path(
    get,
    path = "/api/v1/patients/{id}",
    params(("id" = Uuid, Path, description = "Patient ID")),
    responses(
        (status = 200, description = "Patient", body = UserProfile),
        (status = 403, description = "Not the patient, a treating clinician or an administrator"),
        (status = 404, description = "Patient not found")
    ),
    tag = "patients",
    security(("bearer_auth" = []))
)]
pub async fn get_patient(
    State(server): State<ClinicServer>,
    Path(patient_id): Path<Uuid>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    let allowed = match auth.role {
        Role::Admin => true,
        Role::Patient => auth.user_id == patient_id,
        _ => server.users.treats_patient(auth.user_id, patient_id).await?,
    };
    if !allowed {
        return Err(ApiError::authorization("You cannot view this patient"));
    }
    let patient = find_patient(&server, patient_id).await?;
    Ok(Json(api_success(patient.into())))
}

#[utoipa::path(
    patch,
    path = "/api/v1/patients/{id}",
    params(("id" = Uuid, Path, description = "Patient ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Patient updated", body = UserProfile),
        (status = 403, description = "Only the patient or an administrator"),
        (status = 404, description = "Patient not found")
    ),
    tag = "patients",
    security(("bearer_auth" = []))
)]
pub async fn update_patient(
    State(server): State<ClinicServer>,
    Path(patient_id): Path<Uuid>,
    auth: AuthContext,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    let req = if auth.is_admin() {
        req
    } else if auth.user_id == patient_id {
        req.strip_privileged()
    } else {
        return Err(ApiError::authorization("Only administrators can modify other patients"));
    };
    req.validate()?;
    find_patient(&server, patient_id).await?;
    let profile = apply_update(&server, patient_id, req).await?;
    Ok(Json(api_success(profile)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/patients/{id}",
    params(("id" = Uuid, Path, description = "Patient ID")),
    responses(
        (status = 204, description = "Patient deleted"),
        (status = 403, description = "Administrators only"),
        (status = 404, description = "Patient not found")
    ),
    tag = "patients",
    security(("bearer_auth" = []))
)]
pub async fn delete_patient(
    State(server): State<ClinicServer>,
    Path(patient_id): Path<Uuid>,
    auth: AuthContext,
) -> Result<StatusCode, ApiError> {
    auth.require_admin()?;
    find_patient(&server, patient_id).await?;
    delete_account(&server, patient_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Appointments of one patient, narrowed to the caller's own when a clinician asks
#[utoipa::path(
    get,
    path = "/api/v1/patients/{id}/appointments",
    params(("id" = Uuid, Path, description = "Patient ID"), PaginationParams),
    responses(
        (status = 200, description = "Appointments ordered by date", body = Vec<AppointmentDetail>),
        (status = 403, description = "Patients can only list their own appointments")
    ),
    tag = "patients",
    security(("bearer_auth" = []))
)]
pub async fn patient_appointments(
    State(server): State<ClinicServer>,
    Path(patient_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<AppointmentDetail>>>, ApiError> {
    let doctor_id = match auth.role {
        Role::Admin => None,
        Role::Patient if auth.user_id == patient_id => None,
        Role::Patient => return Err(ApiError::authorization("You can only view your own appointments")),
        _ => Some(auth.user_id),
    };
    let filter = AppointmentFilter {
        patient_id: Some(patient_id),
        doctor_id,
        ..AppointmentFilter::default()
    };
    let page = server.appointments.list(filter, pagination.to_page_request()).await?;
    Ok(Json(api_paginated(page)))
}

/// Screening results placeholder, available to the screening role
#[utoipa::path(
    get,
    path = "/api/v1/screening/results",
    responses(
        (status = 200, description = "Screening results (currently always empty)"),
        (status = 403, description = "Screening role only")
    ),
    tag = "screening",
    security(("bearer_auth" = []))
)]
pub async fn screening_results(auth: AuthContext) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, ApiError> {
    auth.require_role(&[Role::Screening])?;
    Ok(Json(api_success(Vec::new())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateUserRequest {
        CreateUserRequest {
            first_name: "María".to_string(),
            last_name: "Núñez".to_string(),
            age: 40,
            sex: "female".to_string(),
            weight_kg: Some(Decimal::new(655, 1)),
            phone: "7551234567".to_string(),
            role: "podiatrist".to_string(),
            specialty_id: None,
            password: "clinica2025".to_string(),
            password_confirm: Some("clinica2025".to_string()),
        }
    }

    #[test]
    fn test_create_user_validation() {
        assert!(request().validate().is_ok());
        assert!(CreateUserRequest { role: "nurse".into(), ..request() }.validate().is_err());
        assert!(CreateUserRequest { age: 17, ..request() }.validate().is_err());
        assert!(CreateUserRequest { weight_kg: Some(Decimal::ZERO), ..request() }.validate().is_err());
        assert!(CreateUserRequest { weight_kg: Some(Decimal::from(301)), ..request() }.validate().is_err());
        assert!(CreateUserRequest { password_confirm: Some("other123".into()), ..request() }
            .validate()
            .is_err());
    }

    #[test]
    fn test_parse_sex() {
        assert_eq!(parse_sex("m").unwrap(), Sex::Male);
        assert_eq!(parse_sex("Female").unwrap(), Sex::Female);
        assert!(parse_sex("x").is_err());
    }

    #[test]
    fn test_patient_self_update_drops_privileged_fields() {
        let req = UpdateUserRequest {
            first_name: Some("Ana".into()),
            role: Some("ADMIN".into()),
            is_active: Some(false),
            ..UpdateUserRequest::default()
        }
        .strip_privileged();
        assert_eq!(req.first_name.as_deref(), Some("Ana"));
        assert!(req.role.is_none());
        assert!(req.is_active.is_none());
    }

    #[test]
    fn test_update_validation() {
        let bad_phone = UpdateUserRequest {
            phone: Some("123".into()),
            ..UpdateUserRequest::default()
        };
        assert!(bad_phone.validate().is_err());
        assert!(UpdateUserRequest::default().validate().is_ok());
    }
}
