use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use database_layer::{NewUser, Role, TransactionManager, UserProfile};
use logger_redacted::{redacted_info, redacted_warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::TokenType;
use crate::error::{api_success, ApiError, ApiResponse};
use crate::handlers::found;
use crate::handlers::users::{check_name, check_new_password, check_weight, ensure_phone_free, parse_sex};
use crate::middleware::AuthContext;
use crate::server::ClinicServer;
use crate::validation::{is_valid_phone, RequestValidation};
use crate::{validate_field, validate_range, validate_required};

/// Self-service patient registration
#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "first_name": "Ana",
    "last_name": "López",
    "age": 34,
    "sex": "FEMALE",
    "weight_kg": "62.5",
    "phone": "7551234567",
    "password": "clinica2025",
    "password_confirm": "clinica2025"
}))]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub sex: String,
    #[schema(value_type = Option<String>)]
    pub weight_kg: Option<Decimal>,
    pub phone: String,
    pub password: String,
    pub password_confirm: String,
}

impl RequestValidation for RegisterRequest {
    fn validate(&self) -> Result<(), ApiError> {
        check_name(&self.first_name, "First name")?;
        check_name(&self.last_name, "Last name")?;
        validate_range!(&self.age, 18, 120, "Age must be between 18 and 120");
        parse_sex(&self.sex)?;
        check_weight(self.weight_kg)?;
        validate_field!(self.phone, is_valid_phone(&self.phone), "Phone must have exactly 10 digits");
        check_new_password(&self.password, Some(&self.password_confirm))
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    #[schema(example = "Registration successful")]
    pub message: String,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "7551234567")]
    pub phone: String,
    pub password: String,
}

impl RequestValidation for LoginRequest {
    fn validate(&self) -> Result<(), ApiError> {
        validate_field!(self.phone, is_valid_phone(&self.phone), "Phone must have exactly 10 digits");
        validate_required!(self.password, "Password is required");
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: UserProfile,
    /// Access JWT for the `Authorization: Bearer` header
    pub access: String,
    /// Refresh JWT for `POST /auth/refresh`
    pub refresh: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub access: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DetailResponse {
    #[schema(example = "authenticated")]
    pub detail: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    #[schema(example = "Welcome Ana")]
    pub message: String,
    pub role: Role,
    #[schema(example = "/dashboard/patient/")]
    pub redirect_to: String,
}

/// Register a patient account
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Patient registered", body = RegisterResponse),
        (status = 400, description = "Invalid registration data"),
        (status = 409, description = "Phone number already registered")
    ),
    tag = "authentication"
)]
pub async fn register(
    State(server): State<ClinicServer>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RegisterResponse>>), ApiError> {
    req.validate()?;
    ensure_phone_free(&server, &req.phone, None).await?;

    let new_user = NewUser {
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        age: req.age,
        sex: parse_sex(&req.sex)?,
        weight_kg: req.weight_kg,
        phone: req.phone.clone(),
        role: Role::Patient,
        specialty_id: None,
        password_hash: hash_password(&req.password).await?,
    };

    let mut tx = server.transactions.begin().await?;
    let user = server.users.create(&mut *tx, &new_user).await?;
    TransactionManager::commit(tx).await?;

    redacted_info!("Patient {} registered with phone {}", user.id, user.phone);

    Ok((
        StatusCode::CREATED,
        Json(api_success(RegisterResponse {
            message: "Registration successful".to_string(),
            user: user.into(),
        })),
    ))
}

/// Log in with phone number and password
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, description = "Malformed phone number"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account disabled")
    ),
    tag = "authentication"
)]
pub async fn login(
    State(server): State<ClinicServer>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    req.validate()?;

    let Some(user) = server.users.find_by_phone(&req.phone).await? else {
        redacted_warn!("Login failed: unknown phone {}", req.phone);
        return Err(ApiError::authentication("Invalid credentials"));
    };

    if !verify_password(&req.password, &user.password_hash).await? {
        redacted_warn!("Login failed: wrong password for {}", req.phone);
        return Err(ApiError::authentication("Invalid credentials"));
    }

    if !user.is_active {
        warn!(user_id = %user.id, "Login refused: account disabled");
        return Err(ApiError::authorization("Account disabled"));
    }

    let tokens = server.tokens.issue_pair(user.id, user.role)?;
    info!(user_id = %user.id, role = %user.role, "User logged in");

    Ok(Json(api_success(LoginResponse {
        user: user.into(),
        access: tokens.access,
        refresh: tokens.refresh,
    })))
}

/// Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 401, description = "Invalid or expired refresh token")
    ),
    tag = "authentication"
)]
pub async fn refresh(
    State(server): State<ClinicServer>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<RefreshResponse>>, ApiError> {
    let claims = server
        .tokens
        .verify(req.refresh.trim(), TokenType::Refresh)
        .map_err(|e| ApiError::authentication(e.to_string()))?;
    let user_id = claims
        .user_id()
        .map_err(|_| ApiError::authentication("Invalid user ID in token"))?;

    // Role and active flag come from the current row, not the token
    let user = server
        .users
        .find_by_id(user_id)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| ApiError::authentication("Account no longer available"))?;

    let access = server.tokens.issue(user.id, user.role, TokenType::Access)?;
    Ok(Json(api_success(RefreshResponse { access })))
}

/// Check that the access token is valid
#[utoipa::path(
    get,
    path = "/api/v1/auth/verify",
    responses(
        (status = 200, description = "Token is valid", body = DetailResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "authentication",
    security(("bearer_auth" = []))
)]
pub async fn verify(_auth: AuthContext) -> Result<Json<ApiResponse<DetailResponse>>, ApiError> {
    Ok(Json(api_success(DetailResponse {
        detail: "authenticated".to_string(),
    })))
}

/// Tokens are stateless; the client discards them
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = DetailResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "authentication",
    security(("bearer_auth" = []))
)]
pub async fn logout(auth: AuthContext) -> Result<Json<ApiResponse<DetailResponse>>, ApiError> {
    info!(user_id = %auth.user_id, "User logged out");
    Ok(Json(api_success(DetailResponse {
        detail: "Logged out successfully".to_string(),
    })))
}

/// Landing data for the caller's role dashboard
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/{role}",
    params(("role" = String, Path, description = "Role name, case-insensitive")),
    responses(
        (status = 200, description = "Dashboard greeting", body = DashboardResponse),
        (status = 403, description = "Path role differs from the caller's role")
    ),
    tag = "authentication",
    security(("bearer_auth" = []))
)]
pub async fn dashboard(
    State(server): State<ClinicServer>,
    Path(role): Path<String>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<DashboardResponse>>, ApiError> {
    if Role::parse(&role) != Some(auth.role) {
        return Err(ApiError::authorization("You do not have access to this dashboard"));
    }

    let user = found(server.users.find_by_id(auth.user_id).await, "User")?;
    Ok(Json(api_success(DashboardResponse {
        message: format!("Welcome {}", user.first_name),
        role: auth.role,
        redirect_to: format!("/dashboard/{}/", auth.role.slug()),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> RegisterRequest {
        RegisterRequest {
            first_name: "José".to_string(),
            last_name: "Pérez".to_string(),
            age: 30,
            sex: "MALE".to_string(),
            weight_kg: None,
            phone: "7559876543".to_string(),
            password: "piel2024x".to_string(),
            password_confirm: "piel2024x".to_string(),
        }
    }

    #[test]
    fn test_registration_rules() {
        assert!(registration().validate().is_ok());
        assert!(RegisterRequest { phone: "755987654".into(), ..registration() }.validate().is_err());
        assert!(RegisterRequest { first_name: "J".into(), ..registration() }.validate().is_err());
        assert!(RegisterRequest { age: 121, ..registration() }.validate().is_err());
        assert!(RegisterRequest {
            password: "12345678".into(),
            password_confirm: "12345678".into(),
            ..registration()
        }
        .validate()
        .is_err());
        assert!(RegisterRequest { password_confirm: "piel2024y".into(), ..registration() }
            .validate()
            .is_err());
    }

    #[test]
    fn test_login_requires_ten_digit_phone() {
        let req = LoginRequest {
            phone: "+527551234567".to_string(),
            password: "secret123".to_string(),
        };
        assert!(req.validate().is_err());
    }
}
