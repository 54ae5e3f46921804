use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use billing_service::BillingError;
use database_layer::{ConstraintKind, DatabaseError, Page};
use error_common::{codes, DataSanitizer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Standard API error response structure
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Error type
    pub error_type: String,
    /// Stable error code, see `error_common::codes`
    pub error_code: String,
    /// Human-readable error message
    pub message: String,
    /// Detailed error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Field-specific validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<HashMap<String, Vec<String>>>,
    /// Timestamp when error occurred
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Request ID for correlation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Suggested actions for resolving the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

/// Standard API success response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}

/// Response metadata for pagination
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResponseMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginationInfo {
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Main API error enum
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field_errors: Option<HashMap<String, Vec<String>>>,
    },

    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Authorization error: {message}")]
    Authorization { message: String },

    #[error("Resource not found: {resource_type}")]
    NotFound { resource_type: String },

    #[error("Resource conflict: {message}")]
    Conflict { message: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

}

impl ApiError {
    /// Create a simple validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field_errors: None,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    pub fn not_found(resource_type: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Authentication { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Authorization { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Database(db_err) => match db_err.constraint_violation() {
                Some((ConstraintKind::Unique, _)) => StatusCode::CONFLICT,
                Some((ConstraintKind::ForeignKey | ConstraintKind::Check, _)) => StatusCode::BAD_REQUEST,
                None => match db_err {
                    DatabaseError::ConnectionFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
                    DatabaseError::QueryFailed(_) => StatusCode::BAD_REQUEST,
                    DatabaseError::SqlxError(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
                    DatabaseError::SqlxError(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                },
            },
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "validation_error",
            ApiError::Authentication { .. } => "authentication_error",
            ApiError::Authorization { .. } => "authorization_error",
            ApiError::NotFound { .. } => "not_found",
            ApiError::Conflict { .. } => "conflict",
            ApiError::Database(db_err) if db_err.is_unique_violation() => "conflict",
            ApiError::Database(_) => "database_error",
            ApiError::Internal { .. } => "internal_error",
            ApiError::BadRequest { .. } => "bad_request",
        }
    }

    /// Stable code clients can branch on
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => codes::validation::INVALID_INPUT,
            ApiError::BadRequest { .. } => codes::validation::INVALID_FORMAT,
            ApiError::Authentication { .. } => codes::authentication::TOKEN_INVALID,
            ApiError::Authorization { .. } => codes::authorization::ACCESS_DENIED,
            ApiError::NotFound { .. } => codes::resource::NOT_FOUND,
            ApiError::Conflict { .. } => codes::resource::CONFLICT,
            ApiError::Database(db_err) => match db_err {
                _ if db_err.constraint_violation().is_some() => codes::database::CONSTRAINT_VIOLATION,
                DatabaseError::ConnectionFailed(_) => codes::database::CONNECTION_FAILED,
                _ => codes::database::QUERY_FAILED,
            },
            ApiError::Internal { .. } => codes::internal::UNEXPECTED,
        }
    }

    /// Get suggested actions for resolving the error
    pub fn suggestions(&self) -> Option<Vec<String>> {
        match self {
            ApiError::Validation { .. } => Some(vec![
                "Check the request payload for invalid fields".to_string(),
                "Ensure all required fields are provided".to_string(),
            ]),
            ApiError::Authentication { .. } => Some(vec![
                "Verify your phone number and password".to_string(),
                "Refresh your access token if it has expired".to_string(),
            ]),
            ApiError::Authorization { .. } => Some(vec![
                "Check if your role allows this operation".to_string(),
            ]),
            ApiError::NotFound { .. } => Some(vec![
                "Verify the resource ID is correct".to_string(),
                "Ensure you have access to view this resource".to_string(),
            ]),
            ApiError::Conflict { .. } => Some(vec![
                "Reload the resource and retry with current data".to_string(),
            ]),
            ApiError::Database(db_err) => match db_err {
                DatabaseError::ConnectionFailed(_) => Some(vec![
                    "Try again in a few moments".to_string(),
                    "Contact support if the issue persists".to_string(),
                ]),
                _ if db_err.is_unique_violation() => Some(vec![
                    "A record with these details already exists".to_string(),
                ]),
                _ => Some(vec![
                    "Verify your request data is valid".to_string(),
                    "Contact support if the issue persists".to_string(),
                ]),
            },
            _ => None,
        }
    }

    /// Client-facing text for database errors
    pub fn format_database_error(db_error: &DatabaseError) -> String {
        match db_error.constraint_violation() {
            Some((ConstraintKind::Unique, constraint)) => match constraint.as_deref() {
                Some("users_phone_key") => "Phone number is already registered.".to_string(),
                Some("appointments_doctor_slot_taken") => {
                    "The doctor already has an appointment at that time.".to_string()
                }
                Some("appointments_one_open_subsequent") => {
                    "The treatment already has a subsequent appointment.".to_string()
                }
                Some("payments_one_open_per_method") => {
                    "The appointment already has an open payment with that method.".to_string()
                }
                Some("treatments_one_active_per_pair") => {
                    "The patient already has an active treatment with this doctor.".to_string()
                }
                _ => "A record with these details already exists.".to_string(),
            },
            Some((ConstraintKind::ForeignKey, _)) => {
                "Referenced record does not exist or has been deleted.".to_string()
            }
            Some((ConstraintKind::Check, _)) => {
                "The provided data does not meet validation requirements.".to_string()
            }
            None => match db_error {
                DatabaseError::ConnectionFailed(_) => {
                    "Unable to connect to the database.".to_string()
                }
                DatabaseError::QueryFailed(msg) => {
                    DataSanitizer::new().sanitize_for_client(&format!("Database operation failed: {}", msg))
                }
                DatabaseError::SqlxError(sqlx::Error::RowNotFound) => {
                    "Requested record not found.".to_string()
                }
                _ => "Database operation failed. Please try again.".to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4().to_string();
        let status_code = self.status_code();

        // Log the error with correlation ID
        if status_code.is_server_error() {
            error!(
                error_id = %error_id,
                error_type = %self.error_type(),
                status_code = %status_code.as_u16(),
                error = %DataSanitizer::new().sanitize_for_client(&self.to_string()),
                "API error occurred"
            );
        } else {
            warn!(
                error_id = %error_id,
                error_type = %self.error_type(),
                status_code = %status_code.as_u16(),
                error = %DataSanitizer::new().sanitize_for_client(&self.to_string()),
                "Request rejected"
            );
        }

        let field_errors = match &self {
            ApiError::Validation { field_errors, .. } => field_errors.clone(),
            _ => None,
        };

        let message = match &self {
            ApiError::Database(db_err) => ApiError::format_database_error(db_err),
            ApiError::Validation { message, .. }
            | ApiError::Authentication { message }
            | ApiError::Authorization { message }
            | ApiError::Conflict { message }
            | ApiError::BadRequest { message } => message.clone(),
            ApiError::NotFound { resource_type } => format!("{} not found", resource_type),
            ApiError::Internal { .. } => "An unexpected error occurred.".to_string(),
        };

        let error_response = ApiErrorResponse {
            error_id,
            error_type: self.error_type().to_string(),
            error_code: self.error_code().to_string(),
            message,
            details: None,
            field_errors,
            timestamp: chrono::Utc::now(),
            request_id: None,
            suggestions: self.suggestions(),
        };

        (status_code, Json(error_response)).into_response()
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Helper function to create successful API responses
pub fn api_success<T>(data: T) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        data,
        metadata: None,
    }
}

/// Helper function to create successful API responses with metadata
pub fn api_success_with_meta<T>(data: T, metadata: ResponseMetadata) -> ApiResponse<T> {
    ApiResponse {
        success: true,
        data,
        metadata: Some(metadata),
    }
}

/// Helper function to create paginated responses
pub fn api_paginated<T>(page: Page<T>) -> ApiResponse<Vec<T>> {
    let page_size = page.request.page_size.max(1);
    let total = u64::try_from(page.total).unwrap_or(0);
    let total_pages = u32::try_from(total.div_ceil(u64::from(page_size)))
        .unwrap_or(u32::MAX)
        .max(1);

    let pagination = PaginationInfo {
        page: page.request.page,
        page_size,
        total_pages,
        has_next: page.request.page < total_pages,
        has_previous: page.request.page > 1,
    };

    let metadata = ResponseMetadata {
        pagination: Some(pagination),
        total_count: Some(page.total),
        request_id: None,
    };

    api_success_with_meta(page.items, metadata)
}

/// Convert SQLx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(sqlx_error: sqlx::Error) -> Self {
        ApiError::Database(DatabaseError::SqlxError(sqlx_error))
    }
}

impl From<BillingError> for ApiError {
    fn from(error: BillingError) -> Self {
        match error {
            BillingError::Validation(message) => ApiError::validation(message),
            BillingError::Duplicate(message) => ApiError::conflict(message),
            BillingError::Database(db_err) => ApiError::Database(db_err),
        }
    }
}

/// Convert anyhow errors to API errors
impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        ApiError::Internal {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::BadRequest {
            message: format!("Invalid JSON: {}", error),
        }
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use database_layer::PageRequest;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::authentication("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::authorization("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("Appointment").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("x").status_code(), StatusCode::CONFLICT);
        let row_missing: ApiError = sqlx::Error::RowNotFound.into();
        assert_eq!(row_missing.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_billing_errors_map_to_http() {
        let duplicate: ApiError = BillingError::Duplicate("open transfer".into()).into();
        assert_eq!(duplicate.status_code(), StatusCode::CONFLICT);
        let invalid: ApiError = BillingError::Validation("bad amount".into()).into();
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.error_code(), codes::validation::INVALID_INPUT);
    }

    #[test]
    fn test_malformed_json_is_bad_request() {
        let parse_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: ApiError = parse_error.into();
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.error_type(), "bad_request");
    }

    #[test]
    fn test_paginated_metadata() {
        let page = Page {
            items: vec![1, 2, 3],
            total: 45,
            request: PageRequest::new(Some(2), Some(20)),
        };
        let response = api_paginated(page);
        let pagination = response.metadata.and_then(|m| m.pagination).unwrap();
        assert_eq!(pagination.total_pages, 3);
        assert!(pagination.has_next);
        assert!(pagination.has_previous);
    }

    #[test]
    fn test_empty_page_has_one_page() {
        let page: Page<u8> = Page {
            items: vec![],
            total: 0,
            request: PageRequest::default(),
        };
        let pagination = api_paginated(page).metadata.and_then(|m| m.pagination).unwrap();
        assert_eq!(pagination.total_pages, 1);
        assert!(!pagination.has_next);
    }
}
