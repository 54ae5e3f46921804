//! Appointment payments: online transfers with a receipt, in-office
//! collection and reversal

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use billing_service::{Payment, PaymentDraft, PaymentFilter};
use chrono::Utc;
use database_layer::{AppointmentStatus, PaymentMethod, PaymentStatus, Role, TransactionManager};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{api_paginated, api_success, ApiError, ApiResponse, ApiResult};
use crate::handlers::{found, non_blank, required};
use crate::middleware::AuthContext;
use crate::server::ClinicServer;
use crate::services::media::{decode_upload, discard_on_error, receipt_key};
use crate::types::pagination::page_request;

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "appointment_id": "5b0e4b7e-2c43-4a3e-9a57-0d5f7c1e2a11",
    "total": "900.00",
    "receipt_base64": "data:image/png;base64,iVBORw0KGgo=",
    "receipt_filename": "transferencia.png"
}))]
pub struct TransferPaymentRequest {
    pub appointment_id: Uuid,
    /// Decimal amount as string or number; defaults to the configured consultation fee
    #[schema(value_type = Option<String>)]
    pub total: Option<serde_json::Value>,
    /// Receipt file, plain base64 or a `data:` URL
    pub receipt_base64: Option<String>,
    pub receipt_filename: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InOfficePaymentRequest {
    pub appointment_id: Uuid,
    #[schema(value_type = Option<String>, example = "900.00")]
    pub total: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RevertPaymentRequest {
    #[schema(example = "Receipt does not match the bank statement")]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListPaymentsQuery {
    pub patient_id: Option<Uuid>,
    /// `TRANSFER` or `IN_OFFICE`
    pub method: Option<String>,
    /// `PENDING`, `APPROVED` or `REJECTED`
    pub status: Option<String>,
    #[param(minimum = 1)]
    pub page: Option<u32>,
    #[param(minimum = 1, maximum = 100)]
    pub page_size: Option<u32>,
}

/// Amount text as sent by the client; non-scalar values are kept so they fail parsing
fn amount_text(total: Option<&serde_json::Value>) -> Option<String> {
    match total? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Record an online transfer with its receipt
#[utoipa::path(
    post,
    path = "/api/v1/payments",
    request_body = TransferPaymentRequest,
    responses(
        (status = 201, description = "Transfer recorded, pending verification", body = Payment),
        (status = 400, description = "Missing receipt, invalid amount or appointment not pending"),
        (status = 403, description = "Not the patient of the appointment"),
        (status = 404, description = "Appointment not found"),
        (status = 409, description = "A transfer is already open for the appointment")
    ),
    tag = "payments",
    security(("bearer_auth" = []))
)]
pub async fn create_transfer_payment(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    Json(req): Json<TransferPaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Payment>>), ApiError> {
    auth.require_patient()?;
    let receipt = required(&req.receipt_base64, "receipt_base64")?;

    let appointment = found(server.appointments.find_by_id(req.appointment_id).await, "Appointment")?;
    if appointment.patient_id != auth.user_id {
        return Err(ApiError::authorization("You can only pay for your own appointments"));
    }
    if appointment.status != AppointmentStatus::Pending {
        return Err(ApiError::bad_request("Only pending appointments can be paid by transfer"));
    }

    let amount = amount_text(req.total.as_ref());
    let total = server
        .billing
        .prepare(appointment.id, PaymentMethod::Transfer, amount.as_deref())
        .await?;

    let upload = decode_upload(receipt, req.receipt_filename.as_deref(), "png")
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let receipt_path = server
        .media
        .put(&receipt_key(appointment.id, &upload.extension), upload.bytes)
        .await?;

    let draft = PaymentDraft::transfer(auth.user_id, appointment.id, total, receipt_path.clone());
    let recorded = record_payment(&server, &draft).await;
    let payment = discard_on_error(server.media.as_ref(), &receipt_path, recorded).await?;

    Ok((StatusCode::CREATED, Json(api_success(payment))))
}

async fn record_payment(server: &ClinicServer, draft: &PaymentDraft) -> ApiResult<Payment> {
    let mut tx = server.transactions.begin().await?;
    let payment = server.billing.record(&mut *tx, draft).await?;
    TransactionManager::commit(tx).await?;
    Ok(payment)
}

/// Record a payment collected at the clinic
#[utoipa::path(
    post,
    path = "/api/v1/payments/in-office",
    request_body = InOfficePaymentRequest,
    responses(
        (status = 201, description = "Payment recorded as approved", body = Payment),
        (status = 400, description = "Invalid amount or appointment not confirmed"),
        (status = 403, description = "Not the appointment's doctor or an administrator"),
        (status = 404, description = "Appointment not found"),
        (status = 409, description = "An in-office payment already exists")
    ),
    tag = "payments",
    security(("bearer_auth" = []))
)]
pub async fn create_in_office_payment(
    State(server): State<ClinicServer>,
    auth: AuthContext,
    Json(req): Json<InOfficePaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Payment>>), ApiError> {
    auth.require_staff()?;

    let appointment = found(server.appointments.find_by_id(req.appointment_id).await, "Appointment")?;
    if !auth.is_admin() && appointment.doctor_id != auth.user_id {
        return Err(ApiError::authorization("You can only collect payments for your own appointments"));
    }
    if appointment.status != AppointmentStatus::Confirmed {
        return Err(ApiError::bad_request("Only confirmed appointments can be paid in office"));
    }

    let amount = amount_text(req.total.as_ref());
    let total = server
        .billing
        .prepare(appointment.id, PaymentMethod::InOffice, amount.as_deref())
        .await?;

    let draft = PaymentDraft::in_office(appointment.patient_id, appointment.id, total, Utc::now());
    let payment = record_payment(&server, &draft).await?;

    info!(payment_id = %payment.id, collected_by = %auth.user_id, "In-office payment collected");
    Ok((StatusCode::CREATED, Json(api_success(payment))))
}

/// Reject and zero a payment
#[utoipa::path(
    post,
    path = "/api/v1/payments/{id}/revert",
    params(("id" = Uuid, Path, description = "Payment ID")),
    request_body = RevertPaymentRequest,
    responses(
        (status = 200, description = "Payment reverted", body = Payment),
        (status = 400, description = "Payment already reverted"),
        (status = 403, description = "Not the appointment's doctor or an administrator"),
        (status = 404, description = "Payment not found")
    ),
    tag = "payments",
    security(("bearer_auth" = []))
)]
pub async fn revert_payment(
    State(server): State<ClinicServer>,
    Path(payment_id): Path<Uuid>,
    auth: AuthContext,
    body: Option<Json<RevertPaymentRequest>>,
) -> Result<Json<ApiResponse<Payment>>, ApiError> {
    let payment = server
        .billing
        .payments()
        .find_by_id(payment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment"))?;

    if !auth.is_admin() {
        let appointment = found(server.appointments.find_by_id(payment.appointment_id).await, "Appointment")?;
        if appointment.doctor_id != auth.user_id {
            warn!(payment_id = %payment.id, user_id = %auth.user_id, "Payment reversal refused");
            return Err(ApiError::authorization("Only the appointment's doctor or an administrator can revert payments"));
        }
    }

    let reason = body.and_then(|Json(req)| non_blank(req.reason));
    let mut tx = server.transactions.begin().await?;
    let reverted = server.billing.revert(&mut *tx, &payment, reason.as_deref()).await?;
    TransactionManager::commit(tx).await?;

    Ok(Json(api_success(reverted)))
}

fn parse_filter<T>(raw: Option<&str>, parse: fn(&str) -> Option<T>, field: &str) -> ApiResult<Option<T>> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => parse(value)
            .map(Some)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown {} '{}'", field, value))),
        None => Ok(None),
    }
}

/// List payments visible to the caller, most recently paid first
#[utoipa::path(
    get,
    path = "/api/v1/payments",
    params(ListPaymentsQuery),
    responses(
        (status = 200, description = "Payments", body = Vec<Payment>),
        (status = 400, description = "Unknown method or status filter")
    ),
    tag = "payments",
    security(("bearer_auth" = []))
)]
pub async fn list_payments(
    State(server): State<ClinicServer>,
    Query(query): Query<ListPaymentsQuery>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<Payment>>>, ApiError> {
    let mut filter = PaymentFilter {
        patient_id: query.patient_id,
        doctor_id: None,
        method: parse_filter(query.method.as_deref(), PaymentMethod::parse, "payment method")?,
        status: parse_filter(query.status.as_deref(), PaymentStatus::parse, "payment status")?,
    };
    match auth.role {
        Role::Admin => {}
        Role::Patient => filter.patient_id = Some(auth.user_id),
        _ => filter.doctor_id = Some(auth.user_id),
    }

    let page = server
        .billing
        .payments()
        .list(filter, page_request(query.page, query.page_size))
        .await?;
    Ok(Json(api_paginated(page)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_amount_text_accepts_numbers_and_strings() {
        assert_eq!(amount_text(Some(&json!(850))), Some("850".to_string()));
        assert_eq!(amount_text(Some(&json!("850.50"))), Some("850.50".to_string()));
        assert_eq!(amount_text(Some(&json!(null))), None);
        assert_eq!(amount_text(None), None);
        assert_eq!(amount_text(Some(&json!([1]))), Some("[1]".to_string()));
    }

    #[test]
    fn test_list_filters() {
        assert_eq!(
            parse_filter(Some("in-office"), PaymentMethod::parse, "payment method").unwrap(),
            Some(PaymentMethod::InOffice)
        );
        assert_eq!(parse_filter(Some(" "), PaymentStatus::parse, "payment status").unwrap(), None);
        assert!(parse_filter(Some("CASH"), PaymentMethod::parse, "payment method").is_err());
    }
}
