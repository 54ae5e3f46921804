//! Middleware for request processing

pub mod auth_context;

pub use auth_context::AuthContext;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use logger_redacted::PiiRedactor;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::auth::TokenType;
use crate::server::ClinicServer;

/// Request timing middleware
pub async fn request_timing_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = PiiRedactor::default().redact(&request.uri().to_string());

    let response = next.run(request).await;

    let elapsed = start.elapsed();

    tracing::info!(
        method = %method,
        uri = %uri,
        duration_ms = elapsed.as_millis(),
        status = response.status().as_u16(),
        "Request processed"
    );

    response
}

/// Audit logging middleware.
///
/// Logs the caller's user id when a valid access token is present, never the token.
pub async fn audit_logging_middleware(
    State(server): State<ClinicServer>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = server.redactor.redact(&request.uri().to_string());
    let user_id = bearer_token(request.headers())
        .and_then(|token| server.tokens.verify(token, TokenType::Access).ok())
        .map(|claims| claims.sub)
        .unwrap_or_else(|| "anonymous".to_string());

    tracing::info!(
        method = %method,
        uri = %uri,
        user_id = %user_id,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Audit log: Request received"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        user_id = %user_id,
        status = response.status().as_u16(),
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Audit log: Response sent"
    );

    response
}

/// Token part of an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Create CORS layer for the configured frontend origins
pub fn create_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }
}
