//! Authentication context extraction
//!
//! Handlers take an [`AuthContext`] argument to require a valid access token.
//! The context carries the caller's id and role as signed into the token.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use database_layer::Role;
use uuid::Uuid;

use crate::auth::TokenType;
use crate::error::ApiError;
use crate::middleware::bearer_token;
use crate::server::ClinicServer;

/// Authenticated caller extracted from the bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthContext {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_clinician(&self) -> bool {
        self.role.is_clinician()
    }

    pub fn is_patient(&self) -> bool {
        self.role == Role::Patient
    }

    /// Require one of `roles`
    pub fn require_role(&self, roles: &[Role]) -> Result<(), ApiError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::authorization(format!(
                "Role {} is not allowed to perform this operation",
                self.role
            )))
        }
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        self.require_role(&[Role::Admin])
    }

    pub fn require_patient(&self) -> Result<(), ApiError> {
        self.require_role(&[Role::Patient])
    }

    /// Clinicians and administrators
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.is_clinician() || self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::authorization("Only clinicians or administrators can perform this operation"))
        }
    }
}

#[async_trait]
impl FromRequestParts<ClinicServer> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        server: &ClinicServer,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            ApiError::authentication("Missing or malformed Authorization header. Expected: Bearer <token>")
        })?;

        let claims = server
            .tokens
            .verify(token, TokenType::Access)
            .map_err(|e| ApiError::authentication(e.to_string()))?;

        let user_id = claims
            .user_id()
            .map_err(|_| ApiError::authentication("Invalid user ID in token"))?;

        Ok(AuthContext::new(user_id, claims.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_requirements() {
        let patient = AuthContext::new(Uuid::new_v4(), Role::Patient);
        assert!(patient.require_patient().is_ok());
        assert!(patient.require_staff().is_err());
        assert!(patient.require_admin().is_err());

        let screening = AuthContext::new(Uuid::new_v4(), Role::Screening);
        assert!(screening.require_staff().is_ok());
        assert!(screening.require_role(&[Role::Dermatologist, Role::Podiatrist]).is_err());
    }
}
